//! Bit-banged SPI over plain GPIO lines
//!
//! Microcontroller pins, Linux GPIO character devices and test doubles all
//! reduce to the same capability: drive a line high, drive it low, or sample
//! it. [`GpioLine`] is that capability, resolved once when the bus is built,
//! and [`BitbangBus`] turns four (or five) of them into an [`SpiBus`].
//!
//! Timing is SPI mode 0: data is set up while SCK is low and sampled on the
//! rising edge, MSB first.

use super::SpiBus;
use crate::error::Result;

/// A single GPIO line
pub trait GpioLine {
    /// Drive the line high
    fn set(&mut self);

    /// Drive the line low
    fn clear(&mut self);

    /// Sample the line level
    fn read(&mut self) -> bool;

    /// Drive the line to `high`
    fn write(&mut self, high: bool) {
        if high {
            self.set()
        } else {
            self.clear()
        }
    }
}

/// Microsecond delay hook used for clock half-periods and poll intervals
pub type DelayFn = fn(u32);

fn no_delay(_us: u32) {}

/// Pins making up a bit-banged bus
pub struct BitbangPins<L> {
    /// Chip select (active low)
    pub cs: L,
    /// Serial clock
    pub sck: L,
    /// Controller out, device in
    pub mosi: L,
    /// Controller in, device out
    pub miso: L,
    /// Optional power-enable line for boards with a switched supply rail
    pub power: Option<L>,
}

/// SPI bus implemented by toggling GPIO lines
pub struct BitbangBus<L: GpioLine> {
    pins: BitbangPins<L>,
    half_period_us: u32,
    delay: DelayFn,
}

impl<L: GpioLine> BitbangBus<L> {
    /// Build a bus from its pins, leaving chip-select deasserted and SCK low
    ///
    /// The default has no clock delay, which suits targets where a GPIO
    /// write is already slower than the flash's maximum clock.
    pub fn new(mut pins: BitbangPins<L>) -> Self {
        pins.cs.set();
        pins.sck.clear();
        pins.mosi.clear();
        if let Some(power) = pins.power.as_mut() {
            power.clear();
        }
        Self {
            pins,
            half_period_us: 0,
            delay: no_delay,
        }
    }

    /// Use `delay` for clock half-periods of `half_period_us` microseconds
    pub fn with_delay(mut self, half_period_us: u32, delay: DelayFn) -> Self {
        self.half_period_us = half_period_us;
        self.delay = delay;
        self
    }

    /// Give the pins back
    pub fn release(self) -> BitbangPins<L> {
        self.pins
    }

    fn half_period_delay(&self) {
        if self.half_period_us > 0 {
            (self.delay)(self.half_period_us);
        }
    }
}

impl<L: GpioLine> SpiBus for BitbangBus<L> {
    fn select(&mut self, asserted: bool) -> Result<()> {
        if asserted {
            self.pins.sck.clear();
            self.pins.cs.clear();
        } else {
            self.pins.sck.clear();
            self.half_period_delay();
            self.pins.cs.set();
        }
        self.half_period_delay();
        Ok(())
    }

    fn exchange(&mut self, byte: u8) -> Result<u8> {
        let mut input = 0u8;
        for i in (0..8).rev() {
            self.pins.sck.clear();
            self.pins.mosi.write((byte >> i) & 1 != 0);
            self.half_period_delay();
            self.pins.sck.set();
            input <<= 1;
            if self.pins.miso.read() {
                input |= 1;
            }
            self.half_period_delay();
        }
        self.pins.sck.clear();
        Ok(input)
    }

    fn power(&mut self, on: bool) -> Result<()> {
        if let Some(power) = self.pins.power.as_mut() {
            log::trace!("bitbang: power {}", if on { "on" } else { "off" });
            power.write(on);
        }
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        (self.delay)(us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Shared wire state: a loopback where MISO mirrors MOSI one bit late
    #[derive(Default)]
    struct Wires {
        cs: bool,
        sck: bool,
        mosi: bool,
        power: bool,
        shifted_in: Vec<bool>,
    }

    #[derive(Clone, Copy)]
    enum Pin {
        Cs,
        Sck,
        Mosi,
        Miso,
        Power,
    }

    struct TestLine {
        pin: Pin,
        wires: Rc<RefCell<Wires>>,
        response: Rc<RefCell<Vec<bool>>>,
    }

    impl GpioLine for TestLine {
        fn set(&mut self) {
            self.write(true)
        }

        fn clear(&mut self) {
            self.write(false)
        }

        fn write(&mut self, high: bool) {
            let mut w = self.wires.borrow_mut();
            match self.pin {
                Pin::Cs => w.cs = high,
                Pin::Sck => {
                    // Rising edge while selected: device samples MOSI
                    if high && !w.sck && !w.cs {
                        let bit = w.mosi;
                        w.shifted_in.push(bit);
                    }
                    w.sck = high;
                }
                Pin::Mosi => w.mosi = high,
                Pin::Power => w.power = high,
                Pin::Miso => {}
            }
        }

        fn read(&mut self) -> bool {
            match self.pin {
                Pin::Miso => {
                    let mut r = self.response.borrow_mut();
                    if r.is_empty() {
                        true
                    } else {
                        r.remove(0)
                    }
                }
                _ => false,
            }
        }
    }

    fn bus_with_response(bits: Vec<bool>) -> (BitbangBus<TestLine>, Rc<RefCell<Wires>>) {
        let wires = Rc::new(RefCell::new(Wires::default()));
        let response = Rc::new(RefCell::new(bits));
        let line = |pin| TestLine {
            pin,
            wires: wires.clone(),
            response: response.clone(),
        };
        let pins = BitbangPins {
            cs: line(Pin::Cs),
            sck: line(Pin::Sck),
            mosi: line(Pin::Mosi),
            miso: line(Pin::Miso),
            power: Some(line(Pin::Power)),
        };
        (BitbangBus::new(pins), wires)
    }

    fn bits_of(byte: u8) -> Vec<bool> {
        (0..8).rev().map(|i| (byte >> i) & 1 != 0).collect()
    }

    #[test]
    fn test_idle_state() {
        let (_bus, wires) = bus_with_response(Vec::new());
        let w = wires.borrow();
        assert!(w.cs, "chip-select must start deasserted");
        assert!(!w.sck);
        assert!(!w.power);
    }

    #[test]
    fn test_exchange_msb_first() {
        let (mut bus, wires) = bus_with_response(bits_of(0x3C));
        bus.select(true).unwrap();
        assert!(!wires.borrow().cs);

        let got = bus.exchange(0xA5).unwrap();
        bus.select(false).unwrap();

        assert_eq!(got, 0x3C);
        assert_eq!(wires.borrow().shifted_in, bits_of(0xA5));
        assert!(wires.borrow().cs);
    }

    #[test]
    fn test_power_line() {
        let (mut bus, wires) = bus_with_response(Vec::new());
        bus.power(true).unwrap();
        assert!(wires.borrow().power);
        bus.power(false).unwrap();
        assert!(!wires.borrow().power);
    }
}
