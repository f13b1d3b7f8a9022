//! GPIO lines from a Linux character device, driven as a bit-banged SPI bus
//!
//! All lines live in one `gpiocdev` request. Each [`LinuxLine`] holds a
//! shared handle to that request plus its own offset, which is all the core
//! [`BitbangBus`] needs.

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use spiprog_core::spi::{BitbangBus, GpioLine};

use crate::error::{LinuxGpioError, Result};

/// Default half-period delay in microseconds (roughly 100 kHz SPI clock)
const DEFAULT_HALF_PERIOD_US: u32 = 5;

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "spiprog";

/// Configuration for opening a Linux GPIO SPI bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxGpioSpiConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS (Chip Select) GPIO line offset
    pub cs: Offset,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI GPIO line offset
    pub mosi: Offset,
    /// MISO GPIO line offset
    pub miso: Offset,
    /// Power-enable GPIO line offset, for boards with a switched supply rail
    pub power: Option<Offset>,
    /// Half-period delay in microseconds
    pub half_period_us: u32,
}

impl Default for LinuxGpioSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            cs: 0,
            sck: 0,
            mosi: 0,
            miso: 0,
            power: None,
            half_period_us: DEFAULT_HALF_PERIOD_US,
        }
    }
}

impl LinuxGpioSpiConfig {
    /// Create a new configuration with the given device path and required pins
    pub fn new(
        device: impl Into<String>,
        cs: Offset,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            cs,
            sck,
            mosi,
            miso,
            ..Default::default()
        }
    }

    /// Set the power-enable line
    pub fn with_power(mut self, power: Offset) -> Self {
        self.power = Some(power);
        self
    }

    /// Set SPI speed in kHz (approximate, via half-period calculation)
    ///
    /// Anything above 500 kHz runs without delays, as fast as the GPIO
    /// writes go.
    pub fn with_speed_khz(mut self, khz: u32) -> Self {
        if khz > 0 {
            self.half_period_us = 500 / khz;
        }
        self
    }

    fn offsets(&self) -> impl Iterator<Item = Offset> + '_ {
        [self.cs, self.sck, self.mosi, self.miso]
            .into_iter()
            .chain(self.power)
    }
}

/// One line of the shared request
pub struct LinuxLine {
    request: Rc<Request>,
    offset: Offset,
    name: &'static str,
}

impl LinuxLine {
    /// Line offset on the chip
    pub fn offset(&self) -> Offset {
        self.offset
    }
}

impl GpioLine for LinuxLine {
    fn set(&mut self) {
        self.write(true)
    }

    fn clear(&mut self) {
        self.write(false)
    }

    fn write(&mut self, high: bool) {
        let value = if high { Value::Active } else { Value::Inactive };
        if let Err(e) = self.request.set_value(self.offset, value) {
            log::error!("Failed to set {} (line {}): {}", self.name, self.offset, e);
        }
    }

    fn read(&mut self) -> bool {
        match self.request.value(self.offset) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("Failed to get {} (line {}): {}", self.name, self.offset, e);
                false
            }
        }
    }
}

/// Bit-banged SPI bus over Linux GPIO lines
pub type LinuxGpioSpi = BitbangBus<LinuxLine>;

fn sleep_us(us: u32) {
    std::thread::sleep(Duration::from_micros(us as u64));
}

/// Request the configured lines and build a bus on them
pub fn open(config: &LinuxGpioSpiConfig) -> Result<LinuxGpioSpi> {
    if config.device.is_empty() {
        return Err(LinuxGpioError::NoDevice);
    }
    check_distinct(config)?;

    log::debug!("linux_gpio: Opening device {}", config.device);

    // Initial state: CS high (inactive), SCK low, MOSI low, power off
    let mut req_config = Config::default();
    req_config.with_line(config.cs).as_output(Value::Active);
    req_config.with_line(config.sck).as_output(Value::Inactive);
    req_config.with_line(config.mosi).as_output(Value::Inactive);
    req_config.with_line(config.miso).as_input();
    if let Some(power) = config.power {
        req_config.with_line(power).as_output(Value::Inactive);
    }

    let request = Request::from_config(req_config)
        .on_chip(&config.device)
        .with_consumer(CONSUMER)
        .request()
        .map_err(|source| LinuxGpioError::LineRequestFailed {
            path: config.device.clone(),
            source,
        })?;
    let request = Rc::new(request);

    log::info!(
        "linux_gpio: Opened {} (cs={}, sck={}, mosi={}, miso={}{}), half period {}us",
        config.device,
        config.cs,
        config.sck,
        config.mosi,
        config.miso,
        config
            .power
            .map(|p| format!(", power={}", p))
            .unwrap_or_default(),
        config.half_period_us
    );

    let line = |offset, name| LinuxLine {
        request: Rc::clone(&request),
        offset,
        name,
    };
    let pins = spiprog_core::spi::bitbang::BitbangPins {
        cs: line(config.cs, "CS"),
        sck: line(config.sck, "SCK"),
        mosi: line(config.mosi, "MOSI"),
        miso: line(config.miso, "MISO"),
        power: config.power.map(|p| line(p, "POWER")),
    };

    Ok(BitbangBus::new(pins).with_delay(config.half_period_us, sleep_us))
}

fn check_distinct(config: &LinuxGpioSpiConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for offset in config.offsets() {
        if !seen.insert(offset) {
            return Err(LinuxGpioError::DuplicateLine(offset));
        }
    }
    Ok(())
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

/// Parse bus options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (required, or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - CS (chip select) GPIO line offset (required)
/// - `sck=N` - SCK (clock) GPIO line offset (required)
/// - `mosi=N` - MOSI GPIO line offset (required)
/// - `miso=N` - MISO GPIO line offset (required)
/// - `power=N` - power-enable GPIO line offset (optional)
/// - `spispeed=N` - SPI speed in kHz (optional, default ~100 kHz)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioSpiConfig> {
    let mut config = LinuxGpioSpiConfig::default();
    let mut cs = None;
    let mut sck = None;
    let mut mosi = None;
    let mut miso = None;
    let mut gpiochip: Option<u32> = None;

    for (key, value) in options {
        match *key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("gpiochip={}", value))
                })?);
            }
            "cs" => cs = Some(parse_line("cs", value)?),
            "sck" => sck = Some(parse_line("sck", value)?),
            "mosi" => mosi = Some(parse_line("mosi", value)?),
            "miso" => miso = Some(parse_line("miso", value)?),
            "power" => config.power = Some(parse_line("power", value)?),
            "spispeed" => {
                let khz: u32 = value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("spispeed={}", value))
                })?;
                config = config.with_speed_khz(khz);
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    match (config.device.is_empty(), gpiochip) {
        (true, Some(n)) => config.device = format!("/dev/gpiochip{}", n),
        (true, None) => return Err(LinuxGpioError::NoDevice),
        (false, Some(_)) => return Err(LinuxGpioError::ConflictingDevice),
        (false, None) => {}
    }

    config.cs = cs.ok_or(LinuxGpioError::MissingParameter("cs"))?;
    config.sck = sck.ok_or(LinuxGpioError::MissingParameter("sck"))?;
    config.mosi = mosi.ok_or(LinuxGpioError::MissingParameter("mosi"))?;
    config.miso = miso.ok_or(LinuxGpioError::MissingParameter("miso"))?;
    check_distinct(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config = parse_options(&[
            ("gpiochip", "0"),
            ("cs", "25"),
            ("sck", "11"),
            ("mosi", "10"),
            ("miso", "9"),
            ("power", "17"),
            ("spispeed", "50"),
        ])
        .unwrap();
        assert_eq!(config.device, "/dev/gpiochip0");
        assert_eq!((config.cs, config.sck, config.mosi, config.miso), (25, 11, 10, 9));
        assert_eq!(config.power, Some(17));
        assert_eq!(config.half_period_us, 10);
    }

    #[test]
    fn test_parse_options_defaults() {
        let config = parse_options(&[
            ("dev", "/dev/gpiochip2"),
            ("cs", "1"),
            ("sck", "2"),
            ("mosi", "3"),
            ("miso", "4"),
        ])
        .unwrap();
        assert_eq!(config, LinuxGpioSpiConfig::new("/dev/gpiochip2", 1, 2, 3, 4));
        assert_eq!(config.half_period_us, DEFAULT_HALF_PERIOD_US);
    }

    #[test]
    fn test_parse_options_errors() {
        assert!(matches!(
            parse_options(&[("cs", "1"), ("sck", "2"), ("mosi", "3"), ("miso", "4")]),
            Err(LinuxGpioError::NoDevice)
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/gpiochip0"), ("gpiochip", "0")]),
            Err(LinuxGpioError::ConflictingDevice)
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("cs", "1"), ("sck", "2"), ("mosi", "3")]),
            Err(LinuxGpioError::MissingParameter("miso"))
        ));
        assert!(matches!(
            parse_options(&[("gpiochip", "0"), ("cs", "x")]),
            Err(LinuxGpioError::InvalidLineNumber { name: "cs", .. })
        ));
        assert!(matches!(
            parse_options(&[
                ("gpiochip", "0"),
                ("cs", "1"),
                ("sck", "2"),
                ("mosi", "3"),
                ("miso", "4"),
                ("power", "2"),
            ]),
            Err(LinuxGpioError::DuplicateLine(2))
        ));
    }

    #[test]
    fn test_fast_speed_has_no_delay() {
        let config = LinuxGpioSpiConfig::default().with_speed_khz(1000);
        assert_eq!(config.half_period_us, 0);
    }

    #[test]
    fn test_open_without_device() {
        assert!(matches!(
            open(&LinuxGpioSpiConfig::default()),
            Err(LinuxGpioError::NoDevice)
        ));
    }
}
