//! SPI backend registration and dispatch
//!
//! Backends are selected with a `name:key=value,key=value` string. Each one
//! resolves to a variant of [`Backend`], which forwards the core bus trait.

use spiprog_core::spi::SpiBus;
use spiprog_dummy::{DummyConfig, DummyFlash};
use thiserror::Error;

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Errors opening a backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// No backend with that name is compiled in
    #[error("Unknown SPI backend: {0}\n\n{help}", help = backend_help())]
    Unknown(String),

    /// Option value could not be used
    #[error("Invalid option {key}={value} for {backend}")]
    InvalidOption {
        backend: &'static str,
        key: String,
        value: String,
    },

    /// Linux GPIO failure
    #[cfg(feature = "linux-gpio")]
    #[error(transparent)]
    LinuxGpio(#[from] spiprog_linux_gpio::LinuxGpioError),
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    backends.push(BackendInfo {
        name: "dummy",
        aliases: &["emulator"],
        description: "In-memory flash emulator (size=<MiB>,wp=<0|1>,busy=<polls>)",
    });

    #[cfg(feature = "linux-gpio")]
    backends.push(BackendInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO bit-bang (dev=/dev/gpiochipN|gpiochip=N,cs=,sck=,mosi=,miso=[,power=][,spispeed=<kHz>])",
    });

    backends
}

/// Generate help text listing all available backends
pub fn backend_help() -> String {
    let mut help = String::from("Available SPI backends:\n");
    for b in available_backends() {
        help.push_str(&format!("  {:12} - {}\n", b.name, b.description));
    }
    help
}

/// Print the compiled-in backends and channel kinds
pub fn list_backends() {
    print!("{}", backend_help());
    println!();
    println!("Command channels:");
    println!("  stdio             - this process's stdin/stdout");
    println!("  dev=<port>[:baud] - serial port (default 115200 baud)");
    println!("  ip=<host>:<port>  - TCP listener, one client at a time");
}

/// Resolve an alias to the backend's primary name
pub fn find_backend(name: &str) -> Option<&'static str> {
    available_backends()
        .into_iter()
        .find(|b| b.name == name || b.aliases.contains(&name))
        .map(|b| b.name)
}

/// Parse a backend string into name and options
///
/// Format: `name:key1=value1,key2=value2`
pub fn parse_backend_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// An opened SPI backend
pub enum Backend {
    /// Emulated chip
    Dummy(DummyFlash),
    /// GPIO lines on a Linux gpiochip
    #[cfg(feature = "linux-gpio")]
    LinuxGpio(spiprog_linux_gpio::LinuxGpioSpi),
}

impl Backend {
    /// Size of the attached chip, when the backend knows it
    pub fn chip_size(&self) -> Option<u32> {
        match self {
            Self::Dummy(chip) => u32::try_from(chip.config().size).ok(),
            #[cfg(feature = "linux-gpio")]
            Self::LinuxGpio(_) => None,
        }
    }
}

impl SpiBus for Backend {
    fn select(&mut self, asserted: bool) -> spiprog_core::Result<()> {
        match self {
            Self::Dummy(bus) => bus.select(asserted),
            #[cfg(feature = "linux-gpio")]
            Self::LinuxGpio(bus) => bus.select(asserted),
        }
    }

    fn exchange(&mut self, byte: u8) -> spiprog_core::Result<u8> {
        match self {
            Self::Dummy(bus) => bus.exchange(byte),
            #[cfg(feature = "linux-gpio")]
            Self::LinuxGpio(bus) => bus.exchange(byte),
        }
    }

    fn power(&mut self, on: bool) -> spiprog_core::Result<()> {
        match self {
            Self::Dummy(bus) => bus.power(on),
            #[cfg(feature = "linux-gpio")]
            Self::LinuxGpio(bus) => bus.power(on),
        }
    }

    fn delay_us(&mut self, us: u32) {
        match self {
            Self::Dummy(bus) => bus.delay_us(us),
            #[cfg(feature = "linux-gpio")]
            Self::LinuxGpio(bus) => bus.delay_us(us),
        }
    }
}

/// Open the backend named by `spec`
pub fn open_backend(spec: &str) -> Result<Backend, BackendError> {
    let (name, options) = parse_backend_string(spec);
    let resolved = find_backend(name).ok_or_else(|| BackendError::Unknown(name.to_string()))?;
    log::debug!("backend: opening {} with {:?}", resolved, options);

    match resolved {
        "dummy" => Ok(Backend::Dummy(DummyFlash::new(parse_dummy_options(
            &options,
        )?))),
        #[cfg(feature = "linux-gpio")]
        "linux_gpio" => Ok(Backend::LinuxGpio(
            spiprog_linux_gpio::open_from_options(&options)?,
        )),
        _ => Err(BackendError::Unknown(name.to_string())),
    }
}

/// Parse `dummy` backend options
pub fn parse_dummy_options(options: &[(&str, &str)]) -> Result<DummyConfig, BackendError> {
    let invalid = |key: &str, value: &str| BackendError::InvalidOption {
        backend: "dummy",
        key: key.to_string(),
        value: value.to_string(),
    };

    let mut config = DummyConfig::default();
    for &(key, value) in options {
        match key {
            "size" => {
                let mib: usize = value.parse().map_err(|_| invalid(key, value))?;
                if mib == 0 || mib > 16 {
                    return Err(invalid(key, value));
                }
                config.size = mib * 1024 * 1024;
            }
            "wp" => {
                config.write_protect = match value {
                    "0" => false,
                    "1" => true,
                    _ => return Err(invalid(key, value)),
                }
            }
            "busy" => config.busy_polls = value.parse().map_err(|_| invalid(key, value))?,
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }
    Ok(config)
}
