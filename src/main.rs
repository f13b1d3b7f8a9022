//! spiprog - Serial-attached SPI NOR flash programmer
//!
//! Serves a single-character command console over stdio, a serial port or a
//! TCP socket and carries each command out on one SPI NOR chip.
//!
//! # Architecture
//!
//! - `spiprog-core` holds the console dispatcher, the 25-series flash protocol
//!   and the XMODEM/raw bulk transfers. It is `no_std` and only sees the
//!   `Channel` and `SpiBus` traits.
//! - `spiprog-serial` provides the command channels.
//! - SPI backends (`spiprog-dummy`, `spiprog-linux-gpio`) provide the bus.

mod backends;
mod cli;
mod serve;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Serve(args) => serve::run(&args),
        Commands::ListBackends => {
            backends::list_backends();
            Ok(())
        }
    }
}
