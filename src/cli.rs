//! CLI argument parsing

use clap::{Parser, Subcommand};

const CHANNEL_HELP: &str = "Command channel: stdio, dev=<port>[:baud] or ip=<host>:<port>";

const SPI_HELP: &str =
    "SPI backend, name[:key=value,...] (see `spiprog list-backends` for what is compiled in)";

#[derive(Parser)]
#[command(name = "spiprog")]
#[command(author, version, about = "Serial-attached SPI NOR flash programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the single-character command console
    Serve(ServeArgs),

    /// List the SPI backends and command channels this build supports
    ListBackends,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(short, long, default_value = "stdio", help = CHANNEL_HELP)]
    pub channel: String,

    #[arg(short, long, default_value = "dummy", help = SPI_HELP)]
    pub spi: String,

    /// Initial chip-size hint in MiB [default: the backend's chip size, else 8]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=16))]
    pub size_mib: Option<u32>,

    /// Give up on a sector erase after this many milliseconds
    #[arg(long, default_value_t = 1000)]
    pub erase_timeout_ms: u32,

    /// Give up on a page program after this many milliseconds
    #[arg(long, default_value_t = 10)]
    pub program_timeout_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["spiprog", "serve"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.channel, "stdio");
        assert_eq!(args.spi, "dummy");
        assert_eq!(args.size_mib, None);
        assert_eq!(args.erase_timeout_ms, 1000);
        assert_eq!(args.program_timeout_ms, 10);
    }

    #[test]
    fn test_serve_options() {
        let cli = Cli::try_parse_from([
            "spiprog",
            "-vv",
            "serve",
            "--channel",
            "ip=0.0.0.0:2222",
            "--spi",
            "dummy:wp=1",
            "--size-mib",
            "16",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.channel, "ip=0.0.0.0:2222");
        assert_eq!(args.spi, "dummy:wp=1");
        assert_eq!(args.size_mib, Some(16));
    }

    #[test]
    fn test_size_out_of_range() {
        assert!(Cli::try_parse_from(["spiprog", "serve", "--size-mib", "0"]).is_err());
        assert!(Cli::try_parse_from(["spiprog", "serve", "--size-mib", "32"]).is_err());
    }

    #[test]
    fn test_list_backends() {
        let cli = Cli::try_parse_from(["spiprog", "list-backends"]).unwrap();
        assert!(matches!(cli.command, Commands::ListBackends));
    }
}
