//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// signaltrader - turns chat trade signals into managed futures order brackets.
#[derive(Parser, Debug)]
#[command(name = "signaltrader")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the engine (foreground).
    Run(RunArgs),
    /// Validate the configuration file and exit.
    Check,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Use JSON log output instead of pretty-printed.
    #[arg(long)]
    pub json_logs: bool,

    /// Detect and place orders normally, but skip the final `create_order`
    /// call - useful for dry-running a new channel parser against live
    /// traffic without risking capital.
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_subcommand_with_flags() {
        let cli = Cli::parse_from(["signaltrader", "run", "--dry-run"]);
        match cli.command {
            Commands::Run(args) => assert!(args.dry_run),
            Commands::Check => panic!("expected Run"),
        }
    }

    #[test]
    fn parses_check_subcommand() {
        let cli = Cli::parse_from(["signaltrader", "check"]);
        assert!(matches!(cli.command, Commands::Check));
    }
}
