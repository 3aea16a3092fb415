//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Samovar persona chat bot.
#[derive(Debug, Parser)]
#[command(name = "samovar", version, about)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data directory (defaults to $SAMOVAR_DATA_DIR, then ~/.samovar)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the REST API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1", env = "SAMOVAR_HOST")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 8080, env = "SAMOVAR_PORT")]
        port: u16,
    },

    /// Validate the configuration and print the effective settings
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_serve() {
        let cli = Cli::parse_from(["samovar", "-v", "serve", "--port", "9999"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Serve { port, .. } => assert_eq!(port, 9999),
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli_parses_check_with_data_dir() {
        let cli = Cli::parse_from(["samovar", "check", "--data-dir", "/tmp/x"]);
        assert_eq!(cli.data_dir.as_deref(), Some(std::path::Path::new("/tmp/x")));
        assert!(matches!(cli.command, Commands::Check));
    }
}
