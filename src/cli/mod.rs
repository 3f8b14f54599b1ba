//! CLI module for the keygen service
//!
//! - `serve`: run the HTTP API (default)
//! - `migrate`: apply PostgreSQL migrations and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// Keygen Service - API key issuance, validation and revocation
#[derive(Parser)]
#[command(name = "keygen-service")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Apply pending PostgreSQL migrations
    Migrate(migrate::MigrateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["keygen-service"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["keygen-service", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Serve)));

        let cli = Cli::try_parse_from([
            "keygen-service",
            "migrate",
            "--database-url",
            "postgres://localhost/keys",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Migrate(args)) => {
                assert_eq!(args.database_url.as_deref(), Some("postgres://localhost/keys"));
            }
            _ => panic!("expected migrate"),
        }
    }
}
