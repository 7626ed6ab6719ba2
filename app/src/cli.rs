//! Command-line interface.

use clap::{Parser, Subcommand};

/// Maintenance commands for the KiwiScript course database.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Recompute Section and Series aggregates and fix any drift.
    Reconcile {
        /// Only reconcile this Series
        #[arg(long)]
        series_id: Option<i32>,
        /// Print the drift reports as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reconcile_with_series() {
        let cli = Cli::try_parse_from(["kiwiscript", "reconcile", "--series-id", "7"])
            .map(|cli| cli.command);

        assert!(matches!(
            cli,
            Ok(Command::Reconcile {
                series_id: Some(7),
                json: false
            })
        ));
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Cli::try_parse_from(["kiwiscript", "serve"]).is_err());
    }
}
