//! CLI argument definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// kakeibo - Receipt scanning, item tagging, and AI-written monthly reviews
#[derive(Parser, Debug)]
#[command(name = "kakeibo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record every receipt in the input directory, then write monthly summaries and charts
    Run {
        /// Do not generate monthly summaries
        #[arg(long)]
        skip_summary: bool,

        /// Do not draw spending charts
        #[arg(long)]
        skip_graph: bool,
    },

    /// Record a single receipt image
    Process {
        /// Receipt image
        file: PathBuf,
    },

    /// Write the AI summary for one month
    Summarize {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// Tag the items listed in a JSON file and print the result
    Tag {
        /// JSON array of items, or an object with an "items" array
        file: PathBuf,
    },

    /// Check a JSON file against a completion schema
    Validate {
        /// Schema to check against
        #[arg(value_enum)]
        schema: SchemaKind,

        /// JSON file to check
        file: PathBuf,

        /// Number of items the tag result must contain
        #[arg(short, long)]
        expected: Option<usize>,
    },

    /// List months that have ledger entries
    Months,

    /// Show category totals and the comparison prompt for one month
    Report {
        #[arg(short, long)]
        year: i32,

        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// Show the tag vocabulary
    Tags,

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Commands {
    /// Commands that call out to the services or change the ledger
    pub fn writes_run_log(&self) -> bool {
        matches!(
            self,
            Self::Run { .. } | Self::Process { .. } | Self::Summarize { .. } | Self::Tag { .. }
        )
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    /// Monthly summary
    Summary,
    /// Item tags
    Tags,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn month_outside_range_is_rejected() {
        let err = Cli::try_parse_from(["kakeibo", "report", "--year", "2026", "--month", "13"]);
        assert!(err.is_err());

        let ok = Cli::try_parse_from(["kakeibo", "summarize", "-y", "2026", "-m", "1"]).unwrap();
        assert!(matches!(ok.command, Commands::Summarize { year: 2026, month: 1 }));
    }

    #[test]
    fn validate_takes_schema_and_expected_count() {
        let cli = Cli::try_parse_from(["kakeibo", "validate", "tags", "a.json", "--expected", "3"])
            .unwrap();
        match cli.command {
            Commands::Validate {
                schema, expected, ..
            } => {
                assert_eq!(schema, SchemaKind::Tags);
                assert_eq!(expected, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn run_flags_default_off() {
        let cli = Cli::try_parse_from(["kakeibo", "run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                skip_summary: false,
                skip_graph: false
            }
        ));

        let cli = Cli::try_parse_from(["kakeibo", "run", "--skip-graph"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { skip_graph: true, .. }));
    }

    #[test]
    fn only_ledger_commands_write_a_run_log() {
        let run = Cli::try_parse_from(["kakeibo", "run"]).unwrap();
        assert!(run.command.writes_run_log());

        let months = Cli::try_parse_from(["kakeibo", "months"]).unwrap();
        assert!(!months.command.writes_run_log());

        let config = Cli::try_parse_from(["kakeibo", "config", "path"]).unwrap();
        assert!(!config.command.writes_run_log());
    }
}
