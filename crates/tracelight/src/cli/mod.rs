//! Command-line interface for tracelight.
//!
//! This module provides the CLI structure for the `tracelight` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, DiagnosticsCommand, DispatchCommand, DocumentsCommand};

use crate::logging::Verbosity;

/// tracelight - Checkpoint tracing and adaptive dispatch
///
/// Runs operations through the adaptive dispatcher, manages the coaching
/// document store, and reports what the trace registry recorded.
#[derive(Debug, Parser)]
#[command(name = "tracelight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one operation through the adaptive dispatcher
    Dispatch(DispatchCommand),

    /// List the operations the fallback catalog serves
    Operations,

    /// Exercise the dispatcher and report trace statistics
    Diagnostics(DiagnosticsCommand),

    /// Manage the coaching document store
    #[command(subcommand)]
    Documents(DocumentsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli_with(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Operations,
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "tracelight");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(cli_with(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli_with(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli_with(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli_with(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dispatch_with_args() {
        let args = vec![
            "tracelight",
            "dispatch",
            "generate_coaching_prompt",
            "--args",
            r#"{"transcript":"too expensive"}"#,
            "--trace",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Dispatch(cmd) = cli.command else {
            panic!("expected dispatch");
        };
        assert_eq!(cmd.operation, "generate_coaching_prompt");
        assert!(cmd.args.is_some());
        assert!(cmd.trace);
        assert!(!cmd.immediate);
    }

    #[test]
    fn test_parse_operations() {
        let cli = Cli::try_parse_from(["tracelight", "operations"]).unwrap();
        assert!(matches!(cli.command, Command::Operations));
    }

    #[test]
    fn test_parse_diagnostics_json() {
        let cli = Cli::try_parse_from(["tracelight", "diagnostics", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Diagnostics(DiagnosticsCommand { json: true, .. })
        ));
    }

    #[test]
    fn test_parse_documents_search_default_limit() {
        let cli = Cli::try_parse_from(["tracelight", "documents", "search", "pricing"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Documents(DocumentsCommand::Search { limit: 5, .. })
        ));
    }

    #[test]
    fn test_parse_documents_add() {
        let cli =
            Cli::try_parse_from(["tracelight", "documents", "add", "notes.txt", "-n", "notes"])
                .unwrap();
        let Command::Documents(DocumentsCommand::Add { file, name }) = cli.command else {
            panic!("expected documents add");
        };
        assert_eq!(file, PathBuf::from("notes.txt"));
        assert_eq!(name.as_deref(), Some("notes"));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["tracelight", "config", "validate", "-f", "/tmp/c.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let args = vec!["tracelight", "-c", "/custom/config.toml", "operations"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["tracelight", "operations", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let cli = Cli::try_parse_from(["tracelight", "operations", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["tracelight", "daemon"]).is_err());
    }
}
