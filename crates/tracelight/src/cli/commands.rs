//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Dispatch command arguments.
#[derive(Debug, Args)]
pub struct DispatchCommand {
    /// Operation name (see `tracelight operations`)
    pub operation: String,

    /// Operation arguments as a JSON document
    #[arg(short, long, value_name = "JSON")]
    pub args: Option<String>,

    /// Print trace statistics after the call
    #[arg(short, long)]
    pub trace: bool,

    /// Skip the simulated fallback latency
    #[arg(long)]
    pub immediate: bool,
}

/// Diagnostics command arguments.
#[derive(Debug, Args)]
pub struct DiagnosticsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Skip the simulated fallback latency
    #[arg(long)]
    pub immediate: bool,
}

/// Document store commands.
#[derive(Debug, Subcommand)]
pub enum DocumentsCommand {
    /// Store a text file, replacing any document with the same name
    Add {
        /// Path to the file to store
        file: PathBuf,

        /// Name to store the document under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List stored documents
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove a stored document
    Remove {
        /// Document name
        name: String,
    },

    /// Search stored documents
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show document store statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Remove every stored document
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_command_debug() {
        let cmd = DispatchCommand {
            operation: "get_audio_levels".to_string(),
            args: None,
            trace: true,
            immediate: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("get_audio_levels"));
        assert!(debug_str.contains("trace"));
    }

    #[test]
    fn test_diagnostics_command_debug() {
        let cmd = DiagnosticsCommand {
            json: true,
            immediate: true,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("json"));
    }

    #[test]
    fn test_documents_command_debug() {
        let cmd = DocumentsCommand::Search {
            query: "pricing".to_string(),
            limit: 5,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Search"));
        assert!(debug_str.contains("pricing"));
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
