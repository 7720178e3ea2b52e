//! CLI module for Recap.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Recap - fetch, transcribe and summarize media
///
/// Items move through fetch, transcription and summarization with a durable
/// checkpoint after every step, so failed runs resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Recap and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Register a media URL as a new pending item
    Add {
        /// Media URL (anything yt-dlp understands)
        url: String,

        /// Channel or feed the item belongs to (defaults to the uploader)
        #[arg(short, long)]
        source: Option<String>,

        /// Title (probed from the URL when omitted)
        #[arg(short, long)]
        title: Option<String>,

        /// Duration in seconds (probed from the URL when omitted)
        #[arg(short, long)]
        duration: Option<u32>,
    },

    /// Run one item through the pipeline
    Process {
        /// Item ID
        id: String,

        /// Make a single attempt instead of retrying with backoff
        #[arg(long)]
        once: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process all pending items
    Run {
        /// Maximum number of items to pick up
        #[arg(short, long)]
        limit: Option<usize>,

        /// Items processed concurrently (default from config)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Reset a failed item and process it again
    Reprocess {
        /// Item ID
        id: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an item with its transcript and summary
    Status {
        /// Item ID
        id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List items
    List {
        /// Only show items in this status (e.g. pending, failed, downloading)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of items
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Delete an item
    Delete {
        /// Item ID
        id: String,

        /// Remove the item, its transcript and summary for good
        #[arg(long)]
        purge: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::parse_from(["recap", "-vv", "process", "abc", "--once", "--json"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Process { id, once, json } => {
                assert_eq!(id, "abc");
                assert!(once && json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_filter() {
        let cli = Cli::parse_from(["recap", "list", "--status", "failed", "-l", "5"]);
        assert!(matches!(
            cli.command,
            Commands::List { status: Some(ref s), limit: Some(5) } if s == "failed"
        ));
    }
}
