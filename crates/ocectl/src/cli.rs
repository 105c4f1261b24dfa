//! Command line definition for ocectl.

use clap::{Parser, Subcommand};

/// Default daemon URL
pub const DEFAULT_URL: &str = "http://127.0.0.1:7870";

#[derive(Debug, Parser)]
#[command(name = "ocectl")]
#[command(about = "OCE control - send questions to the oced pipeline", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Base URL of the oced daemon
    #[arg(long, global = true, env = "OCE_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// Bearer key, when the daemon requires one
    #[arg(long, global = true, env = "OCE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check that the daemon is up
    Health,

    /// Run the pipeline on a question
    Run {
        /// Question or problem statement
        text: String,

        /// Project whose session notes apply
        #[arg(long, short)]
        project: Option<String>,

        /// Extra hints as a JSON object
        #[arg(long)]
        hints: Option<String>,

        /// Print the raw JSON response instead of the report
        #[arg(long)]
        json: bool,
    },

    /// Manage session notes
    Notes {
        #[command(subcommand)]
        action: NotesAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum NotesAction {
    /// List notes for a project
    Get { project: String },

    /// Store one note
    Put {
        project: String,
        key: String,
        value: String,
    },

    /// Delete every note for a project
    Purge { project: String },

    /// Delete the notes of every project
    PurgeAll,
}
