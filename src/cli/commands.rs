//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Formwork - declarative infrastructure stack manager.
#[derive(Parser, Debug)]
#[command(name = "formwork")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory.
    #[arg(short, long, global = true, env = "FORMWORK_PATH", default_value = ".")]
    pub path: PathBuf,

    /// Target region.
    #[arg(
        short,
        long,
        global = true,
        env = "FORMWORK_REGION",
        default_value = "us-east-1"
    )]
    pub region: String,

    /// Target environment.
    #[arg(
        short,
        long,
        global = true,
        env = "FORMWORK_ENVIRONMENT",
        default_value = "development"
    )]
    pub environment: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Formwork project.
    Init,

    /// List the stacks declared for the region.
    List,

    /// Show the deployed details of one stack.
    Show {
        /// Stack name (post-prefix).
        stack: String,
    },

    /// Show deployed status for one or all stacks.
    Status {
        /// Stack name; all declared stacks when omitted.
        stack: Option<String>,
    },

    /// Diff local templates and parameters against what is deployed.
    Diff {
        /// Stack name; all declared stacks when omitted.
        stack: Option<String>,
    },

    /// Create or update one or all stacks.
    Update {
        /// Stack name; all declared stacks when omitted.
        stack: Option<String>,

        /// Execute change sets that replace or remove resources.
        #[arg(long)]
        allow_destructive: bool,

        /// Skip confirmation prompts.
        #[arg(short, long)]
        yes: bool,
    },

    /// Write deployed templates over the local files.
    Dump {
        /// Stack name; all declared stacks when omitted.
        stack: Option<String>,

        /// Skip confirmation prompts.
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
