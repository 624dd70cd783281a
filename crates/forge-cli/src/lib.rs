//! forge - package and publish module variants
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a `forge.toml`, resolves the package descriptor against local
//! artifacts, assembles one jar per variant and publishes every jar to
//! every configured target.

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use forge_core::USER_AGENT;

#[derive(Debug, Parser)]
#[command(name = "forge")]
#[command(author, version, about = "forge - package and publish module variants")]
pub struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "FORGE_CONFIG",
        default_value = forge_core::config::CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the descriptor and print each variant's entries
    Resolve {
        /// Only this variant
        #[arg(long)]
        variant: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Assemble every variant and write the jars to a directory
    Assemble {
        /// Output directory
        #[arg(short, long, default_value = "build/forge")]
        output: PathBuf,
    },
    /// Resolve, assemble and publish to the configured targets
    Publish {
        /// Override publish.max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Only publish to these targets
        #[arg(long = "target", value_name = "NAME")]
        targets: Vec<String>,
    },
    /// List the target kinds this build understands
    Targets,
    /// Split a version into its components
    Version {
        /// Version string, e.g. 3.10.8-SNAPSHOT
        version: String,
        /// Print only the first N components
        #[arg(long, value_name = "N")]
        components: Option<usize>,
    },
}
