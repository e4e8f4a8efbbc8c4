//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "kiln", version, about = "Container image build planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a build plan for an application directory
    Plan {
        /// Application directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Pretty-print the plan JSON
        #[arg(long)]
        pretty: bool,

        /// Also print the lowered build IR
        #[arg(long)]
        dump_ir: bool,
    },

    /// Print the provider that would plan the application
    Detect {
        /// Application directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}
