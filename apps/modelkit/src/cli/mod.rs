//! # modelkit CLI Module
//!
//! This module implements the CLI interface for modelkit.
//!
//! ## Available Commands
//!
//! - `check` - Declare a schema and report compiled types
//! - `eval` - Create instances from a data file and report them
//! - `path` - Build a canonical path, optionally test a match

mod commands;

use clap::{Parser, Subcommand};
use modelkit_core::ModelError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// modelkit - declarative in-memory models
///
/// Declares model types from schema files, instantiates them, and resolves
/// the paths that address them.
#[derive(Parser, Debug)]
#[command(name = "modelkit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Declare every type of a schema and print the compiled fields
    Check {
        /// Schema file (.toml or .json)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Create the instances of a data file and print them
    Eval {
        /// Schema file (.toml or .json)
        #[arg(short, long)]
        schema: PathBuf,

        /// Data file: JSON list of {model, id?, parent?, data}
        #[arg(short, long)]
        data: PathBuf,

        /// Query to run afterwards: `<model>` or `<model>=<path pattern>`
        #[arg(long)]
        query: Option<String>,
    },

    /// Print the canonical path of a descriptor
    Path {
        /// Model type name
        #[arg(short, long)]
        name: String,

        /// Instance id (wildcard when omitted)
        #[arg(short, long)]
        id: Option<String>,

        /// Parent model type name
        #[arg(long)]
        parent_name: Option<String>,

        /// Parent instance id (wildcard when omitted)
        #[arg(long, requires = "parent_name")]
        parent_id: Option<String>,

        /// Explicit parent path
        #[arg(long, conflicts_with = "parent_name")]
        parent_path: Option<String>,

        /// Concrete path to test against the built path
        #[arg(short, long)]
        matches: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), ModelError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Check { schema } => cmd_check(&schema, json_mode),
        Commands::Eval {
            schema,
            data,
            query,
        } => cmd_eval(&schema, &data, query.as_deref(), json_mode),
        Commands::Path {
            name,
            id,
            parent_name,
            parent_id,
            parent_path,
            matches,
        } => {
            let args = PathArgs {
                name,
                id,
                parent_name,
                parent_id,
                parent_path,
                matches,
            };
            cmd_path(&args, json_mode)
        }
    }
}
