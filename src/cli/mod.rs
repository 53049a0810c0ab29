//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parallel test execution engine
#[derive(Parser, Debug)]
#[command(name = "testgrid")]
#[command(version)]
#[command(about = "Run test suites with keyed exclusion and lifecycle hooks")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./testgrid.yaml and friends)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the tests of a suite file
    Run(RunArgs),

    /// List the tests of a suite file without running them
    List(ListArgs),

    /// List the hooks of a suite file
    Hooks(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite file (YAML or JSON)
    pub suite: PathBuf,

    /// Maximum concurrently running tests
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Cancel the run after the first failing test
    #[arg(long)]
    pub fail_fast: bool,

    /// Only run matching tests (comma-separated ids or globs)
    #[arg(long)]
    pub filter: Option<String>,

    /// Default test timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save results to file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for list and hooks commands
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite file (YAML or JSON)
    pub suite: PathBuf,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Destination path
        #[arg(default_value = "testgrid.yaml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Also write an example suite next to it
        #[arg(long)]
        with_suite: bool,
    },

    /// Show the effective configuration
    Show {
        /// Also list the supported environment variables
        #[arg(long)]
        env: bool,
    },
}
