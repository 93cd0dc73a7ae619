//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Sequential test runner with lifecycle hooks and tree-structured results
#[derive(Parser, Debug)]
#[command(name = "proving-ground")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.0")]
#[command(about = "Run test modules and report their results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the test files found under the given paths
    Run(RunArgs),

    /// List the suites and tests found under the given paths
    List(ListArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test files or directories to search
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Reporter to use (console, junit). May be repeated.
    #[arg(short, long)]
    pub reporter: Vec<String>,

    /// Stop after the first failure
    #[arg(short, long)]
    pub stop_on_failure: bool,

    /// Show passing suites and tests
    #[arg(short, long)]
    pub all: bool,

    /// File the JUnit reporter writes to
    #[arg(long)]
    pub junit_output: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub plain: bool,

    /// Time allowed for each test phase in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl RunArgs {
    /// Overlay the flags that were given on top of `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if !self.reporter.is_empty() {
            config.reporters = self.reporter.clone();
        }
        if self.stop_on_failure {
            config.stop_on_failure = true;
        }
        if self.all {
            config.show_passed = true;
        }
        if let Some(output) = &self.junit_output {
            config.junit_output = output.clone();
        }
        if self.plain {
            config.color = false;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Test files or directories to search
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}
