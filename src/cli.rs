//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// skillsync - Sync skill packages into your AI coding agents
#[derive(Parser, Debug)]
#[command(name = "skillsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install declared skills into every enabled agent
    Sync(commands::sync::SyncArgs),

    /// Show supported agents and whether each is installed
    Agents(commands::agents::AgentsArgs),

    /// List the dependencies declared across discovered manifests
    List(commands::list::ListArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.log_level),
        )
        .init();

        let output = skillsync::output::OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &output),
            Commands::Agents(args) => commands::agents::execute(args, &output),
            Commands::List(args) => commands::list::execute(args, &output),
        }
    }
}
