//! Agents command implementation
//!
//! Lists every supported agent, its skills directory for the requested
//! scope, and whether it looks installed on this machine.

use anyhow::Result;
use clap::Args;

use skillsync::agents::{detect_installed_agents, resolve_agent, Scope, DETECT_TIMEOUT};
use skillsync::output::{emoji, OutputConfig};

/// Arguments for the agents command
#[derive(Args, Debug)]
pub struct AgentsArgs {
    /// Show global skills directories instead of project-local ones
    #[arg(short, long)]
    pub global: bool,
}

/// Execute the agents command
pub fn execute(args: AgentsArgs, output: &OutputConfig) -> Result<()> {
    let project_root = std::env::current_dir()?;
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("unable to determine the home directory"))?;
    let scope = if args.global {
        Scope::Global
    } else {
        Scope::Local
    };

    for (id, installed) in detect_installed_agents(&home_dir, DETECT_TIMEOUT) {
        let resolved = resolve_agent(id, scope, &project_root, &home_dir)?;
        let marker = if installed {
            emoji(output, "✅", "[installed]")
        } else {
            emoji(output, "➖", "[not found]")
        };
        println!(
            "{} {:<12} {}",
            marker,
            id,
            resolved.skills_path.as_path().display()
        );
    }

    Ok(())
}
