//! List command implementation
//!
//! Discovers and merges manifests, then prints the resulting dependency
//! set without fetching anything.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use skillsync::manifest::{discover_manifests, ValidatedDependency};
use skillsync::merge::merge_manifests;
use skillsync::output::{emoji, OutputConfig};

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project root (defaults to current directory)
    #[arg(long, value_name = "PATH")]
    pub project_root: Option<PathBuf>,
}

/// Execute the list command
pub fn execute(args: ListArgs, output: &OutputConfig) -> Result<()> {
    let project_root = match args.project_root {
        Some(path) => path.canonicalize()?,
        None => std::env::current_dir()?,
    };
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("unable to determine the home directory"))?;

    let manifests = discover_manifests(&project_root, &home_dir)?;
    if manifests.is_empty() {
        println!("No manifests found.");
        return Ok(());
    }
    let merged = merge_manifests(&manifests)?;

    for (alias, dep) in &merged.dependencies {
        println!(
            "{} {:<20} {}",
            emoji(output, "📦", "-"),
            alias,
            describe(&dep.dependency)
        );
    }
    if merged.dependencies.is_empty() {
        println!("No dependencies declared.");
    }

    for warning in &merged.warnings {
        println!("{} {}", emoji(output, "⚠️", "[WARN]"), warning);
    }

    Ok(())
}

fn describe(dep: &ValidatedDependency) -> String {
    match dep {
        ValidatedDependency::Registry { name, org, version } => match org {
            Some(org) => format!("registry @{}/{}@{}", org, name, version),
            None => format!("registry {}@{}", name, version),
        },
        ValidatedDependency::Github { slug, git_ref, path } => {
            let mut s = format!("github {}", slug.as_str());
            if let Some(r) = git_ref {
                s.push_str(&format!(" @ {}", r.value()));
            }
            if let Some(p) = path {
                s.push_str(&format!(" ({})", p));
            }
            s
        }
        ValidatedDependency::Git { url, git_ref, path } => {
            let mut s = format!("git {}", url.as_str());
            if let Some(r) = git_ref {
                s.push_str(&format!(" @ {}", r.value()));
            }
            if let Some(p) = path {
                s.push_str(&format!(" ({})", p));
            }
            s
        }
        ValidatedDependency::Local { path } => format!("local {}", path),
        ValidatedDependency::ClaudePlugin {
            marketplace,
            plugin,
        } => format!("plugin {} from {}", plugin, marketplace.identity()),
    }
}
