//! Sync command implementation
//!
//! Runs the full pipeline: discover manifests, merge, resolve, then fetch,
//! extract, install, and reconcile skills for every enabled agent.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;

use skillsync::agents::Scope;
use skillsync::output::{emoji, OutputConfig};
use skillsync::sync::{run_sync, SyncOptions, SyncSummary};

/// Arguments for the sync command
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Project root (defaults to current directory)
    #[arg(long, value_name = "PATH")]
    pub project_root: Option<PathBuf>,

    /// Install into each agent's global directory instead of the project
    #[arg(short, long)]
    pub global: bool,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the sync command
pub fn execute(args: SyncArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();

    let project_root = match args.project_root {
        Some(path) => path.canonicalize()?,
        None => std::env::current_dir()?,
    };
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("unable to determine the home directory"))?;

    let mut options = SyncOptions::new(project_root, home_dir);
    options.dry_run = args.dry_run;
    options.scope = if args.global {
        Scope::Global
    } else {
        Scope::Local
    };

    if !args.quiet {
        println!("{} skillsync", emoji(output, "🔄", "[SYNC]"));
        if args.dry_run {
            println!("{} DRY RUN MODE - No changes will be made", emoji(output, "🔎", "[DRY]"));
        }
        println!();
    }

    let summary = run_sync(&options)?;
    if !args.quiet {
        report(&summary, output, start_time.elapsed().as_secs_f64());
    }

    if summary.success() {
        Ok(())
    } else {
        anyhow::bail!("sync failed for one or more agents")
    }
}

fn report(summary: &SyncSummary, output: &OutputConfig, seconds: f64) {
    for report in &summary.reports {
        match &report.result {
            Ok(changes) => {
                let verb = if summary.dry_run { "would install" } else { "installed" };
                println!(
                    "{} {}: {} {} skill(s), removed {} stale",
                    emoji(output, "✅", "[OK]"),
                    report.agent,
                    verb,
                    changes.installed,
                    changes.removed
                );
            }
            Err(e) => {
                println!("{} {}: {}", emoji(output, "❌", "[FAIL]"), report.agent, e);
            }
        }
    }

    for warning in &summary.warnings {
        println!("{} {}", emoji(output, "⚠️", "[WARN]"), warning);
    }

    println!();
    println!("Finished in {:.2}s", seconds);
}
