//! # Install Planning and Application
//!
//! Planning turns extracted skills into a flat list of install tasks for one
//! agent: each package contributes a prefix (its alias), each skill a name,
//! and the target directory is `<skills path>/<prefix>-<name>`. Planning is
//! pure and rejects anything that could write outside the agent's skills
//! directory before a single byte touches disk.
//!
//! Application preflights every task against the set of target names the
//! tool itself installed on a previous run. A target that exists on disk but
//! is not in that set belongs to the user and aborts the whole install.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::agents::ResolvedAgent;
use crate::error::{Error, Result};
use crate::extract::Skill;
use crate::resolve::FetchStrategy;

/// How a skill's content reaches its target directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Symlink to the source directory. Used for local-path packages so
    /// edits in the source tree are live.
    Symlink,
    /// Recursive copy of the source tree. Used for everything cloned.
    Copy,
}

impl InstallMode {
    pub fn for_fetch(fetch: FetchStrategy) -> Self {
        match fetch {
            FetchStrategy::Symlink => InstallMode::Symlink,
            FetchStrategy::Clone { .. } => InstallMode::Copy,
        }
    }
}

/// One package's contribution to an agent install.
#[derive(Debug, Clone)]
pub struct PackageInstall {
    /// Raw prefix, normalized during planning. In practice the alias.
    pub prefix: String,
    pub mode: InstallMode,
    pub skills: Vec<Skill>,
}

/// One planned write: install `source_path` at `target_path`.
#[derive(Debug, Clone)]
pub struct InstallTask {
    pub target_name: String,
    pub target_path: PathBuf,
    pub source_path: PathBuf,
    pub mode: InstallMode,
}

/// The full set of writes for one agent, validated and collision-free.
#[derive(Debug, Clone)]
pub struct AgentInstallPlan {
    pub skills_path: PathBuf,
    pub tasks: Vec<InstallTask>,
}

impl AgentInstallPlan {
    /// The target names this plan wants on disk.
    pub fn desired_names(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.target_name.clone()).collect()
    }
}

/// A skill that was actually written by [`apply_agent_install`].
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    pub target_name: String,
    pub target_path: PathBuf,
    pub mode: InstallMode,
}

/// Validate a prefix or skill name as a single safe path component.
fn normalize_component(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("skill prefix/name must not be empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(Error::validation(format!(
            "'{}' is not a valid skill prefix/name",
            trimmed
        )));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed.contains("..") {
        return Err(Error::validation(format!(
            "skill prefix/name '{}' must not contain path separators or '..'",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Build the install plan for one agent. Pure: touches no filesystem state.
pub fn plan_agent_install(
    agent: &ResolvedAgent,
    packages: &[PackageInstall],
) -> Result<AgentInstallPlan> {
    if agent.skills_path.as_path().as_os_str().is_empty() {
        return Err(Error::validation(format!(
            "agent '{}' resolved to an empty skills path",
            agent.id
        )));
    }

    let mut tasks: Vec<InstallTask> = Vec::new();
    for package in packages {
        if package.skills.is_empty() {
            return Err(Error::validation(format!(
                "package '{}' contributed no skills",
                package.prefix
            )));
        }
        let prefix = normalize_component(&package.prefix)?;
        for skill in &package.skills {
            let name = normalize_component(&skill.name)?;
            let target_name = format!("{}-{}", prefix, name);
            let target_path = agent.skills_path.join(&target_name);

            // Names are single components by construction, so a join can
            // only land inside the skills path. Keep the boundary check
            // anyway: it is the contract, not an optimization.
            if !target_path.starts_with(&agent.skills_path) {
                return Err(Error::validation(format!(
                    "target '{}' escapes the skills directory",
                    target_name
                )));
            }

            if let Some(existing) = tasks.iter().find(|t| t.target_name == target_name) {
                return Err(Error::InstallConflict {
                    message: format!(
                        "skills from {} and {} both install to '{}'",
                        existing.source_path.display(),
                        skill.source_path.display(),
                        target_name
                    ),
                });
            }

            tasks.push(InstallTask {
                target_name,
                target_path,
                source_path: skill.source_path.clone(),
                mode: package.mode,
            });
        }
    }

    Ok(AgentInstallPlan {
        skills_path: agent.skills_path.to_path_buf(),
        tasks,
    })
}

/// Check a plan against the filesystem without writing anything. A dry run
/// classifies failures exactly like a real run, so it calls this too.
pub fn preflight_agent_install(plan: &AgentInstallPlan, tracked: &HashSet<String>) -> Result<()> {
    if plan.skills_path.exists() && !plan.skills_path.is_dir() {
        return Err(Error::InstallConflict {
            message: format!(
                "{} exists but is not a directory",
                plan.skills_path.display()
            ),
        });
    }
    for task in &plan.tasks {
        let present = task.target_path.symlink_metadata().is_ok();
        if present && !tracked.contains(&task.target_name) {
            return Err(Error::UnmanagedTarget {
                path: task.target_path.clone(),
            });
        }
    }
    Ok(())
}

/// Execute a plan. `tracked` is the set of target names a previous run
/// installed; only those may be replaced.
///
/// Stops at the first failed task without rolling back earlier ones. State
/// persistence after a partial apply is the caller's concern.
pub fn apply_agent_install(
    plan: &AgentInstallPlan,
    tracked: &HashSet<String>,
) -> Result<Vec<InstalledSkill>> {
    preflight_agent_install(plan, tracked)?;
    fs::create_dir_all(&plan.skills_path)
        .map_err(|e| Error::fs("create dir", &plan.skills_path, e))?;

    let mut installed = Vec::with_capacity(plan.tasks.len());
    for task in &plan.tasks {
        if !task.source_path.is_dir() {
            return Err(Error::InstallConflict {
                message: format!(
                    "skill source {} is missing or not a directory",
                    task.source_path.display()
                ),
            });
        }
        remove_target(&task.target_path)?;
        match task.mode {
            InstallMode::Symlink => {
                symlink_dir(&task.source_path, &task.target_path)
                    .map_err(|e| Error::fs("symlink", &task.target_path, e))?;
            }
            InstallMode::Copy => copy_dir(&task.source_path, &task.target_path)?,
        }
        debug!(
            "installed '{}' -> {}",
            task.target_name,
            task.target_path.display()
        );
        installed.push(InstalledSkill {
            target_name: task.target_name.clone(),
            target_path: task.target_path.clone(),
            mode: task.mode,
        });
    }
    Ok(installed)
}

/// Remove an existing target, whether it is a symlink, directory, or file.
pub fn remove_target(target: &Path) -> Result<()> {
    let meta = match target.symlink_metadata() {
        Ok(meta) => meta,
        Err(_) => return Ok(()),
    };
    if meta.is_dir() {
        fs::remove_dir_all(target).map_err(|e| Error::fs("remove dir", target, e))
    } else {
        // Symlinks (even to directories) and stray files are unlinked.
        fs::remove_file(target).map_err(|e| Error::fs("remove", target, e))
    }
}

#[cfg(unix)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(source, target)
}

/// Recursively copy `source` into `target`.
fn copy_dir(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| Error::Fs {
            operation: "walk".to_string(),
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir entries live under their root");
        let dest = target.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| Error::fs("create dir", &dest, e))?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::fs("create dir", parent, e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| Error::fs("copy", &dest, e))?;
        }
    }
    Ok(())
}
