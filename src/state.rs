//! # Persisted Agent State and Reconciliation
//!
//! After a successful sync, the tool records which target names it installed
//! into an agent's skills directory. That record is the only authority for
//! what a later run may delete: anything on disk the tool did not itself
//! install is off limits, even when it looks exactly like a stale skill.
//!
//! The state file lives at the agent's root as `.skillsync-state.json` and
//! holds a single sorted name list. It is read once at the start of an
//! agent's pipeline and overwritten once at the end with exactly the desired
//! set for this run, never merged with the old set.

use std::collections::HashSet;
use std::fs;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agents::{state_file_path, ResolvedAgent};
use crate::error::{Error, Result};
use crate::install::remove_target;

/// The managed-target record for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub skills: Vec<String>,
}

impl AgentState {
    pub fn new(mut skills: Vec<String>) -> Self {
        skills.sort();
        skills.dedup();
        AgentState { skills }
    }

    pub fn tracked(&self) -> HashSet<String> {
        self.skills.iter().cloned().collect()
    }
}

/// Load the previous run's state. A missing file is `None`, not an error.
pub fn load_state(agent: &ResolvedAgent) -> Result<Option<AgentState>> {
    let path = state_file_path(agent);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::fs("read", &path, e)),
    };
    let state: AgentState = serde_json::from_str(&content).map_err(|e| Error::State {
        agent: agent.id.as_str().to_string(),
        message: format!("malformed state file {}: {}", path.display(), e),
    })?;
    Ok(Some(state))
}

/// Overwrite the agent's state with the given record.
pub fn save_state(agent: &ResolvedAgent, state: &AgentState) -> Result<()> {
    let path = state_file_path(agent);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs("create dir", parent, e))?;
    }
    let content = serde_json::to_string_pretty(state)?;
    fs::write(&path, content).map_err(|e| Error::fs("write", &path, e))?;
    debug!("saved state for {} ({} skills)", agent.id, state.skills.len());
    Ok(())
}

/// Target names from the previous run that this run no longer wants.
///
/// With no previous state there is no safe deletion set, so nothing is
/// removed regardless of what sits on disk.
pub fn stale_targets(previous: Option<&AgentState>, desired: &HashSet<String>) -> Vec<String> {
    let Some(previous) = previous else {
        return Vec::new();
    };
    previous
        .skills
        .iter()
        .filter(|name| !desired.contains(*name))
        .cloned()
        .collect()
}

/// Remove stale managed targets from the agent's skills directory.
///
/// A removal failure is fatal for this agent: advancing state past a target
/// that is still on disk would orphan it forever.
pub fn remove_stale(agent: &ResolvedAgent, stale: &[String]) -> Result<()> {
    for name in stale {
        let target = agent.skills_path.join(name);
        remove_target(&target).map_err(|e| Error::State {
            agent: agent.id.as_str().to_string(),
            message: format!("failed to remove stale skill '{}': {}", name, e),
        })?;
        debug!("removed stale skill '{}'", name);
    }
    Ok(())
}
