//! # Agent Registry and Resolution
//!
//! A static table describes every supported agent: its display name, its
//! project-local and user-global base directories, the name of its skills
//! directory, and the CLI command used to probe whether it is installed.
//!
//! Base paths are configured independently per scope because agents are
//! asymmetric: Claude Code uses `.claude` in both scopes, while OpenCode
//! keeps project state in `.opencode` but global state under
//! `.config/opencode`. Resolution is pure path joining against a project
//! root or home directory.
//!
//! Detection probes never fail: a missing binary, a timeout, or a non-zero
//! exit all resolve to "not installed". Probes for different agents are
//! independent and run in parallel.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::debug;
use rayon::prelude::*;

use crate::coerce::AbsolutePath;
use crate::error::{Error, Result};

/// Default bound on one agent detection probe.
pub const DETECT_TIMEOUT: Duration = Duration::from_secs(3);

/// The supported agents. Adding a variant is a compile error everywhere an
/// exhaustive match exists, which is intentional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentId {
    ClaudeCode,
    Codex,
    OpenCode,
    Amp,
    Factory,
}

impl AgentId {
    pub const ALL: [AgentId; 5] = [
        AgentId::ClaudeCode,
        AgentId::Codex,
        AgentId::OpenCode,
        AgentId::Amp,
        AgentId::Factory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::ClaudeCode => "claude-code",
            AgentId::Codex => "codex",
            AgentId::OpenCode => "opencode",
            AgentId::Amp => "amp",
            AgentId::Factory => "factory",
        }
    }

    pub fn parse(raw: &str) -> Option<AgentId> {
        AgentId::ALL.into_iter().find(|id| id.as_str() == raw)
    }

    pub fn known_ids() -> Vec<&'static str> {
        AgentId::ALL.iter().map(|id| id.as_str()).collect()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which filesystem scope skills are installed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Under the project root.
    Local,
    /// Under the user's home directory.
    Global,
}

/// Static description of one agent.
#[derive(Debug, Clone, Copy)]
pub struct AgentDefinition {
    pub id: AgentId,
    pub display_name: &'static str,
    /// Base directory relative to the project root (local scope).
    pub local_base: &'static str,
    /// Base directory relative to the home directory (global scope).
    pub global_base: &'static str,
    /// Name of the skills directory under the base.
    pub skills_dir_name: &'static str,
    /// CLI probe used for installation detection.
    pub detect_command: &'static str,
}

/// The agent table. Local and global bases differ where the agent itself
/// is asymmetric; this is data, not derivation.
pub const AGENTS: [AgentDefinition; 5] = [
    AgentDefinition {
        id: AgentId::ClaudeCode,
        display_name: "Claude Code",
        local_base: ".claude",
        global_base: ".claude",
        skills_dir_name: "skills",
        detect_command: "claude",
    },
    AgentDefinition {
        id: AgentId::Codex,
        display_name: "Codex",
        local_base: ".codex",
        global_base: ".codex",
        skills_dir_name: "skills",
        detect_command: "codex",
    },
    AgentDefinition {
        id: AgentId::OpenCode,
        display_name: "OpenCode",
        local_base: ".opencode",
        global_base: ".config/opencode",
        skills_dir_name: "skill",
        detect_command: "opencode",
    },
    AgentDefinition {
        id: AgentId::Amp,
        display_name: "Amp",
        local_base: ".agents",
        global_base: ".config/amp",
        skills_dir_name: "skills",
        detect_command: "amp",
    },
    AgentDefinition {
        id: AgentId::Factory,
        display_name: "Factory",
        local_base: ".factory",
        global_base: ".factory",
        skills_dir_name: "skills",
        detect_command: "droid",
    },
];

/// Look up an agent definition by id.
pub fn definition(id: AgentId) -> &'static AgentDefinition {
    AGENTS
        .iter()
        .find(|def| def.id == id)
        .expect("every AgentId has a table entry")
}

/// An agent with concrete filesystem paths for one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgent {
    pub id: AgentId,
    pub display_name: &'static str,
    pub root_path: AbsolutePath,
    pub skills_path: AbsolutePath,
}

/// Resolve an agent's root and skills paths for the given scope.
pub fn resolve_agent(
    id: AgentId,
    scope: Scope,
    project_root: &Path,
    home_dir: &Path,
) -> Result<ResolvedAgent> {
    let def = definition(id);
    let root = match scope {
        Scope::Local => project_root.join(def.local_base),
        Scope::Global => home_dir.join(def.global_base),
    };
    let root_path = AbsolutePath::new(root).map_err(|_| Error::validation(format!(
        "cannot resolve agent '{}': base directory is not absolute",
        id
    )))?;
    let skills_path = AbsolutePath::new(root_path.join(def.skills_dir_name))?;
    Ok(ResolvedAgent {
        id,
        display_name: def.display_name,
        root_path,
        skills_path,
    })
}

/// Probe whether one agent is installed.
///
/// Runs `<detect_command> --version` with a bounded timeout; if the binary
/// is missing or the probe fails, falls back to checking for the agent's
/// global root directory. Never returns an error.
pub fn detect_agent(def: &AgentDefinition, home_dir: &Path, timeout: Duration) -> bool {
    if probe_command(def.detect_command, timeout) {
        return true;
    }
    let root = home_dir.join(def.global_base);
    let present = root.is_dir();
    debug!(
        "agent {} probe failed, root {} present: {}",
        def.id,
        root.display(),
        present
    );
    present
}

/// Run `<command> --version`, killing it at the deadline. Missing binary,
/// timeout, and non-zero exit all mean "not installed".
fn probe_command(command: &str, timeout: Duration) -> bool {
    let child = Command::new(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(_) => return false,
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return false;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => {
                let _ = child.kill();
                return false;
            }
        }
    }
}

/// Detect all installed agents, probing in parallel.
pub fn detect_installed_agents(home_dir: &Path, timeout: Duration) -> Vec<(AgentId, bool)> {
    AGENTS
        .par_iter()
        .map(|def| (def.id, detect_agent(def, home_dir, timeout)))
        .collect()
}

/// The state file recording which targets skillsync manages for an agent.
pub fn state_file_path(agent: &ResolvedAgent) -> PathBuf {
    agent.root_path.join(".skillsync-state.json")
}
