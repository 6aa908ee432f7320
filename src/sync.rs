//! # Sync Orchestrator
//!
//! The full pipeline, sequential per agent:
//!
//! ```text
//! discover -> parse -> merge -> resolve -> agent list
//!   per agent: fetch -> detect + extract -> validate -> plan
//!              -> apply -> reconcile -> persist state
//! ```
//!
//! Manifest discovery through resolution happens once; everything from
//! fetch onward runs per agent inside its own temp root, which is removed
//! on every exit path. One agent's fatal error is recorded in the summary
//! and the remaining agents still run; nothing an earlier agent persisted
//! is touched by a later failure.
//!
//! Dry-run mode computes the same plan and the same stale set as a real
//! run and then stops, so a clean dry run predicts a clean real run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::agents::{detect_installed_agents, resolve_agent, AgentId, Scope, DETECT_TIMEOUT};
use crate::coerce::{GithubSlug, NormalizedGitUrl};
use crate::detect::{detect_structure, MarketplaceDoc, PackageStructure, PluginSource};
use crate::error::{Error, Result};
use crate::extract::{extract_skills, ExtractionMode};
use crate::fetch::{fetch_packages, FetchedPackage};
use crate::git;
use crate::install::{
    apply_agent_install, plan_agent_install, preflight_agent_install, InstallMode, PackageInstall,
};
use crate::manifest::{discover_manifests, validate_subpath};
use crate::merge::merge_manifests;
use crate::resolve::{resolve_merged_packages, CanonicalSource};
use crate::state::{load_state, remove_stale, save_state, stale_targets, AgentState};

/// Inputs for one sync run, built once at process start.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub project_root: PathBuf,
    pub home_dir: PathBuf,
    pub scope: Scope,
    pub dry_run: bool,
    pub detect_timeout: Duration,
}

impl SyncOptions {
    pub fn new(project_root: PathBuf, home_dir: PathBuf) -> Self {
        SyncOptions {
            project_root,
            home_dir,
            scope: Scope::Local,
            dry_run: false,
            detect_timeout: DETECT_TIMEOUT,
        }
    }
}

/// What changed (or would change, in dry-run) for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentChanges {
    pub installed: usize,
    pub removed: usize,
}

/// One agent's outcome within a sync run.
#[derive(Debug)]
pub struct AgentReport {
    pub agent: AgentId,
    pub result: Result<AgentChanges>,
}

/// Aggregated result of a whole run.
#[derive(Debug)]
pub struct SyncSummary {
    pub reports: Vec<AgentReport>,
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

impl SyncSummary {
    /// True when every agent completed without a fatal error.
    pub fn success(&self) -> bool {
        self.reports.iter().all(|r| r.result.is_ok())
    }
}

/// Run the full sync pipeline.
pub fn run_sync(options: &SyncOptions) -> Result<SyncSummary> {
    let manifests = discover_manifests(&options.project_root, &options.home_dir)?;
    if manifests.is_empty() {
        return Err(Error::NotFound {
            message: format!(
                "no {} found in {} or any standard location",
                crate::manifest::MANIFEST_FILE_NAME,
                options.project_root.display()
            ),
        });
    }

    let merged = merge_manifests(&manifests)?;
    let mut warnings = merged.warnings.clone();
    if merged.is_empty() {
        return Err(Error::NotFound {
            message: "no dependencies declared in any manifest".to_string(),
        });
    }
    let packages = resolve_merged_packages(&merged);
    info!(
        "resolved {} packages from {} manifests",
        packages.len(),
        manifests.len()
    );

    let agent_ids = resolve_agent_list(&merged.agents, options)?;

    let mut reports = Vec::with_capacity(agent_ids.len());
    for id in agent_ids {
        let result = sync_one_agent(id, &packages, options, &mut warnings);
        if let Err(e) = &result {
            warn!("agent {} failed: {}", id, e);
        }
        reports.push(AgentReport { agent: id, result });
    }

    Ok(SyncSummary {
        reports,
        warnings,
        dry_run: options.dry_run,
    })
}

/// Decide which agents to sync: the manifest's explicit `[agents]` table
/// when present and non-empty, otherwise whatever is installed.
fn resolve_agent_list(
    configured: &std::collections::BTreeMap<AgentId, bool>,
    options: &SyncOptions,
) -> Result<Vec<AgentId>> {
    if !configured.is_empty() {
        let enabled: Vec<AgentId> = configured
            .iter()
            .filter(|(_, on)| **on)
            .map(|(id, _)| *id)
            .collect();
        if enabled.is_empty() {
            return Err(Error::validation_with_hint(
                "every agent in the [agents] table is disabled",
                "enable at least one agent, or remove the table to auto-detect",
            ));
        }
        return Ok(enabled);
    }

    let detected: Vec<AgentId> = detect_installed_agents(&options.home_dir, options.detect_timeout)
        .into_iter()
        .filter(|(_, installed)| *installed)
        .map(|(id, _)| id)
        .collect();
    if detected.is_empty() {
        return Err(Error::NotFound {
            message: "no supported agents detected; add an [agents] table to choose explicitly"
                .to_string(),
        });
    }
    debug!("auto-detected agents: {:?}", detected);
    Ok(detected)
}

/// Run fetch through persist for one agent. The temp root lives for the
/// duration of this call and is removed on every exit path.
fn sync_one_agent(
    id: AgentId,
    packages: &[crate::resolve::CanonicalPackage],
    options: &SyncOptions,
    warnings: &mut Vec<String>,
) -> Result<AgentChanges> {
    let agent = resolve_agent(id, options.scope, &options.project_root, &options.home_dir)?;
    let temp_root = TempDir::new().map_err(Error::Io)?;

    let fetched = fetch_packages(packages, temp_root.path())?;
    let mut installs: Vec<PackageInstall> = Vec::new();
    for package in &fetched {
        installs.extend(package_installs(package, temp_root.path(), warnings)?);
    }

    // Aliases are unique after merge, but marketplace expansion introduces
    // plugin-named prefixes that can collide across packages.
    let mut seen_prefixes = HashSet::new();
    for install in &installs {
        if !seen_prefixes.insert(install.prefix.clone()) {
            return Err(Error::InstallConflict {
                message: format!("two packages install under the prefix '{}'", install.prefix),
            });
        }
    }

    let plan = plan_agent_install(&agent, &installs)?;
    let previous = load_state(&agent)?;
    if previous.is_none() {
        warnings.push(format!(
            "{}: no previous state found; stale skills will not be removed this run",
            agent.id
        ));
    }
    let desired: HashSet<String> = plan.desired_names().into_iter().collect();
    let stale = stale_targets(previous.as_ref(), &desired);
    let tracked = previous
        .as_ref()
        .map(AgentState::tracked)
        .unwrap_or_default();

    let changes = AgentChanges {
        installed: plan.tasks.len(),
        removed: stale.len(),
    };
    if options.dry_run {
        // A dry run must fail exactly where a real run would.
        preflight_agent_install(&plan, &tracked)?;
        info!(
            "{}: dry run, would install {} and remove {}",
            agent.id, changes.installed, changes.removed
        );
        return Ok(changes);
    }

    apply_agent_install(&plan, &tracked)?;
    remove_stale(&agent, &stale)?;
    save_state(&agent, &AgentState::new(plan.desired_names()))?;
    info!(
        "{}: installed {}, removed {}",
        agent.id, changes.installed, changes.removed
    );
    Ok(changes)
}

/// Turn one fetched package into install units, expanding marketplaces.
fn package_installs(
    fetched: &FetchedPackage,
    temp_root: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<PackageInstall>> {
    let alias = fetched.package.origin.alias.clone();
    let structure = detect_structure(
        &fetched.package_path,
        alias.as_str(),
        fetched.is_remote_subpath(),
    )?;

    if let PackageStructure::Marketplace { doc, .. } = &structure {
        return expand_marketplace(fetched, doc, temp_root, warnings);
    }
    if matches!(fetched.package.source, CanonicalSource::ClaudePlugin { .. }) {
        return Err(Error::Detect {
            alias: alias.as_str().to_string(),
            message: "declared as a marketplace plugin, but the repository has no marketplace descriptor"
                .to_string(),
        });
    }

    let origin = &fetched.package.origin;
    let extraction = extract_skills(&structure, origin, ExtractionMode::Strict)?;
    warnings.extend(extraction.warnings);
    Ok(vec![PackageInstall {
        prefix: alias.as_str().to_string(),
        mode: InstallMode::for_fetch(fetched.package.fetch),
        skills: extraction.skills,
    }])
}

/// Expand a marketplace into per-plugin install units.
///
/// A `claude-plugin` dependency selects exactly the named plugin and keeps
/// the dependency alias as its prefix. A plain dependency pointing at a
/// marketplace repo expands every listed plugin, each prefixed by its own
/// plugin name; a broken plugin in that case degrades to a warning.
fn expand_marketplace(
    fetched: &FetchedPackage,
    doc: &MarketplaceDoc,
    temp_root: &Path,
    warnings: &mut Vec<String>,
) -> Result<Vec<PackageInstall>> {
    let alias = fetched.package.origin.alias.as_str();
    let named = match &fetched.package.source {
        CanonicalSource::ClaudePlugin { plugin, .. } => Some(plugin.as_str()),
        _ => None,
    };

    let selected: Vec<&crate::detect::MarketplacePlugin> = match named {
        Some(name) => {
            let plugin = doc.plugins.iter().find(|p| p.name == name);
            match plugin {
                Some(plugin) => vec![plugin],
                None => {
                    return Err(Error::NotFound {
                        message: format!(
                            "marketplace '{}' has no plugin named '{}'",
                            doc.name, name
                        ),
                    })
                }
            }
        }
        None => doc.plugins.iter().collect(),
    };

    let plugin_base = match doc.metadata.as_ref().and_then(|m| m.plugin_root.clone()) {
        Some(root) => fetched.package_path.join(validate_subpath(root)?),
        None => fetched.package_path.clone(),
    };

    let mut installs = Vec::with_capacity(selected.len());
    for (index, plugin) in selected.iter().enumerate() {
        let result = install_for_plugin(
            fetched, plugin, &plugin_base, temp_root, index, named, warnings,
        );
        match result {
            Ok(install) => installs.push(install),
            // An explicitly requested plugin must work; a broken entry in
            // a bulk expansion only costs that entry.
            Err(e) if named.is_none() => {
                warnings.push(format!(
                    "marketplace '{}': skipping plugin '{}': {}",
                    alias, plugin.name, e
                ));
            }
            Err(e) => return Err(e),
        }
    }

    if installs.is_empty() {
        return Err(Error::Extract {
            alias: alias.to_string(),
            message: format!("marketplace '{}' yielded no usable plugins", doc.name),
        });
    }
    Ok(installs)
}

fn install_for_plugin(
    fetched: &FetchedPackage,
    plugin: &crate::detect::MarketplacePlugin,
    plugin_base: &Path,
    temp_root: &Path,
    index: usize,
    named: Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<PackageInstall> {
    let alias = fetched.package.origin.alias.as_str();
    // A relative plugin lives inside the parent package, so the parent's
    // install mode applies. A structured source is cloned into the per-run
    // temp root and must be copied out before that root is dropped.
    let mode = match &plugin.source {
        PluginSource::Relative(_) => InstallMode::for_fetch(fetched.package.fetch),
        PluginSource::Structured { .. } => InstallMode::Copy,
    };
    let root = match &plugin.source {
        PluginSource::Relative(rel) => plugin_base.join(validate_subpath(rel.clone())?),
        PluginSource::Structured { source, repo, url } => {
            let clone_url = match source.as_str() {
                "github" => {
                    let repo = repo.as_deref().ok_or_else(|| {
                        Error::validation(format!(
                            "plugin '{}': github source requires a 'repo' field",
                            plugin.name
                        ))
                    })?;
                    GithubSlug::new(repo)?.clone_url()
                }
                "url" => {
                    let url = url.as_deref().ok_or_else(|| {
                        Error::validation(format!(
                            "plugin '{}': url source requires a 'url' field",
                            plugin.name
                        ))
                    })?;
                    NormalizedGitUrl::new(url)?.clone_url()
                }
                other => {
                    return Err(Error::validation(format!(
                        "plugin '{}': unknown source kind '{}'",
                        plugin.name, other
                    )))
                }
            };
            let dir = temp_root.join(format!("plugin-{}-{}", alias, index));
            git::clone(&clone_url, &dir, None)?;
            dir
        }
    };

    // Nested marketplaces are not expanded.
    let structure = detect_structure(&root, alias, true)?;
    let extraction = extract_skills(
        &structure,
        &fetched.package.origin,
        ExtractionMode::Lenient,
    )?;
    warnings.extend(extraction.warnings);

    let prefix = match named {
        Some(_) => alias.to_string(),
        None => plugin.name.clone(),
    };
    Ok(PackageInstall {
        prefix,
        mode,
        skills: extraction.skills,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn options(project_root: &Path, home: &Path) -> SyncOptions {
        SyncOptions::new(project_root.to_path_buf(), home.to_path_buf())
    }

    fn git_repo(dir: &Path) {
        for cmd in [
            vec!["init", "-q"],
            vec!["add", "."],
            vec!["-c", "user.email=t@t", "-c", "user.name=t", "commit", "-qm", "init"],
        ] {
            let status = Command::new("git")
                .arg("-C")
                .arg(dir)
                .args(&cmd)
                .status()
                .unwrap();
            assert!(status.success(), "git {:?} failed", cmd);
        }
    }

    fn skill_package(root: &Path, skill: &str) {
        write(
            root,
            &format!("skills/{}/SKILL.md", skill),
            &format!("---\nname: {}\n---\nbody\n", skill),
        );
    }

    #[test]
    fn test_sync_with_local_package_installs_symlinks() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());
        assert_eq!(summary.reports.len(), 1);
        let changes = summary.reports[0].result.as_ref().unwrap();
        assert_eq!(changes.installed, 1);
        assert_eq!(changes.removed, 0);

        let target = project.join(".claude/skills/tools-fmt");
        assert!(target.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(project.join(".claude/.skillsync-state.json").is_file());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\ncodex = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );

        let mut opts = options(&project, &home);
        opts.dry_run = true;
        let summary = run_sync(&opts).unwrap();
        assert!(summary.success());
        let changes = summary.reports[0].result.as_ref().unwrap();
        assert_eq!(changes.installed, 1);

        assert!(!project.join(".codex").exists());
    }

    #[test]
    fn test_dry_run_fails_where_a_real_run_would() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );
        // A user-owned directory sitting exactly where the install would go.
        write(&project, ".claude/skills/tools-fmt/notes.md", "mine\n");

        let mut opts = options(&project, &home);
        opts.dry_run = true;
        let dry = run_sync(&opts).unwrap();
        assert!(!dry.success());
        assert!(matches!(
            dry.reports[0].result,
            Err(Error::UnmanagedTarget { .. })
        ));

        opts.dry_run = false;
        let real = run_sync(&opts).unwrap();
        assert!(!real.success());
        assert!(matches!(
            real.reports[0].result,
            Err(Error::UnmanagedTarget { .. })
        ));
        assert!(project.join(".claude/skills/tools-fmt/notes.md").is_file());
    }

    #[test]
    fn test_second_sync_removes_stale_skill() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        skill_package(&project.join("pkg"), "lint");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );

        run_sync(&options(&project, &home)).unwrap();
        assert!(project.join(".claude/skills/tools-lint").exists());

        fs::remove_dir_all(project.join("pkg/skills/lint")).unwrap();
        let summary = run_sync(&options(&project, &home)).unwrap();
        let changes = summary.reports[0].result.as_ref().unwrap();
        assert_eq!(changes.installed, 1);
        assert_eq!(changes.removed, 1);
        assert!(!project.join(".claude/skills/tools-lint").exists());
        assert!(project.join(".claude/skills/tools-fmt").exists());
    }

    #[test]
    fn test_unmanaged_directory_survives_sync() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );
        // Looks like a plausible target name, but the tool never made it.
        write(&project, ".claude/skills/handmade/notes.md", "mine");

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());
        assert!(project.join(".claude/skills/handmade/notes.md").is_file());
    }

    #[test]
    fn test_first_run_warns_about_missing_state() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.contains("no previous state")));
    }

    #[test]
    fn test_all_agents_disabled_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = false\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );

        assert!(run_sync(&options(&project, &home)).is_err());
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&project).unwrap();
        fs::create_dir_all(&home).unwrap();

        assert!(matches!(
            run_sync(&options(&project, &home)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_one_agent_failure_does_not_stop_others() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();
        skill_package(&project.join("pkg"), "fmt");
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\ncodex = true\n\n[dependencies]\ntools = { path = \"./pkg\" }\n",
        );
        // Sabotage claude-code's skills path with a plain file.
        fs::create_dir_all(project.join(".claude")).unwrap();
        fs::write(project.join(".claude/skills"), "blocker").unwrap();

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(!summary.success());
        let by_agent: std::collections::HashMap<AgentId, bool> = summary
            .reports
            .iter()
            .map(|r| (r.agent, r.result.is_ok()))
            .collect();
        assert_eq!(by_agent[&AgentId::ClaudeCode], false);
        assert_eq!(by_agent[&AgentId::Codex], true);
        assert!(project.join(".codex/skills/tools-fmt").exists());
    }

    #[test]
    fn test_local_marketplace_expands_all_plugins() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let market = project.join("market");
        write(
            &market,
            ".claude-plugin/marketplace.json",
            r#"{
                "name": "acme",
                "plugins": [
                    {"name": "alpha", "source": "plugins/alpha"},
                    {"name": "beta", "source": "plugins/beta"}
                ]
            }"#,
        );
        write(
            &market,
            "plugins/alpha/skills/fmt/SKILL.md",
            "---\nname: fmt\n---\n",
        );
        write(
            &market,
            "plugins/beta/skills/lint/SKILL.md",
            "---\nname: lint\n---\n",
        );
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\nmarket = { path = \"./market\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());
        let changes = summary.reports[0].result.as_ref().unwrap();
        assert_eq!(changes.installed, 2);
        assert!(project.join(".claude/skills/alpha-fmt").exists());
        assert!(project.join(".claude/skills/beta-lint").exists());
    }

    #[test]
    fn test_remote_plugin_in_local_marketplace_is_copied() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let plugin_repo = tmp.path().join("plugin-repo");
        write(&plugin_repo, "skills/fmt/SKILL.md", "---\nname: fmt\n---\n");
        git_repo(&plugin_repo);

        let market = project.join("market");
        write(
            &market,
            ".claude-plugin/marketplace.json",
            &format!(
                r#"{{
                    "name": "acme",
                    "plugins": [
                        {{"name": "alpha", "source": {{"source": "url", "url": "file://{}"}}}}
                    ]
                }}"#,
                plugin_repo.display()
            ),
        );
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\nmarket = { path = \"./market\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());

        // The clone lives in a per-run temp root that is gone by now; the
        // installed skill must be a copy, not a link into it.
        let target = project.join(".claude/skills/alpha-fmt");
        let meta = target.symlink_metadata().unwrap();
        assert!(meta.is_dir());
        assert!(!meta.file_type().is_symlink());
        assert!(target.join("SKILL.md").is_file());
    }

    #[test]
    fn test_marketplace_plugin_root_metadata() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let market = project.join("market");
        write(
            &market,
            ".claude-plugin/marketplace.json",
            r#"{
                "name": "acme",
                "plugins": [{"name": "alpha", "source": "alpha"}],
                "metadata": {"pluginRoot": "plugins"}
            }"#,
        );
        write(
            &market,
            "plugins/alpha/skills/fmt/SKILL.md",
            "---\nname: fmt\n---\n",
        );
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\nmarket = { path = \"./market\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());
        assert!(project.join(".claude/skills/alpha-fmt").exists());
    }

    #[test]
    fn test_broken_plugin_in_bulk_expansion_is_a_warning() {
        let tmp = tempfile::TempDir::new().unwrap();
        let project = tmp.path().join("project");
        let home = tmp.path().join("home");
        fs::create_dir_all(&home).unwrap();

        let market = project.join("market");
        write(
            &market,
            ".claude-plugin/marketplace.json",
            r#"{
                "name": "acme",
                "plugins": [
                    {"name": "good", "source": "plugins/good"},
                    {"name": "broken", "source": "plugins/missing"}
                ]
            }"#,
        );
        write(
            &market,
            "plugins/good/skills/fmt/SKILL.md",
            "---\nname: fmt\n---\n",
        );
        write(
            &project,
            "agents.toml",
            "[agents]\nclaude-code = true\n\n[dependencies]\nmarket = { path = \"./market\" }\n",
        );

        let summary = run_sync(&options(&project, &home)).unwrap();
        assert!(summary.success());
        assert!(summary.warnings.iter().any(|w| w.contains("broken")));
        assert!(project.join(".claude/skills/good-fmt").exists());
    }
}
