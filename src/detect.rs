//! # Package Structure Detection
//!
//! A fetched package root can be laid out four ways, and the layouts are
//! not mutually exclusive on disk, so detection is an ordered first-match
//! check:
//!
//! 1. an `agents.toml` with a `[package]` table (manifest method);
//! 2. a `.claude-plugin/marketplace.json` at the root (marketplace method);
//! 3. a `.claude-plugin/plugin.json` at the root (plugin method);
//! 4. otherwise a bounded, stack-based walk that finds either a directory
//!    of skill directories (subdir method) or a directory that is itself a
//!    skill (single method).
//!
//! The walk never descends into a directory once classified, so nested
//! skill sets are counted once. A root-level manifest or marketplace skips
//! the walk entirely.
//!
//! [`scan_package_root`] is the repo-level counterpart: it enumerates all
//! installable units at a root, where a manifest and a marketplace may
//! coexist. The asymmetry with [`detect_structure`] is deliberate: the
//! scanner answers "what can be installed from here", the detector answers
//! "what is this one dependency".

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::coerce::GithubSlug;
use crate::error::{Error, Result};
use crate::extract::SKILL_FILE;
use crate::manifest::{
    parse_manifest_str, MarketplaceSource, SkillsExport, ValidatedDependency, MANIFEST_FILE_NAME,
};

/// Fixed relative location of the marketplace descriptor.
pub const MARKETPLACE_DESCRIPTOR: &str = ".claude-plugin/marketplace.json";
/// Fixed relative location of the plugin descriptor.
pub const PLUGIN_DESCRIPTOR: &str = ".claude-plugin/plugin.json";
/// Skills directory name fixed for plugin-method packages.
pub const PLUGIN_SKILLS_DIR: &str = "skills";

/// Directories the structure walk never enters.
const IGNORED_DIRS: [&str; 7] = [
    ".git",
    "node_modules",
    "target",
    "dist",
    ".venv",
    "__pycache__",
    ".claude-plugin",
];

/// How a package's structure was recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    Manifest,
    Plugin,
    Subdir,
    Single,
    Marketplace,
}

/// The detected structure, carrying what extraction needs.
#[derive(Debug, Clone)]
pub enum PackageStructure {
    Manifest {
        manifest_path: PathBuf,
        export: SkillsExport,
    },
    Plugin {
        plugin_root: PathBuf,
    },
    Subdir {
        skills_root: PathBuf,
    },
    Single {
        skill_dir: PathBuf,
    },
    Marketplace {
        descriptor_path: PathBuf,
        doc: MarketplaceDoc,
    },
}

impl PackageStructure {
    pub fn method(&self) -> DetectionMethod {
        match self {
            PackageStructure::Manifest { .. } => DetectionMethod::Manifest,
            PackageStructure::Plugin { .. } => DetectionMethod::Plugin,
            PackageStructure::Subdir { .. } => DetectionMethod::Subdir,
            PackageStructure::Single { .. } => DetectionMethod::Single,
            PackageStructure::Marketplace { .. } => DetectionMethod::Marketplace,
        }
    }
}

/// Parsed `.claude-plugin/marketplace.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceDoc {
    pub name: String,
    pub plugins: Vec<MarketplacePlugin>,
    #[serde(default)]
    pub metadata: Option<MarketplaceMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceMetadata {
    #[serde(default, rename = "pluginRoot")]
    pub plugin_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplacePlugin {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: PluginSource,
}

/// A marketplace plugin's source: a path relative to the marketplace repo,
/// or a structured remote reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    Relative(String),
    Structured {
        source: String,
        #[serde(default)]
        repo: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

/// Parsed `.claude-plugin/plugin.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginDoc {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Detect the structure of one package rooted at `root`.
///
/// `remote_subpath` marks packages confined to a sub-path of a remote
/// repository; a marketplace descriptor reached that way is rejected
/// because marketplaces are a repo-root-only concept.
pub fn detect_structure(
    root: &Path,
    alias: &str,
    remote_subpath: bool,
) -> Result<PackageStructure> {
    let manifest_path = root.join(MANIFEST_FILE_NAME);
    if manifest_path.is_file() {
        if let Some(export) = manifest_package_export(&manifest_path)? {
            debug!("{}: manifest method via {}", alias, manifest_path.display());
            return Ok(PackageStructure::Manifest {
                manifest_path,
                export,
            });
        }
        // agents.toml without [package] does not qualify; fall through.
    }

    let marketplace_path = root.join(MARKETPLACE_DESCRIPTOR);
    if marketplace_path.is_file() {
        if remote_subpath {
            return Err(Error::Detect {
                alias: alias.to_string(),
                message: format!(
                    "found {} under a repository sub-path; marketplaces must live at repo root",
                    MARKETPLACE_DESCRIPTOR
                ),
            });
        }
        let doc = read_marketplace(&marketplace_path)?;
        debug!("{}: marketplace method ({} plugins)", alias, doc.plugins.len());
        return Ok(PackageStructure::Marketplace {
            descriptor_path: marketplace_path,
            doc,
        });
    }

    if root.join(PLUGIN_DESCRIPTOR).is_file() {
        debug!("{}: plugin method", alias);
        return Ok(PackageStructure::Plugin {
            plugin_root: root.to_path_buf(),
        });
    }

    match walk_for_skills(root)? {
        Some(structure) => Ok(structure),
        None => Err(Error::Detect {
            alias: alias.to_string(),
            message: format!(
                "unable to detect a package structure under {}",
                root.display()
            ),
        }),
    }
}

/// Read the `[package]`-bearing manifest at `path`, returning its skills
/// export setting, or `None` when there is no `[package]` table.
fn manifest_package_export(path: &Path) -> Result<Option<SkillsExport>> {
    let content = fs::read_to_string(path).map_err(|e| Error::fs("read", path, e))?;
    // Package manifests reuse the manifest schema; the origin slot is
    // irrelevant here.
    let manifest = parse_manifest_str(&content, path, crate::manifest::DiscoveredAt::Cwd)?;
    Ok(manifest.package.map(|_| manifest.exports))
}

fn read_marketplace(path: &Path) -> Result<MarketplaceDoc> {
    let content = fs::read_to_string(path).map_err(|e| Error::fs("read", path, e))?;
    let doc: MarketplaceDoc = serde_json::from_str(&content)?;
    Ok(doc)
}

/// Read and parse a plugin descriptor under `plugin_root`.
pub fn read_plugin(plugin_root: &Path) -> Result<PluginDoc> {
    let path = plugin_root.join(PLUGIN_DESCRIPTOR);
    let content = fs::read_to_string(&path).map_err(|e| Error::fs("read", &path, e))?;
    let doc: PluginDoc = serde_json::from_str(&content)?;
    Ok(doc)
}

/// Explicit stack-based walk looking for the first subdir or single layout.
///
/// Depth is bounded by memory, not call stack, and "stop descending once
/// classified" is simply not pushing a classified directory's children.
fn walk_for_skills(root: &Path) -> Result<Option<PackageStructure>> {
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if dir.join(SKILL_FILE).is_file() {
            return Ok(Some(PackageStructure::Single { skill_dir: dir }));
        }

        let children = child_dirs(&dir)?;
        let has_skill_child = children
            .iter()
            .any(|child| child.join(SKILL_FILE).is_file());
        if has_skill_child {
            return Ok(Some(PackageStructure::Subdir { skills_root: dir }));
        }

        // Reverse-sorted push so pops visit children in name order.
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }

    Ok(None)
}

fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| Error::fs("read dir", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs("read dir", dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if IGNORED_DIRS.contains(&name.as_ref()) || name.starts_with('.') {
            continue;
        }
        children.push(path);
    }
    children.sort();
    Ok(children)
}

/// One installable unit found by the repo-level scanner.
#[derive(Debug, Clone)]
pub struct ScannedUnit {
    pub kind: DetectionMethod,
    pub name: String,
    /// A declaration that would install this unit, when one can be formed.
    pub declaration: Option<ValidatedDependency>,
}

/// Enumerate every installable unit at a repository root.
///
/// Unlike [`detect_structure`], a root-level manifest does not suppress a
/// root-level marketplace here: both coexist as separate units. Each
/// marketplace plugin is its own unit, with a `claude-plugin` declaration
/// when the repository slug is known.
pub fn scan_package_root(root: &Path, repo: Option<&GithubSlug>) -> Result<Vec<ScannedUnit>> {
    let mut units = Vec::new();

    let manifest_path = root.join(MANIFEST_FILE_NAME);
    if manifest_path.is_file() {
        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| Error::fs("read", &manifest_path, e))?;
        let manifest =
            parse_manifest_str(&content, &manifest_path, crate::manifest::DiscoveredAt::Cwd)?;
        if let Some(package) = manifest.package {
            units.push(ScannedUnit {
                kind: DetectionMethod::Manifest,
                name: package.name,
                declaration: None,
            });
        }
    }

    let marketplace_path = root.join(MARKETPLACE_DESCRIPTOR);
    if marketplace_path.is_file() {
        let doc = read_marketplace(&marketplace_path)?;
        for plugin in doc.plugins {
            let declaration = repo.and_then(|slug| {
                crate::coerce::NonEmptyString::new(plugin.name.clone())
                    .ok()
                    .map(|name| ValidatedDependency::ClaudePlugin {
                        marketplace: MarketplaceSource::Slug(slug.clone()),
                        plugin: name,
                    })
            });
            units.push(ScannedUnit {
                kind: DetectionMethod::Marketplace,
                name: plugin.name,
                declaration,
            });
        }
    }

    if units.is_empty() {
        if let Some(structure) = walk_for_skills(root)? {
            if root.join(PLUGIN_DESCRIPTOR).is_file() {
                let doc = read_plugin(root)?;
                units.push(ScannedUnit {
                    kind: DetectionMethod::Plugin,
                    name: doc.name,
                    declaration: None,
                });
            } else {
                let name = root
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "package".to_string());
                units.push(ScannedUnit {
                    kind: structure.method(),
                    name,
                    declaration: None,
                });
            }
        }
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    const MARKETPLACE_JSON: &str = r#"{
        "name": "market",
        "plugins": [
            {"name": "alpha", "source": "plugins/alpha"},
            {"name": "beta", "source": {"source": "github", "repo": "acme/beta"}}
        ]
    }"#;

    #[test]
    fn test_manifest_wins_over_marketplace() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE_NAME,
            "[package]\nname = \"kit\"\nversion = \"1.0.0\"",
        );
        write(tmp.path(), MARKETPLACE_DESCRIPTOR, MARKETPLACE_JSON);

        let structure = detect_structure(tmp.path(), "kit", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Manifest);
    }

    #[test]
    fn test_manifest_suppresses_nested_skills() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE_NAME,
            "[package]\nname = \"kit\"\nversion = \"1.0.0\"",
        );
        write(tmp.path(), "skills/one/SKILL.md", "---\nname: one\n---\n");

        let structure = detect_structure(tmp.path(), "kit", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Manifest);
    }

    #[test]
    fn test_manifest_without_package_table_disqualified() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE_NAME,
            "[dependencies]\nx = { gh = \"a/b\" }",
        );
        write(tmp.path(), "skills/one/SKILL.md", "---\nname: one\n---\n");

        // Falls through to the walk: subdir method, not manifest.
        let structure = detect_structure(tmp.path(), "kit", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Subdir);
    }

    #[test]
    fn test_marketplace_beats_plugin() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), MARKETPLACE_DESCRIPTOR, MARKETPLACE_JSON);
        write(tmp.path(), PLUGIN_DESCRIPTOR, r#"{"name": "plug"}"#);

        let structure = detect_structure(tmp.path(), "m", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Marketplace);
    }

    #[test]
    fn test_marketplace_rejected_under_remote_subpath() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), MARKETPLACE_DESCRIPTOR, MARKETPLACE_JSON);

        let err = detect_structure(tmp.path(), "m", true).unwrap_err();
        assert!(format!("{}", err).contains("repo root"));
    }

    #[test]
    fn test_nested_marketplace_ignored() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "vendor-pkg/.claude-plugin/marketplace.json",
            MARKETPLACE_JSON,
        );
        write(tmp.path(), "skills/one/SKILL.md", "---\nname: one\n---\n");

        let structure = detect_structure(tmp.path(), "m", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Subdir);
    }

    #[test]
    fn test_plugin_method() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), PLUGIN_DESCRIPTOR, r#"{"name": "plug"}"#);
        write(tmp.path(), "skills/one/SKILL.md", "---\nname: one\n---\n");

        let structure = detect_structure(tmp.path(), "p", false).unwrap();
        assert_eq!(structure.method(), DetectionMethod::Plugin);
    }

    #[test]
    fn test_subdir_not_counted_twice_for_nested_skills() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "skills/one/SKILL.md", "---\nname: one\n---\n");
        write(
            tmp.path(),
            "skills/one/nested/SKILL.md",
            "---\nname: nested\n---\n",
        );

        let structure = detect_structure(tmp.path(), "s", false).unwrap();
        match structure {
            PackageStructure::Subdir { skills_root } => {
                assert_eq!(skills_root, tmp.path().join("skills"));
            }
            other => panic!("expected subdir, got {:?}", other),
        }
    }

    #[test]
    fn test_single_skill_package() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "SKILL.md", "---\nname: solo\n---\n");

        let structure = detect_structure(tmp.path(), "s", false).unwrap();
        match structure {
            PackageStructure::Single { skill_dir } => assert_eq!(skill_dir, tmp.path()),
            other => panic!("expected single, got {:?}", other),
        }
    }

    #[test]
    fn test_walk_ignores_vcs_and_dependency_dirs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".git/one/SKILL.md", "---\nname: one\n---\n");
        write(
            tmp.path(),
            "node_modules/pkg/SKILL.md",
            "---\nname: two\n---\n",
        );

        assert!(detect_structure(tmp.path(), "s", false).is_err());
    }

    #[test]
    fn test_detect_nothing() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "README.md", "# hello");
        let err = detect_structure(tmp.path(), "empty", false).unwrap_err();
        assert!(format!("{}", err).contains("unable to detect"));
    }

    #[test]
    fn test_scan_scenario_a_marketplace_units() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), MARKETPLACE_DESCRIPTOR, MARKETPLACE_JSON);

        let slug = GithubSlug::new("acme/market").unwrap();
        let units = scan_package_root(tmp.path(), Some(&slug)).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.kind == DetectionMethod::Marketplace));
        for unit in &units {
            match unit.declaration.as_ref().unwrap() {
                ValidatedDependency::ClaudePlugin { marketplace, .. } => {
                    assert_eq!(marketplace.identity(), "acme/market");
                }
                other => panic!("expected claude-plugin declaration, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_scan_scenario_b_manifest_and_marketplace_coexist() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE_NAME,
            "[package]\nname = \"kit\"\nversion = \"1.0.0\"",
        );
        write(
            tmp.path(),
            MARKETPLACE_DESCRIPTOR,
            r#"{"name": "m", "plugins": [{"name": "only", "source": "plugins/only"}]}"#,
        );

        let units = scan_package_root(tmp.path(), None).unwrap();
        assert_eq!(units.len(), 2);
        let kinds: Vec<DetectionMethod> = units.iter().map(|u| u.kind).collect();
        assert!(kinds.contains(&DetectionMethod::Manifest));
        assert!(kinds.contains(&DetectionMethod::Marketplace));
    }

    #[test]
    fn test_scan_scenario_c_dependencies_only_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            MANIFEST_FILE_NAME,
            "[dependencies]\nx = { gh = \"a/b\" }",
        );

        let units = scan_package_root(tmp.path(), None).unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_plugin_source_shapes_parse() {
        let doc: MarketplaceDoc = serde_json::from_str(MARKETPLACE_JSON).unwrap();
        assert!(matches!(doc.plugins[0].source, PluginSource::Relative(_)));
        assert!(matches!(
            doc.plugins[1].source,
            PluginSource::Structured { .. }
        ));
    }
}
