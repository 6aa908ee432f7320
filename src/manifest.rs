//! # Manifest Model and Discovery
//!
//! An `agents.toml` manifest declares which agents receive skills and which
//! dependencies provide them:
//!
//! ```toml
//! [agents]
//! claude-code = true
//! codex = false
//!
//! [dependencies]
//! fmt = "@acme/fmt-skills@1.2.0"          # registry shorthand
//! review = { gh = "acme/review", tag = "v2" }
//! mono = { git = "https://git.sr.ht/~acme/mono", path = "skills/rust" }
//! scratch = { path = "../local-skills" }
//! deploy = { marketplace = "acme/market", plugin = "deploy" }
//! ```
//!
//! Parsing coerces every raw value through the types in [`crate::coerce`];
//! a successfully parsed [`Manifest`] contains only validated data and is
//! never mutated in place.
//!
//! Discovery looks for manifests at four locations, in precedence order:
//! the working directory, its ancestors, `~/.agents.toml`, and
//! `~/.config/agents/agents.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::agents::AgentId;
use crate::coerce::{AbsolutePath, Alias, GitRef, GithubSlug, NonEmptyString, NormalizedGitUrl};
use crate::error::{Error, Result};

/// Manifest file name looked up during discovery and package detection.
pub const MANIFEST_FILE_NAME: &str = "agents.toml";

/// Where a manifest was found; discovery order is merge precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveredAt {
    Cwd,
    Parent,
    Home,
    Global,
}

/// Identifies the file a manifest (or a dependency within it) came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOrigin {
    pub source_path: AbsolutePath,
    pub discovered_at: DiscoveredAt,
}

/// Where a marketplace lives: a GitHub slug or a full git URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarketplaceSource {
    Slug(GithubSlug),
    Url(NormalizedGitUrl),
}

impl MarketplaceSource {
    /// Stable identity string used for deduplication.
    pub fn identity(&self) -> String {
        match self {
            MarketplaceSource::Slug(slug) => slug.as_str().to_string(),
            MarketplaceSource::Url(url) => url.as_str().to_string(),
        }
    }

    pub fn clone_url(&self) -> String {
        match self {
            MarketplaceSource::Slug(slug) => slug.clone_url(),
            MarketplaceSource::Url(url) => url.clone_url(),
        }
    }
}

/// A validated dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedDependency {
    Registry {
        name: NonEmptyString,
        org: Option<NonEmptyString>,
        version: NonEmptyString,
    },
    Github {
        slug: GithubSlug,
        git_ref: Option<GitRef>,
        path: Option<String>,
    },
    Git {
        url: NormalizedGitUrl,
        git_ref: Option<GitRef>,
        path: Option<String>,
    },
    Local {
        path: AbsolutePath,
    },
    ClaudePlugin {
        marketplace: MarketplaceSource,
        plugin: NonEmptyString,
    },
}

impl ValidatedDependency {
    /// Canonical identity used by the merge to decide whether two
    /// declarations are "the same package". Git refs are intentionally
    /// excluded: the same repo and sub-path under a different ref still
    /// dedupes to one dependency.
    pub fn dedupe_key(&self) -> (&'static str, String, String) {
        match self {
            ValidatedDependency::Registry { name, org, .. } => (
                "registry",
                org.as_ref().map(|o| o.as_str().to_string()).unwrap_or_default(),
                name.as_str().to_string(),
            ),
            ValidatedDependency::Github { slug, path, .. } => (
                "github",
                slug.as_str().to_string(),
                path.clone().unwrap_or_default(),
            ),
            ValidatedDependency::Git { url, path, .. } => (
                "git",
                url.as_str().to_string(),
                path.clone().unwrap_or_default(),
            ),
            ValidatedDependency::Local { path } => {
                ("local", path.to_string(), String::new())
            }
            ValidatedDependency::ClaudePlugin {
                marketplace,
                plugin,
            } => (
                "claude-plugin",
                marketplace.identity(),
                plugin.as_str().to_string(),
            ),
        }
    }

    /// Short human-readable kind for listings and logs.
    pub fn kind(&self) -> &'static str {
        self.dedupe_key().0
    }
}

/// Skill export setting from `[exports.auto_discover]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillsExport {
    /// Skills live under this directory relative to the package root.
    Dir(String),
    /// Auto-discovery explicitly disabled with `skills = false`.
    Disabled,
}

impl Default for SkillsExport {
    fn default() -> Self {
        SkillsExport::Dir("./skills".to_string())
    }
}

/// The `[package]` table; its presence is what makes a directory a
/// manifest-method package during structure detection.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
}

/// A parsed, validated manifest. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub package: Option<PackageSection>,
    pub agents: BTreeMap<AgentId, bool>,
    /// Declaration order is preserved; it drives merge precedence within
    /// one manifest and display ordering.
    pub dependencies: Vec<(Alias, ValidatedDependency)>,
    pub exports: SkillsExport,
    pub origin: ManifestOrigin,
}

impl Manifest {
    pub fn source_path(&self) -> &Path {
        self.origin.source_path.as_path()
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    package: Option<PackageSection>,
    #[serde(default)]
    agents: Option<toml::Table>,
    #[serde(default)]
    dependencies: Option<toml::Table>,
    #[serde(default)]
    exports: Option<RawExports>,
}

#[derive(Debug, Deserialize)]
struct RawExports {
    #[serde(default)]
    auto_discover: Option<RawAutoDiscover>,
}

#[derive(Debug, Deserialize)]
struct RawAutoDiscover {
    #[serde(default)]
    skills: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDependencyTable {
    #[serde(default)]
    gh: Option<String>,
    #[serde(default)]
    git: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    marketplace: Option<String>,
    #[serde(default)]
    plugin: Option<String>,
}

fn registry_shorthand_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // The version group is restricted to git-tag-safe characters so the
        // resolver can turn it into a tag without re-validating.
        Regex::new(r"^(?:@([A-Za-z0-9_.-]+)/)?([A-Za-z0-9_.-]+)@([A-Za-z0-9][A-Za-z0-9_.+-]*)$")
            .expect("static regex")
    })
}

/// Parse a manifest file from disk.
pub fn parse_manifest(path: &Path, discovered_at: DiscoveredAt) -> Result<Manifest> {
    let content = fs::read_to_string(path).map_err(|e| Error::fs("read", path, e))?;
    parse_manifest_str(&content, path, discovered_at)
}

/// Parse manifest content with an explicit source path for error messages.
pub fn parse_manifest_str(
    content: &str,
    path: &Path,
    discovered_at: DiscoveredAt,
) -> Result<Manifest> {
    let raw: RawManifest = toml::from_str(content).map_err(|e| Error::Manifest {
        path: path.to_path_buf(),
        message: e.to_string(),
        hint: None,
    })?;

    let source_path = AbsolutePath::new(path).or_else(|_| {
        // Relative manifest paths are resolved against the process cwd so
        // origins stay absolute for error attribution.
        let cwd = std::env::current_dir()?;
        AbsolutePath::new(cwd.join(path))
    })?;
    let manifest_dir = source_path
        .as_path()
        .parent()
        .unwrap_or(Path::new("/"))
        .to_path_buf();

    let mut agents = BTreeMap::new();
    if let Some(table) = raw.agents {
        for (key, value) in table {
            let id = AgentId::parse(&key).ok_or_else(|| Error::Manifest {
                path: path.to_path_buf(),
                message: format!("unknown agent '{}'", key),
                hint: Some(format!("known agents: {}", AgentId::known_ids().join(", "))),
            })?;
            let enabled = value.as_bool().ok_or_else(|| Error::Manifest {
                path: path.to_path_buf(),
                message: format!("agent '{}' must be a boolean", key),
                hint: None,
            })?;
            agents.insert(id, enabled);
        }
    }

    let mut dependencies = Vec::new();
    if let Some(table) = raw.dependencies {
        for (key, value) in table {
            let alias = Alias::new(&key).map_err(|e| Error::Manifest {
                path: path.to_path_buf(),
                message: format!("invalid dependency alias '{}': {}", key, e),
                hint: None,
            })?;
            let dep = parse_declaration(&value, &manifest_dir).map_err(|e| match e {
                Error::Validation { message, hint } => Error::Manifest {
                    path: path.to_path_buf(),
                    message: format!("dependency '{}': {}", key, message),
                    hint,
                },
                other => other,
            })?;
            dependencies.push((alias, dep));
        }
    }

    let exports = match raw.exports.and_then(|e| e.auto_discover).and_then(|a| a.skills) {
        None => SkillsExport::default(),
        Some(toml::Value::Boolean(false)) => SkillsExport::Disabled,
        Some(toml::Value::Boolean(true)) => SkillsExport::default(),
        Some(toml::Value::String(dir)) => SkillsExport::Dir(dir),
        Some(other) => {
            return Err(Error::Manifest {
                path: path.to_path_buf(),
                message: format!(
                    "exports.auto_discover.skills must be a string or false, got {}",
                    other.type_str()
                ),
                hint: None,
            })
        }
    };

    Ok(Manifest {
        package: raw.package,
        agents,
        dependencies,
        exports,
        origin: ManifestOrigin {
            source_path,
            discovered_at,
        },
    })
}

/// Parse one dependency declaration: a registry shorthand string or a table
/// with exactly one source field.
fn parse_declaration(value: &toml::Value, manifest_dir: &Path) -> Result<ValidatedDependency> {
    match value {
        toml::Value::String(s) => parse_registry_shorthand(s),
        toml::Value::Table(_) => {
            let table: RawDependencyTable =
                value.clone().try_into().map_err(|e: toml::de::Error| {
                    Error::validation_with_hint(
                        e.to_string(),
                        "allowed keys: gh, git, path, tag, branch, rev, marketplace, plugin",
                    )
                })?;
            parse_table_declaration(table, manifest_dir)
        }
        other => Err(Error::validation(format!(
            "declaration must be a string or a table, got {}",
            other.type_str()
        ))),
    }
}

fn parse_registry_shorthand(s: &str) -> Result<ValidatedDependency> {
    let captures = registry_shorthand_re().captures(s).ok_or_else(|| {
        Error::validation_with_hint(
            format!("'{}' is not a valid registry package", s),
            "expected 'name@version' or '@org/name@version'",
        )
    })?;
    Ok(ValidatedDependency::Registry {
        org: captures
            .get(1)
            .map(|m| NonEmptyString::new(m.as_str()))
            .transpose()?,
        name: NonEmptyString::new(&captures[2])?,
        version: NonEmptyString::new(&captures[3])?,
    })
}

fn parse_table_declaration(
    table: RawDependencyTable,
    manifest_dir: &Path,
) -> Result<ValidatedDependency> {
    let git_ref = parse_ref_fields(&table)?;

    let sources = [
        table.gh.is_some(),
        table.git.is_some(),
        table.marketplace.is_some(),
        // `path` only counts as a source when nothing else claims it as a
        // sub-path refinement.
        table.path.is_some() && table.gh.is_none() && table.git.is_none(),
    ];
    let source_count = sources.iter().filter(|s| **s).count();
    if source_count != 1 {
        return Err(Error::validation_with_hint(
            "declaration must name exactly one source",
            "use exactly one of gh, git, path, or marketplace",
        ));
    }

    if let Some(gh) = table.gh {
        return Ok(ValidatedDependency::Github {
            slug: GithubSlug::new(gh)?,
            git_ref,
            path: table.path.map(validate_subpath).transpose()?,
        });
    }

    if let Some(git) = table.git {
        return Ok(ValidatedDependency::Git {
            url: NormalizedGitUrl::new(git)?,
            git_ref,
            path: table.path.map(validate_subpath).transpose()?,
        });
    }

    if let Some(marketplace) = table.marketplace {
        if git_ref.is_some() {
            return Err(Error::validation(
                "marketplace plugins do not accept tag/branch/rev",
            ));
        }
        let plugin = table.plugin.ok_or_else(|| {
            Error::validation_with_hint(
                "marketplace declaration is missing 'plugin'",
                "name the plugin to install from the marketplace",
            )
        })?;
        let source = if marketplace.contains("://") || marketplace.contains('@') {
            MarketplaceSource::Url(NormalizedGitUrl::new(marketplace)?)
        } else {
            MarketplaceSource::Slug(GithubSlug::new(marketplace)?)
        };
        return Ok(ValidatedDependency::ClaudePlugin {
            marketplace: source,
            plugin: NonEmptyString::new(plugin)?,
        });
    }

    // Only `path` remains: a local package.
    if git_ref.is_some() {
        return Err(Error::validation(
            "local path dependencies do not accept tag/branch/rev",
        ));
    }
    let path = table.path.expect("source_count == 1 guarantees path");
    Ok(ValidatedDependency::Local {
        path: AbsolutePath::resolve(manifest_dir, path)?,
    })
}

fn parse_ref_fields(table: &RawDependencyTable) -> Result<Option<GitRef>> {
    let present = [
        table.tag.as_ref().map(|v| ("tag", v)),
        table.branch.as_ref().map(|v| ("branch", v)),
        table.rev.as_ref().map(|v| ("rev", v)),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    match present.as_slice() {
        [] => Ok(None),
        [("tag", v)] => Ok(Some(GitRef::tag(v.as_str())?)),
        [("branch", v)] => Ok(Some(GitRef::branch(v.as_str())?)),
        [("rev", v)] => Ok(Some(GitRef::rev(v.as_str())?)),
        _ => Err(Error::validation(
            "at most one of tag, branch, rev may be set",
        )),
    }
}

/// Validate a repository sub-path refinement: relative, and confined to the
/// repository (no parent traversal, no absolute form).
pub fn validate_subpath(raw: String) -> Result<String> {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::validation("sub-path must not be empty"));
    }
    if Path::new(&raw).is_absolute() {
        return Err(Error::validation(format!(
            "sub-path '{}' must be relative",
            raw
        )));
    }
    if trimmed.split('/').any(|seg| seg == ".." || seg == ".") {
        return Err(Error::validation(format!(
            "sub-path '{}' must not contain '.' or '..' segments",
            raw
        )));
    }
    Ok(trimmed.to_string())
}

/// Find and parse all manifests visible from `project_root`, in precedence
/// order: cwd, ancestors (nearest first), home, global.
pub fn discover_manifests(project_root: &Path, home_dir: &Path) -> Result<Vec<Manifest>> {
    let mut found: Vec<(PathBuf, DiscoveredAt)> = Vec::new();
    let mut seen: Vec<PathBuf> = Vec::new();

    let mut push = |path: PathBuf, at: DiscoveredAt, seen: &mut Vec<PathBuf>| {
        if path.is_file() && !seen.contains(&path) {
            seen.push(path.clone());
            found.push((path, at));
        }
    };

    push(
        project_root.join(MANIFEST_FILE_NAME),
        DiscoveredAt::Cwd,
        &mut seen,
    );
    for ancestor in project_root.ancestors().skip(1) {
        push(
            ancestor.join(MANIFEST_FILE_NAME),
            DiscoveredAt::Parent,
            &mut seen,
        );
    }
    push(home_dir.join(".agents.toml"), DiscoveredAt::Home, &mut seen);
    push(
        home_dir.join(".config").join("agents").join(MANIFEST_FILE_NAME),
        DiscoveredAt::Global,
        &mut seen,
    );

    let mut manifests = Vec::with_capacity(found.len());
    for (path, at) in found {
        debug!("discovered manifest at {} ({:?})", path.display(), at);
        manifests.push(parse_manifest(&path, at)?);
    }
    Ok(manifests)
}
