//! # Package Resolution
//!
//! Turns validated dependency declarations into canonical, fetch-ready
//! package descriptors. Resolution is a pure, total function: coercion has
//! already guaranteed every invariant, so this stage performs no I/O and
//! cannot fail.
//!
//! The fetch strategy follows one rule: local paths are symlinked, and
//! everything else is cloned, sparsely when and only when the declaration
//! names a repository sub-path.

use crate::coerce::{AbsolutePath, Alias, GitRef, GithubSlug, NonEmptyString, NormalizedGitUrl};
use crate::manifest::{MarketplaceSource, ValidatedDependency};
use crate::merge::{MergedDependency, MergedManifest};

/// Org used for registry packages declared without an explicit `@org/`.
pub const DEFAULT_REGISTRY_ORG: &str = "skillsync-registry";

/// Traceability back to the declaring manifest, carried through fetch,
/// detection, extraction, and install for error attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOrigin {
    pub manifest_path: AbsolutePath,
    pub alias: Alias,
}

/// How a canonical package's contents reach the local filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Clone { sparse: bool },
    Symlink,
}

/// The resolved source a canonical package points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalSource {
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

impl CanonicalSource {
    /// The git remote to clone, if this source is git-backed.
    pub fn clone_url(&self) -> Option<String> {
        match self {
            CanonicalSource::Registry { name, org, .. } => {
                let org = org
                    .as_ref()
                    .map(|o| o.as_str())
                    .unwrap_or(DEFAULT_REGISTRY_ORG);
                Some(format!("https://github.com/{}/{}.git", org, name.as_str()))
            }
            CanonicalSource::Github { slug, .. } => Some(slug.clone_url()),
            CanonicalSource::Git { url, .. } => Some(url.clone_url()),
            CanonicalSource::Local { .. } => None,
            CanonicalSource::ClaudePlugin { marketplace, .. } => Some(marketplace.clone_url()),
        }
    }

    /// The ref to check out, if any.
    pub fn git_ref(&self) -> Option<GitRef> {
        match self {
            // The shorthand parser restricts versions to tag-safe
            // characters, so direct construction is safe here.
            CanonicalSource::Registry { version, .. } => {
                Some(GitRef::Tag(version.as_str().to_string()))
            }
            CanonicalSource::Github { git_ref, .. } | CanonicalSource::Git { git_ref, .. } => {
                git_ref.clone()
            }
            CanonicalSource::Local { .. } | CanonicalSource::ClaudePlugin { .. } => None,
        }
    }

    /// The repository sub-path this package is confined to, if any.
    pub fn subpath(&self) -> Option<&str> {
        match self {
            CanonicalSource::Github { path, .. } | CanonicalSource::Git { path, .. } => {
                path.as_deref()
            }
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalSource::Registry { .. } => "registry",
            CanonicalSource::Github { .. } => "github",
            CanonicalSource::Git { .. } => "git",
            CanonicalSource::Local { .. } => "local",
            CanonicalSource::ClaudePlugin { .. } => "claude-plugin",
        }
    }
}

/// A resolved, fetch-ready package descriptor. Created once per sync run
/// and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPackage {
    pub origin: PackageOrigin,
    pub fetch: FetchStrategy,
    pub source: CanonicalSource,
}

/// Resolve one dependency into its canonical form.
pub fn resolve_dependency(
    dependency: &ValidatedDependency,
    origin: PackageOrigin,
) -> CanonicalPackage {
    let (fetch, source) = match dependency {
        ValidatedDependency::Registry { name, org, version } => (
            FetchStrategy::Clone { sparse: false },
            CanonicalSource::Registry {
                name: name.clone(),
                org: org.clone(),
                version: version.clone(),
            },
        ),
        ValidatedDependency::Github { slug, git_ref, path } => (
            FetchStrategy::Clone {
                sparse: path.is_some(),
            },
            CanonicalSource::Github {
                slug: slug.clone(),
                git_ref: git_ref.clone(),
                path: path.clone(),
            },
        ),
        ValidatedDependency::Git { url, git_ref, path } => (
            FetchStrategy::Clone {
                sparse: path.is_some(),
            },
            CanonicalSource::Git {
                url: url.clone(),
                git_ref: git_ref.clone(),
                path: path.clone(),
            },
        ),
        ValidatedDependency::Local { path } => (
            FetchStrategy::Symlink,
            CanonicalSource::Local { path: path.clone() },
        ),
        ValidatedDependency::ClaudePlugin {
            marketplace,
            plugin,
        } => (
            FetchStrategy::Clone { sparse: false },
            CanonicalSource::ClaudePlugin {
                marketplace: marketplace.clone(),
                plugin: plugin.clone(),
            },
        ),
    };

    CanonicalPackage {
        origin,
        fetch,
        source,
    }
}

/// Resolve every dependency of a merged manifest, preserving declaration
/// order. Ordering matters for display only, not correctness.
pub fn resolve_merged_packages(merged: &MergedManifest) -> Vec<CanonicalPackage> {
    merged
        .dependencies
        .iter()
        .map(|(alias, MergedDependency { dependency, origin })| {
            resolve_dependency(
                dependency,
                PackageOrigin {
                    manifest_path: origin.source_path.clone(),
                    alias: alias.clone(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{parse_manifest_str, DiscoveredAt};
    use std::path::Path;

    fn origin() -> PackageOrigin {
        PackageOrigin {
            manifest_path: AbsolutePath::new("/proj/agents.toml").unwrap(),
            alias: Alias::new("dep").unwrap(),
        }
    }

    fn deps(content: &str) -> Vec<ValidatedDependency> {
        parse_manifest_str(content, Path::new("/proj/agents.toml"), DiscoveredAt::Cwd)
            .unwrap()
            .dependencies
            .into_iter()
            .map(|(_, d)| d)
            .collect()
    }

    #[test]
    fn test_local_is_always_symlink() {
        let dep = &deps(r#"[dependencies]
a = { path = "./x" }"#)[0];
        let pkg = resolve_dependency(dep, origin());
        assert_eq!(pkg.fetch, FetchStrategy::Symlink);
    }

    #[test]
    fn test_clone_sparse_iff_path_present() {
        let all = deps(
            r#"[dependencies]
full = { gh = "acme/skills" }
sparse = { gh = "acme/skills", path = "sub" }
git_full = { git = "https://example.com/r" }
git_sparse = { git = "https://example.com/r", path = "sub" }
reg = "fmt@1.0.0"
plug = { marketplace = "acme/market", plugin = "deploy" }"#,
        );
        let strategies: Vec<FetchStrategy> = all
            .iter()
            .map(|d| resolve_dependency(d, origin()).fetch)
            .collect();
        assert_eq!(
            strategies,
            vec![
                FetchStrategy::Clone { sparse: false },
                FetchStrategy::Clone { sparse: true },
                FetchStrategy::Clone { sparse: false },
                FetchStrategy::Clone { sparse: true },
                FetchStrategy::Clone { sparse: false },
                FetchStrategy::Clone { sparse: false },
            ]
        );
    }

    #[test]
    fn test_ref_kind_never_affects_sparseness() {
        let all = deps(
            r#"[dependencies]
t = { gh = "acme/skills", tag = "v1" }
b = { gh = "acme/skills", branch = "main" }
r = { gh = "acme/skills", rev = "deadbeef" }"#,
        );
        for dep in &all {
            assert_eq!(
                resolve_dependency(dep, origin()).fetch,
                FetchStrategy::Clone { sparse: false }
            );
        }
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let dep = &deps(
            r#"[dependencies]
a = { gh = "acme/skills", tag = "v1", path = "sub" }"#,
        )[0];
        let one = resolve_dependency(dep, origin());
        let two = resolve_dependency(dep, origin());
        assert_eq!(one, two);
    }

    #[test]
    fn test_registry_clone_url_and_tag() {
        let dep = &deps(r#"[dependencies]
a = "@acme/fmt@1.2.0""#)[0];
        let pkg = resolve_dependency(dep, origin());
        assert_eq!(
            pkg.source.clone_url().unwrap(),
            "https://github.com/acme/fmt.git"
        );
        assert_eq!(pkg.source.git_ref().unwrap().value(), "1.2.0");
    }

    #[test]
    fn test_registry_default_org() {
        let dep = &deps(r#"[dependencies]
a = "fmt@1.0.0""#)[0];
        let pkg = resolve_dependency(dep, origin());
        assert_eq!(
            pkg.source.clone_url().unwrap(),
            format!("https://github.com/{}/fmt.git", DEFAULT_REGISTRY_ORG)
        );
    }

    #[test]
    fn test_local_has_no_clone_url() {
        let dep = &deps(r#"[dependencies]
a = { path = "./x" }"#)[0];
        let pkg = resolve_dependency(dep, origin());
        assert!(pkg.source.clone_url().is_none());
        assert!(pkg.source.git_ref().is_none());
    }

    #[test]
    fn test_resolve_merged_preserves_order() {
        let manifest = parse_manifest_str(
            r#"[dependencies]
z = { path = "./z" }
a = { gh = "acme/a" }"#,
            Path::new("/proj/agents.toml"),
            DiscoveredAt::Cwd,
        )
        .unwrap();
        let merged = crate::merge::merge_manifests(&[manifest]).unwrap();
        let packages = resolve_merged_packages(&merged);
        let aliases: Vec<&str> = packages
            .iter()
            .map(|p| p.origin.alias.as_str())
            .collect();
        assert_eq!(aliases, vec!["z", "a"]);
    }
}
