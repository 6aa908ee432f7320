//! # Repository Group Batching and Fetching
//!
//! Several declared packages often live in the same remote repository (a
//! skills monorepo, most commonly). To avoid cloning it once per package,
//! canonical packages are grouped by `(kind, repository identity, ref)` and
//! each group is fetched with a single clone.
//!
//! Sparseness is decided per group: if any member needs the whole tree (no
//! sub-path), the group is fetched as a full checkout; otherwise the clone
//! is sparse over the union of the members' sub-paths. Local packages skip
//! grouping entirely: they are resolved in place and later symlinked.
//!
//! Group membership is computed completely before any fetch starts; the
//! fetches themselves are independent and run in parallel. Every group is
//! materialized under a deterministic hashed directory name inside the
//! per-run temp root, so a repeated package within one run reuses the
//! same clone.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use log::{debug, info};
use rayon::prelude::*;

use crate::coerce::GitRef;
use crate::error::{Error, Result};
use crate::git;
use crate::resolve::{CanonicalPackage, CanonicalSource, FetchStrategy};

/// A canonical package materialized on the local filesystem.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub package: CanonicalPackage,
    /// Root directory of the package's content.
    pub package_path: PathBuf,
}

impl FetchedPackage {
    /// True when this package came from a remote repository confined to a
    /// sub-path; marketplaces found under such roots are rejected.
    pub fn is_remote_subpath(&self) -> bool {
        matches!(self.package.fetch, FetchStrategy::Clone { .. })
            && self.package.source.subpath().is_some()
    }
}

/// One clone shared by every member package of a repository + ref pair.
#[derive(Debug)]
struct RepoGroup {
    kind: &'static str,
    clone_url: String,
    git_ref: Option<GitRef>,
    /// Indices into the package slice, in first-seen order.
    members: Vec<usize>,
    /// `None` means full checkout.
    sparse_paths: Option<Vec<String>>,
}

impl RepoGroup {
    fn key(&self) -> (&'static str, &str, String) {
        // A tag and a branch with the same name are distinct groups, so
        // the ref kind is part of the key.
        let ref_name = self
            .git_ref
            .as_ref()
            .map(|r| format!("{}-{}", r.kind(), r.value()))
            .unwrap_or_else(|| "default".to_string());
        (self.kind, &self.clone_url, ref_name)
    }

    /// Deterministic, filesystem-safe directory name for this group.
    fn dir_name(&self) -> String {
        let (kind, url, ref_name) = self.key();
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        url.hash(&mut hasher);
        ref_name.hash(&mut hasher);
        let safe_ref = ref_name.replace('/', "-");
        format!("{:016x}-{}", hasher.finish(), safe_ref)
    }
}

/// Fetch all packages into `temp_root`, returning them in input order.
pub fn fetch_packages(
    packages: &[CanonicalPackage],
    temp_root: &Path,
) -> Result<Vec<FetchedPackage>> {
    let mut paths: Vec<Option<PathBuf>> = vec![None; packages.len()];

    // Local packages resolve in place, no copy.
    for (index, package) in packages.iter().enumerate() {
        if let CanonicalSource::Local { path } = &package.source {
            if !path.as_path().is_dir() {
                return Err(Error::NotFound {
                    message: format!(
                        "local package '{}': {} does not exist or is not a directory",
                        package.origin.alias, path
                    ),
                });
            }
            paths[index] = Some(path.to_path_buf());
        }
    }

    // Assign every remaining package to its group before fetching anything.
    let groups = group_packages(packages);
    if groups.is_empty() {
        return finish(packages, paths);
    }

    git::ensure_git_available()?;

    let fetched_dirs: Vec<(usize, PathBuf)> = groups
        .par_iter()
        .enumerate()
        .map(|(group_index, group)| {
            fetch_group(group, packages, temp_root).map(|dir| (group_index, dir))
        })
        .collect::<Result<Vec<_>>>()?;

    for (group_index, group_dir) in fetched_dirs {
        let group = &groups[group_index];
        for &member in &group.members {
            let package = &packages[member];
            let package_path = match package.source.subpath() {
                Some(sub) => {
                    let path = group_dir.join(sub);
                    if !path.is_dir() {
                        return Err(Error::NotFound {
                            message: format!(
                                "package '{}': sub-path '{}' not found in {}",
                                package.origin.alias, sub, group.clone_url
                            ),
                        });
                    }
                    path
                }
                None => group_dir.clone(),
            };
            paths[member] = Some(package_path);
        }
    }

    finish(packages, paths)
}

fn finish(
    packages: &[CanonicalPackage],
    paths: Vec<Option<PathBuf>>,
) -> Result<Vec<FetchedPackage>> {
    packages
        .iter()
        .zip(paths)
        .map(|(package, path)| {
            let package_path = path.expect("every package was assigned a path");
            Ok(FetchedPackage {
                package: package.clone(),
                package_path,
            })
        })
        .collect()
}

/// Assign clone-strategy packages to repository groups, in first-seen
/// order. A member without a sub-path widens its whole group to a full
/// checkout, because that member needs the entire tree anyway.
fn group_packages(packages: &[CanonicalPackage]) -> Vec<RepoGroup> {
    let mut groups: Vec<RepoGroup> = Vec::new();

    for (index, package) in packages.iter().enumerate() {
        let FetchStrategy::Clone { .. } = package.fetch else {
            continue;
        };
        let clone_url = package
            .source
            .clone_url()
            .expect("clone-strategy packages have a remote");
        let kind = package.source.kind();
        let git_ref = package.source.git_ref();
        let subpath = package.source.subpath().map(|s| s.to_string());

        let existing = groups.iter_mut().find(|g| {
            g.kind == kind && g.clone_url == clone_url && g.git_ref == git_ref
        });
        match existing {
            Some(group) => {
                group.members.push(index);
                match (&mut group.sparse_paths, subpath) {
                    (Some(paths), Some(sub)) => {
                        if !paths.contains(&sub) {
                            paths.push(sub);
                        }
                    }
                    // One full-tree member makes the whole group full.
                    (sparse_paths, None) => *sparse_paths = None,
                    (None, Some(_)) => {}
                }
            }
            None => groups.push(RepoGroup {
                kind,
                clone_url,
                git_ref,
                members: vec![index],
                sparse_paths: subpath.map(|s| vec![s]),
            }),
        }
    }

    groups
}

/// Clone one group into its hashed directory under `temp_root`.
fn fetch_group(group: &RepoGroup, packages: &[CanonicalPackage], temp_root: &Path) -> Result<PathBuf> {
    let dest = temp_root.join(group.dir_name());
    // Hashed names are unique per key, so an existing destination means a
    // key collision inside one run.
    if dest.exists() {
        return Err(Error::InstallConflict {
            message: format!(
                "fetch destination {} already exists for {}",
                dest.display(),
                group.clone_url
            ),
        });
    }

    let aliases: Vec<&str> = group
        .members
        .iter()
        .map(|&i| packages[i].origin.alias.as_str())
        .collect();
    info!(
        "fetching {} ({}{}) for {}",
        group.clone_url,
        group
            .git_ref
            .as_ref()
            .map(|r| r.value())
            .unwrap_or("default"),
        if group.sparse_paths.is_some() {
            ", sparse"
        } else {
            ""
        },
        aliases.join(", ")
    );

    let result = (|| {
        git::clone(&group.clone_url, &dest, group.sparse_paths.as_deref())?;
        if let Some(git_ref) = &group.git_ref {
            git::checkout_ref(&dest, &group.clone_url, git_ref)?;
        }
        Ok(())
    })();

    result.map_err(|e| attach_members(e, &aliases))?;
    debug!("fetched {} into {}", group.clone_url, dest.display());
    Ok(dest)
}

/// Attach the needing aliases to a fetch failure for attribution.
fn attach_members(error: Error, aliases: &[&str]) -> Error {
    let needed_by = format!(" (needed by: {})", aliases.join(", "));
    match error {
        Error::GitClone {
            url,
            git_ref,
            message,
            hint,
        } => Error::GitClone {
            url,
            git_ref,
            message: format!("{}{}", message.trim_end(), needed_by),
            hint,
        },
        Error::GitCommand {
            command,
            url,
            stderr,
        } => Error::GitCommand {
            command,
            url,
            stderr: format!("{}{}", stderr, needed_by),
        },
        other => other,
    }
}
