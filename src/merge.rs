//! # Manifest Merge
//!
//! Combines the ordered list of discovered manifests into one
//! [`MergedManifest`]. The merge is a single pass in discovery order, so
//! precedence is simply "first wins":
//!
//! - Agent settings: the first manifest to mention an agent fixes its value;
//!   later manifests may only add agents not yet seen.
//! - Dependencies: each `(alias, dependency)` pair is checked against what
//!   has been recorded. One alias bound to two different packages is a hard
//!   conflict that aborts the whole merge. The same package re-declared
//!   under a second alias is kept once, under the first alias, with a
//!   warning per re-declaration.
//!
//! The merged result is ephemeral: it is recomputed on every sync and never
//! persisted.

use std::collections::BTreeMap;
use std::collections::HashMap;

use log::warn;

use crate::agents::AgentId;
use crate::coerce::Alias;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, ManifestOrigin, ValidatedDependency};

/// One merged dependency with the manifest it came from.
#[derive(Debug, Clone)]
pub struct MergedDependency {
    pub dependency: ValidatedDependency,
    pub origin: ManifestOrigin,
}

/// The result of merging all discovered manifests.
#[derive(Debug, Clone)]
pub struct MergedManifest {
    pub agents: BTreeMap<AgentId, bool>,
    /// First-declaration order across manifests.
    pub dependencies: Vec<(Alias, MergedDependency)>,
    pub warnings: Vec<String>,
}

impl MergedManifest {
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Merge manifests in precedence order.
///
/// Short-circuits on the first alias conflict: a merged manifest is a
/// global precondition for the rest of the pipeline, so there is no
/// best-effort merging past an error.
pub fn merge_manifests(manifests: &[Manifest]) -> Result<MergedManifest> {
    let mut agents = BTreeMap::new();
    let mut dependencies: Vec<(Alias, MergedDependency)> = Vec::new();
    let mut warnings = Vec::new();

    // alias -> (dedupe key, declaring origin)
    let mut by_alias: HashMap<Alias, ((&'static str, String, String), ManifestOrigin)> =
        HashMap::new();
    // dedupe key -> first alias
    let mut by_key: HashMap<(&'static str, String, String), Alias> = HashMap::new();

    for manifest in manifests {
        for (id, enabled) in &manifest.agents {
            agents.entry(*id).or_insert(*enabled);
        }

        for (alias, dependency) in &manifest.dependencies {
            let key = dependency.dedupe_key();

            if let Some((existing_key, first_origin)) = by_alias.get(alias) {
                if *existing_key != key {
                    return Err(Error::AliasConflict {
                        alias: alias.as_str().to_string(),
                        first: first_origin.source_path.to_path_buf(),
                        second: manifest.source_path().to_path_buf(),
                    });
                }
                // Same alias, same package: already recorded.
                continue;
            }

            if let Some(first_alias) = by_key.get(&key) {
                let message = format!(
                    "package already declared as '{}'; ignoring duplicate alias '{}' from {}",
                    first_alias,
                    alias,
                    manifest.source_path().display()
                );
                warn!("{}", message);
                warnings.push(message);
                continue;
            }

            by_alias.insert(alias.clone(), (key.clone(), manifest.origin.clone()));
            by_key.insert(key, alias.clone());
            dependencies.push((
                alias.clone(),
                MergedDependency {
                    dependency: dependency.clone(),
                    origin: manifest.origin.clone(),
                },
            ));
        }
    }

    Ok(MergedManifest {
        agents,
        dependencies,
        warnings,
    })
}
