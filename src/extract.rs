//! # Skill Extraction
//!
//! Given a detected package structure, extraction walks the relevant skill
//! directories, parses each skill's descriptor, and produces the list of
//! skills the package exports.
//!
//! A skill is a directory containing a `SKILL.md` whose YAML frontmatter
//! names it:
//!
//! ```markdown
//! ---
//! name: commit-style
//! description: House rules for commit messages
//! ---
//! ...instructions...
//! ```
//!
//! Extraction runs in one of two modes. In strict mode (first-party
//! dependencies) a single malformed skill aborts the package. In lenient
//! mode (marketplace-sourced plugins, which are less curated) malformed
//! skills become warnings and are skipped. Duplicate skill names are a hard
//! error in either mode, and a package that yields zero valid skills is an
//! error even when its individual failures were tolerated.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::detect::{PackageStructure, PLUGIN_SKILLS_DIR};
use crate::error::{Error, Result};
use crate::manifest::SkillsExport;
use crate::resolve::PackageOrigin;

/// Descriptor file every skill directory must carry.
pub const SKILL_FILE: &str = "SKILL.md";

/// How tolerant extraction is of malformed skills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// A single bad skill aborts the package.
    Strict,
    /// Bad skills become warnings; the rest of the package survives.
    Lenient,
}

/// One extracted skill, ready for install planning.
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub source_path: PathBuf,
    pub origin: PackageOrigin,
}

/// The outcome of extracting one package.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub skills: Vec<Skill>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SkillFrontmatter {
    name: String,
    #[serde(default)]
    #[allow(dead_code)]
    description: Option<String>,
}

/// Extract the skills a detected package exports.
///
/// Marketplace structures are expanded into plugin sub-packages by the
/// orchestrator before extraction; passing one here is a programmer error.
pub fn extract_skills(
    structure: &PackageStructure,
    origin: &PackageOrigin,
    mode: ExtractionMode,
) -> Result<Extraction> {
    match structure {
        PackageStructure::Subdir { skills_root } => extract_subdir(skills_root, origin, mode),
        PackageStructure::Plugin { plugin_root } => {
            extract_subdir(&plugin_root.join(PLUGIN_SKILLS_DIR), origin, mode)
        }
        PackageStructure::Manifest {
            manifest_path,
            export,
        } => match export {
            SkillsExport::Disabled => Err(Error::Extract {
                alias: origin.alias.as_str().to_string(),
                message: "skill auto-discovery is disabled (exports.auto_discover.skills = false)"
                    .to_string(),
            }),
            SkillsExport::Dir(dir) => {
                let base = manifest_path.parent().unwrap_or(Path::new("/"));
                extract_subdir(&base.join(dir), origin, mode)
            }
        },
        PackageStructure::Single { skill_dir } => {
            let skill = parse_skill_dir(skill_dir, origin)?;
            Ok(Extraction {
                skills: vec![skill],
                warnings: Vec::new(),
            })
        }
        PackageStructure::Marketplace { .. } => {
            unreachable!("marketplace packages expand into plugins before extraction")
        }
    }
}

/// Extract every immediate child directory of `skills_root` that carries a
/// skill descriptor.
fn extract_subdir(
    skills_root: &Path,
    origin: &PackageOrigin,
    mode: ExtractionMode,
) -> Result<Extraction> {
    if !skills_root.is_dir() {
        return Err(Error::Extract {
            alias: origin.alias.as_str().to_string(),
            message: format!("skills directory {} does not exist", skills_root.display()),
        });
    }

    let mut candidates = Vec::new();
    let entries =
        fs::read_dir(skills_root).map_err(|e| Error::fs("read dir", skills_root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::fs("read dir", skills_root, e))?;
        let path = entry.path();
        if path.is_dir() && path.join(SKILL_FILE).is_file() {
            candidates.push(path);
        }
    }
    candidates.sort();

    let mut skills: Vec<Skill> = Vec::new();
    let mut warnings = Vec::new();
    for candidate in candidates {
        match parse_skill_dir(&candidate, origin) {
            Ok(skill) => {
                if skills.iter().any(|s| s.name == skill.name) {
                    return Err(Error::Extract {
                        alias: origin.alias.as_str().to_string(),
                        message: format!(
                            "duplicate skill name '{}' (ambiguous install target)",
                            skill.name
                        ),
                    });
                }
                debug!("extracted skill '{}' from {}", skill.name, candidate.display());
                skills.push(skill);
            }
            Err(e) => match mode {
                ExtractionMode::Strict => return Err(e),
                ExtractionMode::Lenient => {
                    warnings.push(format!(
                        "skipping skill at {}: {}",
                        candidate.display(),
                        e
                    ));
                }
            },
        }
    }

    if skills.is_empty() {
        return Err(Error::Extract {
            alias: origin.alias.as_str().to_string(),
            message: format!("no skills found under {}", skills_root.display()),
        });
    }

    Ok(Extraction { skills, warnings })
}

/// Parse one skill directory's descriptor into a [`Skill`].
fn parse_skill_dir(dir: &Path, origin: &PackageOrigin) -> Result<Skill> {
    let descriptor = dir.join(SKILL_FILE);
    let content =
        fs::read_to_string(&descriptor).map_err(|e| Error::fs("read", &descriptor, e))?;
    let frontmatter = parse_frontmatter(&content).map_err(|message| Error::Extract {
        alias: origin.alias.as_str().to_string(),
        message: format!("{}: {}", descriptor.display(), message),
    })?;
    Ok(Skill {
        name: frontmatter.name,
        source_path: dir.to_path_buf(),
        origin: origin.clone(),
    })
}

/// Split the YAML frontmatter out of a descriptor and parse it.
fn parse_frontmatter(content: &str) -> std::result::Result<SkillFrontmatter, String> {
    let rest = content
        .strip_prefix("---")
        .ok_or("missing frontmatter: descriptor must start with '---'")?;
    let end = rest
        .find("\n---")
        .ok_or("unterminated frontmatter: missing closing '---'")?;
    let yaml = &rest[..end];

    let frontmatter: SkillFrontmatter =
        serde_yaml::from_str(yaml).map_err(|e| format!("invalid frontmatter: {}", e))?;
    if frontmatter.name.trim().is_empty() {
        return Err("frontmatter 'name' must not be empty".to_string());
    }
    Ok(frontmatter)
}
