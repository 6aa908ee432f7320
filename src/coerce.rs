//! # Coercion and Branded Types
//!
//! Raw strings from manifests and the CLI are coerced exactly once into the
//! validated wrapper types in this module. Downstream code accepts the
//! wrapper types and never re-validates: an `Alias` is known to be a safe
//! path component, an `AbsolutePath` is known to be absolute, a
//! `NormalizedGitUrl` is known to be a well-formed remote.
//!
//! Each type is constructed only through its validating factory; the inner
//! string is reachable read-only via `as_str()`/`as_path()`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A string guaranteed to be non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let s = raw.into();
        if s.trim().is_empty() {
            return Err(Error::validation("expected a non-empty string"));
        }
        Ok(NonEmptyString(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user-chosen dependency name, unique within a merged manifest.
///
/// Aliases become install-prefix path components, so they must not contain
/// path separators, dots, or colons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Alias(String);

impl Alias {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let s = raw.into();
        if s.is_empty() {
            return Err(Error::validation("alias must not be empty"));
        }
        if let Some(bad) = s.chars().find(|c| matches!(c, '/' | '\\' | '.' | ':')) {
            return Err(Error::validation_with_hint(
                format!("alias '{}' contains forbidden character '{}'", s, bad),
                "aliases may not contain path separators, dots, or colons",
            ));
        }
        Ok(Alias(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An absolute filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsolutePath(PathBuf);

impl AbsolutePath {
    pub fn new(raw: impl Into<PathBuf>) -> Result<Self> {
        let path = raw.into();
        if !path.is_absolute() {
            return Err(Error::validation(format!(
                "expected an absolute path, got '{}'",
                path.display()
            )));
        }
        Ok(AbsolutePath(path))
    }

    /// Resolve a possibly-relative raw path against `base`.
    pub fn resolve(base: &Path, raw: impl Into<PathBuf>) -> Result<Self> {
        let path = raw.into();
        if path.is_absolute() {
            Self::new(path)
        } else {
            Self::new(base.join(path))
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.0.clone()
    }

    /// Join a trusted relative component onto this path.
    pub fn join(&self, component: impl AsRef<Path>) -> PathBuf {
        self.0.join(component)
    }
}

impl fmt::Display for AbsolutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for AbsolutePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// A GitHub `owner/repo` slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GithubSlug(String);

impl GithubSlug {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let s = raw.into();
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(Error::validation_with_hint(
                format!("'{}' is not a valid GitHub slug", s),
                "expected the form 'owner/repo'",
            ));
        }
        let valid = |p: &str| {
            p.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !parts.iter().all(|p| valid(p)) {
            return Err(Error::validation(format!(
                "GitHub slug '{}' contains invalid characters",
                s
            )));
        }
        Ok(GithubSlug(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The HTTPS clone URL for this slug.
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}.git", self.0)
    }
}

impl fmt::Display for GithubSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized git remote URL.
///
/// Accepts https/ssh/git/file URLs and scp-style `git@host:owner/repo`
/// remotes. Normalization lowercases the host and strips a trailing slash
/// and `.git` suffix so equivalent spellings dedupe to one identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedGitUrl(String);

impl NormalizedGitUrl {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let s = raw.into();
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("git URL must not be empty"));
        }

        // scp-style remotes (git@host:path) are not URL-parseable; rewrite
        // them to the ssh:// form first.
        let rewritten = match s.split_once(':') {
            Some((user_host, path)) if !s.contains("://") && s.contains('@') => {
                format!("ssh://{}/{}", user_host, path)
            }
            _ => s.to_string(),
        };

        let parsed = url::Url::parse(&rewritten)?;
        match parsed.scheme() {
            "http" | "https" | "ssh" | "git" | "file" => {}
            other => {
                return Err(Error::validation(format!(
                    "unsupported git URL scheme '{}'",
                    other
                )))
            }
        }

        let mut normalized = rewritten;
        if let Some(host) = parsed.host_str() {
            normalized = normalized.replacen(host, &host.to_lowercase(), 1);
        }
        while normalized.ends_with('/') {
            normalized.pop();
        }
        if let Some(stripped) = normalized.strip_suffix(".git") {
            normalized = stripped.to_string();
        }
        Ok(NormalizedGitUrl(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL to hand to `git clone`.
    pub fn clone_url(&self) -> String {
        self.0.clone()
    }
}

impl fmt::Display for NormalizedGitUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated git reference: tag, branch, or revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GitRef {
    Tag(String),
    Branch(String),
    Rev(String),
}

impl GitRef {
    pub fn tag(value: impl Into<String>) -> Result<Self> {
        Ok(GitRef::Tag(Self::check(value.into())?))
    }

    pub fn branch(value: impl Into<String>) -> Result<Self> {
        Ok(GitRef::Branch(Self::check(value.into())?))
    }

    pub fn rev(value: impl Into<String>) -> Result<Self> {
        let v = Self::check(value.into())?;
        if !v.chars().all(|c| c.is_ascii_hexdigit()) || v.len() < 4 {
            return Err(Error::validation(format!(
                "'{}' is not a valid git revision",
                v
            )));
        }
        Ok(GitRef::Rev(v))
    }

    fn check(value: String) -> Result<String> {
        if value.is_empty() {
            return Err(Error::validation("git ref must not be empty"));
        }
        if value.contains("..")
            || value.ends_with('/')
            || value.ends_with(".lock")
            || value
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '['))
        {
            return Err(Error::validation(format!(
                "'{}' is not a valid git ref name",
                value
            )));
        }
        Ok(value)
    }

    /// The ref value without its kind.
    pub fn value(&self) -> &str {
        match self {
            GitRef::Tag(v) | GitRef::Branch(v) | GitRef::Rev(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GitRef::Tag(_) => "tag",
            GitRef::Branch(_) => "branch",
            GitRef::Rev(_) => "rev",
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}
