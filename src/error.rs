//! # Error Handling
//!
//! Centralized error type for skillsync, built on `thiserror`. Variants map
//! onto the tool's failure taxonomy:
//!
//! - **validation**: bad user input (aliases, paths, refs, URLs, manifest
//!   declarations); never retried, fixed by editing the manifest.
//! - **io**: filesystem or subprocess failure, surfaced with the operation
//!   and path involved.
//! - **conflict**: two manifests binding one alias to different packages,
//!   duplicate skill names, or an install target that already exists and is
//!   not managed by this tool. Always fatal to the affected unit.
//! - **not found**: a missing agent, dependency, or manifest reference.
//!
//! Warnings are not errors: non-fatal findings accumulate in stage results
//! and are reported alongside success.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for skillsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A raw value failed coercion into one of the validated types.
    #[error("Validation error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Validation {
        message: String,
        /// Optional hint for how to fix the input
        hint: Option<String>,
    },

    /// A manifest file could not be parsed or failed schema validation.
    #[error("Manifest error in {}: {message}{}", path.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Manifest {
        path: PathBuf,
        message: String,
        hint: Option<String>,
    },

    /// The same alias resolves to two different packages across manifests.
    #[error("Alias '{alias}' is declared as different packages in {} and {}", first.display(), second.display())]
    AliasConflict {
        alias: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// An error occurred while cloning a Git repository.
    #[error("Git clone error for {url}@{git_ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        git_ref: String,
        message: String,
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// The `git` binary is not available on PATH.
    #[error("git binary not found: {message}")]
    GitUnavailable { message: String },

    /// A fetched or local package failed structure detection.
    #[error("Package '{alias}': {message}")]
    Detect { alias: String, message: String },

    /// Skill extraction failed for a package.
    #[error("Skill extraction failed for '{alias}': {message}")]
    Extract { alias: String, message: String },

    /// Two skills would install to the same target path.
    #[error("Install conflict: {message}")]
    InstallConflict { message: String },

    /// A target path already exists and is not managed by skillsync.
    #[error("Refusing to overwrite {}: not managed by skillsync", path.display())]
    UnmanagedTarget { path: PathBuf },

    /// A filesystem operation failed, with the operation and path involved.
    #[error("{operation} failed for {}: {message}", path.display())]
    Fs {
        operation: String,
        path: PathBuf,
        message: String,
    },

    /// Persisted agent state could not be read or written.
    #[error("Agent state error for {agent}: {message}")]
    State { agent: String, message: String },

    /// A referenced agent, dependency, or file does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a validation error without a hint.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for a validation error carrying a fix-it hint.
    pub fn validation_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Shorthand for a filesystem error with operation context.
    pub fn fs(operation: impl Into<String>, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Error::Fs {
            operation: operation.into(),
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// True for errors a user fixes by editing input rather than retrying.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::Manifest { .. })
    }
}
