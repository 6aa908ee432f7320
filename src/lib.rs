//! # skillsync Library
//!
//! Core functionality for syncing skill packages into the directories that
//! AI coding agents read them from. It backs the `skillsync` command-line
//! tool but can be embedded by other applications.
//!
//! ## Core Concepts
//!
//! - **Manifest (`manifest`)**: the `agents.toml` schema, its discovery
//!   across the project tree and home directory, and dependency validation.
//! - **Merge (`merge`)**: combining discovered manifests in precedence
//!   order, with alias-conflict detection and same-package deduplication.
//! - **Resolution (`resolve`)**: turning validated dependencies into
//!   canonical packages with an explicit fetch strategy.
//! - **Fetching (`fetch`, `git`)**: batching packages that share a
//!   repository and ref into one clone, sparse when every member is
//!   confined to a sub-path.
//! - **Detection & Extraction (`detect`, `extract`)**: classifying a
//!   package's on-disk structure, then pulling out its named skills.
//! - **Installation (`install`, `state`, `agents`)**: planning prefixed
//!   target directories per agent, applying by copy or symlink, and
//!   reconciling against the previous run's managed set.
//!
//! ## Execution Flow
//!
//! The main entry point is [`sync::run_sync`], which executes:
//!
//! 1. **Discover** manifests and merge them into one dependency set.
//! 2. **Resolve** every dependency to a canonical package.
//! 3. Per agent: **fetch** into a temp root, **detect** and **extract**
//!    skills, **plan** and **apply** the install, then **reconcile** stale
//!    targets and **persist** the managed set.

pub mod agents;
pub mod coerce;
pub mod detect;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod git;
pub mod install;
pub mod manifest;
pub mod merge;
pub mod output;
pub mod resolve;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
