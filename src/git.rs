//! # Git Subprocess Wrapper
//!
//! Thin wrapper around the system `git` command. Using the real binary
//! means SSH keys, credential helpers, and access tokens all work exactly
//! as the user has configured them.
//!
//! The clone procedure is tuned for skill packages: shallow (`--depth=1`),
//! with `--filter=blob:none --sparse` when only repository sub-paths are
//! needed. Ref checkout first tries a shallow, ref-scoped fetch and falls
//! back to a deepened fetch for refs outside the initial shallow window
//! (older tags, mostly).

use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;

use crate::coerce::GitRef;
use crate::error::{Error, Result};

/// Depth used when the shallow ref fetch misses and we retry deeper.
const DEEPEN_DEPTH: u32 = 50;

/// Verify the `git` binary is reachable. Checked once per run before any
/// fetch work starts.
pub fn ensure_git_available() -> Result<()> {
    let output = Command::new("git").arg("--version").output();
    match output {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(Error::GitUnavailable {
            message: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }),
        Err(e) => Err(Error::GitUnavailable {
            message: format!("{} (is git installed and on PATH?)", e),
        }),
    }
}

/// Clone `url` into `target_dir`, shallow, optionally sparse.
///
/// When `sparse_paths` is given the clone transfers no blobs up front and
/// checks out only the cone-mode union of those paths.
pub fn clone(url: &str, target_dir: &Path, sparse_paths: Option<&[String]>) -> Result<()> {
    // git refuses to clone into an existing non-empty directory.
    if target_dir.exists() {
        fs::remove_dir_all(target_dir).map_err(|e| Error::fs("remove", target_dir, e))?;
    }
    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs("create", parent, e))?;
    }

    let mut args = vec!["clone", "--depth=1"];
    if sparse_paths.is_some() {
        args.push("--filter=blob:none");
        args.push("--sparse");
    }
    debug!("git {} {}", args.join(" "), url);

    let output = Command::new("git")
        .args(&args)
        .arg(url)
        .arg(target_dir)
        .output()
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            git_ref: "HEAD".to_string(),
            message: e.to_string(),
            hint: None,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(Error::GitClone {
            url: url.to_string(),
            git_ref: "HEAD".to_string(),
            hint: auth_hint(&stderr),
            message: stderr,
        });
    }

    if let Some(paths) = sparse_paths {
        let mut set_args: Vec<&str> = vec!["sparse-checkout", "set", "--cone"];
        set_args.extend(paths.iter().map(|p| p.as_str()));
        run_in(target_dir, url, &set_args)?;
    }

    Ok(())
}

/// Check out a specific ref in an already-cloned repository.
///
/// Tries a shallow ref-scoped fetch first; if the ref is not reachable in
/// the shallow window, deepens to [`DEEPEN_DEPTH`] and retries. If the
/// deepened fetch also fails, the whole fetch operation fails.
pub fn checkout_ref(repo_dir: &Path, url: &str, git_ref: &GitRef) -> Result<()> {
    let value = git_ref.value();
    let shallow = run_in(repo_dir, url, &["fetch", "--depth=1", "origin", value]);
    if shallow.is_err() {
        debug!("shallow fetch of {} missed, deepening to {}", value, DEEPEN_DEPTH);
        let deepen_arg = format!("--depth={}", DEEPEN_DEPTH);
        run_in(repo_dir, url, &["fetch", &deepen_arg, "origin", value])?;
    }
    run_in(repo_dir, url, &["checkout", "--detach", "FETCH_HEAD"])?;
    Ok(())
}

/// Run a git command inside `repo_dir`, mapping failure to a
/// [`Error::GitCommand`] carrying stderr.
fn run_in(repo_dir: &Path, url: &str, args: &[&str]) -> Result<()> {
    debug!("git -C {} {}", repo_dir.display(), args.join(" "));
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            url: url.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Recognize common authentication failures and attach a fix-it hint.
fn auth_hint(stderr: &str) -> Option<String> {
    let auth_failure = stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository");
    auth_failure.then(|| {
        "make sure you have access to the repository: an SSH key in the agent, \
         git credentials, or a personal access token"
            .to_string()
    })
}
