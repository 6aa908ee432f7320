//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_manifest(manifests::LOCAL_DEP);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    pub use super::TestFixture;
}

/// Common manifest snippets for testing.
#[allow(dead_code)]
pub mod manifests {
    /// A single local-path dependency aimed at Claude Code.
    pub const LOCAL_DEP: &str = r#"
[agents]
claude-code = true

[dependencies]
tools = { path = "./pkg" }
"#;

    /// Two enabled agents sharing one local dependency.
    pub const TWO_AGENTS: &str = r#"
[agents]
claude-code = true
codex = true

[dependencies]
tools = { path = "./pkg" }
"#;

    /// Every agent disabled.
    pub const ALL_DISABLED: &str = r#"
[agents]
claude-code = false

[dependencies]
tools = { path = "./pkg" }
"#;

    /// Registry shorthand plus a pinned GitHub dependency.
    pub const REMOTE_DEPS: &str = r#"
[agents]
claude-code = true

[dependencies]
fmt = "@acme/fmt@1.2.0"
lint = { gh = "acme/lint", tag = "v2.0.0", path = "skills" }
"#;

    /// Invalid TOML for error testing.
    pub const INVALID_TOML: &str = "[dependencies\nbroken";
}

/// A test fixture that provides a temporary project directory with an
/// isolated home directory.
///
/// The home directory keeps manifest discovery and agent detection away
/// from the real user environment.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_manifest(manifests::LOCAL_DEP)
///     .with_skill("pkg", "fmt");
///
/// fixture.command().arg("sync").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with empty project and home directories.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("project")
            .create_dir_all()
            .expect("Failed to create project directory");
        temp_dir
            .child("home")
            .create_dir_all()
            .expect("Failed to create home directory");
        Self { temp_dir }
    }

    /// Add an `agents.toml` manifest at the project root.
    pub fn with_manifest(self, content: &str) -> Self {
        self.temp_dir
            .child("project/agents.toml")
            .write_str(content)
            .expect("Failed to write manifest");
        self
    }

    /// Add a skill named `skill` under `<package>/skills/` in the project.
    pub fn with_skill(self, package: &str, skill: &str) -> Self {
        self.temp_dir
            .child(format!("project/{}/skills/{}/SKILL.md", package, skill))
            .write_str(&format!("---\nname: {}\n---\nInstructions.\n", skill))
            .expect("Failed to write skill");
        self
    }

    /// Add a file with the given project-relative path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(format!("project/{}", path))
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// The project directory commands run in.
    pub fn project_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("project")
    }

    /// The isolated home directory.
    pub fn home_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("home")
    }

    /// Get the path to the temporary directory.
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured for this fixture: project directory as
    /// cwd, isolated home directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("skillsync");
        cmd.current_dir(self.project_path());
        cmd.env("HOME", self.home_path());
        cmd.env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_project_and_home() {
        let fixture = TestFixture::new();
        assert!(fixture.project_path().exists());
        assert!(fixture.home_path().exists());
    }

    #[test]
    fn test_fixture_with_skill() {
        let fixture = TestFixture::new().with_skill("pkg", "fmt");
        assert!(fixture
            .project_path()
            .join("pkg/skills/fmt/SKILL.md")
            .is_file());
    }
}
