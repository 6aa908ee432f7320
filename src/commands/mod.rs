//! # CLI Command Implementations
//!
//! One file per subcommand. Each module contains an `Args` struct derived
//! with `clap` and an `execute` function that calls into the `skillsync`
//! library to do the real work.

pub mod agents;
pub mod list;
pub mod sync;
