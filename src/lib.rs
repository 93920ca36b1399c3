//! antw: a project-local wrapper that bootstraps and launches Apache Ant.
//!
//! The binary reads `ant/wrapper/antw.toml`, asks [`antw_installer`] to
//! ensure the pinned distribution is installed in the shared cache, and then
//! starts Ant with the remaining command-line arguments.
//!
//! # Modules
//!
//! - [`cli`] - Command-line parsing
//! - [`config`] - Loading and interpreting `antw.toml`
//! - [`dirs`] - Home directory lookup
//! - [`error`] - The wrapper's top-level error
//! - [`launcher`] - Starting Ant from an installation

pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod launcher;
