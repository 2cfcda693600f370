//! Tangle CLI library
//!
//! Components for the `tangle` command-line node: argument parsing,
//! configuration loading and the command handlers that drive a
//! [`tangle_runtime::Session`].

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands};
pub use config::AppConfig;
