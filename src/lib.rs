//! photovault - photo storage with a consistent metadata/blob pair
//!
//! Photo metadata lives in SQLite and photo bytes in a flat directory tree.
//! Schema changes go through a versioned migrator, and deletes run as a
//! backup/commit/finalize saga so the two stores never disagree.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;

pub use error::{Result, VaultError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
