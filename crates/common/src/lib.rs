//! Stepwright Common Library
//!
//! Shared data model, persistence and the generated-script store used by the
//! generation agent, the execution runner and the CLI.

pub mod db;
pub mod error;
pub mod script_store;
pub mod steps;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use db::Database;
pub use error::{Error, Result};
pub use script_store::{ScriptKind, ScriptStore};
pub use steps::{steps_to_table, table_to_steps};
pub use store::{EnvironmentStore, TestRunStore, TestSpecStore};
pub use types::*;

/// Stepwright version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".stepwright")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
