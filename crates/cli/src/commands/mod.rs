//! CLI Commands

pub mod config;
pub mod env;
pub mod generate;
pub mod run;
pub mod script;
pub mod spec;

use anyhow::{Context as _, Result};
use stepwright_common::{Database, Error, ScriptStore, TestSpec, TestSpecStore};

use crate::config::AppConfig;
use crate::output::OutputFormat;

/// Everything a command needs: configuration, state database, script store
pub struct Context {
    pub config: AppConfig,
    pub db: Database,
    pub scripts: ScriptStore,
    pub format: OutputFormat,
}

impl Context {
    pub fn open(config: AppConfig, format: OutputFormat) -> Result<Self> {
        let db_path = config.db_path();
        let db = Database::open(&db_path)
            .with_context(|| format!("failed to open state database {}", db_path.display()))?;
        let scripts = ScriptStore::new(&config.scripts_dir);

        Ok(Self {
            config,
            db,
            scripts,
            format,
        })
    }

    /// Load a spec or fail with a not-found error
    pub fn require_spec(&self, id: i64) -> Result<TestSpec> {
        self.db
            .find_by_id(id)?
            .ok_or_else(|| Error::not_found("test spec", id).into())
    }

    /// Fail with a not-found error unless the spec exists
    pub fn ensure_spec(&self, id: i64) -> Result<()> {
        if self.db.exists_by_id(id)? {
            Ok(())
        } else {
            Err(Error::not_found("test spec", id).into())
        }
    }
}
