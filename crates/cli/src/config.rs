//! CLI configuration

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwright_agent::{AgentSettings, McpServerConfig, ModelSettings};
use stepwright_runner::RunnerConfig;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "stepwright.toml";

/// Stepwright configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the state database
    pub store_path: PathBuf,

    /// Root of the script store
    pub scripts_dir: PathBuf,

    /// Test execution
    pub runner: RunnerConfig,

    /// Model and agent loop
    pub agent: AgentConfig,

    /// Tool servers handed to the agent
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: stepwright_common::default_store_path(),
            scripts_dir: PathBuf::from("playwright_tests"),
            runner: RunnerConfig::default(),
            agent: AgentConfig::default(),
            mcp_servers: vec![McpServerConfig::playwright()],
        }
    }
}

/// `[agent]` section: connection settings plus loop settings in one table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub model: ModelSettings,

    #[serde(flatten)]
    pub settings: AgentSettings,
}

impl AppConfig {
    /// Load configuration from file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("state.db")
    }
}
