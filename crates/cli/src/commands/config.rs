//! Configuration commands

use anyhow::{bail, Result};
use clap::Subcommand;
use std::path::Path;

use crate::config::AppConfig;
use crate::output::print_success;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with the default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path, config: &AppConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }
            AppConfig::default().save(path)?;
            print_success(&format!("Wrote default configuration to {}", path.display()));
        }

        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
    }

    Ok(())
}
