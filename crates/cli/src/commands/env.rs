//! Target environment commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use stepwright_common::{EnvironmentStore, Secret, TargetEnvironment};

use super::Context;
use crate::output::{print_item, print_list, print_success, TableDisplay};

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Register a target environment
    Add {
        /// Environment name
        #[arg(short, long)]
        name: String,

        /// Base URL of the application under test
        #[arg(short, long)]
        url: String,

        /// Login user name
        #[arg(long, default_value = "")]
        username: String,

        /// Login password
        #[arg(long, env = "STEPWRIGHT_ENV_PASSWORD", hide_env_values = true, default_value = "")]
        password: String,
    },

    /// List target environments
    List,
}

/// Environment display wrapper, never carries the password
#[derive(Serialize)]
pub struct EnvDisplay {
    pub id: Option<i64>,
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl From<&TargetEnvironment> for EnvDisplay {
    fn from(env: &TargetEnvironment) -> Self {
        Self {
            id: env.id,
            name: env.name.clone(),
            base_url: env.base_url.clone(),
            username: env.username.clone(),
            password: env.password.to_string(),
        }
    }
}

impl TableDisplay for EnvDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "URL", "Username", "Password"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_default(),
            self.name.clone(),
            self.base_url.clone(),
            self.username.clone(),
            self.password.clone(),
        ]
    }
}

pub async fn execute(cmd: EnvCommands, ctx: &Context) -> Result<()> {
    match cmd {
        EnvCommands::Add {
            name,
            url,
            username,
            password,
        } => {
            let env = ctx.db.insert_environment(&TargetEnvironment {
                id: None,
                name,
                base_url: url,
                username,
                password: Secret::new(password),
            })?;
            print_success(&format!("Environment '{}' added", env.name));
            print_item(&EnvDisplay::from(&env), ctx.format);
        }

        EnvCommands::List => {
            let envs = ctx.db.list_environments()?;
            let displays: Vec<EnvDisplay> = envs.iter().map(EnvDisplay::from).collect();
            print_list(&displays, ctx.format, "No environments found.");
        }
    }

    Ok(())
}
