//! Generated script commands

use anyhow::{Context as _, Result};
use clap::Subcommand;
use std::path::PathBuf;
use stepwright_common::{ScriptKind, ScriptStore};

use super::Context;
use crate::output::{print_info, print_success};

#[derive(Subcommand)]
pub enum ScriptCommands {
    /// Print the stored script of a test spec
    Get {
        /// Test spec ID
        id: i64,
    },

    /// Replace the stored script of a test spec
    Put {
        /// Test spec ID
        id: i64,

        /// File with the new script content
        #[arg(short, long)]
        file: PathBuf,
    },
}

pub async fn execute(cmd: ScriptCommands, ctx: &Context) -> Result<()> {
    match cmd {
        ScriptCommands::Get { id } => {
            let file_name = ScriptStore::file_name(id, ScriptKind::Spec);
            match ctx.scripts.read(&file_name).await {
                Ok(content) => print!("{}", content),
                Err(e) if e.is_not_found() => {
                    print_info(&format!("No content yet for test spec {}", id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        ScriptCommands::Put { id, file } => {
            ctx.ensure_spec(id)?;
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let path = ctx.scripts.write(id, &content, ScriptKind::Spec).await?;
            print_success(&format!("Script for test spec {} written to {}", id, path.display()));
        }
    }

    Ok(())
}
