//! Script generation command

use anyhow::{Context as _, Result};
use clap::Args;
use futures::future::try_join_all;
use std::sync::Arc;
use stepwright_agent::{
    AnthropicModel, Generated, GenerationCoordinator, McpStdioProvider, ToolAgent, ToolFilter,
    ToolProvider, ToolRegistry,
};
use stepwright_common::steps::has_content;
use stepwright_common::{ScriptKind, TestSpecStore};
use tracing::info;

use super::Context;
use crate::output::{print_info, print_success, print_warning};

#[derive(Args)]
pub struct GenerateArgs {
    /// Test spec ID
    pub id: i64,

    /// Print the script instead of storing it
    #[arg(long)]
    pub stdout: bool,
}

pub async fn execute(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let mut spec = ctx.require_spec(args.id)?;

    // Blank specs never reach the model, so skip starting the tool servers
    if !has_content(&spec.steps) {
        print_warning(&format!("Test spec {} has no steps, nothing to generate", spec.id));
        return Ok(());
    }

    let model = AnthropicModel::from_env(&ctx.config.agent.model)?;

    print_info(&format!(
        "Starting {} tool server(s)",
        ctx.config.mcp_servers.len()
    ));
    let providers: Vec<Arc<McpStdioProvider>> = try_join_all(
        ctx.config
            .mcp_servers
            .iter()
            .cloned()
            .map(McpStdioProvider::connect),
    )
    .await
    .context("failed to start tool servers")?
    .into_iter()
    .map(Arc::new)
    .collect();

    let result = generate_with(&providers, model, &mut spec, ctx).await;

    for provider in &providers {
        provider.shutdown().await;
    }

    match result? {
        Generated::Script(script) if args.stdout => print!("{}", script),
        Generated::Script(script) => {
            let path = ctx.scripts.write(spec.id, &script, ScriptKind::Spec).await?;
            info!(test_id = spec.id, path = %path.display(), "Stored generated script");
            print_success(&format!(
                "Generated script for test spec {} written to {}",
                spec.id,
                path.display()
            ));
        }
        Generated::NoSteps => print_warning(Generated::NoSteps.text()),
    }

    Ok(())
}

async fn generate_with(
    providers: &[Arc<McpStdioProvider>],
    model: AnthropicModel,
    spec: &mut stepwright_common::TestSpec,
    ctx: &Context,
) -> Result<Generated> {
    let sources: Vec<(Arc<dyn ToolProvider>, ToolFilter)> = providers
        .iter()
        .map(|p| {
            let filter = p.config().filter();
            (Arc::clone(p) as Arc<dyn ToolProvider>, filter)
        })
        .collect();

    let registry = ToolRegistry::assemble(sources).await?;
    print_info(&format!("Agent has {} tool(s)", registry.len()));

    let agent = ToolAgent::new(
        Arc::new(model),
        Arc::new(registry),
        ctx.config.agent.settings.clone(),
    );
    let coordinator = GenerationCoordinator::new(agent)
        .with_state_store(Arc::new(ctx.db.clone()) as Arc<dyn TestSpecStore>);

    Ok(coordinator.generate(spec).await?)
}
