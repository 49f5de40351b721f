//! Test execution and run history commands

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use stepwright_common::{RunStatus, ScriptKind, ScriptStore, TestRun, TestRunStore};
use stepwright_runner::ExecutionRunner;

use super::Context;
use crate::output::{
    print_error, print_item, print_list, print_success, print_warning, truncate, OutputFormat,
    TableDisplay,
};

#[derive(Args)]
pub struct RunArgs {
    /// Test spec ID
    pub id: i64,
}

#[derive(Args)]
pub struct RunsArgs {
    /// Test spec ID
    pub id: i64,
}

/// Run display wrapper for serialization
#[derive(Serialize)]
pub struct RunDisplay {
    pub id: Option<i64>,
    pub test_id: i64,
    pub status: RunStatus,
    pub description: String,
    pub executed_at: Option<DateTime<Utc>>,
}

impl From<TestRun> for RunDisplay {
    fn from(run: TestRun) -> Self {
        Self {
            id: run.id,
            test_id: run.test_id,
            status: run.status,
            description: run.description,
            executed_at: run.executed_at,
        }
    }
}

impl TableDisplay for RunDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Test", "Status", "Executed", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            self.test_id.to_string(),
            self.status.as_str().to_uppercase(),
            self.executed_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            truncate(&self.description, 60),
        ]
    }
}

/// Execute the stored script of a spec. Returns the terminal status.
pub async fn execute_run(args: RunArgs, ctx: &Context) -> Result<RunStatus> {
    ctx.ensure_spec(args.id)?;

    let file_name = ScriptStore::file_name(args.id, ScriptKind::Spec);
    if !ctx.scripts.exists(&file_name).await? {
        print_warning(&format!(
            "No script stored for test spec {} yet, running {} anyway",
            args.id, file_name
        ));
    }

    let runner = ExecutionRunner::new(ctx.config.runner.clone(), Arc::new(ctx.db.clone()));
    let run = runner.run(args.id, &file_name).await;
    let status = run.status;

    if ctx.format == OutputFormat::Table {
        match status {
            RunStatus::Passed => print_success(&format!("Test spec {} passed", args.id)),
            RunStatus::Failed => print_error(&format!("Test spec {} failed", args.id)),
            _ => print_warning(&format!("Test spec {} ran no tests", args.id)),
        }
        let description = run.description.clone();
        print_item(&RunDisplay::from(run), ctx.format);
        if description.lines().count() > 1 {
            println!("{}", description);
        }
    } else {
        print_item(&RunDisplay::from(run), ctx.format);
    }

    Ok(status)
}

/// List the runs of a spec, newest first
pub async fn execute_runs(args: RunsArgs, ctx: &Context) -> Result<()> {
    ctx.ensure_spec(args.id)?;

    let runs = ctx.db.find_by_test_newest_first(args.id)?;
    let displays: Vec<RunDisplay> = runs.into_iter().map(RunDisplay::from).collect();
    print_list(&displays, ctx.format, "No runs.");
    Ok(())
}
