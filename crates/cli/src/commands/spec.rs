//! Test spec commands

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stepwright_common::{
    steps_to_table, table_to_steps, NewTestSpec, Step, TestSpec, TestSpecStore,
};

use super::Context;
use crate::output::{print_item, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum SpecCommands {
    /// Import a test spec from a CSV step table or a YAML document
    Import {
        /// `.csv` step table or `.yaml`/`.yml` spec document
        file: PathBuf,

        /// Spec name (defaults to the document name or the file stem)
        #[arg(short, long)]
        name: Option<String>,

        /// Free-form description
        #[arg(short, long)]
        description: Option<String>,

        /// Target environment ID
        #[arg(short, long)]
        env: Option<i64>,
    },

    /// List all test specs
    List,

    /// Show a test spec with its steps
    Show {
        /// Test spec ID
        id: i64,
    },

    /// Print the steps of a test spec as a CSV table
    Export {
        /// Test spec ID
        id: i64,
    },
}

/// YAML import format
#[derive(Debug, Deserialize)]
pub struct SpecDocument {
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub environment_id: Option<i64>,
    #[serde(default)]
    pub steps: Vec<StepDocument>,
}

#[derive(Debug, Deserialize)]
pub struct StepDocument {
    #[serde(default)]
    pub action: String,
    #[serde(default, alias = "data")]
    pub input_data: String,
    #[serde(default, alias = "expected")]
    pub expected_result: String,
}

/// Read a spec file. Explicit arguments win over values from the document.
pub fn load_spec_file(
    path: &Path,
    content: &str,
    name: Option<String>,
    description: Option<String>,
    environment_id: Option<i64>,
) -> Result<NewTestSpec> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let stem = || {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string()
    };

    let spec = match extension.as_str() {
        "csv" => NewTestSpec {
            name: name.unwrap_or_else(stem),
            description: description.unwrap_or_default(),
            steps: table_to_steps(content)?,
            environment_id,
        },
        "yaml" | "yml" => {
            let doc: SpecDocument = serde_yaml::from_str(content)
                .with_context(|| format!("invalid spec document {}", path.display()))?;
            let steps = doc
                .steps
                .into_iter()
                .enumerate()
                .map(|(i, s)| Step::new(i as u32, s.action, s.input_data, s.expected_result))
                .collect();

            NewTestSpec {
                name: name.or(doc.name).unwrap_or_else(stem),
                description: description.unwrap_or(doc.description),
                steps,
                environment_id: environment_id.or(doc.environment_id),
            }
        }
        other => bail!("unsupported spec format '{}', expected csv, yaml or yml", other),
    };

    if spec.name.trim().is_empty() {
        bail!("spec name must not be empty");
    }
    Ok(spec)
}

/// Spec display wrapper for serialization
#[derive(Serialize)]
pub struct SpecDisplay {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub steps: usize,
    pub environment: Option<String>,
    pub generation_state: String,
}

impl From<&TestSpec> for SpecDisplay {
    fn from(spec: &TestSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            steps: spec.steps.len(),
            environment: spec.environment.as_ref().map(|e| e.name.clone()),
            generation_state: spec.generation_state.to_string(),
        }
    }
}

impl TableDisplay for SpecDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Description", "Steps", "Environment", "Generation"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            crate::output::truncate(&self.description, 40),
            self.steps.to_string(),
            self.environment.clone().unwrap_or_else(|| "-".to_string()),
            self.generation_state.clone(),
        ]
    }
}

impl TableDisplay for Step {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Action", "Data", "Expected Result"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.action.clone(),
            self.input_data.clone(),
            self.expected_result.clone(),
        ]
    }
}

pub async fn execute(cmd: SpecCommands, ctx: &Context) -> Result<()> {
    match cmd {
        SpecCommands::Import {
            file,
            name,
            description,
            env,
        } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let new_spec = load_spec_file(&file, &content, name, description, env)?;
            let spec = ctx.db.insert(new_spec)?;

            print_success(&format!(
                "Imported test spec '{}' with {} step(s)",
                spec.name,
                spec.steps.len()
            ));
            print_item(&SpecDisplay::from(&spec), ctx.format);
        }

        SpecCommands::List => {
            let specs = ctx.db.list()?;
            let displays: Vec<SpecDisplay> = specs.iter().map(SpecDisplay::from).collect();
            print_list(&displays, ctx.format, "No test specs found.");
        }

        SpecCommands::Show { id } => {
            let spec = ctx.require_spec(id)?;
            match ctx.format {
                OutputFormat::Json | OutputFormat::Yaml => {
                    let detail = SpecDetail {
                        spec: SpecDisplay::from(&spec),
                        steps: spec.ordered_steps(),
                    };
                    print_item(&detail, ctx.format);
                }
                _ => {
                    print_item(&SpecDisplay::from(&spec), ctx.format);
                    print_list(&spec.ordered_steps(), ctx.format, "No steps.");
                }
            }
        }

        SpecCommands::Export { id } => {
            let spec = ctx.require_spec(id)?;
            print!("{}", steps_to_table(&spec.ordered_steps())?);
        }
    }

    Ok(())
}

/// Spec summary plus its steps for structured output
#[derive(Serialize)]
struct SpecDetail {
    spec: SpecDisplay,
    steps: Vec<Step>,
}

impl TableDisplay for SpecDetail {
    fn headers() -> Vec<&'static str> {
        SpecDisplay::headers()
    }

    fn row(&self) -> Vec<String> {
        self.spec.row()
    }
}
