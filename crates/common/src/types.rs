//! Core types for Stepwright

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// One row of a tabular test script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Position of the step; sort order is authoritative, gaps are tolerated
    pub index: u32,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub input_data: String,
    #[serde(default)]
    pub expected_result: String,
}

impl Step {
    pub fn new(
        index: u32,
        action: impl Into<String>,
        input_data: impl Into<String>,
        expected_result: impl Into<String>,
    ) -> Self {
        Self {
            index,
            action: action.into(),
            input_data: input_data.into(),
            expected_result: expected_result.into(),
        }
    }

    /// A step with nothing but whitespace in every column
    pub fn is_blank(&self) -> bool {
        self.action.trim().is_empty()
            && self.input_data.trim().is_empty()
            && self.expected_result.trim().is_empty()
    }
}

/// Opaque secret that never renders its value through `Debug` or `Display`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only the generation prompt should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("********")
    }
}

/// Target environment the generated script logs into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEnvironment {
    pub id: Option<i64>,
    pub name: String,
    pub base_url: String,
    pub username: String,
    pub password: Secret,
}

/// Generation state of a test spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::NotStarted => "not_started",
            GenerationState::InProgress => "in_progress",
            GenerationState::Completed => "completed",
            GenerationState::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidConfig(format!(
                "unknown generation state '{}'",
                other
            ))),
        }
    }
}

/// A human-authored test script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpec {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub environment: Option<TargetEnvironment>,
    #[serde(default)]
    pub generation_state: GenerationState,
}

impl TestSpec {
    /// Steps in execution order (by index, stable for duplicates)
    pub fn ordered_steps(&self) -> Vec<Step> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.index);
        steps
    }
}

/// Fields needed to create a test spec
#[derive(Debug, Clone, Default)]
pub struct NewTestSpec {
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub environment_id: Option<i64>,
}

/// Outcome of a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Passed,
    Failed,
    Skipped,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(Error::InvalidConfig(format!("unknown run status '{}'", other))),
        }
    }
}

/// Placeholder description of a run that has not finished yet
pub const RUN_IN_PROGRESS: &str = "Test execution in progress...";

/// One execution attempt of a generated script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: Option<i64>,
    pub test_id: i64,
    pub status: RunStatus,
    pub description: String,
    /// Set once when the run is created, never altered afterwards
    pub executed_at: Option<DateTime<Utc>>,
}

impl TestRun {
    /// A fresh `PENDING` run stamped with the current time
    pub fn pending(test_id: i64) -> Self {
        Self {
            id: None,
            test_id,
            status: RunStatus::Pending,
            description: RUN_IN_PROGRESS.to_string(),
            executed_at: Some(Utc::now()),
        }
    }

    pub fn finish(&mut self, status: RunStatus, description: impl Into<String>) {
        self.status = status;
        self.description = description.into();
    }
}
