//! Generation coordinator
//!
//! Turns a [`TestSpec`] into script text by running the tool agent, and
//! advances the spec's generation state:
//!
//! ```text
//! NOT_STARTED | COMPLETED | FAILED -> IN_PROGRESS -> COMPLETED | FAILED
//! ```
//!
//! A spec without any step content short-circuits to [`Generated::NoSteps`]
//! and leaves the state untouched.

use crate::agent::ToolAgent;
use crate::prompt::{build_user_message, SYSTEM_PROMPT};
use std::sync::Arc;
use stepwright_common::steps::{has_content, steps_to_table};
use stepwright_common::{GenerationState, TestSpec, TestSpecStore};
use thiserror::Error;
use tracing::{error, info, warn};

/// Result text returned when a spec has nothing to generate from
pub const NO_STEPS_PROVIDED: &str = "No test steps provided";

/// Outcome of a successful `generate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    /// Script text exactly as the agent returned it
    Script(String),
    NoSteps,
}

impl Generated {
    pub fn text(&self) -> &str {
        match self {
            Generated::Script(s) => s,
            Generated::NoSteps => NO_STEPS_PROVIDED,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to generate test script: {message}")]
    Failed {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl GenerationError {
    fn failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        GenerationError::Failed {
            message: source.to_string(),
            source: Box::new(source),
        }
    }
}

/// Drives generation for one spec at a time
pub struct GenerationCoordinator {
    agent: ToolAgent,
    state_store: Option<Arc<dyn TestSpecStore>>,
}

impl GenerationCoordinator {
    pub fn new(agent: ToolAgent) -> Self {
        Self {
            agent,
            state_store: None,
        }
    }

    /// Persist every state transition so other observers can see it
    pub fn with_state_store(mut self, store: Arc<dyn TestSpecStore>) -> Self {
        self.state_store = Some(store);
        self
    }

    pub async fn generate(&self, spec: &mut TestSpec) -> Result<Generated, GenerationError> {
        if !has_content(&spec.steps) {
            warn!(test_id = spec.id, "No test steps found, skipping generation");
            return Ok(Generated::NoSteps);
        }

        self.transition(spec, GenerationState::InProgress);

        match self.run_agent(spec).await {
            Ok(script) => {
                self.transition(spec, GenerationState::Completed);
                info!(test_id = spec.id, bytes = script.len(), "Script generated");
                Ok(Generated::Script(script))
            }
            Err(e) => {
                self.transition(spec, GenerationState::Failed);
                error!(test_id = spec.id, "Generation failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_agent(&self, spec: &TestSpec) -> Result<String, GenerationError> {
        let table = steps_to_table(&spec.ordered_steps()).map_err(GenerationError::failed)?;
        let user = build_user_message(&table, spec.environment.as_ref());

        info!(
            test_id = spec.id,
            steps = spec.steps.len(),
            environment = spec.environment.as_ref().map(|e| e.name.as_str()).unwrap_or("-"),
            "Generating Playwright script"
        );

        self.agent
            .run(SYSTEM_PROMPT, &user)
            .await
            .map_err(GenerationError::failed)
    }

    fn transition(&self, spec: &mut TestSpec, state: GenerationState) {
        spec.generation_state = state;

        if let Some(store) = &self.state_store {
            if let Err(e) = store.set_generation_state(spec.id, state) {
                warn!(test_id = spec.id, %state, "Failed to persist generation state: {}", e);
            }
        }
    }
}
