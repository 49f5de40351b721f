//! Persistence seams consumed by the generation coordinator and the runner

use crate::types::{GenerationState, NewTestSpec, TargetEnvironment, TestRun, TestSpec};
use crate::Result;

/// Test spec persistence
pub trait TestSpecStore: Send + Sync {
    fn insert(&self, spec: NewTestSpec) -> Result<TestSpec>;

    fn find_by_id(&self, id: i64) -> Result<Option<TestSpec>>;

    fn exists_by_id(&self, id: i64) -> Result<bool>;

    /// Persist name, description, steps, environment and generation state
    fn save(&self, spec: &TestSpec) -> Result<()>;

    fn set_generation_state(&self, id: i64, state: GenerationState) -> Result<()>;

    fn list(&self) -> Result<Vec<TestSpec>>;
}

/// Target environment persistence
pub trait EnvironmentStore: Send + Sync {
    fn insert_environment(&self, env: &TargetEnvironment) -> Result<TargetEnvironment>;

    fn find_environment(&self, id: i64) -> Result<Option<TargetEnvironment>>;

    fn list_environments(&self) -> Result<Vec<TargetEnvironment>>;
}

/// Append-only run history
pub trait TestRunStore: Send + Sync {
    /// Insert a new run, stamping `executed_at` if it is unset
    fn create(&self, run: &TestRun) -> Result<TestRun>;

    /// Move a `PENDING` run to its terminal status. A second terminal write
    /// for the same run fails with `InvalidStateTransition`.
    fn finalize(&self, run: &TestRun) -> Result<()>;

    /// Runs for a test, newest first
    fn find_by_test_newest_first(&self, test_id: i64) -> Result<Vec<TestRun>>;
}
