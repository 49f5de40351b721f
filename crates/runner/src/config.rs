//! Runner configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How and where the test process is launched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Working directory of the spawned shell
    pub launch_dir: PathBuf,

    /// Directory the shell changes into before running the tests
    pub working_dir: PathBuf,

    /// Test runner invocation, the script file name is appended
    pub test_command: String,

    /// Arguments requesting a JSON report on stdout
    pub reporter_args: String,

    /// Ceiling for one execution
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            launch_dir: PathBuf::from("."),
            working_dir: PathBuf::from("."),
            test_command: "npx playwright test".to_string(),
            reporter_args: "--reporter=json".to_string(),
            timeout_secs: 600,
        }
    }
}

impl RunnerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
