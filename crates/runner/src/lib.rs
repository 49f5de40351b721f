//! Stepwright Execution Runner
//!
//! Runs a stored Playwright spec as an external process and records the
//! outcome as a [`TestRun`](stepwright_common::TestRun):
//!
//! 1. persist a `PENDING` run
//! 2. spawn `cd <dir> && npx playwright test <file> --reporter=json` through the platform shell
//! 3. drain stdout and stderr into one buffer while waiting, bounded by a timeout
//! 4. classify the JSON report found in the output
//! 5. finalize the run exactly once
//!
//! Execution failures never surface as errors; they end in a `FAILED` run.

pub mod command;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;

pub use command::{build_command, Platform, ShellCommand};
pub use config::RunnerConfig;
pub use error::ProcessError;
pub use report::{classify, extract_stats, Classification, ReportStats};
pub use runner::ExecutionRunner;
