//! Error types for test execution

use thiserror::Error;

/// Failures while starting or supervising the test process.
///
/// These never leave the runner; they become the description of a
/// `FAILED` run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to start test process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to capture {0} of test process")]
    Pipe(&'static str),

    #[error("failed to wait for test process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to read test output: {0}")]
    Drain(#[source] std::io::Error),

    #[error("could not record run: {0}")]
    Store(#[from] stepwright_common::Error),
}
