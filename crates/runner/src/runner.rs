//! Execution runner - spawns the test process and records the run

use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use stepwright_common::{RunStatus, TestRun, TestRunStore};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::command::{build_command, Platform};
use crate::config::RunnerConfig;
use crate::error::ProcessError;
use crate::report::classify;

/// How long to keep reading after the process exits. Grandchildren that
/// inherited the pipes can hold them open past the parent's exit.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

enum Execution {
    Finished { exit_code: i32, output: String },
    TimedOut { output: String },
}

/// Runs stored specs and records each attempt
pub struct ExecutionRunner {
    config: RunnerConfig,
    runs: Arc<dyn TestRunStore>,
}

impl ExecutionRunner {
    pub fn new(config: RunnerConfig, runs: Arc<dyn TestRunStore>) -> Self {
        Self { config, runs }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `file_name` for `test_id`.
    ///
    /// Never fails: every error ends as a `FAILED` run. The returned run is
    /// the persisted terminal state unless the store itself was unavailable.
    pub async fn run(&self, test_id: i64, file_name: &str) -> TestRun {
        let mut run = match self.runs.create(&TestRun::pending(test_id)) {
            Ok(run) => run,
            Err(e) => {
                error!(test_id, "Failed to record pending run: {}", e);
                let mut run = TestRun::pending(test_id);
                run.finish(RunStatus::Failed, format!("Error: {}", ProcessError::Store(e)));
                return run;
            }
        };
        info!(test_id, run_id = ?run.id, file = file_name, "Created run with PENDING status");

        let (status, description) = match self.execute(file_name).await {
            Ok(Execution::Finished { exit_code, output }) => {
                debug!(test_id, exit_code, bytes = output.len(), "Test process finished");
                let outcome = classify(&output, exit_code);
                (outcome.status, outcome.description)
            }
            Ok(Execution::TimedOut { output }) => {
                warn!(test_id, "Test process timed out");
                (
                    RunStatus::Failed,
                    format!(
                        "Test execution timeout after {}\n{}",
                        describe_limit(self.config.timeout()),
                        output
                    ),
                )
            }
            Err(e) => {
                error!(test_id, file = file_name, "Error executing test: {}", e);
                (RunStatus::Failed, format!("Error: {}", e))
            }
        };

        run.finish(status, description);
        if let Err(e) = self.runs.finalize(&run) {
            error!(test_id, run_id = ?run.id, "Failed to finalize run: {}", e);
        }

        info!(test_id, run_id = ?run.id, status = %run.status, "Run finished");
        run
    }

    async fn execute(&self, file_name: &str) -> Result<Execution, ProcessError> {
        let shell = build_command(&self.config, file_name, Platform::current());
        debug!("Spawning {} {:?}", shell.program, shell.args);

        let mut cmd = Command::new(&shell.program);
        cmd.args(&shell.args)
            .current_dir(&self.config.launch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down npx and its children
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

        let stdout = child.stdout.take().ok_or(ProcessError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ProcessError::Pipe("stderr"))?;

        let output = Arc::new(Mutex::new(String::new()));
        let mut drains = vec![
            tokio::spawn(drain(stdout, Arc::clone(&output))),
            tokio::spawn(drain(stderr, Arc::clone(&output))),
        ];

        let waited = tokio::time::timeout(self.config.timeout(), child.wait()).await;

        let status = match waited {
            Ok(status) => status.map_err(ProcessError::Wait)?,
            Err(_) => {
                terminate(&mut child).await;
                for task in &drains {
                    task.abort();
                }
                let captured = output.lock().clone();
                return Ok(Execution::TimedOut { output: captured });
            }
        };

        finish_drains(&mut drains).await?;

        // A signal-terminated process has no exit code
        let exit_code = status.code().unwrap_or(-1);
        let captured = output.lock().clone();
        Ok(Execution::Finished {
            exit_code,
            output: captured,
        })
    }
}

/// Append every line from `reader` to the shared buffer
async fn drain<R>(reader: R, sink: Arc<Mutex<String>>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf);
        let mut out = sink.lock();
        out.push_str(&line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
}

async fn finish_drains(
    drains: &mut [JoinHandle<std::io::Result<()>>],
) -> Result<(), ProcessError> {
    for task in drains.iter_mut() {
        match tokio::time::timeout(DRAIN_GRACE, &mut *task).await {
            Ok(Ok(result)) => result.map_err(ProcessError::Drain)?,
            Ok(Err(join)) => {
                return Err(ProcessError::Drain(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    join,
                )))
            }
            Err(_) => {
                warn!("Output pipe still open after process exit, stop reading");
                task.abort();
            }
        }
    }
    Ok(())
}

/// Kill the process (and its group on unix) and reap it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                debug!("killpg({}) failed: {}", pid, e);
            }
        }
    }

    if let Err(e) = child.start_kill() {
        debug!("start_kill failed: {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap timed out process: {}", e);
    }
}

/// "10 minutes", "1 minute", "90 seconds"
fn describe_limit(limit: Duration) -> String {
    let secs = limit.as_secs();
    let (n, unit) = if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_limit() {
        assert_eq!(describe_limit(Duration::from_secs(600)), "10 minutes");
        assert_eq!(describe_limit(Duration::from_secs(60)), "1 minute");
        assert_eq!(describe_limit(Duration::from_secs(90)), "90 seconds");
        assert_eq!(describe_limit(Duration::from_secs(1)), "1 second");
    }

    #[tokio::test]
    async fn test_drain_handles_partial_last_line_and_invalid_utf8() {
        let sink = Arc::new(Mutex::new(String::new()));
        let input: &[u8] = b"first\nsecond \xff\nlast";
        drain(input, Arc::clone(&sink)).await.unwrap();
        assert_eq!(*sink.lock(), "first\nsecond \u{fffd}\nlast\n");
    }
}
