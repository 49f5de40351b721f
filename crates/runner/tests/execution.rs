//! Execution runner tests against real shell processes

#![cfg(unix)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stepwright_common::{Database, Error, RunStatus, TestRun, TestRunStore, RUN_IN_PROGRESS};
use stepwright_runner::{ExecutionRunner, RunnerConfig};
use tempfile::TempDir;

const TEST_ID: i64 = 42;

/// Database-backed store that counts calls
struct RecordingStore {
    db: Database,
    creates: AtomicUsize,
    finalizes: AtomicUsize,
    fail_create: bool,
}

impl RecordingStore {
    fn new(fail_create: bool) -> Arc<Self> {
        Arc::new(Self {
            db: Database::open_memory().unwrap(),
            creates: AtomicUsize::new(0),
            finalizes: AtomicUsize::new(0),
            fail_create,
        })
    }
}

impl TestRunStore for RecordingStore {
    fn create(&self, run: &TestRun) -> stepwright_common::Result<TestRun> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create {
            return Err(Error::InvalidConfig("store offline".to_string()));
        }
        self.db.create(run)
    }

    fn finalize(&self, run: &TestRun) -> stepwright_common::Result<()> {
        self.finalizes.fetch_add(1, Ordering::SeqCst);
        self.db.finalize(run)
    }

    fn find_by_test_newest_first(&self, test_id: i64) -> stepwright_common::Result<Vec<TestRun>> {
        self.db.find_by_test_newest_first(test_id)
    }
}

/// Runner whose "test command" is `sh <script>` inside a temp dir
fn runner(dir: &Path, store: Arc<RecordingStore>, timeout_secs: u64) -> ExecutionRunner {
    let config = RunnerConfig {
        launch_dir: dir.to_path_buf(),
        working_dir: dir.to_path_buf(),
        test_command: "sh".to_string(),
        reporter_args: String::new(),
        timeout_secs,
    };
    ExecutionRunner::new(config, store)
}

fn script(dir: &TempDir, name: &str, body: &str) -> String {
    std::fs::write(dir.path().join(name), body).unwrap();
    name.to_string()
}

#[tokio::test]
async fn test_passing_report_is_recorded() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let file = script(
        &dir,
        "1.spec.ts",
        r#"echo '{"stats":{"expected":2,"unexpected":0,"skipped":0,"flaky":0}}'"#,
    );

    let run = runner(dir.path(), store.clone(), 30).run(TEST_ID, &file).await;

    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.description, "All tests passed: 2 test(s) passed, 0 skipped");
    assert!(run.id.is_some());

    let history = store.find_by_test_newest_first(TEST_ID).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Passed);
    assert_eq!(history[0].id, run.id);
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.finalizes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_report_wins_over_exit_code() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let file = script(
        &dir,
        "2.spec.ts",
        "echo 'Running 3 tests' >&2\n\
         echo '{\"stats\":{\"expected\":2,\"unexpected\":1,\"skipped\":0,\"flaky\":0}}'\n\
         exit 0\n",
    );

    let run = runner(dir.path(), store, 30).run(TEST_ID, &file).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.description, "Test failed: 1 test(s) failed, 2 passed, 0 skipped");
}

#[tokio::test]
async fn test_no_report_falls_back_to_exit_code() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);

    let ok = script(&dir, "3.spec.ts", "echo done\n");
    let run = runner(dir.path(), store.clone(), 30).run(TEST_ID, &ok).await;
    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.description, "Test executed successfully (exit code 0)");

    let bad = script(&dir, "4.spec.ts", "echo boom >&2\nexit 3\n");
    let run = runner(dir.path(), store.clone(), 30).run(TEST_ID, &bad).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.description, "Test failed with exit code: 3");

    let history = store.find_by_test_newest_first(TEST_ID).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, RunStatus::Failed, "newest first");
}

#[tokio::test]
async fn test_timeout_kills_process_and_keeps_output() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let file = script(&dir, "5.spec.ts", "echo started\nsleep 30\necho never\n");

    let start = Instant::now();
    let run = runner(dir.path(), store.clone(), 1).run(TEST_ID, &file).await;

    assert!(start.elapsed() < Duration::from_secs(15));
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.description.starts_with("Test execution timeout after 1 second\n"));
    assert!(run.description.contains("started"));
    assert!(!run.description.contains("never"));

    let history = store.find_by_test_newest_first(TEST_ID).unwrap();
    assert_eq!(history[0].status, RunStatus::Failed);
    assert_eq!(store.finalizes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_large_output_does_not_block() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let file = script(
        &dir,
        "6.spec.ts",
        "i=0\n\
         while [ $i -lt 20000 ]; do echo \"progress line $i\"; i=$((i+1)); done >&2\n\
         echo '{\"stats\":{\"expected\":1,\"unexpected\":0,\"skipped\":0,\"flaky\":0}}'\n",
    );

    let run = runner(dir.path(), store, 30).run(TEST_ID, &file).await;
    assert_eq!(run.status, RunStatus::Passed);
}

#[tokio::test]
async fn test_signal_exit_is_minus_one() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    // Kills the wrapper shell too, the runner placed both in their own group
    let file = script(&dir, "7.spec.ts", "kill -9 0\n");

    let run = runner(dir.path(), store, 30).run(TEST_ID, &file).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.description, "Test failed with exit code: -1");
}

#[tokio::test]
async fn test_spawn_failure_becomes_failed_run() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let missing = dir.path().join("does-not-exist");

    let run = runner(&missing, store.clone(), 30).run(TEST_ID, "8.spec.ts").await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.description.starts_with("Error: failed to start test process"));
    let history = store.find_by_test_newest_first(TEST_ID).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn test_store_failure_skips_execution() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(true);
    let file = script(&dir, "9.spec.ts", "touch ran\n");

    let run = runner(dir.path(), store.clone(), 30).run(TEST_ID, &file).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.id.is_none());
    assert!(run.description.contains("store offline"));
    assert_ne!(run.description, RUN_IN_PROGRESS);
    assert!(!dir.path().join("ran").exists());
    assert_eq!(store.finalizes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_pending_run_is_visible_while_the_process_runs() {
    let dir = TempDir::new().unwrap();
    let store = RecordingStore::new(false);
    let file = script(
        &dir,
        "10.spec.ts",
        "sleep 2\necho '{\"stats\":{\"expected\":1,\"unexpected\":0,\"skipped\":0,\"flaky\":0}}'\n",
    );

    let runner = runner(dir.path(), store.clone(), 30);
    let handle = tokio::spawn(async move { runner.run(TEST_ID, &file).await });

    let deadline = Instant::now() + Duration::from_secs(5);
    let pending = loop {
        let history = store.find_by_test_newest_first(TEST_ID).unwrap();
        if let Some(run) = history.into_iter().next() {
            break run;
        }
        assert!(Instant::now() < deadline, "no run recorded");
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert_eq!(pending.status, RunStatus::Pending);
    assert_eq!(pending.description, RUN_IN_PROGRESS);
    assert_eq!(store.finalizes.load(Ordering::SeqCst), 0);

    let run = handle.await.unwrap();
    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.id, pending.id);

    let history = store.find_by_test_newest_first(TEST_ID).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Passed);
}
