//! Report parsing and run classification
//!
//! The JSON reporter prints one object with a top-level `stats` field. The
//! output also carries whatever else the process wrote, so the report is
//! located through a fallback chain:
//!
//! 1. the whole output parsed as JSON
//! 2. the first JSON object with `stats` starting at any `{`, with
//!    whatever follows it ignored
//! 3. no report: the exit code decides

use serde_json::{Deserializer, Value};
use stepwright_common::RunStatus;
use tracing::{debug, info, warn};

/// Counters from the report's `stats` object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportStats {
    pub unexpected: u64,
    pub expected: u64,
    pub skipped: u64,
    pub flaky: u64,
}

impl ReportStats {
    fn from_report(report: &Value) -> Option<Self> {
        let stats = report.get("stats")?;
        let counter = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
        Some(Self {
            unexpected: counter("unexpected"),
            expected: counter("expected"),
            skipped: counter("skipped"),
            flaky: counter("flaky"),
        })
    }
}

/// Terminal status plus human readable summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: RunStatus,
    pub description: String,
}

/// Parse one JSON value at the start of `text`, ignoring trailing output
fn leading_value(text: &str) -> Option<Value> {
    Deserializer::from_str(text).into_iter::<Value>().next()?.ok()
}

/// Find the report stats in captured output
pub fn extract_stats(output: &str) -> Option<ReportStats> {
    if let Ok(report) = serde_json::from_str::<Value>(output.trim()) {
        if let Some(stats) = ReportStats::from_report(&report) {
            debug!("Parsed report from structured output");
            return Some(stats);
        }
    }

    let stats = output
        .match_indices('{')
        .filter_map(|(start, _)| leading_value(&output[start..]))
        .find_map(|report| ReportStats::from_report(&report));
    if stats.is_none() && output.contains("\"stats\"") {
        warn!("Output mentions stats but holds no parseable report");
    }
    stats
}

/// Classify a finished run from its output and exit code
pub fn classify(output: &str, exit_code: i32) -> Classification {
    let Some(stats) = extract_stats(output) else {
        return classify_exit_code(exit_code);
    };

    info!(
        expected = stats.expected,
        unexpected = stats.unexpected,
        skipped = stats.skipped,
        flaky = stats.flaky,
        "Test results"
    );

    if stats.unexpected > 0 {
        Classification {
            status: RunStatus::Failed,
            description: format!(
                "Test failed: {} test(s) failed, {} passed, {} skipped",
                stats.unexpected, stats.expected, stats.skipped
            ),
        }
    } else if stats.expected > 0 || (exit_code == 0 && stats.skipped == 0) {
        Classification {
            status: RunStatus::Passed,
            description: format!(
                "All tests passed: {} test(s) passed, {} skipped",
                stats.expected, stats.skipped
            ),
        }
    } else {
        Classification {
            status: RunStatus::Skipped,
            description: "No tests were executed".to_string(),
        }
    }
}

fn classify_exit_code(exit_code: i32) -> Classification {
    if exit_code == 0 {
        Classification {
            status: RunStatus::Passed,
            description: "Test executed successfully (exit code 0)".to_string(),
        }
    } else {
        Classification {
            status: RunStatus::Failed,
            description: format!("Test failed with exit code: {}", exit_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(r#"{"stats":{"unexpected":1,"expected":2,"skipped":0,"flaky":0}}"#, 0, RunStatus::Failed ; "unexpected fails despite exit 0")]
    #[test_case(r#"{"stats":{"unexpected":1,"expected":2,"skipped":0,"flaky":0}}"#, 1, RunStatus::Failed ; "unexpected fails")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":3,"skipped":1,"flaky":0}}"#, 0, RunStatus::Passed ; "expected passes")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":3,"skipped":0,"flaky":1}}"#, 1, RunStatus::Passed ; "expected passes despite exit code")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":0,"skipped":2,"flaky":0}}"#, 0, RunStatus::Skipped ; "only skipped with exit 0")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":0,"skipped":2,"flaky":0}}"#, 2, RunStatus::Skipped ; "only skipped with exit 2")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":0,"skipped":0,"flaky":0}}"#, 0, RunStatus::Passed ; "empty report exit 0")]
    #[test_case(r#"{"stats":{"unexpected":0,"expected":0,"skipped":0,"flaky":0}}"#, 1, RunStatus::Skipped ; "empty report nonzero exit")]
    #[test_case(r#"{"stats": invalid}"#, 0, RunStatus::Passed ; "invalid json exit 0")]
    #[test_case(r#"{"stats": invalid}"#, 1, RunStatus::Failed ; "invalid json exit 1")]
    #[test_case("Error: Cannot find module '@playwright/test'", 1, RunStatus::Failed ; "no report nonzero")]
    #[test_case("", 0, RunStatus::Passed ; "no output exit 0")]
    #[test_case("", -1, RunStatus::Failed ; "killed by signal")]
    fn test_classification(output: &str, exit_code: i32, expected: RunStatus) {
        assert_eq!(classify(output, exit_code).status, expected);
    }

    #[test]
    fn test_descriptions() {
        let failed = classify(r#"{"stats":{"unexpected":1,"expected":2,"skipped":3}}"#, 1);
        assert_eq!(failed.description, "Test failed: 1 test(s) failed, 2 passed, 3 skipped");

        let passed = classify(r#"{"stats":{"unexpected":0,"expected":3,"skipped":1}}"#, 0);
        assert_eq!(passed.description, "All tests passed: 3 test(s) passed, 1 skipped");

        let skipped = classify(r#"{"stats":{"expected":0,"skipped":2}}"#, 0);
        assert_eq!(skipped.description, "No tests were executed");

        assert_eq!(
            classify("garbage", 0).description,
            "Test executed successfully (exit code 0)"
        );
        assert_eq!(classify("garbage", 3).description, "Test failed with exit code: 3");
    }

    #[test]
    fn test_report_inside_noisy_output() {
        let output = "Running 3 tests using 1 worker\n\
            {\n  \"config\": {\"workers\": 1},\n  \"suites\": [],\n  \"stats\": {\"expected\": 3, \"unexpected\": 0, \"skipped\": 0, \"flaky\": 0, \"duration\": 1234.5}\n}\n\
            npm notice New version available\n";

        let stats = extract_stats(output).unwrap();
        assert_eq!(
            stats,
            ReportStats {
                unexpected: 0,
                expected: 3,
                skipped: 0,
                flaky: 0
            }
        );
    }

    #[test]
    fn test_missing_and_negative_counters_default_to_zero() {
        let stats = extract_stats(r#"{"stats":{"expected":-4,"flaky":"x"}}"#).unwrap();
        assert_eq!(stats, ReportStats::default());
    }

    #[test]
    fn test_braces_after_the_report_are_ignored() {
        let output = "{\"stats\":{\"unexpected\":0,\"expected\":0,\"skipped\":2,\"flaky\":0}}\n\
            [WebServer] shutdown {code: 0}\n";
        let outcome = classify(output, 0);
        assert_eq!(outcome.status, RunStatus::Skipped);
        assert_eq!(outcome.description, "No tests were executed");

        let output = "[WebServer] {starting}\n\
            {\"config\":{},\"stats\":{\"expected\":1,\"unexpected\":1}}\n\
            npm notice {\"update\": true}\n";
        assert_eq!(classify(output, 0).status, RunStatus::Failed);
    }

    #[test]
    fn test_json_without_stats_is_not_a_report() {
        assert!(extract_stats(r#"{"suites":[]}"#).is_none());
    }
}
