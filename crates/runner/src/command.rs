//! Shell invocation for the test runner CLI

use crate::config::RunnerConfig;
use std::path::Path;

/// Shell family used to launch the tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Program plus arguments, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    /// The script passed to the shell
    pub fn script(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or("")
    }
}

/// Build `<shell> <flag> "cd <dir> && <test command> <file> <reporter args>"`.
///
/// The directory and file name are quoted for the target shell. The test
/// command and reporter arguments are configuration and pass through as is.
pub fn build_command(config: &RunnerConfig, file_name: &str, platform: Platform) -> ShellCommand {
    let mut script = format!(
        "cd {} && {} {}",
        quote_path(&config.working_dir, platform),
        config.test_command.trim(),
        quote(file_name, platform)
    );
    let reporter = config.reporter_args.trim();
    if !reporter.is_empty() {
        script.push(' ');
        script.push_str(reporter);
    }

    match platform {
        Platform::Windows => ShellCommand {
            program: "cmd.exe".to_string(),
            args: vec!["/c".to_string(), script],
        },
        Platform::Unix => ShellCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script],
        },
    }
}

fn quote_path(path: &Path, platform: Platform) -> String {
    quote(&path.to_string_lossy(), platform)
}

fn quote(value: &str, platform: Platform) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '\\' | ':' | '='));
    if plain {
        return value.to_string();
    }

    match platform {
        Platform::Unix => format!("'{}'", value.replace('\'', r"'\''")),
        Platform::Windows => format!("\"{}\"", value.replace('"', "\"\"")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(dir: &str) -> RunnerConfig {
        RunnerConfig {
            working_dir: PathBuf::from(dir),
            ..Default::default()
        }
    }

    #[test]
    fn test_windows_uses_cmd() {
        let cmd = build_command(&config("backend"), "login.spec.ts", Platform::Windows);
        assert_eq!(cmd.program, "cmd.exe");
        assert_eq!(cmd.args[0], "/c");
        assert!(cmd.script().contains("cd backend"));
        assert!(cmd.script().contains("npx playwright test login.spec.ts"));
        assert!(cmd.script().ends_with("--reporter=json"));
    }

    #[test]
    fn test_unix_uses_sh() {
        let cmd = build_command(&config("backend"), "7.spec.ts", Platform::Unix);
        assert_eq!(cmd.program, "/bin/sh");
        assert_eq!(cmd.args[0], "-c");
        assert_eq!(
            cmd.script(),
            "cd backend && npx playwright test 7.spec.ts --reporter=json"
        );
    }

    #[test]
    fn test_quotes_unsafe_values() {
        let cmd = build_command(&config("my tests"), "it's.spec.ts", Platform::Unix);
        assert_eq!(
            cmd.script(),
            r"cd 'my tests' && npx playwright test 'it'\''s.spec.ts' --reporter=json"
        );

        let cmd = build_command(&config("my tests"), "a b.spec.ts", Platform::Windows);
        assert!(cmd.script().starts_with("cd \"my tests\" && "));
        assert!(cmd.script().contains("\"a b.spec.ts\""));
    }

    #[test]
    fn test_empty_reporter_args_are_omitted() {
        let mut cfg = config(".");
        cfg.reporter_args = String::new();
        let cmd = build_command(&cfg, "1.spec.ts", Platform::Unix);
        assert_eq!(cmd.script(), "cd . && npx playwright test 1.spec.ts");
    }
}
