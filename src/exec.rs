use std::{
    collections::BTreeMap,
    io::Read,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::AppError;

/// Credential variables that leak another identity into `gh` calls
pub const CREDENTIAL_ENV_VARS: [&str; 4] = [
    "GH_TOKEN",
    "GITHUB_TOKEN",
    // gh prefers these over GH_CONFIG_DIR for non-github.com hosts
    "GH_ENTERPRISE_TOKEN",
    "GITHUB_ENTERPRISE_TOKEN",
];
/// Variable that bypasses the guard when set to `1`
pub const SKIP_GUARD_ENV: &str = "CTX_SKIP_GUARD";

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Per-call environment changes: `Some` sets a variable, `None` removes it
pub type EnvOverrides = BTreeMap<String, Option<String>>;

/// Captured result of one external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Builds a successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout and stderr joined, for classifying failures
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Narrow capability for running external programs
pub trait CommandRunner {
    /// Runs a program with the inherited environment
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, AppError> {
        self.run_with_env(program, args, &EnvOverrides::new())
    }

    /// Runs a program with `env` applied on top of the inherited environment
    ///
    /// A non-zero exit is returned as output. Only spawn failures and
    /// timeouts are errors.
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, AppError>;
}

/// Runs real processes, killing any that outlive the timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, AppError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            match value {
                Some(value) => command.env(key, value),
                None => command.env_remove(key),
            };
        }

        debug!(program, ?args, "running command");
        let mut child = command.spawn().map_err(|err| AppError::Command {
            program: program.to_string(),
            message: err.to_string(),
        })?;

        // Pipes are drained on helper threads so a chatty child never fills
        // its pipe buffer while we poll for exit.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdout_reader = thread::spawn(move || read_pipe(stdout));
        let stderr_reader = thread::spawn(move || read_pipe(stderr));

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                warn!(program, timeout_secs = self.timeout.as_secs(), "killing command after timeout");
                let _ = child.kill();
                let _ = child.wait();
                return Err(AppError::Timeout {
                    program: program.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = CommandOutput {
            code: status.code(),
            stdout: stdout_reader.join().unwrap_or_default(),
            stderr: stderr_reader.join().unwrap_or_default(),
        };
        debug!(program, code = ?output.code, "command finished");
        Ok(output)
    }
}

fn read_pipe<R: Read>(pipe: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buffer);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Process environment state the engine depends on, captured once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnv {
    /// Credential variables that were set to a non-empty value
    pub credential_vars: Vec<String>,
    /// Whether the guard bypass was requested
    pub skip_guard: bool,
}

impl AmbientEnv {
    /// Reads the current process environment
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the ambient state from any variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential_vars = CREDENTIAL_ENV_VARS
            .into_iter()
            .filter(|key| lookup(*key).is_some_and(|value| !value.is_empty()))
            .map(|key| key.to_string())
            .collect();
        let skip_guard = lookup(SKIP_GUARD_ENV).is_some_and(|value| value == "1");
        Self {
            credential_vars,
            skip_guard,
        }
    }

    /// First credential variable that would override profile authentication
    pub fn token_interference(&self) -> Option<&str> {
        self.credential_vars.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_env_detects_tokens_and_bypass() {
        let ambient = AmbientEnv::from_lookup(|key| match key {
            "GITHUB_TOKEN" => Some("ghp_secret".to_string()),
            "GH_TOKEN" => Some(String::new()),
            "CTX_SKIP_GUARD" => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(ambient.credential_vars, vec!["GITHUB_TOKEN".to_string()]);
        assert_eq!(ambient.token_interference(), Some("GITHUB_TOKEN"));
        assert!(ambient.skip_guard);
    }

    #[test]
    fn bypass_requires_exact_sentinel() {
        let ambient = AmbientEnv::from_lookup(|key| match key {
            "CTX_SKIP_GUARD" => Some("true".to_string()),
            _ => None,
        });
        assert!(!ambient.skip_guard);
        assert_eq!(ambient.token_interference(), None);

        let padded = AmbientEnv::from_lookup(|key| match key {
            "CTX_SKIP_GUARD" => Some(" 1 ".to_string()),
            _ => None,
        });
        assert!(!padded.skip_guard);
    }

    #[test]
    fn ambient_env_reports_enterprise_tokens() {
        let ambient = AmbientEnv::from_lookup(|key| match key {
            "GH_ENTERPRISE_TOKEN" => Some("ghp_enterprise".to_string()),
            _ => None,
        });
        assert_eq!(ambient.token_interference(), Some("GH_ENTERPRISE_TOKEN"));
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_captures_output_and_exit_code() {
        let runner = SystemRunner::new(Duration::from_secs(10));
        let output = runner
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"])
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_applies_and_removes_env() {
        // HOME is inherited from the test process unless removed
        assert!(std::env::var_os("HOME").is_some());
        let runner = SystemRunner::new(Duration::from_secs(10));
        let script = "printf '%s|%s' \"$CTX_TEST_SET\" \"${HOME-unset}\"";

        let inherited = runner.run("sh", &["-c", script]).unwrap();
        assert!(!inherited.stdout.ends_with("|unset"));

        let mut env = EnvOverrides::new();
        env.insert("CTX_TEST_SET".to_string(), Some("value".to_string()));
        env.insert("HOME".to_string(), None);
        let output = runner.run_with_env("sh", &["-c", script], &env).unwrap();
        assert_eq!(output.stdout, "value|unset");
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_times_out() {
        let runner = SystemRunner::new(Duration::from_millis(200));
        let err = runner.run("sleep", &["5"]).unwrap_err();
        assert!(matches!(err, AppError::Timeout { .. }));
    }

    #[test]
    fn missing_program_is_command_error() {
        let runner = SystemRunner::new(Duration::from_secs(1));
        let err = runner.run("ctx-definitely-not-a-binary", &[]).unwrap_err();
        assert!(matches!(err, AppError::Command { .. }));
    }
}
