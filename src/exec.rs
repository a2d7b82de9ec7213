//! Subprocess execution for gt/bd invocations.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Text returned when a command exceeds its timeout.
pub const TIMED_OUT: &str = "Error: command timed out";

/// Text returned when a command succeeds without printing anything.
pub const NO_OUTPUT: &str = "(no output)";

/// Default wall-clock limit for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub text: String,
    pub timed_out: bool,
    pub failed: bool,
}

impl CommandResult {
    fn ok(text: String) -> Self {
        Self {
            text,
            timed_out: false,
            failed: false,
        }
    }

    fn error(text: String) -> Self {
        Self {
            text,
            timed_out: false,
            failed: true,
        }
    }

    fn timeout() -> Self {
        Self {
            text: TIMED_OUT.to_string(),
            timed_out: true,
            failed: true,
        }
    }
}

/// Something that can run an argv and report a `CommandResult`.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, argv: &[String]) -> CommandResult;
}

/// Runs commands as child processes in a fixed working directory.
#[derive(Debug, Clone)]
pub struct Executor {
    work_dir: PathBuf,
    timeout: Duration,
}

impl Executor {
    pub fn new(work_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Runner for Executor {
    async fn run(&self, argv: &[String]) -> CommandResult {
        let Some((program, args)) = argv.split_first() else {
            return CommandResult::error("Error: empty command".to_string());
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.work_dir)
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to start {}: {}", program, e);
                return CommandResult::error(format!("Error: {}", e));
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!("Failed to wait for {}: {}", program, e);
                return CommandResult::error(format!("Error: {}", e));
            }
            Err(_) => {
                tracing::warn!(
                    "{} {} timed out after {}s",
                    program,
                    args.join(" "),
                    self.timeout.as_secs_f32()
                );
                return CommandResult::timeout();
            }
        };

        let text = combine_output(&output.stdout, &output.stderr);
        tracing::debug!(
            "{} {} exited with {} ({} bytes)",
            program,
            args.join(" "),
            output.status,
            text.len()
        );

        match (output.status.success(), text.is_empty()) {
            (true, true) => CommandResult::ok(NO_OUTPUT.to_string()),
            (true, false) => CommandResult::ok(text),
            (false, true) => CommandResult::error(format!("Error: {}", output.status)),
            (false, false) => CommandResult::error(text),
        }
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = stdout.trim();
    let stderr = stderr.trim();

    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}
