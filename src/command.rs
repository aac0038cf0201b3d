// Bounded execution of OS networking commands

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{program} exited with status {code:?}: {message}")]
    Failed {
        program: String,
        code: Option<i32>,
        message: String,
    },

    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// The OS-provided reason, suitable for a per-route failure record
    pub fn reason(&self) -> String {
        match self {
            Error::Failed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub trait CommandExt {
    /// Run to completion and return trimmed stdout.
    /// The child is killed if it outlives `timeout`.
    fn run_stdout(
        &mut self,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<String, Error>> + Send;
}

impl CommandExt for Command {
    async fn run_stdout(&mut self, timeout: Duration) -> Result<String, Error> {
        let program = self.as_std().get_program().to_string_lossy().into_owned();
        tracing::debug!(cmd = ?self, "Executing");

        self.kill_on_drop(true);
        let output = match tokio::time::timeout(timeout, self.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(Error::Spawn { program, source }),
            Err(_) => return Err(Error::Timeout { program, timeout }),
        };

        stdout_from_output(program, output)
    }
}

pub fn stdout_from_output(program: String, output: Output) -> Result<String, Error> {
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if output.status.success() {
        if !stderr.is_empty() {
            tracing::warn!(program, %stderr, "Non empty stderr on successful command");
        }
        return Ok(stdout);
    }

    tracing::debug!(program, status_code = ?output.status.code(), %stdout, %stderr, "Command failed");
    let message = if stderr.is_empty() { stdout } else { stderr };
    Err(Error::Failed {
        program,
        code: output.status.code(),
        message: first_meaningful_line(&message),
    })
}

/// PowerShell errors span many lines of position info; the first line carries the reason.
fn first_meaningful_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}
