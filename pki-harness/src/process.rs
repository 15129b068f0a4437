// Process execution utilities

use pki_core::{PkiError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ProcessConfig {
    pub timeout: Option<Duration>,
    /// Complete environment of the child; nothing is inherited
    pub env: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            env: BTreeMap::new(),
            working_directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program` to completion and capture both output streams.
///
/// A non-zero exit is reported in `returncode`, never as an error. Errors are
/// reserved for spawn failures and timeouts; on timeout the child is killed.
pub async fn run_process(
    program: &Path,
    args: &[String],
    config: &ProcessConfig,
) -> Result<ProcessOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .env_clear()
        .envs(&config.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &config.working_directory {
        command.current_dir(dir);
    }

    let child = command.spawn().map_err(|e| {
        PkiError::LaunchError(format!("Failed to start {}: {}", program.display(), e))
    })?;

    debug!(program = %program.display(), pid = ?child.id(), "Spawned process");

    // Dropping the wait future on timeout drops the child, which kills it.
    let waited = match config.timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(waited) => waited,
            Err(_) => {
                warn!(
                    program = %program.display(),
                    timeout_ms = limit.as_millis() as u64,
                    "Process timed out, killing it"
                );
                return Err(PkiError::TimeoutError {
                    command: program.display().to_string(),
                    seconds: limit.as_secs_f64(),
                });
            }
        },
        None => child.wait_with_output().await,
    };

    let output = waited.map_err(|e| {
        PkiError::LaunchError(format!("Failed to wait for {}: {}", program.display(), e))
    })?;

    Ok(ProcessOutput {
        returncode: exit_code(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => -signal,
        (None, None) => -1,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
