use crate::config::HarnessConfig;
use crate::process::{run_process, ProcessConfig};
use crate::snapshot::{created_between, snapshot};
use chrono::Utc;
use pki_core::{ExecutionResult, Identity, KeyCheckResult, PkiError, Result, TestEnvironment};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Runs command-line tools in a scratch directory and reports what they did
pub struct ScriptHarness {
    config: HarnessConfig,
    work_dir: PathBuf,
}

impl ScriptHarness {
    /// Create a harness with its own empty working directory
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;

        let root = config
            .work_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let work_dir = root.join(format!("pki-harness-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&work_dir)?;

        info!(work_dir = %work_dir.display(), "Created harness working directory");

        Ok(Self { config, work_dir })
    }

    /// Create a harness configured from `PKI_HARNESS_CONFIG`
    pub fn from_env() -> Result<Self> {
        Self::new(HarnessConfig::from_env()?)
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn identity(&self) -> &Identity {
        &self.config.identity
    }

    /// Build the environment scripts are launched with.
    ///
    /// Starts from this process's environment, applies the configured
    /// overrides, then puts the scripts directory at the front of PATH.
    pub fn get_test_env(&self) -> TestEnvironment {
        let mut vars: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        for (name, value) in &self.config.env {
            vars.insert(name.clone(), value.clone());
        }

        if let Some(scripts_dir) = &self.config.scripts_dir {
            let path = prepend_path(scripts_dir, vars.get("PATH").map(String::as_str));
            vars.insert("PATH".to_string(), path);
        }

        TestEnvironment {
            work_dir: self.work_dir.clone(),
            vars,
            identity: self.config.identity.clone(),
        }
    }

    /// Run `command` with `args` in the environment's working directory.
    ///
    /// A non-zero exit is returned as data in `returncode`. Errors mean the
    /// command could not be found or started, timed out, or the working
    /// directory could not be listed.
    pub async fn run_script<S: AsRef<str>>(
        &self,
        env: &TestEnvironment,
        command: &str,
        args: &[S],
    ) -> Result<ExecutionResult> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        let program = which::which_in(command, env.var("PATH"), &env.work_dir)
            .map_err(|e| PkiError::LaunchError(format!("Cannot find {}: {}", command, e)))?;

        info!(
            command = %command,
            program = %program.display(),
            args = ?args,
            "Running script"
        );

        let before = snapshot(&env.work_dir)?;
        let started_at = Utc::now();
        let start_instant = std::time::Instant::now();

        let process_config = ProcessConfig {
            timeout: self.config.timeout(),
            env: env.vars.clone(),
            working_directory: Some(env.work_dir.clone()),
        };
        let output = run_process(&program, &args, &process_config).await?;

        let duration_ms = start_instant.elapsed().as_millis() as u64;
        let completed_at = Utc::now();
        let after = snapshot(&env.work_dir)?;
        let files_created = created_between(&before, &after);

        info!(
            command = %command,
            returncode = output.returncode,
            files_created = ?files_created,
            duration_ms,
            "Script finished"
        );

        Ok(ExecutionResult {
            command: command.to_string(),
            args,
            returncode: output.returncode,
            stdout: output.stdout,
            stderr: output.stderr,
            files_created,
            duration_ms,
            started_at,
            completed_at,
        })
    }

    /// Text for assertion failure messages
    pub fn run_error_msg(&self, result: &ExecutionResult) -> String {
        result.diagnostic()
    }

    /// Run the configured key check against `filename`
    pub async fn check_private_key(
        &self,
        env: &TestEnvironment,
        filename: &str,
    ) -> Result<KeyCheckResult> {
        let template = &self.config.key_check;
        let args = template.expand(filename);
        self.run_script(env, &template.program, &args).await
    }
}

impl Drop for ScriptHarness {
    fn drop(&mut self) {
        if self.config.keep_work_dir {
            info!(work_dir = %self.work_dir.display(), "Keeping harness working directory");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.work_dir) {
            warn!(
                work_dir = %self.work_dir.display(),
                error = %e,
                "Failed to remove harness working directory"
            );
        }
    }
}

fn prepend_path(dir: &Path, existing: Option<&str>) -> String {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = existing {
        paths.extend(std::env::split_paths(existing));
    }
    match std::env::join_paths(paths) {
        Ok(joined) => joined.to_string_lossy().into_owned(),
        Err(_) => match existing {
            Some(existing) => format!("{}:{}", dir.display(), existing),
            None => dir.display().to_string(),
        },
    }
}
