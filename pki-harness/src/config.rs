use pki_core::{Identity, PkiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a TOML harness configuration file
pub const CONFIG_ENV_VAR: &str = "PKI_HARNESS_CONFIG";

/// Placeholder in the key check template replaced by the key file name
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Harness configuration
///
/// ```toml
/// scripts_dir = "/usr/share/osg-pki-tools/bin"
/// timeout_secs = 60
///
/// [identity]
/// domain = "example.org"
/// email = "pki-test@example.org"
///
/// [env]
/// OSG_PKI_SERVER = "http://127.0.0.1:3000"
///
/// [key_check]
/// program = "openssl"
/// args = ["rsa", "-in", "{key}", "-check", "-noout"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub identity: Identity,
    /// Prepended to PATH so scripts under test are found first
    pub scripts_dir: Option<PathBuf>,
    /// Per-process timeout; 0 disables it
    pub timeout_secs: u64,
    /// Extra variables, applied after the inherited environment
    pub env: BTreeMap<String, String>,
    pub key_check: CommandTemplate,
    /// Parent directory for scratch working directories
    pub work_root: Option<PathBuf>,
    pub keep_work_dir: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            scripts_dir: None,
            timeout_secs: 120,
            env: BTreeMap::new(),
            key_check: CommandTemplate::default(),
            work_root: None,
            keep_work_dir: false,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(input)
            .map_err(|e| PkiError::InvalidConfiguration(format!("Invalid harness config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PkiError::InvalidConfiguration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from the file named by `PKI_HARNESS_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    pub fn with_scripts_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.scripts_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the per-process timeout, rounded up to whole seconds
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_secs = timeout
            .map(|t| {
                let secs = t.as_secs() + u64::from(t.subsec_nanos() > 0);
                secs.max(1)
            })
            .unwrap_or(0);
        self
    }

    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn with_key_check(mut self, key_check: CommandTemplate) -> Self {
        self.key_check = key_check;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.key_check.program.trim().is_empty() {
            return Err(PkiError::InvalidConfiguration(
                "key_check.program must not be empty".to_string(),
            ));
        }
        if !self.key_check.args.iter().any(|a| a.contains(KEY_PLACEHOLDER)) {
            return Err(PkiError::InvalidConfiguration(format!(
                "key_check.args must reference {}",
                KEY_PLACEHOLDER
            )));
        }
        if self.identity.domain.trim().is_empty() {
            return Err(PkiError::InvalidConfiguration(
                "identity.domain must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A command line with a `{key}` placeholder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for CommandTemplate {
    fn default() -> Self {
        Self::new(
            "openssl",
            ["pkey", "-in", KEY_PLACEHOLDER, "-check", "-noout"],
        )
    }
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn expand(&self, key_file: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(KEY_PLACEHOLDER, key_file))
            .collect()
    }
}
