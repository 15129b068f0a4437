use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Observable effects of one harness invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub command: String,
    pub args: Vec<String>,
    /// Exit code, or the negated signal number when the process was killed
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    /// Entries of the working directory that appeared during the run
    pub files_created: BTreeSet<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Result of running the private-key check command
pub type KeyCheckResult = ExecutionResult;

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        self.returncode == 0
    }

    /// Whether `name` was created in the working directory by this run
    pub fn created(&self, name: &str) -> bool {
        self.files_created.contains(name)
    }

    /// The invocation as it would be typed in a shell
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Diagnostic text for assertion messages
    pub fn diagnostic(&self) -> String {
        let created = if self.files_created.is_empty() {
            "(none)".to_string()
        } else {
            self.files_created
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };

        format!(
            "Command: {}\nReturn code: {}\nFiles created: {}\nSTDOUT:\n{}\nSTDERR:\n{}",
            self.command_line(),
            self.returncode,
            created,
            self.stdout.trim_end(),
            self.stderr.trim_end(),
        )
    }
}

fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    if word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c))
    {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Requester identity used to fill request options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Identity {
    pub domain: String,
    pub email: String,
    pub name: String,
    pub phone: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            domain: "example.org".to_string(),
            email: "pki-test@example.org".to_string(),
            name: "PKI Test".to_string(),
            phone: "555-0100".to_string(),
        }
    }
}

impl Identity {
    /// Fully qualified host name under this identity's domain
    pub fn host(&self, label: &str) -> String {
        format!("{}.{}", label, self.domain)
    }
}

/// Everything a test needs to launch a process
#[derive(Debug, Clone, PartialEq)]
pub struct TestEnvironment {
    pub work_dir: PathBuf,
    pub vars: BTreeMap<String, String>,
    pub identity: Identity,
}

impl TestEnvironment {
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn without_var(mut self, name: &str) -> Self {
        self.vars.remove(name);
        self
    }
}

/// Body posted to the request service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertRequest {
    pub csr: String,
    pub hostname: String,
    #[serde(default)]
    pub altnames: Vec<String>,
    pub email: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub vo: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Received,
    Approved,
    Issued,
    Rejected,
}

/// Reply from the request service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestReceipt {
    pub request_id: u64,
    pub hostname: String,
    pub status: RequestStatus,
    pub submitted_at: DateTime<Utc>,
}
