// Key and CSR generation is delegated to `openssl req`

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

pub struct KeySpec {
    pub hostname: String,
    pub altnames: Vec<String>,
    pub bits: u32,
    pub key_path: PathBuf,
}

impl KeySpec {
    pub fn openssl_args(&self) -> Vec<String> {
        let mut args = vec![
            "req".to_string(),
            "-new".to_string(),
            "-batch".to_string(),
            "-newkey".to_string(),
            format!("rsa:{}", self.bits),
            "-nodes".to_string(),
            "-keyout".to_string(),
            self.key_path.display().to_string(),
            "-subj".to_string(),
            format!("/CN={}", self.hostname),
        ];

        if !self.altnames.is_empty() {
            let sans = std::iter::once(&self.hostname)
                .chain(self.altnames.iter().filter(|a| **a != self.hostname))
                .map(|name| format!("DNS:{}", name))
                .collect::<Vec<_>>()
                .join(",");
            args.push("-addext".to_string());
            args.push(format!("subjectAltName={}", sans));
        }

        args
    }
}

/// Write a new private key to `spec.key_path` and return the PEM CSR
pub async fn generate_key_and_csr(spec: &KeySpec) -> anyhow::Result<String> {
    let openssl = which::which("openssl").context("openssl was not found in PATH")?;
    let args = spec.openssl_args();

    debug!(program = %openssl.display(), args = ?args, "Running openssl");

    let output = Command::new(&openssl)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("Failed to run {}", openssl.display()))?;

    if !output.status.success() {
        bail!(
            "openssl req failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    restrict_permissions(&spec.key_path)?;

    info!(key_path = %spec.key_path.display(), bits = spec.bits, "Generated private key");

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(unix)]
fn restrict_permissions(path: &std::path::Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &std::path::Path) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(altnames: &[&str]) -> KeySpec {
        KeySpec {
            hostname: "test.example.org".to_string(),
            altnames: altnames.iter().map(|a| a.to_string()).collect(),
            bits: 2048,
            key_path: PathBuf::from("./host-key.pem"),
        }
    }

    #[test]
    fn test_openssl_args_without_altnames() {
        let args = spec(&[]).openssl_args();
        assert!(args.contains(&"rsa:2048".to_string()));
        assert!(args.contains(&"/CN=test.example.org".to_string()));
        assert!(!args.contains(&"-addext".to_string()));

        let keyout = args.iter().position(|a| a == "-keyout").unwrap();
        assert_eq!(args[keyout + 1], "./host-key.pem");
    }

    #[test]
    fn test_openssl_args_altnames_include_hostname_once() {
        let args = spec(&["www.example.org", "test.example.org"]).openssl_args();
        assert_eq!(
            args.last().unwrap(),
            "subjectAltName=DNS:test.example.org,DNS:www.example.org"
        );
    }
}
