use anyhow::{bail, Context};
use clap::Parser;
use pki_core::{CertRequest, RequestReceipt};
use pki_parser::{inspect_private_key, parse_pem};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

mod keygen;
mod request;

use keygen::{generate_key_and_csr, KeySpec};
use request::RequestClient;

/// Environment variable consulted when --server is not given
const SERVER_ENV_VAR: &str = "OSG_PKI_SERVER";
const DEFAULT_SERVER: &str = "http://localhost:3000";

#[derive(Parser, Debug)]
#[command(name = "osg-cert-request")]
#[command(about = "Generate a host key and request a host certificate", long_about = None)]
struct Cli {
    /// Fully qualified host name to request a certificate for
    #[arg(long)]
    hostname: String,

    /// Additional DNS names for the certificate
    #[arg(short = 'a', long = "altname")]
    altnames: Vec<String>,

    /// Requester email address
    #[arg(short, long)]
    email: String,

    /// Requester full name
    #[arg(short, long)]
    name: String,

    /// Requester phone number
    #[arg(short, long)]
    phone: String,

    /// Comment passed along with the request
    #[arg(short = 'm', long)]
    comment: Option<String>,

    /// Email addresses to copy on request notifications
    #[arg(long)]
    cc: Vec<String>,

    /// Virtual organization the host belongs to
    #[arg(long)]
    vo: Option<String>,

    /// Directory to write the private key into
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Private key file name
    #[arg(short, long, default_value = "host-key.pem")]
    keyfile: String,

    /// RSA key size
    #[arg(long, default_value_t = 2048)]
    key_bits: u32,

    /// Request service URL [default: $OSG_PKI_SERVER or http://localhost:3000]
    #[arg(long)]
    server: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    request_certificate(cli).await
}

async fn request_certificate(cli: Cli) -> anyhow::Result<()> {
    validate_hostname(&cli.hostname)?;
    for altname in &cli.altnames {
        validate_hostname(altname)?;
    }
    validate_email(&cli.email)?;
    for cc in &cli.cc {
        validate_email(cc)?;
    }

    let key_path = cli.directory.join(&cli.keyfile);
    if key_path.exists() {
        bail!(
            "{} already exists; remove it or choose another --keyfile",
            key_path.display()
        );
    }

    println!("Generating private key in {}", key_path.display());
    let spec = KeySpec {
        hostname: cli.hostname.clone(),
        altnames: cli.altnames.clone(),
        bits: cli.key_bits,
        key_path: key_path.clone(),
    };

    // Never leave a key behind without a submitted request
    let receipt = match submit_with_new_key(cli, &spec).await {
        Ok(receipt) => receipt,
        Err(e) => {
            discard_key(&key_path);
            return Err(e);
        }
    };

    println!("Request Id#: {}", receipt.request_id);

    Ok(())
}

async fn submit_with_new_key(cli: Cli, spec: &KeySpec) -> anyhow::Result<RequestReceipt> {
    let csr = generate_key_and_csr(spec).await?;

    let key_path = &spec.key_path;
    let key_text = std::fs::read_to_string(key_path)
        .with_context(|| format!("Failed to read {}", key_path.display()))?;
    inspect_private_key(&key_text)
        .with_context(|| format!("{} does not hold a usable private key", key_path.display()))?;

    let csr_block = parse_pem(&csr).context("openssl produced an unreadable CSR")?;
    if csr_block.label != "CERTIFICATE REQUEST" {
        bail!("openssl produced a {} instead of a CSR", csr_block.label);
    }

    let server = server_url(cli.server.as_deref());
    let client = RequestClient::new(&server, Duration::from_secs(cli.timeout))?;
    let receipt = client
        .submit(&CertRequest {
            csr,
            hostname: cli.hostname,
            altnames: cli.altnames,
            email: cli.email,
            name: cli.name,
            phone: cli.phone,
            comment: cli.comment,
            cc: cli.cc,
            vo: cli.vo,
        })
        .await?;

    Ok(receipt)
}

fn discard_key(key_path: &Path) {
    match std::fs::remove_file(key_path) {
        Ok(()) => info!(key_path = %key_path.display(), "Removed unused private key"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            key_path = %key_path.display(),
            error = %e,
            "Failed to remove unused private key"
        ),
    }
}

fn server_url(flag: Option<&str>) -> String {
    flag.map(String::from)
        .or_else(|| std::env::var(SERVER_ENV_VAR).ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| DEFAULT_SERVER.to_string())
}

fn validate_hostname(hostname: &str) -> anyhow::Result<()> {
    let valid = hostname.contains('.')
        && !hostname.starts_with('.')
        && !hostname.ends_with('.')
        && hostname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');

    if !valid {
        bail!("{:?} is not a fully qualified host name", hostname);
    }
    Ok(())
}

fn validate_email(email: &str) -> anyhow::Result<()> {
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') => Ok(()),
        _ => bail!("{:?} is not a valid email address", email),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_request_options() {
        let cli = Cli::try_parse_from([
            "osg-cert-request",
            "--hostname",
            "test.example.org",
            "-e",
            "a@example.org",
            "-n",
            "A Name",
            "-p",
            "555-0100",
            "-a",
            "www.example.org",
            "-a",
            "ftp.example.org",
        ])
        .unwrap();

        assert_eq!(cli.hostname, "test.example.org");
        assert_eq!(cli.name, "A Name");
        assert_eq!(cli.altnames, vec!["www.example.org", "ftp.example.org"]);
        assert_eq!(cli.keyfile, "host-key.pem");
        assert_eq!(cli.key_bits, 2048);
        assert!(cli.server.is_none());
    }

    #[test]
    fn test_missing_required_option() {
        let parsed = Cli::try_parse_from(["osg-cert-request", "--hostname", "test.example.org"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_help_mentions_usage() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("Usage:"));
        assert!(help.contains("--hostname"));
    }

    #[test]
    fn test_server_flag_wins() {
        assert_eq!(
            server_url(Some("http://pki.example.org")),
            "http://pki.example.org"
        );
    }

    #[test]
    fn test_discard_key() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("host-key.pem");
        std::fs::write(&key_path, "key\n").unwrap();

        discard_key(&key_path);
        assert!(!key_path.exists());

        // already gone
        discard_key(&key_path);
    }

    #[test]
    fn test_validate_hostname() {
        assert!(validate_hostname("test.example.org").is_ok());
        assert!(validate_hostname("localhost").is_err());
        assert!(validate_hostname("bad host.example.org").is_err());
        assert!(validate_hostname(".example.org").is_err());
        assert!(validate_hostname("").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@example.org").is_ok());
        assert!(validate_email("example.org").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("a@localhost").is_err());
    }
}
