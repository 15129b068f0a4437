use crate::grammar::{PkiParser, Rule};
use pest::Parser;
use pki_core::{PkiError, Result};
use serde::{Deserialize, Serialize};

/// A single PEM-armoured block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    pub headers: Vec<(String, String)>,
    /// Base64 body with line breaks removed
    pub body: String,
}

impl PemBlock {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Number of bytes the body decodes to
    pub fn decoded_len(&self) -> usize {
        let padding = self.body.bytes().rev().take_while(|b| *b == b'=').count();
        self.body.len() / 4 * 3 - padding
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyKind {
    Pkcs8,
    EncryptedPkcs8,
    Rsa,
    Ec,
    Dsa,
    Other,
}

impl KeyKind {
    fn from_label(label: &str) -> Self {
        match label {
            "PRIVATE KEY" => KeyKind::Pkcs8,
            "ENCRYPTED PRIVATE KEY" => KeyKind::EncryptedPkcs8,
            "RSA PRIVATE KEY" => KeyKind::Rsa,
            "EC PRIVATE KEY" => KeyKind::Ec,
            "DSA PRIVATE KEY" => KeyKind::Dsa,
            _ => KeyKind::Other,
        }
    }
}

/// Structural summary of a private key file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrivateKeyInfo {
    pub label: String,
    pub kind: KeyKind,
    pub encrypted: bool,
    pub der_len: usize,
}

/// Find the request id printed by osg-cert-request.
///
/// Matches the first line of the form `Request Id#: <digits>` with optional
/// trailing whitespace. Returns `None` when no such line exists.
pub fn parse_request_id(output: &str) -> Option<u64> {
    let mut pairs = PkiParser::parse(Rule::request_output, output).ok()?;
    let document = pairs.next()?;

    document
        .into_inner()
        .filter(|pair| pair.as_rule() == Rule::request_id_line)
        .filter_map(|line| line.into_inner().next())
        .find_map(|id| id.as_str().parse::<u64>().ok())
}

/// Parse the first PEM block found in `input`
pub fn parse_pem(input: &str) -> Result<PemBlock> {
    let mut pairs = PkiParser::parse(Rule::pem_file, input)
        .map_err(|e| PkiError::ParseError(format!("Invalid PEM data: {}", e)))?;

    let file = pairs
        .next()
        .ok_or_else(|| PkiError::ParseError("No PEM block found".to_string()))?;

    let block = file
        .into_inner()
        .find(|pair| pair.as_rule() == Rule::pem_block)
        .ok_or_else(|| PkiError::ParseError("No PEM block found".to_string()))?;

    parse_pem_block(block)
}

fn parse_pem_block(pair: pest::iterators::Pair<Rule>) -> Result<PemBlock> {
    let mut begin_label = None;
    let mut end_label = None;
    let mut headers = Vec::new();
    let mut body = String::new();

    for inner_pair in pair.into_inner() {
        match inner_pair.as_rule() {
            Rule::begin_line => begin_label = label_of(inner_pair),
            Rule::end_line => end_label = label_of(inner_pair),
            Rule::pem_headers => {
                for header in inner_pair.into_inner() {
                    let mut parts = header.into_inner();
                    let name = parts.next().map(|p| p.as_str().to_string());
                    let value = parts.next().map(|p| p.as_str().trim_end().to_string());
                    if let (Some(name), Some(value)) = (name, value) {
                        headers.push((name, value));
                    }
                }
            }
            Rule::pem_body => {
                for line in inner_pair.into_inner() {
                    body.push_str(line.as_str());
                }
            }
            _ => {}
        }
    }

    let label = begin_label
        .ok_or_else(|| PkiError::ParseError("PEM block has no BEGIN line".to_string()))?;
    let end_label =
        end_label.ok_or_else(|| PkiError::ParseError("PEM block has no END line".to_string()))?;

    if label != end_label {
        return Err(PkiError::ParseError(format!(
            "PEM labels do not match: BEGIN {} / END {}",
            label, end_label
        )));
    }

    validate_base64(&body)?;

    Ok(PemBlock {
        label,
        headers,
        body,
    })
}

fn label_of(pair: pest::iterators::Pair<Rule>) -> Option<String> {
    pair.into_inner()
        .find(|p| p.as_rule() == Rule::pem_label)
        .map(|p| p.as_str().trim().to_string())
}

fn validate_base64(body: &str) -> Result<()> {
    if body.len() % 4 != 0 {
        return Err(PkiError::ParseError(format!(
            "PEM body length {} is not a multiple of 4",
            body.len()
        )));
    }

    let data = body.trim_end_matches('=');
    if body.len() - data.len() > 2 || data.contains('=') {
        return Err(PkiError::ParseError(
            "PEM body has misplaced padding".to_string(),
        ));
    }

    Ok(())
}

/// Check that `input` holds a structurally valid private key
pub fn inspect_private_key(input: &str) -> Result<PrivateKeyInfo> {
    let block = parse_pem(input)?;

    if !block.label.ends_with("PRIVATE KEY") {
        return Err(PkiError::ParseError(format!(
            "Expected a private key, found {}",
            block.label
        )));
    }

    let kind = KeyKind::from_label(&block.label);
    let encrypted = kind == KeyKind::EncryptedPkcs8
        || block
            .header("Proc-Type")
            .map(|v| v.contains("ENCRYPTED"))
            .unwrap_or(false);

    Ok(PrivateKeyInfo {
        der_len: block.decoded_len(),
        label: block.label,
        kind,
        encrypted,
    })
}
