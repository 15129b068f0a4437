use pki_core::{CertRequest, PkiError, RequestReceipt, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

/// Client for the certificate request service
pub struct RequestClient {
    client: Client,
    base_url: String,
}

impl RequestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PkiError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn submit(&self, request: &CertRequest) -> Result<RequestReceipt> {
        let url = format!("{}/api/v1/requests", self.base_url);

        info!(url = %url, hostname = %request.hostname, "Submitting certificate request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PkiError::NetworkError(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PkiError::RequestRejected(format!(
                "{} ({})",
                error_message(&body),
                status
            )));
        }

        response
            .json::<RequestReceipt>()
            .await
            .map_err(|e| PkiError::NetworkError(format!("Invalid response from {}: {}", url, e)))
    }
}

/// Pull the `error` field out of a JSON error body, or fall back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
