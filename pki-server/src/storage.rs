use chrono::Utc;
use pki_core::{CertRequest, RequestReceipt, RequestStatus};
use std::collections::BTreeMap;

/// First id handed out by a fresh store
pub const DEFAULT_FIRST_ID: u64 = 1000;

/// A submitted request together with the receipt returned for it
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub request: CertRequest,
    pub receipt: RequestReceipt,
}

/// In-memory storage for certificate requests
/// Ids are sequential and never reused
pub struct InMemoryStorage {
    // None once u64::MAX has been handed out
    next_id: Option<u64>,
    requests: BTreeMap<u64, StoredRequest>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_first_id(DEFAULT_FIRST_ID)
    }

    pub fn with_first_id(first_id: u64) -> Self {
        Self {
            next_id: Some(first_id),
            requests: BTreeMap::new(),
        }
    }

    /// Store `request` under the next id, or `None` when ids are exhausted
    pub fn submit(&mut self, request: CertRequest) -> Option<RequestReceipt> {
        let request_id = self.next_id?;
        self.next_id = request_id.checked_add(1);

        let receipt = RequestReceipt {
            request_id,
            hostname: request.hostname.clone(),
            status: RequestStatus::Received,
            submitted_at: Utc::now(),
        };

        self.requests.insert(
            request_id,
            StoredRequest {
                request,
                receipt: receipt.clone(),
            },
        );

        Some(receipt)
    }

    pub fn get(&self, request_id: u64) -> Option<&StoredRequest> {
        self.requests.get(&request_id)
    }

    /// Receipts in submission order
    pub fn list(&self) -> Vec<RequestReceipt> {
        self.requests.values().map(|r| r.receipt.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
