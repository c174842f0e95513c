//! Transport trait for delivering serialized submissions.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::document::SubmissionResponse;
use crate::error::Result;

/// Trait for document transports.
///
/// The client hands over the serialized envelope and takes whatever comes
/// back; connection handling, TLS and retries on the wire belong to the
/// implementation.
#[async_trait]
pub trait DocumentTransport: Send + Sync {
    /// Deliver one serialized submission.
    async fn send(&self, payload: String) -> Result<SubmissionResponse>;
}

/// Transport that logs payloads instead of sending them.
#[derive(Debug)]
pub struct DryRunTransport {
    endpoint: String,
    sent: AtomicU64,
}

impl DryRunTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Number of payloads accepted so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentTransport for DryRunTransport {
    async fn send(&self, payload: String) -> Result<SubmissionResponse> {
        let sequence = self.sent.fetch_add(1, Ordering::SeqCst) + 1;

        debug!(
            endpoint = %self.endpoint,
            sequence = sequence,
            bytes = payload.len(),
            "Dry run: document not sent"
        );

        Ok(SubmissionResponse {
            status: 200,
            body: format!("{{\"sequence\":{}}}", sequence),
        })
    }
}
