//! Rate-limited document submission client.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::document::{Document, SubmissionMessage, SubmissionResponse};
use super::transport::DocumentTransport;
use crate::error::{DoclimitError, Result};
use crate::ratelimit::{LimitedInvoker, WindowedLimiter};

/// Submits documents through a shared rate limiter.
pub struct DocumentClient<T: DocumentTransport> {
    /// Gate shared by every submission from this client
    invoker: LimitedInvoker,
    /// Delivery mechanism
    transport: Arc<T>,
    /// Upper bound on waiting for capacity
    acquire_timeout: Option<Duration>,
}

impl<T: DocumentTransport> DocumentClient<T> {
    /// Create a new client with the given limiter and transport.
    pub fn new(limiter: Arc<WindowedLimiter>, transport: Arc<T>) -> Self {
        Self {
            invoker: LimitedInvoker::new(limiter),
            transport,
            acquire_timeout: None,
        }
    }

    /// Fail submissions that wait longer than `timeout` for capacity.
    pub fn with_acquire_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn limiter(&self) -> &Arc<WindowedLimiter> {
        self.invoker.limiter()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Submit one document.
    ///
    /// Every attempt that gets past the limiter counts against the window,
    /// including attempts that fail to serialize or that the transport
    /// rejects.
    #[instrument(skip(self, document, signature), fields(doc_type = %document.doc_type))]
    pub async fn create_document(
        &self,
        document: Document,
        signature: &str,
    ) -> Result<SubmissionResponse> {
        let operation = || self.submit(document, signature);

        match self.acquire_timeout {
            Some(deadline) => self.invoker.invoke_timeout(deadline, operation).await,
            None => self.invoker.invoke(operation).await,
        }
    }

    async fn submit(&self, document: Document, signature: &str) -> Result<SubmissionResponse> {
        let message = SubmissionMessage::new(document, signature);
        let payload = serde_json::to_string(&message)?;

        debug!(
            request_id = %message.request_id,
            bytes = payload.len(),
            "Submitting document"
        );

        let response = self.transport.send(payload).await?;
        if !response.is_success() {
            warn!(
                request_id = %message.request_id,
                status = response.status,
                "Document rejected"
            );
            return Err(DoclimitError::Transport(format!(
                "document rejected with status {}: {}",
                response.status, response.body
            )));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::DryRunTransport;
    use crate::error::LimiterError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Transport that records payloads and answers with a fixed status.
    struct RecordingTransport {
        status: u16,
        payloads: Mutex<Vec<String>>,
    }

    impl RecordingTransport {
        fn new(status: u16) -> Self {
            Self {
                status,
                payloads: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DocumentTransport for RecordingTransport {
        async fn send(&self, payload: String) -> Result<SubmissionResponse> {
            self.payloads.lock().push(payload);
            Ok(SubmissionResponse {
                status: self.status,
                body: "status".to_string(),
            })
        }
    }

    fn limiter(limit: u32) -> Arc<WindowedLimiter> {
        Arc::new(WindowedLimiter::new(limit, Duration::from_secs(5)).unwrap())
    }

    fn document() -> Document {
        Document::new("LP_INTRODUCE_GOODS", json!({"products": []}))
    }

    #[tokio::test]
    async fn test_create_document_sends_envelope() {
        let transport = Arc::new(RecordingTransport::new(200));
        let client = DocumentClient::new(limiter(5), transport.clone());

        let response = client.create_document(document(), "sig").await.unwrap();
        assert_eq!(response.status, 200);

        let payloads = transport.payloads.lock();
        assert_eq!(payloads.len(), 1);
        let sent: serde_json::Value = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(sent["signature"], "sig");
        assert_eq!(sent["document"]["docType"], "LP_INTRODUCE_GOODS");
    }

    #[tokio::test]
    async fn test_rejected_document_still_counts() {
        let transport = Arc::new(RecordingTransport::new(500));
        let client = DocumentClient::new(limiter(2), transport.clone());

        let err = client.create_document(document(), "sig").await.unwrap_err();
        assert!(matches!(err, DoclimitError::Transport(_)));
        assert_eq!(client.limiter().used(), 1);
        assert_eq!(transport.payloads.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_timeout_surfaces_as_limiter_error() {
        let transport = Arc::new(DryRunTransport::new("http://localhost/documents"));
        let client = DocumentClient::new(limiter(1), transport.clone())
            .with_acquire_timeout(Some(Duration::from_millis(30)));

        client.create_document(document(), "sig").await.unwrap();
        let err = client.create_document(document(), "sig").await.unwrap_err();

        assert!(matches!(
            err,
            DoclimitError::Limiter(LimiterError::Timeout(_))
        ));
        assert_eq!(transport.sent(), 1);
    }
}
