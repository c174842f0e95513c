//! Concurrent submission of document batches.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use super::document::{Document, SubmissionResponse};
use super::document_client::DocumentClient;
use super::transport::DocumentTransport;
use crate::error::{DoclimitError, Result};
use crate::ratelimit::ShutdownOutcome;

/// Tally of a dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks aborted after the grace period
    pub aborted: usize,
}

impl DispatchReport {
    fn record(&mut self, result: &Result<SubmissionResponse>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Runs each submission as its own task on a shared client.
pub struct SubmissionDispatcher<T: DocumentTransport + 'static> {
    client: Arc<DocumentClient<T>>,
    tasks: JoinSet<Result<SubmissionResponse>>,
}

impl<T: DocumentTransport + 'static> SubmissionDispatcher<T> {
    pub fn new(client: Arc<DocumentClient<T>>) -> Self {
        Self {
            client,
            tasks: JoinSet::new(),
        }
    }

    /// Spawn a task submitting `document`.
    pub fn submit(&mut self, document: Document, signature: impl Into<String>) {
        let client = self.client.clone();
        let signature = signature.into();
        self.tasks
            .spawn(async move { client.create_document(document, &signature).await });
    }

    /// Number of submissions still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every submitted task.
    pub async fn join_all(&mut self) -> Vec<Result<SubmissionResponse>> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            results.push(flatten(joined));
        }
        results
    }

    /// Stop accepting capacity requests and wind down.
    ///
    /// Waiting submissions are released by the limiter. Submissions already
    /// past the limiter get until `grace` to finish, after which they are
    /// aborted.
    pub async fn shutdown(&mut self, grace: Duration) -> DispatchReport {
        // Grace comes straight from configuration and may not fit an Instant.
        let deadline = Instant::now()
            .checked_add(grace)
            .unwrap_or_else(far_future);
        let outcome = self.client.limiter().shutdown_with_grace(grace).await;
        if let ShutdownOutcome::GraceExpired { pending } = outcome {
            warn!(pending = pending, "Limiter did not drain within grace period");
        }

        let mut report = DispatchReport::default();
        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(joined)) => report.record(&flatten(joined)),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        remaining = self.tasks.len(),
                        "Grace period expired, aborting submissions"
                    );
                    self.tasks.abort_all();
                    while let Some(joined) = self.tasks.join_next().await {
                        match joined {
                            Err(e) if e.is_cancelled() => report.aborted += 1,
                            other => report.record(&flatten(other)),
                        }
                    }
                    break;
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            aborted = report.aborted,
            "Dispatcher shut down"
        );
        report
    }
}

/// Deadline for a grace period too large to represent, about thirty years out.
fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

fn flatten(
    joined: std::result::Result<Result<SubmissionResponse>, tokio::task::JoinError>,
) -> Result<SubmissionResponse> {
    joined.unwrap_or_else(|e| Err(DoclimitError::Task(e.to_string())))
}
