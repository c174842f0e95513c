//! Document submission client built on the windowed rate limiter.

mod dispatcher;
mod document;
mod document_client;
mod transport;

pub use dispatcher::{DispatchReport, SubmissionDispatcher};
pub use document::{Document, SubmissionMessage, SubmissionResponse};
pub use document_client::DocumentClient;
pub use transport::{DocumentTransport, DryRunTransport};
