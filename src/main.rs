use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use doclimit::client::{Document, DocumentClient, DryRunTransport, SubmissionDispatcher};
use doclimit::config::DoclimitConfig;
use doclimit::ratelimit::WindowedLimiter;

/// Submit a batch of documents through the windowed rate limiter.
#[derive(Debug, Parser)]
#[command(name = "doclimit", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Number of documents to submit
    #[arg(short = 'n', long, default_value_t = 25)]
    documents: usize,

    /// Signature attached to every document
    #[arg(short, long, default_value = "dry-run-signature")]
    signature: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting doclimit");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = DoclimitConfig::load(args.config.as_deref())?;
    info!(
        request_limit = config.limiter.request_limit,
        window_ms = config.limiter.window().as_millis() as u64,
        endpoint = %config.client.endpoint,
        "Configuration loaded"
    );

    let limiter = Arc::new(WindowedLimiter::from_config(&config.limiter)?);
    let transport = Arc::new(DryRunTransport::new(config.client.endpoint.clone()));
    let client = Arc::new(
        DocumentClient::new(limiter, transport.clone())
            .with_acquire_timeout(config.limiter.acquire_timeout()),
    );

    let mut dispatcher = SubmissionDispatcher::new(client);
    for n in 0..args.documents {
        let document = Document::new("LP_INTRODUCE_GOODS", json!({ "sequence": n }))
            .with_id(format!("doc-{}", n));
        dispatcher.submit(document, args.signature.clone());
    }
    info!(documents = args.documents, "Submissions queued");

    let grace = config.shutdown.grace_period();
    let completed = tokio::select! {
        results = dispatcher.join_all() => Some(results),
        _ = shutdown_signal() => None,
    };

    match completed {
        Some(results) => {
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                warn!(failed = failed, "Some submissions failed");
            }
            info!(
                submitted = results.len() - failed,
                sent = transport.sent(),
                "All submissions finished"
            );
            dispatcher.shutdown(grace).await;
        }
        None => {
            let report = dispatcher.shutdown(grace).await;
            info!(sent = transport.sent(), report = ?report, "Stopped before completion");
        }
    }

    info!("doclimit stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
