//! Doclimit - windowed rate limiting for document submission
//!
//! This crate bounds outbound document submissions to at most N per time
//! window. Callers over the limit are suspended until the window rolls over,
//! can give up through a deadline or a cancellation signal, and are released
//! with an error when the limiter shuts down.

pub mod client;
pub mod config;
pub mod error;
pub mod ratelimit;
