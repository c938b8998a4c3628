//! Error types for the acquisition pipeline.
//!
//! Transformation operations are deliberately infallible (absence/emptiness
//! is the "not applicable" signal); only acquisition failures propagate to
//! the caller, as an aggregated failure object.

use thiserror::Error;

use crate::types::ChannelFailure;

/// Errors from a fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The user-supplied header JSON could not be parsed. Fails the attempt
    /// up-front with a clear message rather than silently dropping headers.
    #[error("invalid header JSON: {0}")]
    InvalidHeaders(String),

    /// Every channel was tried and failed. Carries the per-channel failures
    /// in channel order so a true 404 can be told apart from total
    /// connectivity failure.
    #[error("all acquisition channels exhausted: {}", summarize(.0))]
    Exhausted(Vec<ChannelFailure>),
}

impl FetchError {
    /// The recorded per-channel failures, if this is an exhaustion error.
    pub fn failures(&self) -> &[ChannelFailure] {
        match self {
            FetchError::Exhausted(failures) => failures,
            FetchError::InvalidHeaders(_) => &[],
        }
    }
}

fn summarize(failures: &[ChannelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.channel, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
