//! Error taxonomy for the polling pipeline
//!
//! Every error raised inside one station's pipeline is caught at the
//! scheduler boundary, logged with station context, and converted into
//! "skip this station this cycle". Nothing here aborts the process.

use thiserror::Error;

/// Pipeline errors for one station's polling attempt
#[derive(Debug, Error)]
pub enum PollError {
    /// Stream connection could not be opened, timed out, or yielded
    /// no audio
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    /// Leading-intro trim re-encode failed
    #[error("Sample trim failed: {0}")]
    TrimFailed(String),

    /// Recognition service call failed (distinct from a no-match,
    /// which is a normal outcome, not an error)
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    /// Catalog credential exchange failed. Fatal for this station's
    /// cycle; retried next cycle, never within the same one.
    #[error("Catalog auth failure: {0}")]
    AuthFailure(String),

    /// Catalog call failed after authentication
    #[error("Catalog unavailable: {0}")]
    RemoteUnavailable(String),

    /// Store transaction failed and was rolled back
    #[error("Store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl PollError {
    /// Whether the station attempt may be retried within the cycle.
    /// Auth failures are not, to avoid hammering the auth endpoint.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PollError::AuthFailure(_))
    }
}
