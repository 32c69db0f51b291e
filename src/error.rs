use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a resolution can fail
///
/// Cloneable so a failure can be both returned to the caller and kept on the
/// [`Session`](crate::Session) diagnostic list.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("access token request failed{}: {detail}", fmt_status(.status))]
    Auth {
        status: Option<StatusCode>,
        detail: String,
    },

    #[error("transport failure: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    #[error("stream is offline or channel `{channel}` was not found")]
    StreamOffline { channel: String },

    #[error("upstream responded with http status {status}")]
    Upstream { status: StatusCode, body: String },

    #[error("unable to parse playlist: {0}")]
    Parse(String),

    #[error("playlist has no variants")]
    NoVariants,

    #[error("playlist has no audio only rendition")]
    NoAudioTrack,

    #[error("not enough variants to pick the worst quality (got {available})")]
    InsufficientVariants { available: usize },

    #[error("request was cancelled")]
    Cancelled,

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the retry executor may spend another backoff slot on this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if !e.is_builder())
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(Arc::new(value))
    }
}

#[allow(clippy::ref_option)]
fn fmt_status(status: &Option<StatusCode>) -> String {
    status.map_or_else(String::new, |s| format!(" with http status {s}"))
}
