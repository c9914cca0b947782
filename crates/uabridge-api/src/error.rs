use thiserror::Error;

/// Top-level error type for the `uabridge-api` crate.
///
/// Covers every failure mode of the backend surface: transport, URL
/// construction, TLS setup, non-success HTTP statuses, and payload
/// decoding. `uabridge-core` maps these into its own error type.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The access token cannot be carried in an HTTP header.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    // ── Backend responses ───────────────────────────────────────────
    /// The backend rejected the bearer credential.
    #[error("Unauthorized -- the backend rejected the access token")]
    Unauthorized,

    /// Any other non-success status, with the response body for debugging.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Request body could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying on the
    /// next cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
