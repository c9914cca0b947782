// ── Core error types ──
//
// Errors surfaced by the engine. Consumers never see raw HTTP details; the
// `From<uabridge_api::Error>` impl translates transport-layer failures into
// engine-level variants. Endpoint failures have their own type
// (`EndpointError`) since they are reported to the backend, not propagated.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend errors ───────────────────────────────────────────────
    #[error("Backend rejected the access token")]
    Unauthorized,

    #[error("Backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the next cycle may succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
            || matches!(self, Self::Backend { status: Some(s), .. } if *s >= 500)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<uabridge_api::Error> for CoreError {
    fn from(err: uabridge_api::Error) -> Self {
        match err {
            uabridge_api::Error::Unauthorized => CoreError::Unauthorized,
            uabridge_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::BackendUnavailable {
                    reason: e.to_string(),
                }
            }
            uabridge_api::Error::Transport(e) => CoreError::Backend {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            uabridge_api::Error::Status { status, body } => CoreError::Backend {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
            uabridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            uabridge_api::Error::InvalidToken(msg) => CoreError::Config {
                message: format!("Invalid access token: {msg}"),
            },
            uabridge_api::Error::Tls(msg) => CoreError::BackendUnavailable {
                reason: format!("TLS error: {msg}"),
            },
            uabridge_api::Error::Deserialization { message, body: _ } => CoreError::Backend {
                message: format!("Deserialization error: {message}"),
                status: None,
            },
            uabridge_api::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}
