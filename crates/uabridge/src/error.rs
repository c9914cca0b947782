//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text
//! and per-kind exit codes.

use miette::Diagnostic;
use thiserror::Error;

use uabridge_config::ConfigError;
use uabridge_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend at {url}: {reason}")]
    #[diagnostic(
        code(uabridge::connection_failed),
        help(
            "Check that the backend is running and reachable.\n\
             URL: {url}\n\
             Override it with --api-url or API_URL."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Backend at {url} is not healthy")]
    #[diagnostic(
        code(uabridge::unhealthy),
        help("The health check answered, but not with HTTP 200.")
    )]
    Unhealthy { url: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The backend rejected the access token")]
    #[diagnostic(
        code(uabridge::auth_failed),
        help("Check ACCESS_TOKEN or the --access-token flag.")
    )]
    AuthFailed,

    #[error("No access token configured")]
    #[diagnostic(
        code(uabridge::no_token),
        help(
            "Set ACCESS_TOKEN, UABRIDGE_ACCESS_TOKEN, or pass --access-token.\n\
             Config file: {path}"
        )
    )]
    NoToken { path: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(uabridge::api_error))]
    Api { status: Option<u16>, message: String },

    // ── Validation / configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(uabridge::validation))]
    Validation { field: String, reason: String },

    #[error("{message}")]
    #[diagnostic(
        code(uabridge::config),
        help("Run: uabridge config path  to see which file is read.")
    )]
    Config { message: String },

    // ── Process ──────────────────────────────────────────────────────

    #[error("Interrupted")]
    #[diagnostic(code(uabridge::interrupted))]
    Interrupted,

    #[error("Internal error: {0}")]
    #[diagnostic(code(uabridge::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(uabridge::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Attach the backend URL to connection errors raised below the CLI.
    #[must_use]
    pub fn with_url(self, backend: &url::Url) -> Self {
        match self {
            Self::ConnectionFailed { reason, .. } => Self::ConnectionFailed {
                url: backend.to_string(),
                reason,
            },
            other => other,
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Unhealthy { .. } => exit_code::CONNECTION,
            Self::AuthFailed | Self::NoToken { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::Interrupted => exit_code::INTERRUPTED,
            Self::Api { .. } | Self::Internal(_) | Self::Io(_) | Self::Json(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::MissingToken => Self::NoToken {
                path: uabridge_config::config_path().display().to_string(),
            },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized => Self::AuthFailed,
            CoreError::BackendUnavailable { reason } => Self::ConnectionFailed {
                url: "(backend)".into(),
                reason,
            },
            CoreError::Backend { message, status } => Self::Api { status, message },
            CoreError::Config { message } => Self::Config { message },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}
