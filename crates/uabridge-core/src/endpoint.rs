// ── Endpoint capability ──
//
// The protocol side of the bridge. A `Connector` opens sessions to remote
// endpoints; each `EndpointClient` can read, write, and manage change
// subscriptions on its endpoint. Change notifications flow through a
// `ChangeSink` into the bounded queue consumed by the relay.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use strum::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::codec::Value;
use crate::model::ServerId;

// ── StatusCode ───────────────────────────────────────────────────────

/// Protocol status code reported by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    pub const BAD_SUBSCRIPTION_ID_INVALID: Self = Self(0x8028_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_MONITORED_ITEM_ID_INVALID: Self = Self(0x8042_0000);

    /// Severity bits say "bad".
    pub fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::BAD_TIMEOUT => Some("BadTimeout"),
            Self::BAD_SUBSCRIPTION_ID_INVALID => Some("BadSubscriptionIdInvalid"),
            Self::BAD_NODE_ID_UNKNOWN => Some("BadNodeIdUnknown"),
            Self::BAD_MONITORED_ITEM_ID_INVALID => Some("BadMonitoredItemIdInvalid"),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{:#010X}", self.0),
        }
    }
}

// ── EndpointError ────────────────────────────────────────────────────

/// Failure kind, used for the connection-error summary stored on a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EndpointErrorKind {
    #[strum(serialize = "StatusCodeError")]
    Status,
    #[strum(serialize = "CancelledError")]
    Cancelled,
    #[strum(serialize = "OSError")]
    Io,
    #[strum(serialize = "ProtocolError")]
    Protocol,
}

/// Anything that can go wrong talking to a remote endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint answered with a bad status code.
    #[error("{0}")]
    Status(StatusCode),

    /// The operation was cancelled (including local timeouts).
    #[error("operation cancelled")]
    Cancelled,

    /// Socket-level failure.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// Any other protocol failure.
    #[error("{0}")]
    Protocol(String),
}

impl EndpointError {
    /// A local deadline expired before the endpoint answered.
    pub fn timed_out() -> Self {
        Self::Status(StatusCode::BAD_TIMEOUT)
    }

    pub fn kind(&self) -> EndpointErrorKind {
        match self {
            Self::Status(_) => EndpointErrorKind::Status,
            Self::Cancelled => EndpointErrorKind::Cancelled,
            Self::Io(_) => EndpointErrorKind::Io,
            Self::Protocol(_) => EndpointErrorKind::Protocol,
        }
    }

    /// Short, stable summary reported as the server's connection error,
    /// e.g. `StatusCodeError(BadTimeout)` or `OSError`.
    pub fn summary(&self) -> String {
        match self {
            Self::Status(code) => format!("{}({code})", self.kind()),
            _ => self.kind().to_string(),
        }
    }

    /// The subscription or monitored item no longer exists on the endpoint,
    /// so removing it has nothing left to do.
    pub fn is_already_absent(&self) -> bool {
        matches!(
            self,
            Self::Status(
                StatusCode::BAD_MONITORED_ITEM_ID_INVALID | StatusCode::BAD_SUBSCRIPTION_ID_INVALID
            )
        )
    }

    /// The endpoint does not know the requested address.
    pub fn is_unknown_node(&self) -> bool {
        matches!(self, Self::Status(StatusCode::BAD_NODE_ID_UNKNOWN))
    }
}

// ── Change notifications ─────────────────────────────────────────────

/// One change notification from a subscribed data point.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    pub server_id: ServerId,
    pub path: String,
    /// `None` when the notification carried no value.
    pub value: Option<Value>,
    pub server_timestamp: Option<DateTime<Utc>>,
}

/// Delivery handle given to an endpoint subscription.
///
/// Non-blocking: endpoint callbacks must never stall on the relay, so a
/// full queue drops the notification with a warning.
#[derive(Debug, Clone)]
pub struct ChangeSink {
    server_id: ServerId,
    tx: mpsc::Sender<DataChange>,
}

impl ChangeSink {
    pub fn new(server_id: ServerId, tx: mpsc::Sender<DataChange>) -> Self {
        Self { server_id, tx }
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Queue a notification. Returns `false` if it was dropped.
    pub fn deliver(
        &self,
        path: impl Into<String>,
        value: Option<Value>,
        server_timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        let change = DataChange {
            server_id: self.server_id,
            path: path.into(),
            value,
            server_timestamp,
        };
        match self.tx.try_send(change) {
            Ok(()) => true,
            Err(TrySendError::Full(change)) => {
                warn!(
                    server_id = %change.server_id,
                    path = %change.path,
                    "notification queue full, dropping change"
                );
                false
            }
            Err(TrySendError::Closed(change)) => {
                debug!(
                    server_id = %change.server_id,
                    path = %change.path,
                    "relay stopped, dropping change"
                );
                false
            }
        }
    }
}

// ── Capability traits ────────────────────────────────────────────────

/// Opens sessions to remote endpoints.
pub trait Connector: Send + Sync + 'static {
    type Client: EndpointClient;

    /// Establish a session with the endpoint at `address`.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Client, EndpointError>> + Send;
}

/// An open session with one remote endpoint.
pub trait EndpointClient: Send + Sync + 'static {
    /// Identifies one live change subscription.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;

    /// Load custom structured type definitions so their values decode.
    fn load_type_definitions(&self) -> impl Future<Output = Result<(), EndpointError>> + Send;

    /// Create the session's change subscription; notifications go to `sink`.
    fn create_subscription(
        &self,
        publishing_interval: Duration,
        sink: ChangeSink,
    ) -> impl Future<Output = Result<(), EndpointError>> + Send;

    fn read(&self, path: &str) -> impl Future<Output = Result<Value, EndpointError>> + Send;

    fn write(
        &self,
        path: &str,
        value: &Value,
    ) -> impl Future<Output = Result<(), EndpointError>> + Send;

    /// Subscribe to changes of `path`.
    fn subscribe(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Self::Handle, EndpointError>> + Send;

    fn unsubscribe(
        &self,
        handle: &Self::Handle,
    ) -> impl Future<Output = Result<(), EndpointError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), EndpointError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn summaries_are_stable() {
        assert_eq!(
            EndpointError::timed_out().summary(),
            "StatusCodeError(BadTimeout)"
        );
        assert_eq!(
            EndpointError::Status(StatusCode(0x8001_0000)).summary(),
            "StatusCodeError(0x80010000)"
        );
        assert_eq!(EndpointError::Cancelled.summary(), "CancelledError");
        assert_eq!(
            EndpointError::from(io::Error::from(io::ErrorKind::ConnectionRefused)).summary(),
            "OSError"
        );
        assert_eq!(
            EndpointError::Protocol("bad handshake".into()).summary(),
            "ProtocolError"
        );
    }

    #[test]
    fn already_absent_codes() {
        assert!(EndpointError::Status(StatusCode::BAD_MONITORED_ITEM_ID_INVALID).is_already_absent());
        assert!(EndpointError::Status(StatusCode::BAD_SUBSCRIPTION_ID_INVALID).is_already_absent());
        assert!(!EndpointError::Status(StatusCode::BAD_NODE_ID_UNKNOWN).is_already_absent());
        assert!(EndpointError::Status(StatusCode::BAD_NODE_ID_UNKNOWN).is_unknown_node());
        assert!(!EndpointError::Cancelled.is_already_absent());
    }

    #[test]
    fn status_severity() {
        assert!(StatusCode::BAD_TIMEOUT.is_bad());
        assert!(!StatusCode(0).is_bad());
    }

    #[tokio::test]
    async fn full_queue_drops_notification() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChangeSink::new(ServerId::new(7), tx);

        assert!(sink.deliver("ns=2;s=A", Some(Value::Int(1)), None));
        assert!(!sink.deliver("ns=2;s=A", Some(Value::Int(2)), None));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.server_id, ServerId::new(7));
        assert_eq!(change.value, Some(Value::Int(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_drops_notification() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let sink = ChangeSink::new(ServerId::new(1), tx);
        assert!(!sink.deliver("ns=2;s=A", None, None));
    }
}
