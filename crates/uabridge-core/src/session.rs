// ── Session ──
//
// One open session with a remote endpoint: connected, type definitions
// loaded, change subscription created. Opening is all-or-nothing under a
// single deadline, and every later endpoint call is bounded by the same
// endpoint timeout.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, timeout};
use tracing::{debug, warn};

use crate::codec::Value;
use crate::config::BridgeConfig;
use crate::endpoint::{ChangeSink, Connector, EndpointClient, EndpointError};
use crate::model::{Server, ServerId};

/// An established session keyed by its server.
#[derive(Debug)]
pub struct Session<C> {
    server_id: ServerId,
    address: String,
    client: C,
    opened_at: DateTime<Utc>,
    deadline: Duration,
    /// Distinguishes successive sessions for the same server; assigned by
    /// the pool.
    pub(crate) generation: u64,
}

/// Run `call` under `deadline`; expiry is reported as `BadTimeout`.
async fn bounded<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, EndpointError>>,
) -> Result<T, EndpointError> {
    timeout(deadline, call)
        .await
        .unwrap_or_else(|_| Err(EndpointError::timed_out()))
}

impl<C: EndpointClient> Session<C> {
    /// Connect to `server` and prepare its change subscription.
    ///
    /// Connect and preparation share one `endpoint_timeout` budget. If a
    /// step after the connect fails or runs out of time, the half-open
    /// client is disconnected before the error is returned.
    pub async fn open<K>(
        connector: &K,
        server: &Server,
        config: &BridgeConfig,
        sink: ChangeSink,
    ) -> Result<Self, EndpointError>
    where
        K: Connector<Client = C>,
    {
        let deadline = config.endpoint_timeout;
        let started = Instant::now();
        let client = bounded(deadline, connector.connect(&server.address)).await?;

        let remaining = deadline.saturating_sub(started.elapsed());
        let prepared = bounded(remaining, async {
            client.load_type_definitions().await?;
            client
                .create_subscription(config.publishing_interval, sink)
                .await
        })
        .await;

        if let Err(e) = prepared {
            if let Err(close_err) = bounded(deadline, client.disconnect()).await {
                debug!(server_id = %server.id, error = %close_err, "disconnect after failed open");
            }
            return Err(e);
        }

        debug!(server_id = %server.id, address = %server.address, "session opened");
        Ok(Self {
            server_id: server.id,
            address: server.address.clone(),
            client,
            opened_at: Utc::now(),
            deadline,
            generation: 0,
        })
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    /// Address the session was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn subscribe(&self, path: &str) -> Result<C::Handle, EndpointError> {
        bounded(self.deadline, self.client.subscribe(path)).await
    }

    pub async fn unsubscribe(&self, handle: &C::Handle) -> Result<(), EndpointError> {
        bounded(self.deadline, self.client.unsubscribe(handle)).await
    }

    pub async fn read(&self, path: &str) -> Result<Value, EndpointError> {
        bounded(self.deadline, self.client.read(path)).await
    }

    pub async fn write(&self, path: &str, value: &Value) -> Result<(), EndpointError> {
        bounded(self.deadline, self.client.write(path, value)).await
    }

    /// Disconnect, logging rather than returning failures.
    pub async fn close(self) {
        let uptime_secs = (Utc::now() - self.opened_at).num_seconds();
        match bounded(self.deadline, self.client.disconnect()).await {
            Ok(()) => debug!(server_id = %self.server_id, uptime_secs, "session closed"),
            Err(e) => warn!(server_id = %self.server_id, uptime_secs, error = %e, "error closing session"),
        }
    }
}
