use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::{ServerId, from_epoch};
use uabridge_api::ServerRecord;

/// A remote endpoint from the backend's desired-state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Server {
    pub id: ServerId,
    pub name: Option<String>,
    /// Endpoint address handed to the connector.
    pub address: String,
    pub checked_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub has_connection_error: bool,
    pub connection_error: Option<String>,
}

impl Server {
    /// Whether this server is due for (re)connection.
    ///
    /// Due iff it has been checked since its last update, and that check is
    /// more recent than `now - window`. Servers the backend stopped
    /// refreshing fall out of the desired set.
    pub fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let Some(checked) = self.checked_at else {
            return false;
        };
        if self.updated_at.is_some_and(|updated| checked < updated) {
            return false;
        }
        let Ok(window) = TimeDelta::from_std(window) else {
            return true;
        };
        now.checked_sub_signed(window)
            .is_none_or(|cutoff| checked > cutoff)
    }

    /// Display label: the name if set, the address otherwise.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.address)
    }
}

impl From<ServerRecord> for Server {
    fn from(record: ServerRecord) -> Self {
        Self {
            id: ServerId::new(record.id),
            name: record.name,
            address: record.url.trim().to_owned(),
            checked_at: from_epoch(record.checked_at),
            updated_at: from_epoch(record.updated_at),
            has_connection_error: record.has_connection_error,
            connection_error: record.connection_error.filter(|e| !e.is_empty()),
        }
    }
}

/// Apply the staleness gate to a server snapshot.
pub fn due_servers(
    servers: impl IntoIterator<Item = Server>,
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<Server> {
    servers
        .into_iter()
        .filter(|s| s.is_due(now, window))
        .collect()
}
