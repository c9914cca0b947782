use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{DataPointId, ServerId, from_epoch};
use uabridge_api::DataPointRecord;

/// An addressable value on a remote endpoint, from the desired-state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub id: DataPointId,
    pub server_id: ServerId,
    /// Protocol address on the remote endpoint (e.g. `ns=2;s=Line1.Temp`).
    pub path: String,
    pub display_name: Option<String>,
    pub tracked: bool,
    pub is_virtual: bool,
    /// Value the operator asked to write, if any.
    pub pending_value: Option<serde_json::Value>,
    pub write_error_at: Option<DateTime<Utc>>,
    pub write_error: Option<String>,
}

impl DataPoint {
    /// Tracked and backed by a real address on the endpoint.
    pub fn is_subscribable(&self) -> bool {
        self.tracked && !self.is_virtual
    }

    /// The value to write, if one is pending and no earlier write failed.
    pub fn pending_write(&self) -> Option<&serde_json::Value> {
        if self.write_error.is_some() {
            return None;
        }
        self.pending_value.as_ref().filter(|v| !v.is_null())
    }
}

impl From<DataPointRecord> for DataPoint {
    fn from(record: DataPointRecord) -> Self {
        Self {
            id: DataPointId::new(record.id),
            server_id: ServerId::new(record.server_id),
            path: record.identifier,
            display_name: record.display_name,
            tracked: record.tracked,
            is_virtual: record.r#virtual,
            pending_value: record.change_value,
            write_error_at: from_epoch(record.change_error_at),
            write_error: record.change_error.filter(|e| !e.is_empty()),
        }
    }
}
