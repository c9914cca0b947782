// Backend wire types
//
// Records as the backend serves them. Timestamps are integer epoch seconds,
// flags arrive either as JSON booleans or as 0/1 integers depending on the
// backend's column type, and most descriptive fields are optional.

use serde::{Deserialize, Deserializer, Serialize};

// ── Server ───────────────────────────────────────────────────────────

/// A remote endpoint the backend wants the bridge to manage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: i64,
    /// Endpoint address, e.g. `opc.tcp://plc-1:4840`.
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort: Option<i64>,
    #[serde(default)]
    pub root_node: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub scan_required: bool,
    /// Last time the bridge (or a scanner) reported on this server.
    #[serde(default)]
    pub checked_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub created_by: Option<i64>,
    #[serde(default)]
    pub updated_by: Option<i64>,
    #[serde(default, deserialize_with = "flag")]
    pub has_connection_error: bool,
    #[serde(default)]
    pub connection_error: Option<String>,
}

/// Body of `PATCH /api/server_manager/server/update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerUpdate {
    pub checked_at: i64,
    /// Sent as `0`/`1`, matching the backend's column type.
    pub has_connection_error: u8,
    pub connection_error: String,
}

impl ServerUpdate {
    /// The server was reached; clears any previous error.
    pub fn connected(checked_at: i64) -> Self {
        Self {
            checked_at,
            has_connection_error: 0,
            connection_error: String::new(),
        }
    }

    /// The connection attempt failed with the given summary.
    pub fn failed(checked_at: i64, error: impl Into<String>) -> Self {
        Self {
            checked_at,
            has_connection_error: 1,
            connection_error: error.into(),
        }
    }
}

// ── Data point ───────────────────────────────────────────────────────

/// An addressable value on a remote endpoint (the backend calls it a node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPointRecord {
    pub id: i64,
    pub server_id: i64,
    /// Protocol address of the value, e.g. `ns=2;s=Line1.Temperature`.
    pub identifier: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Human-readable browse path.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub readable: bool,
    #[serde(default, deserialize_with = "flag")]
    pub writable: bool,
    #[serde(default, deserialize_with = "flag")]
    pub tracked: bool,
    #[serde(default, rename = "virtual", deserialize_with = "flag")]
    pub r#virtual: bool,
    #[serde(default)]
    pub parent_identifier: Option<String>,
    /// Value the operator wants written to the endpoint.
    #[serde(default)]
    pub change_value: Option<serde_json::Value>,
    #[serde(default)]
    pub change_error_at: Option<i64>,
    #[serde(default)]
    pub change_error: Option<String>,
    #[serde(default)]
    pub checked_at: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// Partial update for `PATCH /api/server_manager/node/update`.
///
/// Outer `None` leaves a field untouched; `Some(None)` sends an explicit
/// `null` to clear it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataPointPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_value: Option<Option<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_error_at: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_error: Option<Option<String>>,
}

impl DataPointPatch {
    /// The pending value reached the endpoint: clear value and error state.
    pub fn written() -> Self {
        Self {
            change_value: Some(None),
            change_error_at: Some(None),
            change_error: Some(None),
        }
    }

    /// The write failed: record why and when, keep the pending value.
    pub fn write_failed(at: i64, error: impl Into<String>) -> Self {
        Self {
            change_value: None,
            change_error_at: Some(Some(at)),
            change_error: Some(Some(error.into())),
        }
    }
}

// ── Time series ──────────────────────────────────────────────────────

/// One observed value for `POST /api/server_manager/influx/store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSample {
    pub server_id: i64,
    /// Protocol address of the data point that changed.
    pub node_id: String,
    /// Epoch seconds.
    pub time: i64,
    /// JSON text of the canonical value.
    pub value: String,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Accept `true`/`false`, `0`/`1`, `"0"`/`"1"` and `null` (false).
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Flag::Bool(b)) => Ok(b),
        Some(Flag::Int(i)) => Ok(i != 0),
        Some(Flag::Text(s)) => match s.trim() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(serde::de::Error::custom(format!("invalid flag value: {other}"))),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flags_accept_integers_and_booleans() {
        let record: DataPointRecord = serde_json::from_value(json!({
            "id": 7,
            "server_id": 1,
            "identifier": "ns=2;s=Temp",
            "tracked": 1,
            "virtual": false,
            "readable": "1",
            "writable": null
        }))
        .unwrap();

        assert!(record.tracked);
        assert!(!record.r#virtual);
        assert!(record.readable);
        assert!(!record.writable);
        assert_eq!(record.change_value, None);
    }

    #[test]
    fn written_patch_sends_explicit_nulls() {
        let body = serde_json::to_value(DataPointPatch::written()).unwrap();
        assert_eq!(
            body,
            json!({ "change_value": null, "change_error_at": null, "change_error": null })
        );
    }

    #[test]
    fn failed_patch_leaves_value_untouched() {
        let body = serde_json::to_value(DataPointPatch::write_failed(1_700_000_000, "timeout"))
            .unwrap();
        assert_eq!(
            body,
            json!({ "change_error_at": 1_700_000_000, "change_error": "timeout" })
        );
    }

    #[test]
    fn server_update_encodes_flag_as_integer() {
        let body = serde_json::to_value(ServerUpdate::failed(10, "OSError")).unwrap();
        assert_eq!(
            body,
            json!({ "checked_at": 10, "has_connection_error": 1, "connection_error": "OSError" })
        );
    }
}
