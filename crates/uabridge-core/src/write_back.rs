// ── Write-back scheduler ──
//
// One tick: fetch pending writes, push each value to its endpoint, and
// acknowledge the outcome on the data point record. Items are independent;
// a failed write records its error and leaves the pending value in place.

use chrono::Utc;
use tracing::{debug, info, warn};

use uabridge_api::DataPointPatch;

use crate::backend::Backend;
use crate::codec::{Value, epoch_seconds};
use crate::config::BridgeConfig;
use crate::endpoint::{Connector, EndpointError};
use crate::error::CoreError;
use crate::model::DataPointId;
use crate::pool::ConnectionPool;

/// Outcome of one write-back tick. Ids are in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBackReport {
    pub written: Vec<DataPointId>,
    pub failed: Vec<(DataPointId, String)>,
    /// Owning server has no session; left for a later tick.
    pub skipped: Vec<DataPointId>,
}

impl WriteBackReport {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Run one write-back tick.
///
/// Only the fetch of pending writes can fail the tick; endpoint and
/// acknowledgement failures are recorded or logged per item.
pub async fn tick<K, B>(
    pool: &ConnectionPool<K>,
    backend: &B,
    config: &BridgeConfig,
) -> Result<WriteBackReport, CoreError>
where
    K: Connector,
    B: Backend,
{
    let pending = backend.fetch_pending_writes().await?;
    let mut report = WriteBackReport::default();

    for point in &pending {
        let Some(raw) = point.pending_write() else {
            continue;
        };
        let Some(session) = pool.session(point.server_id) else {
            debug!(data_point_id = %point.id, server_id = %point.server_id, "no session, deferring write");
            report.skipped.push(point.id);
            continue;
        };

        let value = Value::from(raw.clone());
        let result = tokio::time::timeout(config.endpoint_timeout, session.write(&point.path, &value))
            .await
            .unwrap_or_else(|_| Err(EndpointError::timed_out()));

        let patch = match result {
            Ok(()) => {
                info!(data_point_id = %point.id, path = %point.path, "value written");
                report.written.push(point.id);
                DataPointPatch::written()
            }
            Err(e) => {
                let message = e.to_string();
                warn!(data_point_id = %point.id, path = %point.path, error = %message, "write failed");
                report.failed.push((point.id, message.clone()));
                DataPointPatch::write_failed(epoch_seconds(&Utc::now()), message)
            }
        };

        if let Err(e) = backend.patch_data_point(point.id, patch).await {
            warn!(data_point_id = %point.id, error = %e, "failed to acknowledge write");
        }
    }

    Ok(report)
}
