// ── Change relay ──
//
// Consumes change notifications from every session and appends them to the
// backend's time-series store. Delivery is at-most-once: failures are
// logged with the offending payload and never retried. The relay holds no
// reference into the pool or subscription maps.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uabridge_api::IngestSample;

use crate::backend::Backend;
use crate::codec::{self, epoch_seconds};
use crate::endpoint::DataChange;

/// What happened to one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Stored,
    /// No value; nothing to store.
    Skipped,
    /// The value has no canonical form.
    Unencodable,
    /// The backend refused or could not be reached.
    Rejected,
}

/// Counters for a relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub stored: u64,
    pub skipped: u64,
    pub unencodable: u64,
    pub rejected: u64,
}

impl RelayStats {
    fn record(&mut self, outcome: RelayOutcome) {
        match outcome {
            RelayOutcome::Stored => self.stored += 1,
            RelayOutcome::Skipped => self.skipped += 1,
            RelayOutcome::Unencodable => self.unencodable += 1,
            RelayOutcome::Rejected => self.rejected += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.stored + self.skipped + self.unencodable + self.rejected
    }
}

/// Encode one notification and forward it to the backend.
pub async fn relay_change<B: Backend>(backend: &B, change: DataChange) -> RelayOutcome {
    let value = match change.value {
        Some(v) if !v.is_null() => v,
        _ => return RelayOutcome::Skipped,
    };

    let encoded = match codec::encode(&value) {
        Ok(s) => s,
        Err(e) => {
            warn!(
                server_id = %change.server_id,
                path = %change.path,
                error = %e,
                value = ?value,
                "cannot encode change, dropping"
            );
            return RelayOutcome::Unencodable;
        }
    };

    let time = epoch_seconds(&change.server_timestamp.unwrap_or_else(Utc::now));
    let sample = IngestSample {
        server_id: change.server_id.get(),
        node_id: change.path,
        time,
        value: encoded,
    };

    match backend.ingest_sample(sample.clone()).await {
        Ok(()) => RelayOutcome::Stored,
        Err(e) => {
            warn!(error = %e, sample = ?sample, "could not store sample");
            RelayOutcome::Rejected
        }
    }
}

/// Long-running consumer of the notification queue.
pub struct ChangeRelay<B> {
    backend: Arc<B>,
    rx: mpsc::Receiver<DataChange>,
    cancel: CancellationToken,
}

impl<B: Backend> ChangeRelay<B> {
    pub fn new(backend: Arc<B>, rx: mpsc::Receiver<DataChange>, cancel: CancellationToken) -> Self {
        Self {
            backend,
            rx,
            cancel,
        }
    }

    /// Relay until cancelled or every sender is gone.
    ///
    /// On cancellation the queue is closed and notifications already in it
    /// are still delivered.
    pub async fn run(mut self) -> RelayStats {
        let mut stats = RelayStats::default();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                change = self.rx.recv() => match change {
                    Some(change) => stats.record(relay_change(&*self.backend, change).await),
                    None => {
                        debug!("notification queue closed");
                        return stats;
                    }
                },
            }
        }

        self.rx.close();
        let mut drained = 0_u64;
        while let Some(change) = self.rx.recv().await {
            stats.record(relay_change(&*self.backend, change).await);
            drained += 1;
        }
        info!(drained, stored = stats.stored, "relay stopped");
        stats
    }
}
