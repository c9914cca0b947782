// ── Bridge ──
//
// The outer loop. Once per cycle: refresh desired servers, reconcile the
// pool, refresh desired data points, reconcile subscriptions, then run the
// write-back scheduler for the rest of the cycle. The change relay runs as
// its own task for the whole lifetime of the bridge.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::config::BridgeConfig;
use crate::endpoint::Connector;
use crate::error::CoreError;
use crate::model::due_servers;
use crate::pool::{ConnectionPool, PoolReport};
use crate::relay::{ChangeRelay, RelayStats};
use crate::subscriptions::{SubscriptionReport, SubscriptionSet};
use crate::write_back;

/// Result of one reconcile cycle. A step whose desired-state fetch failed
/// is `None`; live state is kept as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pool: Option<PoolReport>,
    pub subscriptions: Option<SubscriptionReport>,
}

/// The reconciliation and relay engine.
pub struct Bridge<K: Connector, B: Backend> {
    config: BridgeConfig,
    backend: Arc<B>,
    pool: ConnectionPool<K>,
    subscriptions: SubscriptionSet<K::Client>,
    relay: Option<ChangeRelay<B>>,
    cancel: CancellationToken,
}

impl<K: Connector, B: Backend> Bridge<K, B> {
    pub fn new(config: BridgeConfig, connector: K, backend: Arc<B>) -> Self {
        let (tx, rx) = mpsc::channel(config.notification_capacity.max(1));
        let cancel = CancellationToken::new();
        let relay = ChangeRelay::new(Arc::clone(&backend), rx, cancel.child_token());

        Self {
            config,
            backend,
            pool: ConnectionPool::new(connector, tx),
            subscriptions: SubscriptionSet::new(),
            relay: Some(relay),
            cancel,
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool<K> {
        &self.pool
    }

    pub fn subscriptions(&self) -> &SubscriptionSet<K::Client> {
        &self.subscriptions
    }

    /// One reconcile pass: servers first, then subscriptions.
    ///
    /// Backend and endpoint failures never fail the cycle; only a broken
    /// bookkeeping invariant does.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CoreError> {
        let now = Utc::now();
        let mut report = CycleReport::default();

        match self.backend.fetch_servers().await {
            Ok(servers) => {
                let due = due_servers(servers, now, self.config.staleness_window);
                debug!(due = due.len(), "fetched desired servers");
                report.pool = Some(
                    self.pool
                        .reconcile(&due, &*self.backend, &self.config, now)
                        .await,
                );
            }
            Err(e) => warn!(error = %e, "failed to fetch servers, keeping sessions"),
        }

        match self.backend.fetch_tracked_data_points().await {
            Ok(points) => {
                report.subscriptions = Some(self.subscriptions.reconcile(&points, &self.pool).await);
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch data points, keeping subscriptions");
                self.subscriptions.drop_orphans(&self.pool);
            }
        }

        self.subscriptions.check_invariants(&self.pool)?;

        info!(
            sessions = self.pool.len(),
            subscriptions = self.subscriptions.len(),
            opened = report.pool.as_ref().map_or(0, |r| r.opened.len()),
            failed = report.pool.as_ref().map_or(0, |r| r.failed.len()),
            closed = report.pool.as_ref().map_or(0, |r| r.closed.len()),
            subscribed = report.subscriptions.as_ref().map_or(0, |r| r.subscribed.len()),
            unsubscribed = report.subscriptions.as_ref().map_or(0, |r| r.unsubscribed.len()),
            "cycle reconciled"
        );
        Ok(report)
    }

    /// Run until cancelled, then close every session and stop the relay.
    ///
    /// Returns an error only for a bookkeeping failure; teardown still runs
    /// first.
    pub async fn run(mut self) -> Result<(), CoreError> {
        let relay = self.relay.take().map(|r| tokio::spawn(r.run()));
        info!(
            cycle_secs = self.config.cycle_interval.as_secs(),
            tick_secs = self.config.write_back_interval.as_secs(),
            "bridge started"
        );

        let result = self.run_loop().await;
        if let Err(ref e) = result {
            error!(error = %e, "bridge stopping on internal error");
        }

        self.teardown(relay).await;
        result
    }

    async fn run_loop(&mut self) -> Result<(), CoreError> {
        let cancel = self.cancel.clone();
        let ticks = self.config.ticks_per_cycle();

        'cycles: while !cancel.is_cancelled() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                cycle = self.run_cycle() => { cycle?; }
            }

            for _ in 0..ticks {
                let tick = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'cycles,
                    tick = write_back::tick(&self.pool, &*self.backend, &self.config) => tick,
                };
                match tick {
                    Ok(report) if !report.is_empty() => debug!(
                        written = report.written.len(),
                        failed = report.failed.len(),
                        skipped = report.skipped.len(),
                        "write-back tick"
                    ),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "failed to fetch pending writes"),
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'cycles,
                    _ = tokio::time::sleep(self.config.write_back_interval) => {}
                }
            }
        }

        debug!("bridge loop cancelled");
        Ok(())
    }

    async fn teardown(&mut self, relay: Option<JoinHandle<RelayStats>>) {
        self.pool.shutdown().await;
        self.subscriptions.drop_orphans(&self.pool);
        self.cancel.cancel();

        if let Some(handle) = relay {
            match handle.await {
                Ok(stats) => info!(
                    stored = stats.stored,
                    rejected = stats.rejected,
                    skipped = stats.skipped,
                    "relay finished"
                ),
                Err(e) => warn!(error = %e, "relay task failed"),
            }
        }
        info!("bridge stopped");
    }
}
