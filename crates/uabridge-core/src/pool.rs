// ── Connection pool ──
//
// Owns every live `Session`, keyed by server identity. Each reconcile pass
// brings the session map in line with the desired server set: sessions for
// undesired servers are closed, missing ones are opened concurrently, and
// every open attempt is reported back onto the server record.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use uabridge_api::ServerUpdate;

use crate::backend::Backend;
use crate::config::BridgeConfig;
use crate::endpoint::{ChangeSink, Connector, DataChange};
use crate::model::{Server, ServerId};
use crate::session::Session;

/// Outcome of one pool reconciliation pass. Ids are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Sessions opened for servers that had none.
    pub opened: Vec<ServerId>,
    /// Open attempts that failed, with the reported summary.
    pub failed: Vec<(ServerId, String)>,
    /// Sessions closed because their server is no longer desired.
    pub closed: Vec<ServerId>,
    /// Sessions closed because the server address changed; a new open was
    /// attempted in the same pass.
    pub reopened: Vec<ServerId>,
    /// Sessions left untouched.
    pub retained: Vec<ServerId>,
}

impl PoolReport {
    /// No session was opened, closed, or attempted.
    pub fn is_noop(&self) -> bool {
        self.opened.is_empty()
            && self.failed.is_empty()
            && self.closed.is_empty()
            && self.reopened.is_empty()
    }

    fn sort(&mut self) {
        self.opened.sort_unstable();
        self.failed.sort_unstable();
        self.closed.sort_unstable();
        self.reopened.sort_unstable();
        self.retained.sort_unstable();
    }
}

/// The set of live endpoint sessions.
pub struct ConnectionPool<K: Connector> {
    connector: K,
    sessions: HashMap<ServerId, Session<K::Client>>,
    notifications: mpsc::Sender<DataChange>,
    next_generation: u64,
}

impl<K: Connector> ConnectionPool<K> {
    /// Sessions opened by this pool deliver change notifications into
    /// `notifications`.
    pub fn new(connector: K, notifications: mpsc::Sender<DataChange>) -> Self {
        Self {
            connector,
            sessions: HashMap::new(),
            notifications,
            next_generation: 0,
        }
    }

    pub fn session(&self, id: ServerId) -> Option<&Session<K::Client>> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: ServerId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Ids of all live sessions, sorted.
    pub fn server_ids(&self) -> Vec<ServerId> {
        let mut ids: Vec<_> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Bring the session map in line with `desired`.
    ///
    /// `desired` is the already gated set of due servers. Afterwards the
    /// session keys are exactly the desired ids whose open succeeded. Open
    /// attempts are reported to `backend`; report failures are logged only.
    pub async fn reconcile<B: Backend>(
        &mut self,
        desired: &[Server],
        backend: &B,
        config: &BridgeConfig,
        now: DateTime<Utc>,
    ) -> PoolReport {
        let mut report = PoolReport::default();
        let wanted: HashMap<ServerId, &Server> = desired.iter().map(|s| (s.id, s)).collect();

        // Close sessions that are undesired or point at a moved endpoint.
        let stale: Vec<ServerId> = self
            .sessions
            .iter()
            .filter(|(id, session)| {
                wanted
                    .get(*id)
                    .is_none_or(|server| server.address != session.address())
            })
            .map(|(id, _)| *id)
            .collect();

        let mut closing = Vec::with_capacity(stale.len());
        for id in stale {
            let Some(session) = self.sessions.remove(&id) else {
                continue;
            };
            if let Some(server) = wanted.get(&id) {
                info!(
                    server_id = %id,
                    from = %session.address(),
                    to = %server.address,
                    "server address changed, reopening session"
                );
                report.reopened.push(id);
            } else {
                debug!(server_id = %id, "server no longer desired, closing session");
                report.closed.push(id);
            }
            closing.push(session.close());
        }
        join_all(closing).await;

        // Open sessions for desired servers without one.
        let mut seen = HashSet::new();
        let to_open: Vec<&Server> = desired
            .iter()
            .filter(|s| seen.insert(s.id))
            .filter(|s| {
                let live = self.sessions.contains_key(&s.id);
                if live {
                    report.retained.push(s.id);
                }
                !live
            })
            .collect();

        let attempts = join_all(to_open.into_iter().map(|server| {
            let sink = ChangeSink::new(server.id, self.notifications.clone());
            let connector = &self.connector;
            async move { (server, Session::open(connector, server, config, sink).await) }
        }))
        .await;

        let checked_at = report_timestamp(now, config);
        for (server, result) in attempts {
            let update = match result {
                Ok(mut session) => {
                    self.next_generation += 1;
                    session.generation = self.next_generation;
                    self.sessions.insert(server.id, session);
                    if !report.reopened.contains(&server.id) {
                        report.opened.push(server.id);
                    }
                    info!(server_id = %server.id, server = %server.label(), "connected");
                    ServerUpdate::connected(checked_at)
                }
                Err(e) => {
                    let summary = e.summary();
                    warn!(
                        server_id = %server.id,
                        address = %server.address,
                        error = %e,
                        "failed to open session"
                    );
                    report.failed.push((server.id, summary.clone()));
                    ServerUpdate::failed(checked_at, summary)
                }
            };
            if let Err(e) = backend.update_server_status(server.id, update).await {
                warn!(server_id = %server.id, error = %e, "failed to report connection status");
            }
        }

        report.sort();
        report
    }

    /// Close every session. Failures are logged; all sessions are attempted.
    pub async fn shutdown(&mut self) -> usize {
        let sessions: Vec<_> = self.sessions.drain().map(|(_, s)| s).collect();
        let count = sessions.len();
        join_all(sessions.into_iter().map(Session::close)).await;
        if count > 0 {
            info!(count, "closed all sessions");
        }
        count
    }
}

/// `checked_at` sent with a connection report: now plus the configured
/// lead, so the record still passes the staleness gate after the backend
/// bumps `updated_at` on save.
fn report_timestamp(now: DateTime<Utc>, config: &BridgeConfig) -> i64 {
    let lead = i64::try_from(config.checked_at_lead.as_secs()).unwrap_or(i64::MAX);
    crate::codec::epoch_seconds(&now).saturating_add(lead)
}
