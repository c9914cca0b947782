// ── Subscription reconciler ──
//
// Owns every live change subscription, keyed by data point identity. A
// subscription is bound to the session generation it was created on, so
// a closed or reopened session orphans its subscriptions and they are
// dropped without any endpoint call.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::endpoint::{Connector, EndpointClient};
use crate::error::CoreError;
use crate::model::{DataPoint, DataPointId, ServerId};
use crate::pool::ConnectionPool;

/// An active change-notification registration for one data point.
#[derive(Debug, Clone)]
pub struct LiveSubscription<H> {
    pub server_id: ServerId,
    pub path: String,
    pub handle: H,
    generation: u64,
}

/// Outcome of one subscription reconciliation pass. Ids are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionReport {
    pub subscribed: Vec<DataPointId>,
    /// Removed through an unsubscribe call (successful or not).
    pub unsubscribed: Vec<DataPointId>,
    /// Removed without a call because the owning session is gone.
    pub dropped: Vec<DataPointId>,
    /// Desired, but the owning server has no session yet.
    pub deferred: Vec<DataPointId>,
    /// Subscribe calls that failed and will be retried next pass.
    pub failed: Vec<(DataPointId, String)>,
    /// Calls the endpoint answered with an "already gone" status.
    pub already_absent: Vec<DataPointId>,
    pub retained: usize,
}

impl SubscriptionReport {
    /// Nothing was subscribed, unsubscribed, or dropped.
    pub fn is_noop(&self) -> bool {
        self.subscribed.is_empty() && self.unsubscribed.is_empty() && self.dropped.is_empty()
    }

    fn sort(&mut self) {
        self.subscribed.sort_unstable();
        self.unsubscribed.sort_unstable();
        self.dropped.sort_unstable();
        self.deferred.sort_unstable();
        self.failed.sort_unstable();
        self.already_absent.sort_unstable();
    }
}

/// The set of live subscriptions.
pub struct SubscriptionSet<C: EndpointClient> {
    live: HashMap<DataPointId, LiveSubscription<C::Handle>>,
}

impl<C: EndpointClient> Default for SubscriptionSet<C> {
    fn default() -> Self {
        Self {
            live: HashMap::new(),
        }
    }
}

impl<C: EndpointClient> SubscriptionSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: DataPointId) -> Option<&LiveSubscription<C::Handle>> {
        self.live.get(&id)
    }

    pub fn contains(&self, id: DataPointId) -> bool {
        self.live.contains_key(&id)
    }

    /// Ids of all live subscriptions, sorted.
    pub fn data_point_ids(&self) -> Vec<DataPointId> {
        let mut ids: Vec<_> = self.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Forget subscriptions whose session was closed or replaced since they
    /// were made. No endpoint calls. Returns the dropped ids, sorted.
    pub fn drop_orphans<K>(&mut self, pool: &ConnectionPool<K>) -> Vec<DataPointId>
    where
        K: Connector<Client = C>,
    {
        let mut dropped = Vec::new();
        self.live.retain(|id, sub| {
            let owned = pool
                .session(sub.server_id)
                .is_some_and(|s| s.generation() == sub.generation);
            if !owned {
                debug!(data_point_id = %id, server_id = %sub.server_id, "session gone, dropping subscription");
                dropped.push(*id);
            }
            owned
        });
        dropped.sort_unstable();
        dropped
    }

    /// Bring live subscriptions in line with `points`.
    ///
    /// Only subscribable points are considered. Endpoint errors never
    /// propagate: "already absent" answers are treated as done, anything
    /// else is logged and retried next pass.
    pub async fn reconcile<K>(
        &mut self,
        points: &[DataPoint],
        pool: &ConnectionPool<K>,
    ) -> SubscriptionReport
    where
        K: Connector<Client = C>,
    {
        let mut report = SubscriptionReport {
            dropped: self.drop_orphans(pool),
            ..SubscriptionReport::default()
        };

        let desired: HashMap<DataPointId, &DataPoint> = points
            .iter()
            .filter(|p| p.is_subscribable())
            .map(|p| (p.id, p))
            .collect();

        // Undesired, or moved to another path or server.
        let obsolete: Vec<DataPointId> = self
            .live
            .iter()
            .filter(|(id, sub)| {
                desired
                    .get(*id)
                    .is_none_or(|p| p.path != sub.path || p.server_id != sub.server_id)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in obsolete {
            let Some(sub) = self.live.remove(&id) else {
                continue;
            };
            report.unsubscribed.push(id);
            let Some(session) = pool.session(sub.server_id) else {
                continue;
            };
            match session.unsubscribe(&sub.handle).await {
                Ok(()) => debug!(data_point_id = %id, path = %sub.path, "unsubscribed"),
                Err(e) if e.is_already_absent() => {
                    debug!(data_point_id = %id, path = %sub.path, error = %e, "subscription already gone");
                    report.already_absent.push(id);
                }
                Err(e) => {
                    warn!(data_point_id = %id, path = %sub.path, error = %e, "unsubscribe failed, discarding anyway");
                }
            }
        }

        let mut missing: Vec<&DataPoint> = desired
            .values()
            .copied()
            .filter(|p| !self.live.contains_key(&p.id))
            .collect();
        missing.sort_unstable_by_key(|p| p.id);
        report.retained = desired.len() - missing.len();

        for point in missing {
            let Some(session) = pool.session(point.server_id) else {
                report.deferred.push(point.id);
                continue;
            };
            match session.subscribe(&point.path).await {
                Ok(handle) => {
                    debug!(data_point_id = %point.id, path = %point.path, "subscribed");
                    self.live.insert(
                        point.id,
                        LiveSubscription {
                            server_id: point.server_id,
                            path: point.path.clone(),
                            handle,
                            generation: session.generation(),
                        },
                    );
                    report.subscribed.push(point.id);
                }
                Err(e) if e.is_already_absent() || e.is_unknown_node() => {
                    debug!(data_point_id = %point.id, path = %point.path, error = %e, "endpoint has no such item, skipping");
                    report.already_absent.push(point.id);
                }
                Err(e) => {
                    warn!(data_point_id = %point.id, path = %point.path, error = %e, "subscribe failed");
                    report.failed.push((point.id, e.to_string()));
                }
            }
        }

        if !report.is_noop() {
            info!(
                subscribed = report.subscribed.len(),
                unsubscribed = report.unsubscribed.len(),
                dropped = report.dropped.len(),
                live = self.live.len(),
                "subscriptions reconciled"
            );
        }
        report.sort();
        report
    }

    /// Every subscription must belong to the current session of its server.
    pub fn check_invariants<K>(&self, pool: &ConnectionPool<K>) -> Result<(), CoreError>
    where
        K: Connector<Client = C>,
    {
        for (id, sub) in &self.live {
            match pool.session(sub.server_id) {
                Some(session) if session.generation() == sub.generation => {}
                Some(_) => {
                    return Err(CoreError::Internal(format!(
                        "subscription {id} outlived its session for server {}",
                        sub.server_id
                    )));
                }
                None => {
                    return Err(CoreError::Internal(format!(
                        "subscription {id} has no session for server {}",
                        sub.server_id
                    )));
                }
            }
        }
        Ok(())
    }
}
