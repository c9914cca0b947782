// ── Engine configuration ──
//
// Timing knobs for the bridge loop. Pure data; the config crate builds one
// of these from files and environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime settings for [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Period of the outer reconcile cycle.
    pub cycle_interval: Duration,
    /// Period of the write-back scheduler inside one cycle.
    pub write_back_interval: Duration,
    /// Servers whose last check is older than this are not connected.
    pub staleness_window: Duration,
    /// Offset added to "now" when reporting `checked_at`, so the report
    /// still counts as fresh at the start of the next cycle.
    pub checked_at_lead: Duration,
    /// Upper bound for opening a session and for a single write.
    pub endpoint_timeout: Duration,
    /// Publishing interval requested for each change subscription.
    pub publishing_interval: Duration,
    /// Capacity of the notification queue between endpoints and the relay.
    pub notification_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(60),
            write_back_interval: Duration::from_secs(5),
            staleness_window: Duration::from_secs(300),
            checked_at_lead: Duration::from_secs(5),
            endpoint_timeout: Duration::from_secs(10),
            publishing_interval: Duration::from_millis(1000),
            notification_capacity: 1024,
        }
    }
}

impl BridgeConfig {
    /// Number of write-back ticks that make up one cycle (at least one).
    pub fn ticks_per_cycle(&self) -> u32 {
        let tick = self.write_back_interval.as_millis();
        let cycle = self.cycle_interval.as_millis();
        let ticks = cycle
            .saturating_add(tick / 2)
            .checked_div(tick)
            .unwrap_or(1);
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }
}
