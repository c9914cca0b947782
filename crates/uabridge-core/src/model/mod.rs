// ── Domain model ──
//
// Desired-state records as the engine sees them: typed identifiers,
// chrono timestamps, and the eligibility rules (staleness gate,
// subscribable, pending write) applied on every cycle.

mod data_point;
mod ids;
mod server;

pub use data_point::DataPoint;
pub use ids::{DataPointId, ServerId};
pub use server::{Server, due_servers};

use chrono::{DateTime, Utc};

/// Convert backend epoch seconds into a UTC timestamp.
pub(crate) fn from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}
