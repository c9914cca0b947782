//! uabridge-core: Reconciliation and relay engine between remote industrial
//! endpoints and the uabridge management backend.
//!
//! The `Bridge` keeps a pool of endpoint sessions and their change
//! subscriptions in line with the backend's desired state, relays change
//! notifications into the backend's time-series store, and pushes pending
//! writes back to the endpoints. The endpoint protocol itself is supplied
//! through the `Connector` / `EndpointClient` traits.
//!
//! Shutdown goes through the bridge's cancellation token. Wiring it to
//! Ctrl-C:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use uabridge_core::{Backend, Bridge, BridgeConfig, Connector, CoreError};
//!
//! async fn serve<K: Connector, B: Backend>(connector: K, backend: Arc<B>) -> Result<(), CoreError> {
//!     let bridge = Bridge::new(BridgeConfig::default(), connector, backend);
//!     let token = bridge.cancellation_token();
//!     tokio::spawn(async move {
//!         if tokio::signal::ctrl_c().await.is_ok() {
//!             token.cancel();
//!         }
//!     });
//!     // returns once the current step is abandoned and every session is closed
//!     bridge.run().await
//! }
//! ```

pub mod backend;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod pool;
pub mod relay;
pub mod session;
pub mod subscriptions;
pub mod write_back;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::Backend;
pub use bridge::{Bridge, CycleReport};
pub use codec::{Canonical, CodecError, Record, Value};
pub use config::BridgeConfig;
pub use endpoint::{
    ChangeSink, Connector, DataChange, EndpointClient, EndpointError, EndpointErrorKind,
    StatusCode,
};
pub use error::CoreError;
pub use model::{DataPoint, DataPointId, Server, ServerId, due_servers};
pub use pool::{ConnectionPool, PoolReport};
pub use relay::{ChangeRelay, RelayOutcome, RelayStats};
pub use session::Session;
pub use subscriptions::{LiveSubscription, SubscriptionReport, SubscriptionSet};
pub use write_back::WriteBackReport;
