// uabridge-api: Async Rust client for the uabridge management backend.
//
// The backend holds the desired state (servers and data points to track),
// accepts write-back acknowledgements, and ingests observed values into its
// time-series store. Every call carries the bearer credential configured in
// `TransportConfig`.

pub mod client;
pub mod data_points;
pub mod error;
pub mod ingest;
pub mod models;
pub mod servers;
pub mod transport;

pub use client::BackendClient;
pub use error::Error;
pub use models::{DataPointPatch, DataPointRecord, IngestSample, ServerRecord, ServerUpdate};
pub use transport::{TlsMode, TransportConfig};
