// Time-series ingestion and liveness

use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::IngestSample;

impl BackendClient {
    /// Append one observed value to the time-series store.
    ///
    /// `POST /api/server_manager/influx/store`
    ///
    /// Any non-success status is returned as [`Error::Status`] carrying the
    /// response body; the caller decides whether to log or retry.
    pub async fn ingest(&self, sample: &IngestSample) -> Result<(), Error> {
        let url = self.api_url("server_manager/influx/store")?;
        debug!(server_id = sample.server_id, node_id = %sample.node_id, "ingesting sample");
        self.post(url, sample).await.map(|_| ())
    }

    /// Liveness check.
    ///
    /// `GET /api/status/ping` -- `Ok(true)` only for HTTP 200.
    pub async fn ping(&self) -> Result<bool, Error> {
        let url = self.api_url("status/ping")?;
        let status = self.get_status(url).await?;
        Ok(status == reqwest::StatusCode::OK)
    }
}
