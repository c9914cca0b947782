// ── Backend capability ──
//
// What the engine needs from the management backend. `BackendClient`
// implements it over HTTP; tests substitute an in-memory fake.

use std::future::Future;

use uabridge_api::{BackendClient, DataPointPatch, IngestSample, ServerUpdate};

use crate::error::CoreError;
use crate::model::{DataPoint, DataPointId, Server, ServerId};

/// Desired-state source and reporting sink.
pub trait Backend: Send + Sync + 'static {
    /// Full server snapshot, before the staleness gate.
    fn fetch_servers(&self) -> impl Future<Output = Result<Vec<Server>, CoreError>> + Send;

    /// Tracked, non-virtual data points.
    fn fetch_tracked_data_points(
        &self,
    ) -> impl Future<Output = Result<Vec<DataPoint>, CoreError>> + Send;

    /// Data points with a pending write and no recorded write error.
    fn fetch_pending_writes(&self)
    -> impl Future<Output = Result<Vec<DataPoint>, CoreError>> + Send;

    fn update_server_status(
        &self,
        id: ServerId,
        update: ServerUpdate,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn patch_data_point(
        &self,
        id: DataPointId,
        patch: DataPointPatch,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Append one sample to the time-series store.
    fn ingest_sample(
        &self,
        sample: IngestSample,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Liveness check.
    fn health_check(&self) -> impl Future<Output = Result<bool, CoreError>> + Send;
}

impl Backend for BackendClient {
    async fn fetch_servers(&self) -> Result<Vec<Server>, CoreError> {
        let records = self.list_servers().await?;
        Ok(records.into_iter().map(Server::from).collect())
    }

    async fn fetch_tracked_data_points(&self) -> Result<Vec<DataPoint>, CoreError> {
        let records = self.list_tracked_data_points().await?;
        Ok(records.into_iter().map(DataPoint::from).collect())
    }

    async fn fetch_pending_writes(&self) -> Result<Vec<DataPoint>, CoreError> {
        let records = self.list_pending_writes().await?;
        Ok(records.into_iter().map(DataPoint::from).collect())
    }

    async fn update_server_status(
        &self,
        id: ServerId,
        update: ServerUpdate,
    ) -> Result<(), CoreError> {
        Ok(self.update_server(id.get(), &update).await?)
    }

    async fn patch_data_point(
        &self,
        id: DataPointId,
        patch: DataPointPatch,
    ) -> Result<(), CoreError> {
        Ok(self.update_data_point(id.get(), &patch).await?)
    }

    async fn ingest_sample(&self, sample: IngestSample) -> Result<(), CoreError> {
        Ok(self.ingest(&sample).await?)
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(self.ping().await?)
    }
}
