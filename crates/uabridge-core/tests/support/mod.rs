// In-memory doubles for the endpoint and backend capabilities.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use uabridge_api::{DataPointPatch, IngestSample, ServerUpdate};
use uabridge_core::{
    Backend, ChangeSink, Connector, CoreError, DataPoint, DataPointId, EndpointClient,
    EndpointError, Server, ServerId, StatusCode, Value,
};

// ── Failure injection ───────────────────────────────────────────────

/// A failure to inject; turned into a fresh `EndpointError` per call.
#[derive(Debug, Clone)]
pub enum Fail {
    Status(StatusCode),
    Cancelled,
    Io,
    Protocol(String),
    /// Never answers (until the caller's deadline).
    Hang,
}

impl Fail {
    fn into_error(self) -> EndpointError {
        match self {
            Self::Status(code) => EndpointError::Status(code),
            Self::Cancelled | Self::Hang => EndpointError::Cancelled,
            Self::Io => EndpointError::Io(io::Error::from(io::ErrorKind::ConnectionRefused)),
            Self::Protocol(msg) => EndpointError::Protocol(msg),
        }
    }

    async fn apply(fail: Option<Self>) -> Result<(), EndpointError> {
        match fail {
            None => Ok(()),
            Some(Self::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EndpointError::Cancelled)
            }
            Some(other) => Err(other.into_error()),
        }
    }
}

// ── Fake endpoint ───────────────────────────────────────────────────

/// One recorded endpoint call, tagged with the endpoint address.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(String),
    LoadTypes(String),
    CreateSubscription(String),
    Subscribe(String, String),
    Unsubscribe(String, String),
    Read(String, String),
    Write(String, String, Value),
    Disconnect(String),
}

impl Call {
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnect(_))
    }

    pub fn is_subscribe(&self) -> bool {
        matches!(self, Self::Subscribe(..))
    }

    pub fn is_unsubscribe(&self) -> bool {
        matches!(self, Self::Unsubscribe(..))
    }
}

#[derive(Default)]
struct EndpointState {
    calls: Vec<Call>,
    connect_failures: HashMap<String, Fail>,
    load_failures: HashMap<String, Fail>,
    disconnect_failures: HashMap<String, Fail>,
    subscribe_failures: HashMap<String, Fail>,
    unsubscribe_failures: HashMap<String, Fail>,
    write_failures: HashMap<String, Fail>,
    values: HashMap<String, Value>,
    sinks: HashMap<String, ChangeSink>,
    handles: HashMap<u32, String>,
    next_handle: u32,
}

/// Connector over an in-memory endpoint fleet. Clones share state.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<EndpointState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_connect(&self, address: &str, fail: Fail) {
        self.state.lock().unwrap().connect_failures.insert(address.into(), fail);
    }

    pub fn heal_connect(&self, address: &str) {
        self.state.lock().unwrap().connect_failures.remove(address);
    }

    pub fn fail_load_types(&self, address: &str, fail: Fail) {
        self.state.lock().unwrap().load_failures.insert(address.into(), fail);
    }

    pub fn fail_disconnect(&self, address: &str, fail: Fail) {
        self.state.lock().unwrap().disconnect_failures.insert(address.into(), fail);
    }

    pub fn fail_subscribe(&self, path: &str, fail: Fail) {
        self.state.lock().unwrap().subscribe_failures.insert(path.into(), fail);
    }

    pub fn heal_subscribe(&self, path: &str) {
        self.state.lock().unwrap().subscribe_failures.remove(path);
    }

    pub fn fail_unsubscribe(&self, path: &str, fail: Fail) {
        self.state.lock().unwrap().unsubscribe_failures.insert(path.into(), fail);
    }

    pub fn fail_write(&self, path: &str, fail: Fail) {
        self.state.lock().unwrap().write_failures.insert(path.into(), fail);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Value last written to `path` on any endpoint.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().values.get(path).cloned()
    }

    /// Notification sink registered by the session at `address`.
    pub fn sink(&self, address: &str) -> Option<ChangeSink> {
        self.state.lock().unwrap().sinks.get(address).cloned()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub struct FakeClient {
    address: String,
    endpoint: FakeConnector,
}

impl FakeClient {
    fn failure(&self, pick: impl FnOnce(&EndpointState) -> Option<Fail>) -> Option<Fail> {
        pick(&self.endpoint.state.lock().unwrap())
    }
}

impl Connector for FakeConnector {
    type Client = FakeClient;

    async fn connect(&self, address: &str) -> Result<FakeClient, EndpointError> {
        self.record(Call::Connect(address.into()));
        let fail = self.state.lock().unwrap().connect_failures.get(address).cloned();
        Fail::apply(fail).await?;
        Ok(FakeClient {
            address: address.into(),
            endpoint: self.clone(),
        })
    }
}

impl EndpointClient for FakeClient {
    type Handle = u32;

    async fn load_type_definitions(&self) -> Result<(), EndpointError> {
        self.endpoint.record(Call::LoadTypes(self.address.clone()));
        let fail = self.failure(|s| s.load_failures.get(&self.address).cloned());
        Fail::apply(fail).await
    }

    async fn create_subscription(
        &self,
        _publishing_interval: Duration,
        sink: ChangeSink,
    ) -> Result<(), EndpointError> {
        self.endpoint
            .record(Call::CreateSubscription(self.address.clone()));
        self.endpoint
            .state
            .lock()
            .unwrap()
            .sinks
            .insert(self.address.clone(), sink);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Value, EndpointError> {
        self.endpoint
            .record(Call::Read(self.address.clone(), path.into()));
        Ok(self.endpoint.value(path).unwrap_or_default())
    }

    async fn write(&self, path: &str, value: &Value) -> Result<(), EndpointError> {
        self.endpoint.record(Call::Write(
            self.address.clone(),
            path.into(),
            value.clone(),
        ));
        let fail = self.failure(|s| s.write_failures.get(path).cloned());
        Fail::apply(fail).await?;
        self.endpoint
            .state
            .lock()
            .unwrap()
            .values
            .insert(path.into(), value.clone());
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<u32, EndpointError> {
        self.endpoint
            .record(Call::Subscribe(self.address.clone(), path.into()));
        let fail = self.failure(|s| s.subscribe_failures.get(path).cloned());
        Fail::apply(fail).await?;
        let mut state = self.endpoint.state.lock().unwrap();
        state.next_handle += 1;
        let handle = state.next_handle;
        state.handles.insert(handle, path.into());
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &u32) -> Result<(), EndpointError> {
        let path = self
            .endpoint
            .state
            .lock()
            .unwrap()
            .handles
            .remove(handle)
            .unwrap_or_default();
        self.endpoint
            .record(Call::Unsubscribe(self.address.clone(), path.clone()));
        let fail = self.failure(|s| s.unsubscribe_failures.get(&path).cloned());
        Fail::apply(fail).await
    }

    async fn disconnect(&self) -> Result<(), EndpointError> {
        self.endpoint
            .record(Call::Disconnect(self.address.clone()));
        let fail = self.failure(|s| s.disconnect_failures.get(&self.address).cloned());
        Fail::apply(fail).await
    }
}

// ── Fake backend ────────────────────────────────────────────────────

#[derive(Default)]
struct BackendState {
    servers: Vec<Server>,
    data_points: Vec<DataPoint>,
    server_updates: Vec<(ServerId, ServerUpdate)>,
    patches: Vec<(DataPointId, DataPointPatch)>,
    samples: Vec<IngestSample>,
    fail_servers: bool,
    fail_data_points: bool,
    fail_ingest: bool,
    server_fetches: usize,
    pending_fetches: usize,
}

/// Backend holding desired state in memory and recording every report.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_servers(&self, servers: Vec<Server>) {
        self.state.lock().unwrap().servers = servers;
    }

    pub fn set_data_points(&self, points: Vec<DataPoint>) {
        self.state.lock().unwrap().data_points = points;
    }

    pub fn fail_servers(&self, fail: bool) {
        self.state.lock().unwrap().fail_servers = fail;
    }

    pub fn fail_data_points(&self, fail: bool) {
        self.state.lock().unwrap().fail_data_points = fail;
    }

    pub fn fail_ingest(&self, fail: bool) {
        self.state.lock().unwrap().fail_ingest = fail;
    }

    pub fn data_point(&self, id: i64) -> Option<DataPoint> {
        self.state
            .lock()
            .unwrap()
            .data_points
            .iter()
            .find(|p| p.id == DataPointId::new(id))
            .cloned()
    }

    pub fn server_updates(&self) -> Vec<(ServerId, ServerUpdate)> {
        self.state.lock().unwrap().server_updates.clone()
    }

    pub fn patches(&self) -> Vec<(DataPointId, DataPointPatch)> {
        self.state.lock().unwrap().patches.clone()
    }

    pub fn samples(&self) -> Vec<IngestSample> {
        self.state.lock().unwrap().samples.clone()
    }

    pub fn server_fetches(&self) -> usize {
        self.state.lock().unwrap().server_fetches
    }

    pub fn pending_fetches(&self) -> usize {
        self.state.lock().unwrap().pending_fetches
    }
}

fn unavailable() -> CoreError {
    CoreError::BackendUnavailable {
        reason: "connection refused".into(),
    }
}

impl Backend for FakeBackend {
    async fn fetch_servers(&self) -> Result<Vec<Server>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.server_fetches += 1;
        if state.fail_servers {
            return Err(unavailable());
        }
        Ok(state.servers.clone())
    }

    async fn fetch_tracked_data_points(&self) -> Result<Vec<DataPoint>, CoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_data_points {
            return Err(unavailable());
        }
        Ok(state
            .data_points
            .iter()
            .filter(|p| p.is_subscribable())
            .cloned()
            .collect())
    }

    async fn fetch_pending_writes(&self) -> Result<Vec<DataPoint>, CoreError> {
        let mut state = self.state.lock().unwrap();
        state.pending_fetches += 1;
        if state.fail_data_points {
            return Err(unavailable());
        }
        Ok(state
            .data_points
            .iter()
            .filter(|p| p.is_subscribable() && p.pending_write().is_some())
            .cloned()
            .collect())
    }

    async fn update_server_status(
        &self,
        id: ServerId,
        update: ServerUpdate,
    ) -> Result<(), CoreError> {
        self.state.lock().unwrap().server_updates.push((id, update));
        Ok(())
    }

    async fn patch_data_point(
        &self,
        id: DataPointId,
        patch: DataPointPatch,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(point) = state.data_points.iter_mut().find(|p| p.id == id) {
            if let Some(value) = patch.change_value.clone() {
                point.pending_value = value;
            }
            if let Some(at) = patch.change_error_at {
                point.write_error_at = at.and_then(|s| DateTime::from_timestamp(s, 0));
            }
            if let Some(error) = patch.change_error.clone() {
                point.write_error = error;
            }
        }
        state.patches.push((id, patch));
        Ok(())
    }

    async fn ingest_sample(&self, sample: IngestSample) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ingest {
            return Err(CoreError::Backend {
                message: "HTTP 500: store unavailable".into(),
                status: Some(500),
            });
        }
        state.samples.push(sample);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, CoreError> {
        Ok(true)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn address(id: i64) -> String {
    format!("opc.tcp://plc-{id}:4840")
}

/// A server that passes the staleness gate at `now`.
pub fn due_server(id: i64, now: DateTime<Utc>) -> Server {
    Server {
        id: ServerId::new(id),
        name: Some(format!("PLC {id}")),
        address: address(id),
        checked_at: Some(now - TimeDelta::seconds(10)),
        updated_at: Some(now - TimeDelta::seconds(20)),
        has_connection_error: false,
        connection_error: None,
    }
}

/// A server the backend stopped refreshing: last check is ten minutes old.
pub fn stale_server(id: i64, now: DateTime<Utc>) -> Server {
    Server {
        checked_at: Some(now - TimeDelta::minutes(10)),
        updated_at: Some(now - TimeDelta::minutes(20)),
        ..due_server(id, now)
    }
}

pub fn data_point(id: i64, server_id: i64, path: &str) -> DataPoint {
    DataPoint {
        id: DataPointId::new(id),
        server_id: ServerId::new(server_id),
        path: path.into(),
        display_name: None,
        tracked: true,
        is_virtual: false,
        pending_value: None,
        write_error_at: None,
        write_error: None,
    }
}

pub fn ids<T: From<i64>>(raw: &[i64]) -> Vec<T> {
    raw.iter().copied().map(T::from).collect()
}
