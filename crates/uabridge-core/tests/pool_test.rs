#![allow(clippy::unwrap_used)]
// Integration tests for `ConnectionPool` against the in-memory doubles.

mod support;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;

use uabridge_core::codec::Canonical;
use uabridge_core::{BridgeConfig, ConnectionPool, DataChange, ServerId, StatusCode, Value};

use support::{Call, Fail, FakeBackend, FakeConnector, address, due_server, ids};

fn pool(connector: &FakeConnector) -> (ConnectionPool<FakeConnector>, mpsc::Receiver<DataChange>) {
    let (tx, rx) = mpsc::channel(16);
    (ConnectionPool::new(connector.clone(), tx), rx)
}

// ── Opening ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sessions_match_desired_set() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();

    let desired = vec![due_server(1, now), due_server(2, now)];
    let report = pool.reconcile(&desired, &backend, &config, now).await;

    assert_eq!(report.opened, ids::<ServerId>(&[1, 2]));
    assert_eq!(pool.server_ids(), ids::<ServerId>(&[1, 2]));
    assert_eq!(connector.count(Call::is_connect), 2);

    // each open runs connect, type loading, and subscription setup
    let calls = connector.calls();
    for id in [1, 2] {
        assert!(calls.contains(&Call::LoadTypes(address(id))));
        assert!(calls.contains(&Call::CreateSubscription(address(id))));
    }

    let expected_checked_at = now.timestamp() + 5;
    let updates = backend.server_updates();
    assert_eq!(updates.len(), 2);
    for (_, update) in updates {
        assert_eq!(update.has_connection_error, 0);
        assert_eq!(update.connection_error, "");
        assert!((update.checked_at - expected_checked_at).abs() <= 1);
    }
}

#[tokio::test]
async fn test_failed_open_is_reported_and_retried() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();
    let desired = vec![due_server(1, now)];

    connector.fail_connect(&address(1), Fail::Io);
    let report = pool.reconcile(&desired, &backend, &config, now).await;

    assert!(pool.is_empty());
    assert_eq!(report.failed, vec![(ServerId::new(1), "OSError".to_string())]);
    let (id, update) = backend.server_updates().pop().unwrap();
    assert_eq!(id, ServerId::new(1));
    assert_eq!(update.has_connection_error, 1);
    assert_eq!(update.connection_error, "OSError");

    connector.heal_connect(&address(1));
    let report = pool.reconcile(&desired, &backend, &config, now).await;

    assert_eq!(report.opened, ids::<ServerId>(&[1]));
    let (_, update) = backend.server_updates().pop().unwrap();
    assert_eq!(update.has_connection_error, 0);
    assert_eq!(update.connection_error, "");
}

#[tokio::test]
async fn test_failure_after_connect_disconnects_half_open_client() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let now = Utc::now();

    connector.fail_load_types(&address(3), Fail::Status(StatusCode::BAD_NODE_ID_UNKNOWN));
    let report = pool
        .reconcile(&[due_server(3, now)], &backend, &BridgeConfig::default(), now)
        .await;

    assert!(pool.is_empty());
    assert_eq!(
        report.failed,
        vec![(ServerId::new(3), "StatusCodeError(BadNodeIdUnknown)".to_string())]
    );
    assert!(connector.calls().contains(&Call::Disconnect(address(3))));
    assert!(!connector.calls().contains(&Call::CreateSubscription(address(3))));
}

#[tokio::test(start_paused = true)]
async fn test_hanging_setup_after_connect_disconnects_half_open_client() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let now = Utc::now();

    connector.fail_load_types(&address(1), Fail::Hang);
    let report = pool
        .reconcile(&[due_server(1, now)], &backend, &BridgeConfig::default(), now)
        .await;

    assert!(pool.is_empty());
    assert_eq!(
        report.failed,
        vec![(ServerId::new(1), "StatusCodeError(BadTimeout)".to_string())]
    );
    assert_eq!(
        connector.calls(),
        vec![
            Call::Connect(address(1)),
            Call::LoadTypes(address(1)),
            Call::Disconnect(address(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_reported_as_bad_timeout() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let now = Utc::now();

    connector.fail_connect(&address(1), Fail::Hang);
    let report = pool
        .reconcile(&[due_server(1, now)], &backend, &BridgeConfig::default(), now)
        .await;

    assert!(pool.is_empty());
    assert_eq!(
        report.failed,
        vec![(ServerId::new(1), "StatusCodeError(BadTimeout)".to_string())]
    );
}

#[tokio::test]
async fn test_one_failure_does_not_block_other_servers() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let now = Utc::now();

    connector.fail_connect(&address(2), Fail::Cancelled);
    let desired = vec![due_server(1, now), due_server(2, now), due_server(3, now)];
    let report = pool
        .reconcile(&desired, &backend, &BridgeConfig::default(), now)
        .await;

    assert_eq!(pool.server_ids(), ids::<ServerId>(&[1, 3]));
    assert_eq!(report.failed, vec![(ServerId::new(2), "CancelledError".to_string())]);
    assert_eq!(backend.server_updates().len(), 3);
}

// ── Closing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_undesired_server_is_closed() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();

    pool.reconcile(&[due_server(1, now), due_server(2, now)], &backend, &config, now)
        .await;
    let report = pool.reconcile(&[due_server(1, now)], &backend, &config, now).await;

    assert_eq!(report.closed, ids::<ServerId>(&[2]));
    assert_eq!(report.retained, ids::<ServerId>(&[1]));
    assert_eq!(pool.server_ids(), ids::<ServerId>(&[1]));
    assert_eq!(connector.calls().last(), Some(&Call::Disconnect(address(2))));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();
    let desired = vec![due_server(1, now), due_server(2, now)];

    pool.reconcile(&desired, &backend, &config, now).await;
    connector.clear_calls();
    let updates_before = backend.server_updates().len();

    let report = pool.reconcile(&desired, &backend, &config, now).await;

    assert!(report.is_noop());
    assert_eq!(report.retained, ids::<ServerId>(&[1, 2]));
    assert!(connector.calls().is_empty());
    assert_eq!(backend.server_updates().len(), updates_before);
}

#[tokio::test]
async fn test_address_change_reopens_session() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();

    pool.reconcile(&[due_server(1, now)], &backend, &config, now).await;
    let first_generation = pool.session(ServerId::new(1)).unwrap().generation();

    let mut moved = due_server(1, now);
    moved.address = "opc.tcp://plc-1-new:4840".into();
    let report = pool.reconcile(&[moved], &backend, &config, now).await;

    assert_eq!(report.reopened, ids::<ServerId>(&[1]));
    assert!(report.opened.is_empty());
    let session = pool.session(ServerId::new(1)).unwrap();
    assert_eq!(session.address(), "opc.tcp://plc-1-new:4840");
    assert!(session.generation() > first_generation);

    let calls = connector.calls();
    assert!(calls.contains(&Call::Disconnect(address(1))));
    assert!(calls.contains(&Call::Connect("opc.tcp://plc-1-new:4840".into())));
}

#[tokio::test]
async fn test_shutdown_closes_every_session_despite_errors() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let now = Utc::now();
    let desired = vec![due_server(1, now), due_server(2, now), due_server(3, now)];

    pool.reconcile(&desired, &backend, &BridgeConfig::default(), now)
        .await;
    connector.fail_disconnect(&address(1), Fail::Io);
    connector.fail_disconnect(&address(2), Fail::Protocol("session gone".into()));

    let closed = pool.shutdown().await;

    assert_eq!(closed, 3);
    assert!(pool.is_empty());
    assert_eq!(connector.count(Call::is_disconnect), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_does_not_wait_on_hanging_disconnect() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, _rx) = pool(&connector);
    let config = BridgeConfig::default();
    let now = Utc::now();

    pool.reconcile(&[due_server(1, now), due_server(2, now)], &backend, &config, now)
        .await;
    connector.fail_disconnect(&address(1), Fail::Hang);

    let started = Instant::now();
    let closed = pool.shutdown().await;

    assert_eq!(closed, 2);
    assert!(started.elapsed() < config.endpoint_timeout * 2);
    assert_eq!(connector.count(Call::is_disconnect), 2);
}

// ── Notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn test_session_sink_tags_notifications_with_server() {
    let connector = FakeConnector::new();
    let backend = FakeBackend::new();
    let (mut pool, mut rx) = pool(&connector);
    let now = Utc::now();

    pool.reconcile(&[due_server(4, now)], &backend, &BridgeConfig::default(), now)
        .await;

    let sink = connector.sink(&address(4)).unwrap();
    assert!(sink.deliver("ns=2;s=Line1.Temperature", Some(Value::Float(21.5)), None));

    let change = rx.recv().await.unwrap();
    assert_eq!(change.server_id, ServerId::new(4));
    assert_eq!(change.path, "ns=2;s=Line1.Temperature");
    assert_eq!(
        change.value.unwrap().to_canonical().unwrap(),
        serde_json::json!(21.5)
    );
}
