//! Actuator controller socket end to end

use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use rackwatch::{
    ClusterId,
    actors::{
        actuator::{DispatchOutcome, SkipReason},
        aggregator::Aggregation,
    },
    api::ApiState,
    catalog::CatalogStore,
};
use serde_json::json;

use super::helpers::{
    WsClient, connect, eventually, memory_catalog, recv_json, send_json, spawn_test_server,
    spawn_test_server_with_idle,
};

const WAIT: Duration = Duration::from_secs(2);

fn cluster() -> ClusterId {
    ClusterId::from("C1")
}

/// Register a controller for `C1` and wait until the registry has it
async fn register_controller(addr: std::net::SocketAddr, state: &ApiState) -> WsClient {
    let mut controller = connect(addr, "/ws/ac-control").await;
    send_json(&mut controller, json!({"type": "REGISTER", "clusterId": "C1"})).await;

    let registry = state.registry().clone();
    assert!(eventually(|| {
        let registry = registry.clone();
        async move { registry.is_registered(&cluster()) }
    })
    .await);

    controller
}

/// Feed R1 and R2 one reading each through the telemetry socket
async fn report(addr: std::net::SocketAddr, r1_temperature: f64, r2_temperature: f64) {
    let mut hub = connect(addr, "/ws/alerts").await;

    for (sensor, temperature) in [("S-1", r1_temperature), ("S-3", r2_temperature)] {
        send_json(
            &mut hub,
            json!({"hubId": "H1", "sensorName": sensor, "temperature": temperature, "humidity": 50}),
        )
        .await;
        recv_json(&mut hub, WAIT).await.expect("acknowledgement");
    }
}

#[tokio::test]
async fn test_auto_mode_dispatches_and_ack_updates_actual_state() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog.clone(), None).await;
    let mut controller = register_controller(addr, &state).await;

    state.gate.set_auto_mode(&cluster(), true).await.unwrap();
    report(addr, 40.0, 36.0).await;

    let evaluation = state.aggregator.evaluate_cluster(cluster()).await.unwrap();
    assert_eq!(evaluation.dispatch, Some(DispatchOutcome::Dispatched));
    assert_matches!(
        evaluation.aggregation,
        Aggregation::Computed(aggregate) if aggregate.desired_actuator_state
    );

    let command = recv_json(&mut controller, WAIT).await.expect("AC_CONTROL frame");
    assert_eq!(command, json!({"type": "AC_CONTROL", "ac": 1, "meanTemp": 38.0}));

    // desired state alone does not move the actual state
    let stored = catalog.get_cluster(&cluster()).await.unwrap().unwrap();
    assert!(stored.desired_actuator_state);
    assert!(!stored.actual_actuator_state);

    send_json(
        &mut controller,
        json!({"type": "AC_STATUS_ACK", "clusterId": "C1", "ac": 1, "status": "OK"}),
    )
    .await;

    let reader = catalog.clone();
    assert!(eventually(|| {
        let reader = reader.clone();
        async move {
            let stored = reader.get_cluster(&cluster()).await.unwrap().unwrap();
            stored.actual_actuator_state && stored.last_ack_at.is_some()
        }
    })
    .await);
}

#[tokio::test]
async fn test_auto_dispatch_without_controller_is_skipped() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog.clone(), None).await;

    state.gate.set_auto_mode(&cluster(), true).await.unwrap();
    report(addr, 40.0, 36.0).await;

    let evaluation = state.aggregator.evaluate_cluster(cluster()).await.unwrap();
    assert_eq!(
        evaluation.dispatch,
        Some(DispatchOutcome::Skipped(SkipReason::NotConnected))
    );

    // the aggregate is stored even though nothing was sent
    let stored = catalog.get_cluster(&cluster()).await.unwrap().unwrap();
    assert_eq!(stored.mean_temperature, Some(38.0));
    assert!(stored.desired_actuator_state);
}

#[tokio::test]
async fn test_manual_mode_keeps_aggregation_away_from_controller() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog, None).await;
    let mut controller = register_controller(addr, &state).await;

    report(addr, 40.0, 36.0).await;

    let evaluation = state.aggregator.evaluate_cluster(cluster()).await.unwrap();
    assert_eq!(
        evaluation.dispatch,
        Some(DispatchOutcome::Skipped(SkipReason::AutoDisabled))
    );
    assert!(recv_json(&mut controller, Duration::from_millis(200)).await.is_none());

    let outcome = state.gate.manual_command(&cluster(), true).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let command = recv_json(&mut controller, WAIT).await.expect("AC_CONTROL frame");
    assert_eq!(command["type"], "AC_CONTROL");
    assert_eq!(command["ac"], 1);
}

#[tokio::test]
async fn test_latest_controller_wins_and_stale_close_is_ignored() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog, None).await;

    let first = register_controller(addr, &state).await;
    let mut second = connect(addr, "/ws/ac-control").await;
    send_json(&mut second, json!({"type": "REGISTER", "clusterId": "C1"})).await;

    // let the second registration land before the first socket goes away
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(state.registry().is_registered(&cluster()));

    let outcome = state.gate.manual_command(&cluster(), false).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let command = recv_json(&mut second, WAIT).await.expect("AC_CONTROL frame");
    assert_eq!(command["ac"], 0);
}

#[tokio::test]
async fn test_disconnect_unregisters_controller() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog, None).await;

    let controller = register_controller(addr, &state).await;
    drop(controller);

    let registry = state.registry().clone();
    assert!(eventually(|| {
        let registry = registry.clone();
        async move { !registry.is_registered(&cluster()) }
    })
    .await);

    let outcome = state.gate.manual_command(&cluster(), true).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::NotConnected));
}

#[tokio::test]
async fn test_register_for_unknown_cluster_is_ignored() {
    let catalog = memory_catalog().await;
    let (addr, state) = spawn_test_server(catalog, None).await;

    let mut controller = connect(addr, "/ws/ac-control").await;
    send_json(&mut controller, json!({"type": "REGISTER", "clusterId": "C9"})).await;
    send_json(&mut controller, json!({"type": "REGISTER", "clusterId": "C1"})).await;

    let registry = state.registry().clone();
    assert!(eventually(|| {
        let registry = registry.clone();
        async move { registry.is_registered(&cluster()) }
    })
    .await);

    assert!(!state.registry().is_registered(&ClusterId::from("C9")));
    assert_eq!(state.registry().len(), 1);
}

#[tokio::test]
async fn test_quiet_controller_outlives_idle_timeout() {
    let catalog = memory_catalog().await;
    let (addr, state) =
        spawn_test_server_with_idle(catalog, None, Duration::from_millis(300)).await;
    let mut controller = register_controller(addr, &state).await;

    // reading answers the server's pings; no frame of our own is sent
    assert!(recv_json(&mut controller, Duration::from_millis(1200)).await.is_none());
    assert!(state.registry().is_registered(&cluster()));

    let outcome = state.gate.manual_command(&cluster(), true).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::Dispatched);

    let command = recv_json(&mut controller, WAIT).await.expect("AC_CONTROL frame");
    assert_eq!(command["ac"], 1);
}

#[tokio::test]
async fn test_unresponsive_controller_is_dropped_after_idle_timeout() {
    let catalog = memory_catalog().await;
    let (addr, state) =
        spawn_test_server_with_idle(catalog, None, Duration::from_millis(300)).await;

    // never read again, so pings go unanswered
    let _controller = register_controller(addr, &state).await;

    let registry = state.registry().clone();
    assert!(eventually(|| {
        let registry = registry.clone();
        async move { !registry.is_registered(&cluster()) }
    })
    .await);
}
