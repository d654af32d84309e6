//! Helper functions for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rackwatch::{
    Metric, Operator, ThresholdCondition,
    api::{ApiConfig, ApiState, spawn_server},
    catalog::{CatalogSeed, CatalogStore, Hub, MemoryCatalog, Rack, RackCluster, Sensor, ThresholdRule},
};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Hub `H1` with sensors `S-1..S-3`.
///
/// - `R1` (sensors s1, s2, condition `temperature > 35`) and `R2` (sensor s3)
///   form cluster `C1`, cooled when the mean temperature exceeds 30
/// - `R3` has no sensors and no cluster
pub fn test_seed() -> CatalogSeed {
    let mut r1 = Rack::new("R1", "Rack 1", "dc-1", "H1");
    r1.sensor_ids = vec!["s1".into(), "s2".into()];
    r1.conditions = vec![ThresholdCondition::new(Metric::Temperature, Operator::GreaterThan, 35.0)];

    let mut r2 = Rack::new("R2", "Rack 2", "dc-1", "H1");
    r2.sensor_ids = vec!["s3".into()];
    r2.conditions = vec![ThresholdCondition::new(Metric::Humidity, Operator::GreaterThan, 70.0)];

    let r3 = Rack::new("R3", "Rack 3", "dc-1", "H1");

    CatalogSeed {
        hubs: vec![Hub {
            id: "H1".into(),
            name: "Hub 1".to_string(),
            data_center_id: "dc-1".into(),
        }],
        sensors: (1..=3)
            .map(|i| Sensor {
                id: format!("s{i}").as_str().into(),
                name: format!("S-{i}"),
                hub_id: "H1".into(),
            })
            .collect(),
        racks: vec![r1, r2, r3],
        rules: vec![ThresholdRule {
            id: "rule-1".into(),
            name: "Cool above 30".to_string(),
            data_center_id: "dc-1".into(),
            condition: ThresholdCondition::new(Metric::Temperature, Operator::GreaterThan, 30.0),
        }],
        clusters: vec![RackCluster::new(
            "C1",
            "Cluster 1",
            "dc-1",
            "rule-1",
            vec!["R1".into(), "R2".into()],
        )],
        modes: vec![],
    }
}

pub async fn memory_catalog() -> Arc<dyn CatalogStore> {
    Arc::new(MemoryCatalog::with_seed(test_seed()).await.unwrap())
}

/// Spawn a server on an ephemeral port, periodic aggregation off
pub async fn spawn_test_server(
    catalog: Arc<dyn CatalogStore>,
    auth_token: Option<String>,
) -> (SocketAddr, ApiState) {
    spawn_test_server_with_idle(catalog, auth_token, Duration::from_secs(30)).await
}

pub async fn spawn_test_server_with_idle(
    catalog: Arc<dyn CatalogStore>,
    auth_token: Option<String>,
    idle_timeout: Duration,
) -> (SocketAddr, ApiState) {
    let state = ApiState::new(catalog, None, Some(idle_timeout));

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token,
        enable_cors: false,
    };

    let addr = spawn_server(config, state.clone()).await.unwrap();
    (addr, state)
}

pub async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    ws
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, or `None` if nothing arrives within `timeout`
pub async fn recv_json(ws: &mut WsClient, timeout: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next()).await.ok()??.ok()?;
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).ok();
        }
    }
}

/// Poll `check` until it returns true or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
