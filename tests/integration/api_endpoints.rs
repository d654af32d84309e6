//! REST endpoints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use rackwatch::catalog::MemoryCatalog;
use serde_json::{Value, json};

use super::helpers::{
    connect, memory_catalog, recv_json, send_json, spawn_test_server, test_seed,
};

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(url(addr, path))
        .json(&body)
        .send()
        .await
        .unwrap();

    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn get(addr: SocketAddr, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(url(addr, path)).await.unwrap();

    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn report(addr: SocketAddr, readings: &[(&str, f64, f64)]) {
    let mut hub = connect(addr, "/ws/alerts").await;

    for (sensor, temperature, humidity) in readings {
        send_json(
            &mut hub,
            json!({"hubId": "H1", "sensorName": sensor, "temperature": temperature, "humidity": humidity}),
        )
        .await;
        recv_json(&mut hub, Duration::from_secs(2))
            .await
            .expect("acknowledgement");
    }
}

#[tokio::test]
async fn test_health_check() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;

    let (status, body) = get(addr, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connected_actuators"], 0);
}

#[tokio::test]
async fn test_evaluate_cluster_without_rule() {
    let mut seed = test_seed();
    seed.rules.clear();
    let catalog = Arc::new(MemoryCatalog::with_seed(seed).await.unwrap());
    let (addr, _state) = spawn_test_server(catalog, None).await;

    let (status, body) = post(addr, "/api/v1/clusters/C1/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "insufficient_data");

    report(addr, &[("S-1", 25.0, 40.0)]).await;

    let (status, body) = post(addr, "/api/v1/clusters/C1/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rule_missing");
    assert_eq!(body["missingRule"], "rule-1");
    assert_eq!(body["meanTemperature"], Value::Null);
}

#[tokio::test]
async fn test_evaluate_cluster_lifecycle() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;

    let (status, _) = post(addr, "/api/v1/clusters/C9/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(addr, "/api/v1/clusters/C1/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "insufficient_data");
    assert_eq!(body["meanTemperature"], Value::Null);

    report(addr, &[("S-1", 25.0, 40.0), ("S-2", 27.0, 44.0), ("S-3", 29.5, 48.0)]).await;

    let (status, body) = post(addr, "/api/v1/clusters/C1/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "computed");
    assert_eq!(body["clusterId"], "C1");
    assert_eq!(body["meanTemperature"], 27.17);
    assert_eq!(body["meanHumidity"], 44.0);
    assert_eq!(body["desiredActuatorState"], false);
    assert_eq!(body["dispatch"], "auto_disabled");
}

#[tokio::test]
async fn test_evaluate_by_rack() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;
    report(addr, &[("S-3", 33.0, 60.0)]).await;

    let (status, body) = post(addr, "/api/v1/racks/R2/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["clusterId"], "C1");
    assert_eq!(body["desiredActuatorState"], true);

    // R3 belongs to no cluster
    let (status, body) = post(addr, "/api/v1/racks/R3/evaluate", Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_manual_control_is_refused_in_auto_mode() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;

    let (status, body) = post(addr, "/api/v1/ac/manual-control", json!({"clusterId": "C1", "ac": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatch"], "not_connected");
    assert_eq!(body["mode"]["manualCommand"], true);

    let (status, _) = post(addr, "/api/v1/ac/auto-control", json!({"clusterId": "C1", "enabled": true})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(addr, "/api/v1/ac/manual-control", json!({"clusterId": "C1", "ac": 0})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("auto mode"));

    let (status, _) = post(addr, "/api/v1/ac/manual-control", json!({"clusterId": "C1", "ac": 2})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(addr, "/api/v1/ac/manual-control", json!({"clusterId": "C9", "ac": 1})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enabling_auto_mode_re_evaluates() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;
    report(addr, &[("S-1", 40.0, 50.0), ("S-3", 36.0, 50.0)]).await;

    let (status, body) = post(addr, "/api/v1/ac/manual-control", json!({"clusterId": "C1", "ac": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"]["manualCommand"], true);

    let (status, body) = post(addr, "/api/v1/ac/auto-control", json!({"clusterId": "C1", "enabled": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"]["autoEnabled"], true);
    assert_eq!(body["mode"]["manualCommand"], false);
    assert_eq!(body["evaluation"]["status"], "computed");
    assert_eq!(body["evaluation"]["meanTemperature"], 38.0);
    assert_eq!(body["dispatch"], "not_connected");

    let (status, body) = post(addr, "/api/v1/ac/auto-control", json!({"clusterId": "C1", "enabled": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"]["autoEnabled"], false);
    assert_eq!(body["evaluation"], Value::Null);

    let (status, _) = post(addr, "/api/v1/ac/auto-control", json!({"clusterId": "C9", "enabled": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_alert_views() {
    let (addr, _state) = spawn_test_server(memory_catalog().await, None).await;
    report(addr, &[("S-1", 40.0, 50.0), ("S-2", 30.0, 55.0), ("S-3", 22.0, 75.0)]).await;
    post(addr, "/api/v1/clusters/C1/evaluate", Value::Null).await;

    let (status, body) = get(addr, "/api/v1/alerts/by-rack-cluster/C1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rackClusterId"], "C1");
    assert_eq!(body["totalRacks"], 2);
    assert_eq!(body["totalAlerts"], 2);
    assert_eq!(body["meanTemperature"], 30.67);
    assert_eq!(body["desiredActuatorState"], true);
    assert_eq!(body["actualActuatorState"], false);

    let r1 = &body["racks"][0];
    assert_eq!(r1["rackId"], "R1");
    assert_eq!(r1["totalSensors"], 2);
    assert_eq!(r1["dominantSensor"], "S-1");
    assert_eq!(r1["temperatureAlert"], true);
    assert_eq!(r1["temperatureValue"], 40.0);

    let r2 = &body["racks"][1];
    assert_eq!(r2["humidityAlert"], true);
    assert_eq!(r2["temperatureAlert"], false);

    let (status, body) = get(addr, "/api/v1/alerts/by-data-center/dc-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRacks"], 3);
    assert_eq!(body["totalAlerts"], 2);

    let (status, _) = get(addr, "/api/v1/alerts/by-rack-cluster/C9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(addr, "/api/v1/alerts/by-data-center/dc-9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auth_guards_rest_but_not_sockets() {
    let (addr, _state) =
        spawn_test_server(memory_catalog().await, Some("secret".to_string())).await;
    let client = reqwest::Client::new();

    let response = client.get(url(addr, "/api/v1/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(url(addr, "/api/v1/health"))
        .header("Authorization", "Token secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(url(addr, "/api/v1/health"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(url(addr, "/api/v1/health"))
        .bearer_auth("secret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    report(addr, &[("S-1", 21.0, 40.0)]).await;
}
