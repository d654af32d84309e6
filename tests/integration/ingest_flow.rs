//! Telemetry socket end to end

use std::time::Duration;

use pretty_assertions::assert_eq;
use rackwatch::catalog::CatalogStore;
use serde_json::json;

use super::helpers::{connect, memory_catalog, recv_json, send_json, spawn_test_server};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_reading_updates_rack_and_is_acknowledged() {
    let catalog = memory_catalog().await;
    let (addr, _state) = spawn_test_server(catalog.clone(), None).await;
    let mut hub = connect(addr, "/ws/alerts").await;

    send_json(
        &mut hub,
        json!({"hubId": "H1", "sensorName": "S-1", "temperature": 40, "humidity": 50}),
    )
    .await;

    let ack = recv_json(&mut hub, WAIT).await.expect("acknowledgement");
    assert_eq!(
        ack,
        json!({
            "status": "ok",
            "rack": "Rack 1",
            "dominantSensor": "S-1",
            "values": {"temperature": 40.0, "humidity": 50.0},
            "alerts": {"tempA": true, "humiA": false}
        })
    );

    let rack = catalog.get_rack(&"R1".into()).await.unwrap().unwrap();
    assert!(rack.temperature_alert);
    assert_eq!(rack.dominant.unwrap().temperature, 40.0);
}

#[tokio::test]
async fn test_bad_frames_are_dropped_without_closing_socket() {
    let catalog = memory_catalog().await;
    let (addr, _state) = spawn_test_server(catalog.clone(), None).await;
    let mut hub = connect(addr, "/ws/alerts").await;

    hub_send_raw(&mut hub, "not json").await;
    send_json(&mut hub, json!({"hubId": "H1"})).await;
    send_json(
        &mut hub,
        json!({"hubId": "H9", "sensorName": "S-1", "temperature": 40, "humidity": 50}),
    )
    .await;
    send_json(
        &mut hub,
        json!({"hubId": "H1", "sensorName": "S-42", "temperature": 40, "humidity": 50}),
    )
    .await;

    assert!(recv_json(&mut hub, Duration::from_millis(200)).await.is_none());

    // still usable afterwards
    send_json(
        &mut hub,
        json!({"hubId": "H1", "sensorName": "S-3", "temperature": 22, "humidity": 75}),
    )
    .await;
    let ack = recv_json(&mut hub, WAIT).await.expect("acknowledgement");
    assert_eq!(ack["rack"], "Rack 2");
    assert_eq!(ack["alerts"]["humiA"], true);

    let rack = catalog.get_rack(&"R1".into()).await.unwrap().unwrap();
    assert!(rack.sensor_readings.is_empty());
}

#[tokio::test]
async fn test_two_hub_sockets_on_one_rack_keep_both_readings() {
    let catalog = memory_catalog().await;
    let (addr, _state) = spawn_test_server(catalog.clone(), None).await;
    let mut first = connect(addr, "/ws/alerts").await;
    let mut second = connect(addr, "/ws/alerts").await;

    for i in 0..20 {
        send_json(
            &mut first,
            json!({"hubId": "H1", "sensorName": "S-1", "temperature": 20 + i, "humidity": 40}),
        )
        .await;
        send_json(
            &mut second,
            json!({"hubId": "H1", "sensorName": "S-2", "temperature": 30 + i, "humidity": 60}),
        )
        .await;
    }

    for _ in 0..20 {
        recv_json(&mut first, WAIT).await.expect("ack on first socket");
        recv_json(&mut second, WAIT).await.expect("ack on second socket");
    }

    let rack = catalog.get_rack(&"R1".into()).await.unwrap().unwrap();
    assert_eq!(rack.sensor_readings.len(), 2);

    let dominant = rack.dominant.unwrap();
    assert_eq!(dominant.sensor_name, "S-2");
    assert_eq!(dominant.temperature, 49.0);
    assert!(rack.temperature_alert);
}

async fn hub_send_raw(ws: &mut super::helpers::WsClient, text: &str) {
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    ws.send(Message::Text(text.to_string())).await.unwrap();
}
