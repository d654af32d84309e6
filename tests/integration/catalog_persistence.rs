//! Core state surviving a restart on the SQLite catalog

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rackwatch::{
    actors::aggregator::Aggregation,
    catalog::{CatalogStore, sqlite::SqliteCatalog},
};
use serde_json::json;
use tempfile::TempDir;

use super::helpers::{connect, recv_json, send_json, spawn_test_server, test_seed};

#[tokio::test]
async fn test_rack_and_cluster_state_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");

    {
        let catalog = SqliteCatalog::new(&db_path).await.unwrap();
        catalog.import(test_seed()).await.unwrap();
        let catalog: Arc<dyn CatalogStore> = Arc::new(catalog);

        let (addr, state) = spawn_test_server(catalog.clone(), None).await;
        let mut hub = connect(addr, "/ws/alerts").await;

        for (sensor, temperature) in [("S-1", 41.0), ("S-2", 33.0), ("S-3", 28.0)] {
            send_json(
                &mut hub,
                json!({"hubId": "H1", "sensorName": sensor, "temperature": temperature, "humidity": 45}),
            )
            .await;
            recv_json(&mut hub, Duration::from_secs(2))
                .await
                .expect("acknowledgement");
        }

        state.gate.set_auto_mode(&"C1".into(), true).await.unwrap();
        let evaluation = state.aggregator.evaluate_cluster("C1".into()).await.unwrap();
        assert!(matches!(evaluation.aggregation, Aggregation::Computed(_)));

        state.aggregator.shutdown().await.unwrap();
        catalog.close().await.unwrap();
    }

    let catalog = SqliteCatalog::new(&db_path).await.unwrap();

    let rack = catalog.get_rack(&"R1".into()).await.unwrap().unwrap();
    assert_eq!(rack.sensor_readings.len(), 2);
    assert!(rack.temperature_alert);
    assert_eq!(rack.dominant.unwrap().sensor_name, "S-1");

    let cluster = catalog.get_cluster(&"C1".into()).await.unwrap().unwrap();
    assert_eq!(cluster.mean_temperature, Some(34.0));
    assert!(cluster.desired_actuator_state);
    assert!(cluster.last_evaluated_at.is_some());

    let mode = catalog.get_actuator_mode(&"C1".into()).await.unwrap().unwrap();
    assert!(mode.auto_enabled);

    // re-importing topology leaves maintained state alone
    catalog.import(test_seed()).await.unwrap();
    let rack = catalog.get_rack(&"R1".into()).await.unwrap().unwrap();
    assert_eq!(rack.sensor_readings.len(), 2);
}
