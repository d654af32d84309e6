//! SQLite catalog backend
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers are not blocked by the ingest writes
//! - **Migrations**: Schema versioning with sqlx
//!
//! ## Layout
//!
//! Lists (`sensor_ids`, `rack_ids`, `conditions`) and the per-sensor reading map
//! are JSON columns. Rack state is written with a single `UPDATE`, so readings
//! and the flags derived from them always change together.
//!
//! Cluster membership is mirrored into `rack_cluster_members`, keyed by rack id,
//! which makes the database itself refuse a rack in two clusters.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use crate::{
    ClusterId, DataCenterId, HubId, Metric, Operator, RackId, RuleId, SensorId, ThresholdCondition,
};

use super::backend::{CatalogStore, HealthStatus};
use super::error::{CatalogError, CatalogResult};
use super::schema::{
    ActuatorMode, CatalogSeed, ClusterAggregate, Hub, Rack, RackCluster, RackState, Sensor,
    ThresholdRule,
};

const RACK_COLUMNS: &str = "id, name, data_center_id, hub_id, sensor_ids, conditions, \
     sensor_readings, temperature_alert, humidity_alert, dominant";

const CLUSTER_COLUMNS: &str = "c.id, c.name, c.data_center_id, c.rule_id, c.rack_ids, \
     c.mean_temperature, c.mean_humidity, c.desired_actuator_state, c.last_evaluated_at, \
     c.actual_actuator_state, c.last_ack_at";

/// SQLite catalog backend
pub struct SqliteCatalog {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> CatalogResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite catalog at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| CatalogError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn rack_from_row(row: &SqliteRow) -> CatalogResult<Rack> {
        let dominant: Option<String> = row.try_get("dominant")?;

        Ok(Rack {
            id: RackId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            data_center_id: DataCenterId::new(row.try_get::<String, _>("data_center_id")?),
            hub_id: HubId::new(row.try_get::<String, _>("hub_id")?),
            sensor_ids: serde_json::from_str(row.try_get("sensor_ids")?)?,
            conditions: serde_json::from_str(row.try_get("conditions")?)?,
            sensor_readings: serde_json::from_str(row.try_get("sensor_readings")?)?,
            temperature_alert: row.try_get("temperature_alert")?,
            humidity_alert: row.try_get("humidity_alert")?,
            dominant: dominant.as_deref().map(serde_json::from_str).transpose()?,
        })
    }

    fn cluster_from_row(row: &SqliteRow) -> CatalogResult<RackCluster> {
        let last_evaluated_at: Option<i64> = row.try_get("last_evaluated_at")?;
        let last_ack_at: Option<i64> = row.try_get("last_ack_at")?;

        Ok(RackCluster {
            id: ClusterId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            data_center_id: DataCenterId::new(row.try_get::<String, _>("data_center_id")?),
            rack_ids: serde_json::from_str(row.try_get("rack_ids")?)?,
            rule_id: RuleId::new(row.try_get::<String, _>("rule_id")?),
            mean_temperature: row.try_get("mean_temperature")?,
            mean_humidity: row.try_get("mean_humidity")?,
            desired_actuator_state: row.try_get("desired_actuator_state")?,
            last_evaluated_at: last_evaluated_at.map(Self::millis_to_timestamp),
            actual_actuator_state: row.try_get("actual_actuator_state")?,
            last_ack_at: last_ack_at.map(Self::millis_to_timestamp),
        })
    }

    fn rule_from_row(row: &SqliteRow) -> CatalogResult<ThresholdRule> {
        let metric: String = row.try_get("metric")?;
        let operator: String = row.try_get("operator")?;

        Ok(ThresholdRule {
            id: RuleId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            data_center_id: DataCenterId::new(row.try_get::<String, _>("data_center_id")?),
            condition: ThresholdCondition {
                metric: parse_metric(&metric)?,
                operator: parse_operator(&operator)?,
                threshold: row.try_get("threshold")?,
            },
        })
    }
}

fn parse_metric(value: &str) -> CatalogResult<Metric> {
    match value {
        "temperature" | "temp" => Ok(Metric::Temperature),
        "humidity" => Ok(Metric::Humidity),
        other => Err(CatalogError::SerializationError(format!(
            "unknown metric '{other}'"
        ))),
    }
}

fn parse_operator(value: &str) -> CatalogResult<Operator> {
    match value {
        "<" => Ok(Operator::LessThan),
        ">" => Ok(Operator::GreaterThan),
        other => Err(CatalogError::SerializationError(format!(
            "unknown operator '{other}'"
        ))),
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    #[instrument(skip(self, seed), fields(racks = seed.racks.len(), clusters = seed.clusters.len()))]
    async fn import(&self, seed: CatalogSeed) -> CatalogResult<()> {
        // cheap pre-check so a bad seed fails with a readable message
        seed.cluster_memberships()?;

        let mut tx = self.pool.begin().await?;

        for hub in &seed.hubs {
            sqlx::query(
                r#"
                INSERT INTO hubs (id, name, data_center_id) VALUES (?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    data_center_id = excluded.data_center_id
                "#,
            )
            .bind(hub.id.as_str())
            .bind(&hub.name)
            .bind(hub.data_center_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for sensor in &seed.sensors {
            sqlx::query(
                r#"
                INSERT INTO sensors (id, name, hub_id) VALUES (?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    hub_id = excluded.hub_id
                "#,
            )
            .bind(sensor.id.as_str())
            .bind(&sensor.name)
            .bind(sensor.hub_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        // topology columns only; readings and flags survive a re-import
        for rack in &seed.racks {
            sqlx::query(
                r#"
                INSERT INTO racks (id, name, data_center_id, hub_id, sensor_ids, conditions)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    data_center_id = excluded.data_center_id,
                    hub_id = excluded.hub_id,
                    sensor_ids = excluded.sensor_ids,
                    conditions = excluded.conditions
                "#,
            )
            .bind(rack.id.as_str())
            .bind(&rack.name)
            .bind(rack.data_center_id.as_str())
            .bind(rack.hub_id.as_str())
            .bind(serde_json::to_string(&rack.sensor_ids)?)
            .bind(serde_json::to_string(&rack.conditions)?)
            .execute(&mut *tx)
            .await?;
        }

        for rule in &seed.rules {
            sqlx::query(
                r#"
                INSERT INTO threshold_rules (id, name, data_center_id, metric, operator, threshold)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    data_center_id = excluded.data_center_id,
                    metric = excluded.metric,
                    operator = excluded.operator,
                    threshold = excluded.threshold
                "#,
            )
            .bind(rule.id.as_str())
            .bind(&rule.name)
            .bind(rule.data_center_id.as_str())
            .bind(rule.condition.metric.to_string())
            .bind(rule.condition.operator.symbol())
            .bind(rule.condition.threshold)
            .execute(&mut *tx)
            .await?;
        }

        for cluster in &seed.clusters {
            sqlx::query(
                r#"
                INSERT INTO rack_clusters (id, name, data_center_id, rule_id, rack_ids)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    data_center_id = excluded.data_center_id,
                    rule_id = excluded.rule_id,
                    rack_ids = excluded.rack_ids
                "#,
            )
            .bind(cluster.id.as_str())
            .bind(&cluster.name)
            .bind(cluster.data_center_id.as_str())
            .bind(cluster.rule_id.as_str())
            .bind(serde_json::to_string(&cluster.rack_ids)?)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM rack_cluster_members WHERE cluster_id = ?")
                .bind(cluster.id.as_str())
                .execute(&mut *tx)
                .await?;
        }

        // separate pass so a rack moving between two clusters of the same seed
        // does not trip over its old membership row
        for cluster in &seed.clusters {
            for rack_id in &cluster.rack_ids {
                sqlx::query("INSERT INTO rack_cluster_members (rack_id, cluster_id) VALUES (?, ?)")
                    .bind(rack_id.as_str())
                    .bind(cluster.id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| match CatalogError::from(e) {
                        CatalogError::Conflict(_) => CatalogError::Conflict(format!(
                            "rack {rack_id} already belongs to another cluster"
                        )),
                        other => other,
                    })?;
            }
        }

        for mode in &seed.modes {
            sqlx::query(
                r#"
                INSERT INTO actuator_modes (cluster_id, auto_enabled, manual_command, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (cluster_id) DO UPDATE SET
                    auto_enabled = excluded.auto_enabled,
                    manual_command = excluded.manual_command,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(mode.cluster_id.as_str())
            .bind(mode.auto_enabled)
            .bind(mode.manual_command)
            .bind(Self::timestamp_to_millis(&mode.updated_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!("catalog import complete");
        Ok(())
    }

    async fn find_hub(&self, hub_id: &HubId) -> CatalogResult<Option<Hub>> {
        let row = sqlx::query("SELECT id, name, data_center_id FROM hubs WHERE id = ?")
            .bind(hub_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Hub {
                id: HubId::new(row.try_get::<String, _>("id")?),
                name: row.try_get("name")?,
                data_center_id: DataCenterId::new(row.try_get::<String, _>("data_center_id")?),
            })
        })
        .transpose()
    }

    async fn find_sensor(&self, hub_id: &HubId, name: &str) -> CatalogResult<Option<Sensor>> {
        let row = sqlx::query("SELECT id, name, hub_id FROM sensors WHERE hub_id = ? AND name = ?")
            .bind(hub_id.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Sensor {
                id: SensorId::new(row.try_get::<String, _>("id")?),
                name: row.try_get("name")?,
                hub_id: HubId::new(row.try_get::<String, _>("hub_id")?),
            })
        })
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_rack_by_sensor(
        &self,
        hub_id: &HubId,
        sensor_id: &SensorId,
    ) -> CatalogResult<Option<Rack>> {
        let sql = format!(
            r#"
            SELECT {RACK_COLUMNS} FROM racks
            WHERE hub_id = ?
              AND EXISTS (SELECT 1 FROM json_each(racks.sensor_ids) WHERE json_each.value = ?)
            ORDER BY id
            LIMIT 1
            "#
        );

        let row = sqlx::query(&sql)
            .bind(hub_id.as_str())
            .bind(sensor_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::rack_from_row).transpose()
    }

    async fn get_rack(&self, rack_id: &RackId) -> CatalogResult<Option<Rack>> {
        let sql = format!("SELECT {RACK_COLUMNS} FROM racks WHERE id = ?");

        let row = sqlx::query(&sql)
            .bind(rack_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::rack_from_row).transpose()
    }

    async fn get_racks(&self, rack_ids: &[RackId]) -> CatalogResult<Vec<Rack>> {
        if rack_ids.is_empty() {
            return Ok(vec![]);
        }

        let sql = format!(
            "SELECT {RACK_COLUMNS} FROM racks WHERE id IN (SELECT value FROM json_each(?))"
        );

        let rows = sqlx::query(&sql)
            .bind(serde_json::to_string(rack_ids)?)
            .fetch_all(&self.pool)
            .await?;

        let mut by_id = rows
            .iter()
            .map(|row| Self::rack_from_row(row).map(|rack| (rack.id.clone(), rack)))
            .collect::<CatalogResult<HashMap<_, _>>>()?;

        Ok(rack_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_racks_in_data_center(
        &self,
        data_center_id: &DataCenterId,
    ) -> CatalogResult<Vec<Rack>> {
        let sql = format!("SELECT {RACK_COLUMNS} FROM racks WHERE data_center_id = ? ORDER BY id");

        let rows = sqlx::query(&sql)
            .bind(data_center_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::rack_from_row).collect()
    }

    #[instrument(skip(self, state))]
    async fn save_rack_state(&self, rack_id: &RackId, state: &RackState) -> CatalogResult<()> {
        let dominant = state
            .evaluation
            .dominant
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE racks SET
                sensor_readings = ?,
                temperature_alert = ?,
                humidity_alert = ?,
                dominant = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(&state.sensor_readings)?)
        .bind(state.evaluation.temperature_alert)
        .bind(state.evaluation.humidity_alert)
        .bind(dominant)
        .bind(rack_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!("rack {rack_id}")));
        }

        Ok(())
    }

    async fn get_cluster(&self, cluster_id: &ClusterId) -> CatalogResult<Option<RackCluster>> {
        let sql = format!("SELECT {CLUSTER_COLUMNS} FROM rack_clusters c WHERE c.id = ?");

        let row = sqlx::query(&sql)
            .bind(cluster_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::cluster_from_row).transpose()
    }

    async fn find_clusters_containing(&self, rack_id: &RackId) -> CatalogResult<Vec<RackCluster>> {
        let sql = format!(
            r#"
            SELECT {CLUSTER_COLUMNS} FROM rack_clusters c
            JOIN rack_cluster_members m ON m.cluster_id = c.id
            WHERE m.rack_id = ?
            ORDER BY c.id
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(rack_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::cluster_from_row).collect()
    }

    async fn list_clusters(&self) -> CatalogResult<Vec<RackCluster>> {
        let sql = format!("SELECT {CLUSTER_COLUMNS} FROM rack_clusters c ORDER BY c.id");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter().map(Self::cluster_from_row).collect()
    }

    async fn get_rule(&self, rule_id: &RuleId) -> CatalogResult<Option<ThresholdRule>> {
        let row = sqlx::query(
            "SELECT id, name, data_center_id, metric, operator, threshold FROM threshold_rules WHERE id = ?",
        )
        .bind(rule_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::rule_from_row).transpose()
    }

    #[instrument(skip(self), fields(cluster_id = %aggregate.cluster_id))]
    async fn save_cluster_aggregate(&self, aggregate: &ClusterAggregate) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE rack_clusters SET
                mean_temperature = ?,
                mean_humidity = ?,
                desired_actuator_state = ?,
                last_evaluated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(aggregate.mean_temperature)
        .bind(aggregate.mean_humidity)
        .bind(aggregate.desired_actuator_state)
        .bind(Self::timestamp_to_millis(&aggregate.evaluated_at))
        .bind(aggregate.cluster_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(format!(
                "cluster {}",
                aggregate.cluster_id
            )));
        }

        Ok(())
    }

    async fn save_actual_actuator_state(
        &self,
        cluster_id: &ClusterId,
        on: bool,
        at: DateTime<Utc>,
    ) -> CatalogResult<bool> {
        let result = sqlx::query(
            "UPDATE rack_clusters SET actual_actuator_state = ?, last_ack_at = ? WHERE id = ?",
        )
        .bind(on)
        .bind(Self::timestamp_to_millis(&at))
        .bind(cluster_id.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_actuator_mode(&self, cluster_id: &ClusterId) -> CatalogResult<Option<ActuatorMode>> {
        let row = sqlx::query(
            "SELECT cluster_id, auto_enabled, manual_command, updated_at FROM actuator_modes WHERE cluster_id = ?",
        )
        .bind(cluster_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ActuatorMode {
                cluster_id: ClusterId::new(row.try_get::<String, _>("cluster_id")?),
                auto_enabled: row.try_get("auto_enabled")?,
                manual_command: row.try_get("manual_command")?,
                updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?),
            })
        })
        .transpose()
    }

    async fn save_actuator_mode(&self, mode: &ActuatorMode) -> CatalogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO actuator_modes (cluster_id, auto_enabled, manual_command, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (cluster_id) DO UPDATE SET
                auto_enabled = excluded.auto_enabled,
                manual_command = excluded.manual_command,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(mode.cluster_id.as_str())
        .bind(mode.auto_enabled)
        .bind(mode.manual_command)
        .bind(Self::timestamp_to_millis(&mode.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> CatalogResult<HealthStatus> {
        let healthy = sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok();

        let rack_count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM racks")
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("count"))
            .unwrap_or(0);

        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "SQLite catalog operational".to_string()
            } else {
                "SQLite catalog unreachable".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "sqlite".to_string()),
                ("path".to_string(), self.db_path.clone()),
                ("racks".to_string(), rack_count.to_string()),
            ]),
        })
    }

    async fn close(&self) -> CatalogResult<()> {
        info!("closing SQLite catalog");
        self.pool.close().await;
        Ok(())
    }
}
