//! Topology catalog
//!
//! Hubs, sensors, racks, threshold rules, rack clusters and actuator modes live
//! behind the [`CatalogStore`] trait. The telemetry core reads topology from it
//! and writes back only the derived fields it owns.
//!
//! ## Backends
//!
//! - **In-memory** (default for tests and `{"backend": "none"}`): DashMap tables
//! - **SQLite**: embedded database, survives restarts
//!
//! ## Usage
//!
//! ```no_run
//! use rackwatch::catalog::{CatalogStore, sqlite::SqliteCatalog};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let catalog = SqliteCatalog::new("./rackwatch.db").await?;
//!     let clusters = catalog.list_clusters().await?;
//!     println!("{} clusters", clusters.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{CatalogStore, HealthStatus};
pub use error::{CatalogError, CatalogResult};
pub use memory::MemoryCatalog;
pub use schema::{
    ActuatorMode, CatalogSeed, ClusterAggregate, Hub, Rack, RackCluster, RackState, Sensor,
    ThresholdRule,
};
