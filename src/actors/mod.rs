//! Telemetry, aggregation and actuation core
//!
//! ## Architecture Overview
//!
//! ```text
//!   hub sockets (/ws/alerts)                 controller sockets (/ws/ac-control)
//!            │                                        ▲            │
//!            │ TelemetryFrame                AC_CONTROL│            │ REGISTER / AC_STATUS_ACK
//!            ▼                                        │            ▼
//!   ┌─────────────────┐    ┌──────────────────┐   ┌───┴────────────────┐
//!   │ RackStateCache  │    │ AggregatorActor  ├──►│ ControlGate        │
//!   │ (per-rack lock) │    │ (tick + requests)│   │ + ActuatorRegistry │
//!   └────────┬────────┘    └────────┬─────────┘   └─────────┬──────────┘
//!            │                      │                       │
//!            └──────────────────────┼───────────────────────┘
//!                                   ▼
//!                          Arc<dyn CatalogStore>
//! ```
//!
//! ## Components
//!
//! - **RackStateCache**: applies readings and re-evaluates rack alerts
//! - **AggregatorActor**: recomputes cluster means and forwards them to the gate
//! - **ControlGate**: auto/manual gating, dispatch and acknowledgements
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the aggregator has an mpsc command channel with oneshot replies
//! 2. **Links**: each controller socket owns an mpsc queue registered per cluster

pub mod actuator;
pub mod aggregator;
pub mod messages;
pub mod rack_state;
