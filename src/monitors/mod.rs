//! Pure evaluation logic
//!
//! Nothing in here does I/O. The actors feed catalog records in and persist
//! whatever comes out.
//!
//! - [`rack`]: per-rack alert flags from the dominant sensor reading
//! - [`cluster`]: cluster-wide means and the desired actuator state

pub mod cluster;
pub mod rack;
