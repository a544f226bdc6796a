//! Support code for the allowsyncd binary
//!
//! - [`health`]: liveness and readiness routes
//! - [`logging`]: `LOG_LEVEL` handling and subscriber setup

pub mod health;
pub mod logging;
