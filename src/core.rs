pub mod config;
pub mod metrics;
pub mod telemetry;
pub(crate) mod time;
