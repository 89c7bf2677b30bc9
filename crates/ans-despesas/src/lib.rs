pub mod config;
pub mod error;
pub mod pipeline;
pub mod tabular;
pub mod telemetry;
