pub mod indicator;
pub mod telemetry;
