pub mod args;
pub mod config;
pub mod handlers;
pub mod state;
pub mod telemetry;
