//! Polls GitHub's enterprise billing API for per-user Copilot premium request
//! usage and republishes it as Prometheus gauges.

pub mod cli;
pub mod collector;
pub mod config;
pub mod http;
pub mod metrics;
pub mod server;
pub mod types;
pub mod worker;
