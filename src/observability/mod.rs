//! # Observability
//!
//! Prometheus metrics exposed through the controller's HTTP server.

pub mod metrics;
