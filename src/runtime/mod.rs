//! # Runtime
//!
//! Wires the reconcilers into kube-runtime:
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server, client
//! - `controllers`: one `Controller` per kind with its watch relations
//! - `watches`: pure mappers from related objects to reconcile keys
//! - `watch_loop`: controller stream driver with restart
//! - `error_policy`: per-key backoff and stream error classification

pub mod controllers;
pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
pub mod watches;

pub use controllers::run_controllers;
pub use initialization::{initialize, InitializationResult};
pub use watch_loop::spawn_shutdown_handler;
