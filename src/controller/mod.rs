//! # Controller
//!
//! Core controller modules for the secretgen controller.
//!
//! - `backoff`: Fibonacci backoff for transient retries
//! - `exports`: export registry shared by the requester controllers
//! - `generator`: password generation
//! - `jsonpath`: template translation and evaluation
//! - `reconciler`: one reconciler per watched kind
//! - `secret`: derived Secret construction and docker config merging
//! - `server`: HTTP server for metrics and health checks
//! - `status`: status conditions and their persistence
//! - `template`: SecretTemplate input resolution and rendering

pub mod backoff;
pub mod exports;
pub mod generator;
pub mod jsonpath;
pub mod reconciler;
pub mod secret;
pub mod server;
pub mod status;
pub mod template;
