//! # Secretgen Controller
//!
//! Kubernetes controller that shares Secrets across namespaces and renders
//! and generates credential Secrets.
//!
//! - SecretExport offers a Secret; SecretImport, SecretRequest and
//!   SecretExportApproval copy an offered Secret into their namespace
//! - Placeholder Secrets aggregate every offered docker config
//! - SecretTemplate renders a Secret from other resources via JSONPath
//! - Password generates a random password Secret

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
pub mod store;
