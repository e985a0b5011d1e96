//! # Exports
//!
//! Cross-namespace Secret sharing:
//!
//! - `registry`: the shared index of exported Secrets
//! - `matcher`: query value used by requesters
//! - `oracle`: namespace annotation lookups (wildcard exclusion)
//! - `warmup`: one-time relist before the first query

mod matcher;
mod oracle;
mod registry;
mod warmup;

pub use matcher::SecretMatcher;
pub use oracle::{NamespaceOracle, StoreNamespaceOracle};
pub use registry::{ExportedSecretRecord, SecretExports};
pub use warmup::WarmedSecretExports;
