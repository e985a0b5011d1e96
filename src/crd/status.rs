//! # Generic Status
//!
//! Status shared by every resource the controller reconciles.
//!
//! The transitions (`set_reconciling`, `set_reconcile_completed`) live in
//! `controller::status`; this module only holds the serialized shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Observed outcome of the most recent reconcile
///
/// `conditions` only reflects the current reconcile, never a history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenericStatus {
    /// Generation of the spec the conditions describe
    #[serde(default)]
    pub observed_generation: i64,
    /// Conditions of the current reconcile
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Human-readable summary, e.g. "Reconcile succeeded"
    #[serde(default)]
    pub friendly_description: String,
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: ConditionType,
    /// Status of condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Message describing condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// A `True` condition of the given type without reason or message
    #[must_use]
    pub fn truthy(r#type: ConditionType) -> Self {
        Self {
            r#type,
            status: ConditionStatus::True,
            reason: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionType {
    Reconciling,
    ReconcileFailed,
    ReconcileSucceeded,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Access to the `GenericStatus` embedded in a resource-specific status
pub trait HasGenericStatus:
    Clone + Default + PartialEq + std::fmt::Debug + Serialize + Send + Sync + 'static
{
    fn generic(&self) -> &GenericStatus;
    fn generic_mut(&mut self) -> &mut GenericStatus;
}

impl HasGenericStatus for GenericStatus {
    fn generic(&self) -> &GenericStatus {
        self
    }

    fn generic_mut(&mut self) -> &mut GenericStatus {
        self
    }
}
