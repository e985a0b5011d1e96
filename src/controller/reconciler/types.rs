//! # Reconciler Types
//!
//! Outcome and error types shared by every reconciler.

use crate::controller::generator::GeneratorError;
use crate::controller::secret::{CombineError, CopyError};
use crate::controller::template::TemplateError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Terminal message when no export offers a Secret to the requester
pub const EXPORT_NOT_OFFERED: &str = "export was not offered/allowed";

/// Successful reconcile result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Wait for the next watch event
    Done,
    /// Poll again after the duration, for dependencies without a watch
    RequeueAfter(Duration),
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// User must act; retried only when a watch event arrives
    #[error("{0}")]
    Terminal(String),
    /// Spec failed validation
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error(transparent)]
    Combine(#[from] CombineError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

impl ReconcileError {
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Terminal errors are not requeued with backoff
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Terminal(_) | Self::Invalid(_) | Self::Combine(_) | Self::Generator(_) => true,
            Self::Template(err) => err.is_terminal(),
            Self::Copy(err) => err.is_terminal(),
            Self::Store(_) => false,
        }
    }

    /// Error class used as a metrics label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Terminal(_) => "terminal",
            Self::Invalid(_) => "invalid",
            Self::Store(_) => "store",
            Self::Template(_) => "template",
            Self::Copy(_) => "copy",
            Self::Combine(_) => "combine",
            Self::Generator(_) => "generator",
        }
    }
}
