//! Error taxonomy for controller entry points.

use thiserror::Error;

use crate::core::step::{Action, Step};
use crate::core::validation::MissingField;

/// Why a controller operation did not complete.
///
/// None of these are fatal: the controller records the message, routes to a
/// safe step and leaves round and history state intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// A required form field is missing.
    #[error(transparent)]
    Validation(#[from] MissingField),
    /// An external service call failed.
    #[error("failed to {action}: {message}")]
    Service { action: Action, message: String },
    /// The action needs a selected candidate and none was picked.
    #[error("select a candidate first")]
    Selection,
    /// The action is not available from the current step.
    #[error("cannot {action} from step '{step}'")]
    InvalidStep { action: Action, step: Step },
}

impl WorkflowError {
    /// Wrap a collaborator failure, keeping its full context chain.
    pub fn service(action: Action, err: &anyhow::Error) -> Self {
        Self::Service {
            action,
            message: format!("{err:#}"),
        }
    }
}
