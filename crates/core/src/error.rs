#![forbid(unsafe_code)]

use crate::assignment::AssignmentState;

/// Malformed caller input: names the offending field and the violated constraint.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {constraint}")]
pub struct ValidationError {
    pub field: &'static str,
    pub constraint: String,
}

impl ValidationError {
    pub fn new(field: &'static str, constraint: impl Into<String>) -> Self {
        Self {
            field,
            constraint: constraint.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("assignment is {actual}, expected {expected}")]
    WrongState {
        expected: AssignmentState,
        actual: AssignmentState,
    },
    #[error("assignment belongs to another member")]
    NotAssignee,
    #[error("assignment is cooling down until {until_ms}")]
    CoolingDown { until_ms: i64 },
    #[error("one-time chore was already approved")]
    AlreadyApproved,
}
