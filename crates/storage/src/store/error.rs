#![forbid(unsafe_code)]

use cb_core::{MoneyError, TransitionError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("invalid state: {reason}")]
    State { reason: String },
    #[error("not authorized: {reason}")]
    Unauthorized { reason: String },
    #[error("conflict: {reason}")]
    Conflict { reason: String },
    #[error("unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("store needs a reset: {0}")]
    ResetRequired(&'static str),
    #[error("corrupt row: {0}")]
    Corrupt(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
}

impl StoreError {
    /// Stable machine-readable code for callers that branch on the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::State { .. } => "STATE",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::Conflict { .. } => "CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ResetRequired(_) => "RESET_REQUIRED",
            Self::Corrupt(_) | Self::Io(_) | Self::Sql(_) => "STORE",
        }
    }

    /// Failures a caller can act on (refresh, fix input, retry); the rest are
    /// infrastructure faults.
    pub fn is_expected(&self) -> bool {
        !matches!(self.code(), "STORE" | "RESET_REQUIRED")
    }

    pub(crate) fn state(reason: impl Into<String>) -> Self {
        Self::State {
            reason: reason.into(),
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<TransitionError> for StoreError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::Validation(err) => Self::Validation(err),
            other => Self::state(other.to_string()),
        }
    }
}

impl From<MoneyError> for StoreError {
    fn from(value: MoneyError) -> Self {
        match value {
            MoneyError::Overflow => Self::Corrupt("money overflow while summing ledger"),
            other => Self::Validation(ValidationError::new("amount", other.to_string())),
        }
    }
}
