#![forbid(unsafe_code)]

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

pub const MS_PER_DAY: i64 = 86_400_000;
pub const MAX_COOLDOWN_DAYS: u32 = 3650;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Recurrence {
    OneTime,
    #[serde(rename_all = "camelCase")]
    Recurring { cooldown_days: u32 },
}

impl Recurrence {
    pub fn one_time() -> Self {
        Self::OneTime
    }

    pub fn recurring(cooldown_days: u32) -> Result<Self, ValidationError> {
        let recurrence = Self::Recurring { cooldown_days };
        recurrence.validate()?;
        Ok(recurrence)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Self::Recurring { cooldown_days } = self {
            if *cooldown_days < 1 {
                return Err(ValidationError::new(
                    "recurrence.cooldownDays",
                    "must be at least 1",
                ));
            }
            if *cooldown_days > MAX_COOLDOWN_DAYS {
                return Err(ValidationError::new(
                    "recurrence.cooldownDays",
                    format!("must be at most {MAX_COOLDOWN_DAYS}"),
                ));
            }
        }
        Ok(())
    }

    pub fn cooldown_days(&self) -> Option<u32> {
        match self {
            Self::OneTime => None,
            Self::Recurring { cooldown_days } => Some(*cooldown_days),
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Recurring { .. })
    }

    /// Instant after which an approval made at `approved_at_ms` may be redone.
    pub fn next_available_at(&self, approved_at_ms: i64) -> Option<i64> {
        self.cooldown_days()
            .map(|days| approved_at_ms.saturating_add(i64::from(days) * MS_PER_DAY))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Open,
    CoolingDown { until_ms: i64 },
    /// One-time chore that has been approved; it never reopens.
    Closed,
}

/// Whether a new completion attempt is allowed right now.
///
/// `approved_at_ms` is the last approval of the assignment (`None` when it has
/// never been approved in the current round, e.g. right after a rejection).
pub fn recurrence_gate(approved_at_ms: Option<i64>, cooldown_days: Option<u32>, now_ms: i64) -> Gate {
    let Some(approved_at_ms) = approved_at_ms else {
        return Gate::Open;
    };
    let Some(days) = cooldown_days else {
        return Gate::Closed;
    };
    let until_ms = approved_at_ms.saturating_add(i64::from(days) * MS_PER_DAY);
    if now_ms >= until_ms {
        Gate::Open
    } else {
        Gate::CoolingDown { until_ms }
    }
}
