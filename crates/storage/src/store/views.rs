#![forbid(unsafe_code)]

use super::StoreError;
use cb_core::{Assignment, AssignmentId, ChoreTemplate, RewardEvent};
use serde::Serialize;

/// An assignment together with the template it was materialized from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    pub assignment: Assignment,
    pub template: ChoreTemplate,
}

/// Everything a member may act on right now.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableChores {
    /// Assignments owned by the member in state `available`.
    pub assigned: Vec<AssignmentView>,
    /// Pool templates with no round in flight.
    pub claimable: Vec<ChoreTemplate>,
}

impl AvailableChores {
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty() && self.claimable.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub assignment: Assignment,
    pub reward_event: RewardEvent,
}

/// Result of one unit inside a bulk operation.
#[derive(Debug)]
pub struct BulkOutcome<T> {
    pub assignment_id: AssignmentId,
    pub result: Result<T, StoreError>,
}

impl<T> BulkOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
