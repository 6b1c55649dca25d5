#![forbid(unsafe_code)]

pub mod assignment;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod membership;
pub mod money;
pub mod recurrence;
pub mod reward;
pub mod template;

pub use assignment::{Assignment, AssignmentState};
pub use error::{TransitionError, ValidationError};
pub use ids::{AssignmentId, FamilyId, IdError, MemberId, TemplateId};
pub use ledger::{Adjustment, Balance, Payout, RewardEvent};
pub use membership::{Membership, Role};
pub use money::{Money, MoneyError};
pub use recurrence::{Gate, Recurrence, recurrence_gate};
pub use reward::RewardPolicy;
pub use template::{
    AssignmentMode, ChoreTemplate, Slot, SlotPlan, TemplatePatch, TemplateSpec, reconcile_slots,
};
