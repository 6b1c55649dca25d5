#![forbid(unsafe_code)]

use crate::error::ValidationError;
use crate::ids::{FamilyId, MemberId, TemplateId};
use crate::recurrence::Recurrence;
use crate::reward::RewardPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4000;

const POOL_SLOT_KEY: &str = "pool";
const MEMBER_SLOT_PREFIX: &str = "member:";

/// Who a template's assignments belong to. Each mode carries only what it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AssignmentMode {
    Single { assignee: MemberId },
    MultiIndependent { assignees: Vec<MemberId> },
    UnassignedPool,
}

impl AssignmentMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::MultiIndependent { .. } => "multiIndependent",
            Self::UnassignedPool => "unassignedPool",
        }
    }

    pub fn is_pool(&self) -> bool {
        matches!(self, Self::UnassignedPool)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Self::MultiIndependent { assignees } = self {
            if assignees.is_empty() {
                return Err(ValidationError::new(
                    "assignees",
                    "multiIndependent mode needs at least one assignee",
                ));
            }
            let mut seen = BTreeSet::new();
            for assignee in assignees {
                if !seen.insert(assignee) {
                    return Err(ValidationError::new(
                        "assignees",
                        format!("duplicate assignee {assignee}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn assignees(&self) -> Vec<MemberId> {
        match self {
            Self::Single { assignee } => vec![assignee.clone()],
            Self::MultiIndependent { assignees } => assignees.clone(),
            Self::UnassignedPool => Vec::new(),
        }
    }

    /// Slots materialized eagerly when the template is created or edited.
    ///
    /// The pool slot is created lazily by the first claim, so pool mode has none.
    pub fn eager_slots(&self) -> Vec<Slot> {
        self.assignees().into_iter().map(Slot::Member).collect()
    }

    /// Builds a mode from its wire name and an assignee list.
    pub fn from_parts(name: &str, assignees: Vec<MemberId>) -> Result<Self, ValidationError> {
        let mode = match name.trim() {
            "single" => {
                if assignees.len() != 1 {
                    return Err(ValidationError::new(
                        "assignees",
                        format!(
                            "single mode needs exactly one assignee, got {}",
                            assignees.len()
                        ),
                    ));
                }
                let Some(assignee) = assignees.into_iter().next() else {
                    return Err(ValidationError::new("assignees", "missing assignee"));
                };
                Self::Single { assignee }
            }
            "multiIndependent" => Self::MultiIndependent { assignees },
            "unassignedPool" => {
                if !assignees.is_empty() {
                    return Err(ValidationError::new(
                        "assignees",
                        "unassignedPool mode takes no assignees",
                    ));
                }
                Self::UnassignedPool
            }
            other => {
                return Err(ValidationError::new(
                    "assignmentMode",
                    format!("unknown mode {other:?}; expected single, multiIndependent or unassignedPool"),
                ));
            }
        };
        mode.validate()?;
        Ok(mode)
    }
}

/// Uniqueness key of an assignment within its template.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Slot {
    Member(MemberId),
    Pool,
}

impl Slot {
    pub fn key(&self) -> String {
        match self {
            Self::Member(member) => format!("{MEMBER_SLOT_PREFIX}{member}"),
            Self::Pool => POOL_SLOT_KEY.to_string(),
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        if key == POOL_SLOT_KEY {
            return Some(Self::Pool);
        }
        let member = key.strip_prefix(MEMBER_SLOT_PREFIX)?;
        MemberId::try_new(member).ok().map(Self::Member)
    }

    pub fn is_pool(&self) -> bool {
        matches!(self, Self::Pool)
    }
}

impl TryFrom<String> for Slot {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid slot key {value:?}"))
    }
}

impl From<Slot> for String {
    fn from(value: Slot) -> Self {
        value.key()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub family_id: FamilyId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assignment_mode: AssignmentMode,
    pub reward: RewardPolicy,
    pub recurrence: Recurrence,
}

impl TemplateSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        self.assignment_mode.validate()?;
        self.reward.validate()?;
        self.recurrence.validate()?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("title", "must not be empty"));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::new(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::new(
            "description",
            format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoreTemplate {
    pub id: TemplateId,
    pub family_id: FamilyId,
    pub revision: i64,
    pub title: String,
    pub description: String,
    pub assignment_mode: AssignmentMode,
    pub reward: RewardPolicy,
    pub recurrence: Recurrence,
    pub enabled: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ChoreTemplate {
    /// Applies a patch and re-validates the result as a whole.
    pub fn patched(&self, patch: &TemplatePatch) -> Result<ChoreTemplate, ValidationError> {
        let spec = TemplateSpec {
            family_id: self.family_id.clone(),
            title: patch
                .title
                .as_deref()
                .map(|title| title.trim().to_string())
                .unwrap_or_else(|| self.title.clone()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            assignment_mode: patch
                .assignment_mode
                .clone()
                .unwrap_or_else(|| self.assignment_mode.clone()),
            reward: patch.reward.clone().unwrap_or_else(|| self.reward.clone()),
            recurrence: patch.recurrence.unwrap_or(self.recurrence),
        };
        spec.validate()?;

        Ok(ChoreTemplate {
            id: self.id.clone(),
            family_id: spec.family_id,
            revision: self.revision,
            title: spec.title,
            description: spec.description,
            assignment_mode: spec.assignment_mode,
            reward: spec.reward,
            recurrence: spec.recurrence,
            enabled: self.enabled,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignment_mode: Option<AssignmentMode>,
    pub reward: Option<RewardPolicy>,
    pub recurrence: Option<Recurrence>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.assignment_mode.is_none()
            && self.reward.is_none()
            && self.recurrence.is_none()
    }
}

/// Slot changes needed to move a template's live assignments onto a new mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotPlan {
    pub retire: Vec<Slot>,
    pub create: Vec<Slot>,
}

impl SlotPlan {
    pub fn is_noop(&self) -> bool {
        self.retire.is_empty() && self.create.is_empty()
    }
}

/// Slots kept by the target mode survive untouched; the rest are retired and
/// missing eager slots are created.
pub fn reconcile_slots(current: &[Slot], target: &AssignmentMode) -> SlotPlan {
    let wanted: BTreeSet<Slot> = if target.is_pool() {
        current.iter().filter(|slot| slot.is_pool()).cloned().collect()
    } else {
        target.eager_slots().into_iter().collect()
    };
    let existing: BTreeSet<Slot> = current.iter().cloned().collect();

    SlotPlan {
        retire: existing.difference(&wanted).cloned().collect(),
        create: wanted.difference(&existing).cloned().collect(),
    }
}
