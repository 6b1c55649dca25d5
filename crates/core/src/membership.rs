#![forbid(unsafe_code)]

use crate::ids::{FamilyId, MemberId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Parent,
    Child,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "parent" => Some(Self::Parent),
            "child" => Some(Self::Child),
            _ => None,
        }
    }
}

/// What the identity collaborator knows about an actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub member_id: MemberId,
    pub family_id: FamilyId,
    pub role: Role,
}

impl Membership {
    pub fn is_parent(&self) -> bool {
        self.role == Role::Parent
    }

    pub fn in_family(&self, family_id: &FamilyId) -> bool {
        &self.family_id == family_id
    }

    /// Parents administer templates and ledgers of their own family only.
    pub fn can_administer(&self, family_id: &FamilyId) -> bool {
        self.is_parent() && self.in_family(family_id)
    }

    pub fn can_approve_for(&self, assignee: &Membership) -> bool {
        self.can_administer(&assignee.family_id)
    }
}
