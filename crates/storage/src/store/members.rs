#![forbid(unsafe_code)]

use super::rows::load_membership;
use super::{RegisterMemberRequest, SqliteStore, StoreError};
use cb_core::{FamilyId, MemberId, Membership, ValidationError};
use rusqlite::{Connection, params};
use tracing::info;

impl SqliteStore {
    /// Registers a member in exactly one family. Re-registering the same
    /// membership is a no-op; moving a member elsewhere is a conflict.
    pub fn register_member(
        &mut self,
        request: RegisterMemberRequest,
    ) -> Result<Membership, StoreError> {
        let tx = self.write_tx()?;
        let wanted = Membership {
            member_id: request.member_id,
            family_id: request.family_id,
            role: request.role,
        };

        if let Some(existing) = load_membership(&tx, &wanted.member_id)? {
            if existing == wanted {
                return Ok(existing);
            }
            return Err(StoreError::conflict(format!(
                "member {} is already registered as {} in family {}",
                existing.member_id,
                existing.role.as_str(),
                existing.family_id
            )));
        }

        tx.execute(
            "INSERT INTO members(member_id, family_id, role, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![
                wanted.member_id.as_str(),
                wanted.family_id.as_str(),
                wanted.role.as_str(),
                request.created_at_ms
            ],
        )?;
        tx.commit()?;
        info!(
            member = %wanted.member_id,
            family = %wanted.family_id,
            role = wanted.role.as_str(),
            "member registered"
        );
        Ok(wanted)
    }

    pub fn membership(&self, member_id: &MemberId) -> Result<Option<Membership>, StoreError> {
        load_membership(&self.conn, member_id)
    }
}

/// Unknown actors are treated as unauthorized, never as missing records.
pub(super) fn require_actor(conn: &Connection, actor_id: &MemberId) -> Result<Membership, StoreError> {
    load_membership(conn, actor_id)?
        .ok_or_else(|| StoreError::unauthorized(format!("unknown actor {actor_id}")))
}

pub(super) fn require_parent_of(
    conn: &Connection,
    actor_id: &MemberId,
    family_id: &FamilyId,
) -> Result<Membership, StoreError> {
    let actor = require_actor(conn, actor_id)?;
    if !actor.can_administer(family_id) {
        return Err(StoreError::unauthorized(format!(
            "{actor_id} is not a parent in family {family_id}"
        )));
    }
    Ok(actor)
}

pub(super) fn require_member(conn: &Connection, member_id: &MemberId) -> Result<Membership, StoreError> {
    load_membership(conn, member_id)?.ok_or_else(|| StoreError::not_found("member", member_id.as_str()))
}

/// Every assignee named by a mode must belong to the template's family.
pub(super) fn require_assignees_in_family(
    conn: &Connection,
    assignees: &[MemberId],
    family_id: &FamilyId,
) -> Result<(), StoreError> {
    for assignee in assignees {
        let known = load_membership(conn, assignee)?;
        if !known.is_some_and(|membership| membership.in_family(family_id)) {
            return Err(ValidationError::new(
                "assignees",
                format!("{assignee} is not a member of family {family_id}"),
            )
            .into());
        }
    }
    Ok(())
}
