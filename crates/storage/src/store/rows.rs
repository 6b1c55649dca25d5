#![forbid(unsafe_code)]

//! Raw row shapes and their decoding into domain values.
//!
//! Column text that fails to decode is reported as `StoreError::Corrupt`;
//! it can only come from a database edited outside this crate.

use super::StoreError;
use cb_core::{
    Adjustment, Assignment, AssignmentId, AssignmentMode, AssignmentState, ChoreTemplate, FamilyId,
    MemberId, Membership, Money, Payout, Recurrence, RewardEvent, RewardPolicy, Role, Slot,
    TemplateId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

pub(super) const TEMPLATE_COLUMNS: &str = "id, family_id, revision, title, description, \
     mode_json, reward_json, recurrence_json, enabled, created_at_ms, updated_at_ms";

pub(super) const ASSIGNMENT_COLUMNS: &str = "a.id, a.template_id, a.slot, a.assignee_id, a.state, \
     a.round, a.revision, a.completed_at_ms, a.approved_at_ms, a.approved_reward, \
     a.rejection_reason, a.next_available_at_ms, a.retired_at_ms";

pub(super) struct TemplateRow {
    id: String,
    family_id: String,
    revision: i64,
    title: String,
    description: String,
    mode_json: String,
    reward_json: String,
    recurrence_json: String,
    enabled: i64,
    created_at_ms: i64,
    updated_at_ms: i64,
}

pub(super) fn read_template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        id: row.get(0)?,
        family_id: row.get(1)?,
        revision: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        mode_json: row.get(5)?,
        reward_json: row.get(6)?,
        recurrence_json: row.get(7)?,
        enabled: row.get(8)?,
        created_at_ms: row.get(9)?,
        updated_at_ms: row.get(10)?,
    })
}

impl TemplateRow {
    pub(super) fn decode(self) -> Result<ChoreTemplate, StoreError> {
        let assignment_mode: AssignmentMode = serde_json::from_str(&self.mode_json)
            .map_err(|_| StoreError::Corrupt("templates.mode_json"))?;
        let reward: RewardPolicy = serde_json::from_str(&self.reward_json)
            .map_err(|_| StoreError::Corrupt("templates.reward_json"))?;
        let recurrence: Recurrence = serde_json::from_str(&self.recurrence_json)
            .map_err(|_| StoreError::Corrupt("templates.recurrence_json"))?;
        Ok(ChoreTemplate {
            id: TemplateId::try_new(self.id).map_err(|_| StoreError::Corrupt("templates.id"))?,
            family_id: FamilyId::try_new(self.family_id)
                .map_err(|_| StoreError::Corrupt("templates.family_id"))?,
            revision: self.revision,
            title: self.title,
            description: self.description,
            assignment_mode,
            reward,
            recurrence,
            enabled: self.enabled != 0,
            created_at_ms: self.created_at_ms,
            updated_at_ms: self.updated_at_ms,
        })
    }
}

pub(super) struct TemplateJson {
    pub(super) mode: String,
    pub(super) reward: String,
    pub(super) recurrence: String,
}

pub(super) fn encode_template_json(template: &ChoreTemplate) -> Result<TemplateJson, StoreError> {
    Ok(TemplateJson {
        mode: serde_json::to_string(&template.assignment_mode)
            .map_err(|_| StoreError::Corrupt("assignment mode did not serialize"))?,
        reward: serde_json::to_string(&template.reward)
            .map_err(|_| StoreError::Corrupt("reward policy did not serialize"))?,
        recurrence: serde_json::to_string(&template.recurrence)
            .map_err(|_| StoreError::Corrupt("recurrence did not serialize"))?,
    })
}

/// An assignment plus the bookkeeping column that never leaves the store.
pub(super) struct StoredAssignment {
    pub(super) assignment: Assignment,
    pub(super) retired_at_ms: Option<i64>,
}

impl StoredAssignment {
    pub(super) fn is_retired(&self) -> bool {
        self.retired_at_ms.is_some()
    }
}

pub(super) struct AssignmentRow {
    id: String,
    template_id: String,
    slot: String,
    assignee_id: Option<String>,
    state: String,
    round: i64,
    revision: i64,
    completed_at_ms: Option<i64>,
    approved_at_ms: Option<i64>,
    approved_reward: Option<String>,
    rejection_reason: Option<String>,
    next_available_at_ms: Option<i64>,
    retired_at_ms: Option<i64>,
}

/// Reads the columns listed in [`ASSIGNMENT_COLUMNS`], starting at `offset`.
pub(super) fn read_assignment_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<AssignmentRow> {
    Ok(AssignmentRow {
        id: row.get(offset)?,
        template_id: row.get(offset + 1)?,
        slot: row.get(offset + 2)?,
        assignee_id: row.get(offset + 3)?,
        state: row.get(offset + 4)?,
        round: row.get(offset + 5)?,
        revision: row.get(offset + 6)?,
        completed_at_ms: row.get(offset + 7)?,
        approved_at_ms: row.get(offset + 8)?,
        approved_reward: row.get(offset + 9)?,
        rejection_reason: row.get(offset + 10)?,
        next_available_at_ms: row.get(offset + 11)?,
        retired_at_ms: row.get(offset + 12)?,
    })
}

impl AssignmentRow {
    pub(super) fn decode(self) -> Result<StoredAssignment, StoreError> {
        let assignee_id = match self.assignee_id {
            Some(raw) => Some(
                MemberId::try_new(raw).map_err(|_| StoreError::Corrupt("assignments.assignee_id"))?,
            ),
            None => None,
        };
        let approved_reward = match self.approved_reward {
            Some(raw) => Some(decode_money(&raw, "assignments.approved_reward")?),
            None => None,
        };
        let assignment = Assignment {
            id: AssignmentId::try_new(self.id)
                .map_err(|_| StoreError::Corrupt("assignments.id"))?,
            template_id: TemplateId::try_new(self.template_id)
                .map_err(|_| StoreError::Corrupt("assignments.template_id"))?,
            slot: Slot::parse(&self.slot).ok_or(StoreError::Corrupt("assignments.slot"))?,
            assignee_id,
            state: AssignmentState::parse(&self.state)
                .ok_or(StoreError::Corrupt("assignments.state"))?,
            round: u32::try_from(self.round).map_err(|_| StoreError::Corrupt("assignments.round"))?,
            revision: self.revision,
            completed_at_ms: self.completed_at_ms,
            approved_at_ms: self.approved_at_ms,
            approved_reward,
            rejection_reason: self.rejection_reason,
            next_available_at_ms: self.next_available_at_ms,
        };
        Ok(StoredAssignment {
            assignment,
            retired_at_ms: self.retired_at_ms,
        })
    }
}

pub(super) fn decode_money(raw: &str, column: &'static str) -> Result<Money, StoreError> {
    Money::parse(raw).map_err(|_| StoreError::Corrupt(column))
}

fn decode_member(raw: String, column: &'static str) -> Result<MemberId, StoreError> {
    MemberId::try_new(raw).map_err(|_| StoreError::Corrupt(column))
}

pub(super) fn load_template(conn: &Connection, id: &TemplateId) -> Result<ChoreTemplate, StoreError> {
    let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id=?1");
    let row = conn
        .query_row(&sql, params![id.as_str()], read_template_row)
        .optional()?;
    match row {
        Some(row) => row.decode(),
        None => Err(StoreError::not_found("template", id.as_str())),
    }
}

pub(super) fn load_assignment(
    conn: &Connection,
    id: &AssignmentId,
) -> Result<StoredAssignment, StoreError> {
    let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments a WHERE a.id=?1");
    let row = conn
        .query_row(&sql, params![id.as_str()], |row| read_assignment_row(row, 0))
        .optional()?;
    match row {
        Some(row) => row.decode(),
        None => Err(StoreError::not_found("assignment", id.as_str())),
    }
}

/// Live (non-retired) assignments of one template, ordered by slot.
pub(super) fn load_live_assignments(
    conn: &Connection,
    template_id: &TemplateId,
) -> Result<Vec<Assignment>, StoreError> {
    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a \
         WHERE a.template_id=?1 AND a.retired_at_ms IS NULL ORDER BY a.slot ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![template_id.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_assignment_row(row, 0)?.decode()?.assignment);
    }
    Ok(out)
}

pub(super) fn load_live_slot(
    conn: &Connection,
    template_id: &TemplateId,
    slot: &Slot,
) -> Result<Option<Assignment>, StoreError> {
    let sql = format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments a \
         WHERE a.template_id=?1 AND a.slot=?2 AND a.retired_at_ms IS NULL"
    );
    let row = conn
        .query_row(&sql, params![template_id.as_str(), slot.key()], |row| {
            read_assignment_row(row, 0)
        })
        .optional()?;
    match row {
        Some(row) => Ok(Some(row.decode()?.assignment)),
        None => Ok(None),
    }
}

pub(super) fn load_membership(
    conn: &Connection,
    member_id: &MemberId,
) -> Result<Option<Membership>, StoreError> {
    let row = conn
        .query_row(
            "SELECT family_id, role FROM members WHERE member_id=?1",
            params![member_id.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((family_id, role)) = row else {
        return Ok(None);
    };
    Ok(Some(Membership {
        member_id: member_id.clone(),
        family_id: FamilyId::try_new(family_id)
            .map_err(|_| StoreError::Corrupt("members.family_id"))?,
        role: Role::parse(&role).ok_or(StoreError::Corrupt("members.role"))?,
    }))
}

pub(super) fn load_reward_events(
    conn: &Connection,
    member_id: &MemberId,
) -> Result<Vec<RewardEvent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, source_assignment_id, round, created_at_ms FROM reward_events \
         WHERE assignee_id=?1 ORDER BY created_at_ms ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![member_id.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let amount: String = row.get(1)?;
        let source: String = row.get(2)?;
        let round: i64 = row.get(3)?;
        out.push(RewardEvent {
            id: row.get(0)?,
            assignee_id: member_id.clone(),
            amount: decode_money(&amount, "reward_events.amount")?,
            source_assignment_id: AssignmentId::try_new(source)
                .map_err(|_| StoreError::Corrupt("reward_events.source_assignment_id"))?,
            round: u32::try_from(round).map_err(|_| StoreError::Corrupt("reward_events.round"))?,
            created_at_ms: row.get(4)?,
        });
    }
    Ok(out)
}

pub(super) fn load_adjustments(
    conn: &Connection,
    child_id: &MemberId,
) -> Result<Vec<Adjustment>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, reason, created_by, created_at_ms FROM adjustments \
         WHERE child_id=?1 ORDER BY created_at_ms ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![child_id.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let amount: String = row.get(1)?;
        out.push(Adjustment {
            id: row.get(0)?,
            child_id: child_id.clone(),
            amount: decode_money(&amount, "adjustments.amount")?,
            reason: row.get(2)?,
            created_by: decode_member(row.get(3)?, "adjustments.created_by")?,
            created_at_ms: row.get(4)?,
        });
    }
    Ok(out)
}

pub(super) fn load_payouts(conn: &Connection, child_id: &MemberId) -> Result<Vec<Payout>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, note, created_by, created_at_ms FROM payouts \
         WHERE child_id=?1 ORDER BY created_at_ms ASC, id ASC",
    )?;
    let mut rows = stmt.query(params![child_id.as_str()])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let amount: String = row.get(1)?;
        out.push(Payout {
            id: row.get(0)?,
            child_id: child_id.clone(),
            amount: decode_money(&amount, "payouts.amount")?,
            note: row.get(2)?,
            created_by: decode_member(row.get(3)?, "payouts.created_by")?,
            created_at_ms: row.get(4)?,
        });
    }
    Ok(out)
}
