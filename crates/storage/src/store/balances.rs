#![forbid(unsafe_code)]

use super::members::{require_actor, require_member};
use super::rows::{load_adjustments, load_payouts, load_reward_events};
use super::{CreateAdjustmentRequest, RecordPayoutRequest, SqliteStore, StoreError, next_id_tx};
use cb_core::ledger::{validate_adjustment, validate_payout};
use cb_core::{Adjustment, Balance, MemberId, Membership, Money, Payout, RewardEvent};
use rusqlite::{Connection, params};
use tracing::info;

impl SqliteStore {
    /// Appends a signed manual correction to a member's ledger.
    pub fn create_adjustment(
        &mut self,
        request: CreateAdjustmentRequest,
    ) -> Result<Adjustment, StoreError> {
        let reason = validate_adjustment(request.amount, &request.reason)?;

        let tx = self.write_tx()?;
        require_ledger_admin(&tx, &request.actor_id, &request.child_id)?;

        let adjustment = Adjustment {
            id: next_id_tx(&tx, "adjustment", "ADJ")?,
            child_id: request.child_id,
            amount: request.amount,
            reason,
            created_by: request.actor_id,
            created_at_ms: request.created_at_ms,
        };
        tx.execute(
            r#"
            INSERT INTO adjustments(id, child_id, amount, reason, created_by, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                adjustment.id,
                adjustment.child_id.as_str(),
                adjustment.amount.to_string(),
                adjustment.reason,
                adjustment.created_by.as_str(),
                adjustment.created_at_ms,
            ],
        )?;
        tx.commit()?;

        info!(
            adjustment = %adjustment.id,
            child = %adjustment.child_id,
            amount = %adjustment.amount,
            "adjustment recorded"
        );
        Ok(adjustment)
    }

    /// Records money handed out. The payout must be covered by the balance
    /// at the moment it is written.
    pub fn record_payout(&mut self, request: RecordPayoutRequest) -> Result<Payout, StoreError> {
        let tx = self.write_tx()?;
        require_ledger_admin(&tx, &request.actor_id, &request.child_id)?;

        let balance = balance_tx(&tx, &request.child_id)?;
        let note = validate_payout(request.amount, balance.total, request.note.as_deref())?;

        let payout = Payout {
            id: next_id_tx(&tx, "payout", "PAY")?,
            child_id: request.child_id,
            amount: request.amount,
            note,
            created_by: request.actor_id,
            created_at_ms: request.created_at_ms,
        };
        tx.execute(
            r#"
            INSERT INTO payouts(id, child_id, amount, note, created_by, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                payout.id,
                payout.child_id.as_str(),
                payout.amount.to_string(),
                payout.note,
                payout.created_by.as_str(),
                payout.created_at_ms,
            ],
        )?;
        tx.commit()?;

        info!(
            payout = %payout.id,
            child = %payout.child_id,
            amount = %payout.amount,
            "payout recorded"
        );
        Ok(payout)
    }

    pub fn balance_for(&self, child_id: &MemberId) -> Result<Money, StoreError> {
        Ok(self.balance_breakdown(child_id)?.total)
    }

    /// Rewards, adjustments and payouts summed separately, plus the total.
    /// Always recomputed from the logs.
    pub fn balance_breakdown(&self, child_id: &MemberId) -> Result<Balance, StoreError> {
        require_member(&self.conn, child_id)?;
        balance_tx(&self.conn, child_id)
    }

    pub fn list_reward_events(&self, child_id: &MemberId) -> Result<Vec<RewardEvent>, StoreError> {
        require_member(&self.conn, child_id)?;
        load_reward_events(&self.conn, child_id)
    }

    pub fn list_adjustments(&self, child_id: &MemberId) -> Result<Vec<Adjustment>, StoreError> {
        require_member(&self.conn, child_id)?;
        load_adjustments(&self.conn, child_id)
    }

    pub fn list_payouts(&self, child_id: &MemberId) -> Result<Vec<Payout>, StoreError> {
        require_member(&self.conn, child_id)?;
        load_payouts(&self.conn, child_id)
    }
}

fn balance_tx(conn: &Connection, child_id: &MemberId) -> Result<Balance, StoreError> {
    let rewards = load_reward_events(conn, child_id)?;
    let adjustments = load_adjustments(conn, child_id)?;
    let payouts = load_payouts(conn, child_id)?;
    Ok(Balance::from_logs(&rewards, &adjustments, &payouts)?)
}

fn require_ledger_admin(
    conn: &Connection,
    actor_id: &MemberId,
    child_id: &MemberId,
) -> Result<Membership, StoreError> {
    let actor = require_actor(conn, actor_id)?;
    let child = require_member(conn, child_id)?;
    if !actor.can_approve_for(&child) {
        return Err(StoreError::unauthorized(format!(
            "{actor_id} may not change the ledger of {child_id}"
        )));
    }
    Ok(actor)
}
