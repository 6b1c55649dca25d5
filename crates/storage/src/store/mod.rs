#![forbid(unsafe_code)]

mod assignments;
mod balances;
mod error;
mod members;
mod requests;
mod rows;
mod templates;
mod transitions;
mod views;

pub use error::StoreError;
pub use requests::*;
pub use views::*;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, ffi, params};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DB_FILE_NAME: &str = "choreboard.db";
const SCHEMA_VERSION: i64 = 1;

#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// How long a writer waits for another connection's transaction.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(storage_dir, StoreConfig::default())
    }

    pub fn open_with(storage_dir: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            "#,
        )?;

        preflight_gate(&conn)?;
        install_schema(&conn)?;
        info!(path = %db_path.display(), "chore store opened");

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Writers take the database lock up front so that concurrent writers
    /// queue behind each other instead of failing on lock upgrade.
    fn write_tx(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

const REQUIRED_TABLES: [&str; 8] = [
    "store_state",
    "counters",
    "members",
    "templates",
    "assignments",
    "reward_events",
    "adjustments",
    "payouts",
];

/// A fresh file passes. Anything else must carry exactly this schema's tables
/// at this schema's version; the store never migrates in place.
fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let existing = existing_tables(conn)?;
    if existing.is_empty() {
        return Ok(());
    }
    let expected: BTreeSet<String> = REQUIRED_TABLES.iter().map(|name| name.to_string()).collect();
    if existing != expected {
        return Err(StoreError::ResetRequired("table set does not match this schema"));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    if version != Some(SCHEMA_VERSION) {
        return Err(StoreError::ResetRequired("schema version mismatch"));
    }
    Ok(())
}

fn existing_tables(conn: &Connection) -> Result<BTreeSet<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok(names)
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS members (
          member_id TEXT PRIMARY KEY,
          family_id TEXT NOT NULL,
          role TEXT NOT NULL CHECK(role IN ('parent', 'child')),
          created_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_members_family ON members(family_id);

        CREATE TABLE IF NOT EXISTS templates (
          id TEXT PRIMARY KEY,
          family_id TEXT NOT NULL,
          revision INTEGER NOT NULL,
          title TEXT NOT NULL,
          description TEXT NOT NULL,
          mode_kind TEXT NOT NULL,
          mode_json TEXT NOT NULL,
          reward_json TEXT NOT NULL,
          recurrence_json TEXT NOT NULL,
          enabled INTEGER NOT NULL CHECK(enabled IN (0, 1)),
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_templates_family ON templates(family_id, enabled, id);

        CREATE TABLE IF NOT EXISTS assignments (
          id TEXT PRIMARY KEY,
          template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE RESTRICT,
          slot TEXT NOT NULL,
          assignee_id TEXT,
          state TEXT NOT NULL CHECK(state IN ('available', 'completed', 'approved')),
          round INTEGER NOT NULL CHECK(round >= 1),
          revision INTEGER NOT NULL,
          completed_at_ms INTEGER,
          approved_at_ms INTEGER,
          approved_reward TEXT,
          rejection_reason TEXT,
          next_available_at_ms INTEGER,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          retired_at_ms INTEGER,
          CHECK(state <> 'completed' OR (assignee_id IS NOT NULL AND completed_at_ms IS NOT NULL)),
          CHECK(state <> 'approved' OR (assignee_id IS NOT NULL AND approved_at_ms IS NOT NULL AND approved_reward IS NOT NULL))
        );

        -- One live assignment per (template, slot). For pool templates the
        -- slot is the fixed 'pool' marker, so only one claim can ever create it.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_live_slot
          ON assignments(template_id, slot) WHERE retired_at_ms IS NULL;

        CREATE INDEX IF NOT EXISTS idx_assignments_assignee
          ON assignments(assignee_id, state);

        CREATE INDEX IF NOT EXISTS idx_assignments_state
          ON assignments(state, template_id);

        CREATE TABLE IF NOT EXISTS reward_events (
          id TEXT PRIMARY KEY,
          assignee_id TEXT NOT NULL,
          amount TEXT NOT NULL,
          source_assignment_id TEXT NOT NULL REFERENCES assignments(id) ON DELETE RESTRICT,
          round INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          UNIQUE(source_assignment_id, round)
        );

        CREATE INDEX IF NOT EXISTS idx_reward_events_assignee
          ON reward_events(assignee_id, created_at_ms);

        CREATE TABLE IF NOT EXISTS adjustments (
          id TEXT PRIMARY KEY,
          child_id TEXT NOT NULL,
          amount TEXT NOT NULL,
          reason TEXT NOT NULL,
          created_by TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_adjustments_child
          ON adjustments(child_id, created_at_ms);

        CREATE TABLE IF NOT EXISTS payouts (
          id TEXT PRIMARY KEY,
          child_id TEXT NOT NULL,
          amount TEXT NOT NULL,
          note TEXT,
          created_by TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_payouts_child
          ON payouts(child_id, created_at_ms);

        CREATE TRIGGER IF NOT EXISTS reward_events_append_only_update
          BEFORE UPDATE ON reward_events
          BEGIN SELECT RAISE(ABORT, 'reward_events is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS reward_events_append_only_delete
          BEFORE DELETE ON reward_events
          BEGIN SELECT RAISE(ABORT, 'reward_events is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS adjustments_append_only_update
          BEFORE UPDATE ON adjustments
          BEGIN SELECT RAISE(ABORT, 'adjustments is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS adjustments_append_only_delete
          BEFORE DELETE ON adjustments
          BEGIN SELECT RAISE(ABORT, 'adjustments is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS payouts_append_only_update
          BEFORE UPDATE ON payouts
          BEGIN SELECT RAISE(ABORT, 'payouts is append-only'); END;

        CREATE TRIGGER IF NOT EXISTS payouts_append_only_delete
          BEFORE DELETE ON payouts
          BEGIN SELECT RAISE(ABORT, 'payouts is append-only'); END;
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version) VALUES (1, ?1) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version",
        params![SCHEMA_VERSION],
    )?;
    debug!(version = SCHEMA_VERSION, "schema installed");

    Ok(())
}

/// Hands out sequential ids such as `CHORE-0001`.
fn next_id_tx(tx: &Transaction<'_>, counter: &str, prefix: &str) -> Result<String, StoreError> {
    tx.execute(
        "INSERT INTO counters(name, value) VALUES (?1, 1) \
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        params![counter],
    )?;
    let value = tx.query_row(
        "SELECT value FROM counters WHERE name=?1",
        params![counter],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(format!("{prefix}-{value:04}"))
}

/// Unique or primary key collisions; other constraint failures are bugs, not races.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
