// Audit journal at `~/.redline/audit.db`.
//
// Every plan, preview, and apply leaves a row. The journal is append-only
// from the pipeline's point of view; nothing in the daemon reads it back
// except diagnostics and tests.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE plans (
    plan_id         TEXT PRIMARY KEY,
    handle_id       TEXT NOT NULL,
    path            TEXT NOT NULL,
    intent_kind     TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE previews (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_id         TEXT NOT NULL,
    preview_seq     INTEGER NOT NULL,
    fragment_count  INTEGER NOT NULL,
    safety_score    REAL NOT NULL,
    ambiguous       INTEGER NOT NULL,
    content_hash    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE applies (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_id             TEXT NOT NULL,
    idempotency_key     TEXT NOT NULL,
    status              TEXT NOT NULL,
    paragraphs_changed  INTEGER NOT NULL,
    content_hash        TEXT NOT NULL,
    replayed            INTEGER NOT NULL,
    applied_at          TEXT NOT NULL
);

CREATE INDEX applies_key_idx ON applies (idempotency_key);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL)];

#[derive(Debug)]
pub struct AuditDb {
    conn: Connection,
}

impl AuditDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create audit.db parent directory `{}`", parent.display())
            })?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("failed to open audit.db at `{}`", path.display()))?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            ",
        )
        .context("failed to configure sqlite pragmas for audit.db")?;

        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    /// In-memory journal for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn =
            Connection::open_in_memory().context("failed to open in-memory audit.db")?;
        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn record_plan(
        &self,
        plan_id: Uuid,
        handle_id: Uuid,
        path: &str,
        intent_kind: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO plans (plan_id, handle_id, path, intent_kind, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'NEW', ?5)",
                params![
                    plan_id.to_string(),
                    handle_id.to_string(),
                    path,
                    intent_kind,
                    created_at.to_rfc3339(),
                ],
            )
            .context("failed to record plan in audit journal")?;
        Ok(())
    }

    pub fn update_plan_status(&self, plan_id: Uuid, status: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE plans SET status = ?2 WHERE plan_id = ?1",
                params![plan_id.to_string(), status],
            )
            .context("failed to update plan status in audit journal")?;
        Ok(())
    }

    pub fn record_preview(
        &self,
        plan_id: Uuid,
        preview_seq: u64,
        fragment_count: usize,
        safety_score: f64,
        ambiguous: bool,
        content_hash: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO previews
                     (plan_id, preview_seq, fragment_count, safety_score, ambiguous,
                      content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
                params![
                    plan_id.to_string(),
                    preview_seq as i64,
                    fragment_count as i64,
                    safety_score,
                    ambiguous as i64,
                    content_hash,
                ],
            )
            .context("failed to record preview in audit journal")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_apply(
        &self,
        plan_id: Uuid,
        idempotency_key: &str,
        status: &str,
        paragraphs_changed: usize,
        content_hash: &str,
        replayed: bool,
        applied_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO applies
                     (plan_id, idempotency_key, status, paragraphs_changed, content_hash,
                      replayed, applied_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    plan_id.to_string(),
                    idempotency_key,
                    status,
                    paragraphs_changed as i64,
                    content_hash,
                    replayed as i64,
                    applied_at.to_rfc3339(),
                ],
            )
            .context("failed to record apply in audit journal")?;
        Ok(())
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let mut current_version = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply audit.db migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
        current_version = *version;
    }

    Ok(())
}
