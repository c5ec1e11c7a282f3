//! Quote schema migrations.
//!
//! # Invariants
//! - Steps are listed in increasing `version` order; the store's
//!   `PRAGMA user_version` names the last step applied.
//! - Pending steps apply inside one transaction, so a failed step leaves
//!   the previous schema untouched.
//! - v1 creates `quotes` and the `(date_created DESC, seq DESC)` index that
//!   serves both browse and search ordering.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "quotes",
    sql: include_str!("0001_quotes.sql"),
}];

/// Schema version this binary reads and writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the store up to [`latest_version`].
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the store is newer.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = current_user_version(conn)?;
    let latest_supported = latest_version();
    if from_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported,
        });
    }

    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    for step in pending {
        info!(
            "event=db_migrate module=db status=ok version={} step={}",
            step.version, step.name
        );
    }
    Ok(())
}

/// Reads the schema version recorded in the store.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
