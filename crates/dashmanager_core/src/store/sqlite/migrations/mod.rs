//! Bundled schema for the SQLite dashboard store.
//!
//! # Invariants
//! - Steps are listed in strictly increasing `version` order.
//! - `PRAGMA user_version` holds the last applied step; a database ahead of
//!   this binary is refused, never downgraded.
//! - All pending steps commit together or not at all.

use crate::store::{StoreError, StoreResult};
use log::info;
use rusqlite::Connection;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "dashboard_tables",
    sql: include_str!("0001_init.sql"),
}];

/// Schema version this binary brings a database up to.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

fn pending_steps(from_version: u32) -> impl Iterator<Item = &'static SchemaStep> {
    SCHEMA_STEPS
        .iter()
        .filter(move |step| step.version > from_version)
}

/// Brings the schema up to `latest_version()` and returns how many steps ran.
pub fn apply_migrations(conn: &mut Connection) -> StoreResult<usize> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(StoreError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let started_at = Instant::now();
    let tx = conn.transaction()?;
    let mut applied = 0;
    for step in pending_steps(from_version) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=store_migrate module=store status=ok version={} name={}",
            step.version, step.name
        );
        applied += 1;
    }
    tx.commit()?;

    if applied > 0 {
        info!(
            "event=store_migrate module=store status=ok from={from_version} to={latest} steps={applied} duration_ms={}",
            started_at.elapsed().as_millis()
        );
    }
    Ok(applied)
}
