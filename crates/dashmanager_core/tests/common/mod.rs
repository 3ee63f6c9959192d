#![allow(dead_code)]

use dashmanager_core::store::{Filter, Row, Select, Table};
use dashmanager_core::{
    open_store_in_memory, Backend, DataStore, DomainSync, SqliteDataStore, StoreError,
    StoreResult,
};
use std::sync::{Arc, Mutex};

/// Fault switches shared between a test and its `FailingStore`.
#[derive(Debug, Default)]
pub struct Faults {
    /// Every write call fails while set.
    pub fail_writes: bool,
    /// Only the n-th write call (1-based, counted from now on) fails.
    pub fail_write_number: Option<usize>,
    /// Selects against this table fail.
    pub fail_select_on: Option<Table>,
    pub writes: usize,
    pub write_log: Vec<(&'static str, &'static str)>,
}

/// SQLite-backed store that can be told to fail.
pub struct FailingStore {
    inner: SqliteDataStore,
    faults: Arc<Mutex<Faults>>,
}

impl FailingStore {
    pub fn new(inner: SqliteDataStore) -> (Self, Arc<Mutex<Faults>>) {
        let faults = Arc::new(Mutex::new(Faults::default()));
        (
            Self {
                inner,
                faults: Arc::clone(&faults),
            },
            faults,
        )
    }

    fn before_write(&self, op: &'static str, table: Table) -> StoreResult<()> {
        let mut faults = self.faults.lock().unwrap();
        faults.writes += 1;
        faults.write_log.push((op, table.name()));
        let number = faults.writes;
        if faults.fail_writes || faults.fail_write_number == Some(number) {
            return Err(StoreError::Unavailable(format!(
                "injected {op} failure on {}",
                table.name()
            )));
        }
        Ok(())
    }
}

impl DataStore for FailingStore {
    fn check_connection(&self) -> StoreResult<()> {
        self.inner.check_connection()
    }

    fn select(&self, query: &Select) -> StoreResult<Vec<Row>> {
        if self.faults.lock().unwrap().fail_select_on == Some(query.table) {
            return Err(StoreError::Unavailable(format!(
                "injected select failure on {}",
                query.table.name()
            )));
        }
        self.inner.select(query)
    }

    fn insert(&self, table: Table, rows: &[Row]) -> StoreResult<Vec<Row>> {
        self.before_write("insert", table)?;
        self.inner.insert(table, rows)
    }

    fn update(&self, table: Table, values: &Row, filters: &[Filter]) -> StoreResult<usize> {
        self.before_write("update", table)?;
        self.inner.update(table, values, filters)
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> StoreResult<usize> {
        self.before_write("delete", table)?;
        self.inner.delete(table, filters)
    }
}

/// Synchronizer over a fresh in-memory SQLite store with fault injection.
pub fn remote_sync() -> (DomainSync, Arc<Mutex<Faults>>) {
    let (store, faults) = FailingStore::new(open_store_in_memory().unwrap());
    (DomainSync::new(Backend::Remote(Box::new(store))), faults)
}

pub fn reset_counters(faults: &Arc<Mutex<Faults>>) {
    let mut faults = faults.lock().unwrap();
    faults.writes = 0;
    faults.write_log.clear();
}

pub fn writes(faults: &Arc<Mutex<Faults>>) -> usize {
    faults.lock().unwrap().writes
}
