//! In-memory location store.
//!
//! Mirrors the `SQLite` adapter's contract without any I/O. Used by tests
//! and by hosts that run without durable storage. Availability can be
//! toggled at runtime to exercise the pipeline's failure paths, and the
//! legacy table can be made to refuse being dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use locus_types::{LegacyRecord, LocationRecord, OwnerId, RecordKey};

use crate::error::DbError;

/// Rows and id sequence held behind the store's mutex.
#[derive(Debug, Default)]
struct MemoryTables {
    next_id: i64,
    rows: BTreeMap<i64, LocationRecord>,
    legacy: Option<Vec<LegacyRecord>>,
}

impl MemoryTables {
    fn push(&mut self, record: &LocationRecord) -> i64 {
        self.next_id = self.next_id.saturating_add(1);
        let id = self.next_id;
        self.rows.insert(id, record.clone().with_id(id));
        id
    }
}

/// A location store that keeps rows in process memory.
#[derive(Debug)]
pub struct MemoryLocationStore {
    tables: Mutex<MemoryTables>,
    available: AtomicBool,
    legacy_locked: AtomicBool,
}

impl Default for MemoryLocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLocationStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(MemoryTables::default()),
            available: AtomicBool::new(true),
            legacy_locked: AtomicBool::new(false),
        }
    }

    /// Create a store whose legacy table holds `rows`.
    pub fn with_legacy(rows: Vec<LegacyRecord>) -> Self {
        let store = Self::new();
        store.lock().legacy = Some(rows);
        store
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make dropping the legacy table fail (or succeed again).
    pub fn set_legacy_locked(&self, locked: bool) {
        self.legacy_locked.store(locked, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), DbError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DbError::Unavailable(String::from("memory store offline")))
        }
    }

    /// No schema to create; only checks availability.
    pub fn create_table_if_absent(&self) -> Result<(), DbError> {
        self.check()
    }

    /// Insert a record as a new row and return its row id.
    pub fn insert(&self, record: &LocationRecord) -> Result<i64, DbError> {
        self.check()?;
        Ok(self.lock().push(record))
    }

    /// Overwrite the row identified by the record's row id.
    ///
    /// Updating a row that no longer exists is a no-op, as in SQL.
    pub fn update(&self, record: &LocationRecord) -> Result<(), DbError> {
        self.check()?;
        let Some(id) = record.id else {
            return Err(DbError::InvalidRow {
                id: 0,
                reason: format!("cannot update unflushed record for {}", record.owner),
            });
        };
        let mut tables = self.lock();
        if let Some(row) = tables.rows.get_mut(&id) {
            *row = record.clone();
        }
        Ok(())
    }

    /// Find the oldest row matching a record key.
    pub fn find_matching(&self, key: &RecordKey) -> Result<Option<LocationRecord>, DbError> {
        self.check()?;
        Ok(self
            .lock()
            .rows
            .values()
            .find(|row| row.matches(key))
            .cloned())
    }

    /// Fetch every row belonging to an owner, oldest first.
    pub fn find_all_by_owner(&self, owner: OwnerId) -> Result<Vec<LocationRecord>, DbError> {
        self.check()?;
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|row| row.owner == owner)
            .cloned()
            .collect())
    }

    /// Delete every row in a world and return how many were removed.
    pub fn delete_where_world(&self, world: &str) -> Result<u64, DbError> {
        self.check()?;
        let mut tables = self.lock();
        let before = tables.rows.len();
        tables.rows.retain(|_, row| row.world != world);
        let removed = before.saturating_sub(tables.rows.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    /// Whether the legacy table exists.
    pub fn legacy_table_exists(&self) -> Result<bool, DbError> {
        self.check()?;
        Ok(self.lock().legacy.is_some())
    }

    /// Read every legacy row.
    pub fn fetch_legacy(&self) -> Result<Vec<Result<LegacyRecord, DbError>>, DbError> {
        self.check()?;
        Ok(self
            .lock()
            .legacy
            .iter()
            .flatten()
            .cloned()
            .map(Ok)
            .collect())
    }

    /// Insert converted legacy records and drop the legacy table under one
    /// lock; on failure nothing changes.
    pub fn commit_legacy_import(&self, records: &[LocationRecord]) -> Result<u64, DbError> {
        self.check()?;
        if self.legacy_locked.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable(String::from("legacy table is locked")));
        }
        let mut tables = self.lock();
        for record in records {
            tables.push(record);
        }
        tables.legacy = None;
        Ok(u64::try_from(records.len()).unwrap_or(u64::MAX))
    }

    /// Count rows in the main table.
    pub fn count(&self) -> Result<u64, DbError> {
        self.check()?;
        Ok(u64::try_from(self.lock().rows.len()).unwrap_or(u64::MAX))
    }
}
