//! Persistence gateway: the storage port the cache writes through.
//!
//! Defines an enum-based dispatch over the available backends, avoiding the
//! dyn-compatibility issues with async trait methods. Each operation is a
//! single statement, except the legacy import, whose bulk insert and table
//! drop commit together.

use std::sync::Arc;

use locus_types::{LegacyRecord, LocationRecord, OwnerId, RecordKey};

use crate::error::DbError;
use crate::location_store::SqliteLocationStore;
use crate::memory_store::MemoryLocationStore;
use crate::sqlite::{SqliteConfig, SqlitePool};

/// A durable backend for location records.
#[derive(Clone)]
pub enum LocationGateway {
    /// `SQLite` file or in-memory database.
    Sqlite(SqliteLocationStore),
    /// Process-local store without I/O.
    Memory(Arc<MemoryLocationStore>),
}

impl LocationGateway {
    /// Open a `SQLite` gateway.
    ///
    /// The main table is created by
    /// [`create_table_if_absent`](Self::create_table_if_absent), which
    /// [`LocationDatabase`](crate::LocationDatabase) runs for every backend.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened.
    pub async fn open_sqlite(config: &SqliteConfig) -> Result<Self, DbError> {
        let pool = SqlitePool::connect(config).await?;
        Ok(Self::Sqlite(SqliteLocationStore::new(pool)))
    }

    /// Wrap an in-memory store.
    pub const fn memory(store: Arc<MemoryLocationStore>) -> Self {
        Self::Memory(store)
    }

    /// Human-readable backend name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Memory(_) => "memory",
        }
    }

    /// Create the main table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend rejects the DDL.
    pub async fn create_table_if_absent(&self) -> Result<(), DbError> {
        match self {
            Self::Sqlite(store) => store.create_table_if_absent().await,
            Self::Memory(store) => store.create_table_if_absent(),
        }
    }

    /// Insert a record as a new row and return its row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn insert(&self, record: &LocationRecord) -> Result<i64, DbError> {
        match self {
            Self::Sqlite(store) => store.insert(record).await,
            Self::Memory(store) => store.insert(record),
        }
    }

    /// Overwrite the row identified by the record's row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails or the record has no row id.
    pub async fn update(&self, record: &LocationRecord) -> Result<(), DbError> {
        match self {
            Self::Sqlite(store) => store.update(record).await,
            Self::Memory(store) => store.update(record),
        }
    }

    /// Find the row matching `(owner, world, category)`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn find_matching(&self, key: &RecordKey) -> Result<Option<LocationRecord>, DbError> {
        match self {
            Self::Sqlite(store) => store.find_matching(key).await,
            Self::Memory(store) => store.find_matching(key),
        }
    }

    /// Fetch every row belonging to an owner.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn find_all_by_owner(&self, owner: OwnerId) -> Result<Vec<LocationRecord>, DbError> {
        match self {
            Self::Sqlite(store) => store.find_all_by_owner(owner).await,
            Self::Memory(store) => store.find_all_by_owner(owner),
        }
    }

    /// Delete every row in a world and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    pub async fn delete_where_world(&self, world: &str) -> Result<u64, DbError> {
        match self {
            Self::Sqlite(store) => store.delete_where_world(world).await,
            Self::Memory(store) => store.delete_where_world(world),
        }
    }

    /// Whether the legacy table exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the check fails.
    pub async fn legacy_table_exists(&self) -> Result<bool, DbError> {
        match self {
            Self::Sqlite(store) => store.legacy_table_exists().await,
            Self::Memory(store) => store.legacy_table_exists(),
        }
    }

    /// Read every legacy row, decoding each one independently.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the table cannot be read at all.
    pub async fn fetch_legacy(&self) -> Result<Vec<Result<LegacyRecord, DbError>>, DbError> {
        match self {
            Self::Sqlite(store) => store.fetch_legacy().await,
            Self::Memory(store) => store.fetch_legacy(),
        }
    }

    /// Insert converted legacy records and drop the legacy table, all or
    /// nothing. Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if either step fails; neither is applied then.
    pub async fn commit_legacy_import(&self, records: &[LocationRecord]) -> Result<u64, DbError> {
        match self {
            Self::Sqlite(store) => store.commit_legacy_import(records).await,
            Self::Memory(store) => store.commit_legacy_import(records),
        }
    }

    /// Count rows in the main table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        match self {
            Self::Sqlite(store) => store.count().await,
            Self::Memory(store) => store.count(),
        }
    }

    /// Release the backend's connections.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(store) => store.close().await,
            Self::Memory(_) => {}
        }
    }
}
