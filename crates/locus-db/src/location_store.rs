//! `SQLite` operations on the `persistent_locations` and legacy `locations`
//! tables.
//!
//! `persistent_locations` holds one row per `(uuid, world, location_type)`
//! under normal operation. The table itself does not enforce that; the
//! write-behind pipeline does, by matching before it writes.

use locus_types::{Coordinates, LegacyRecord, LocationRecord, OwnerId, RecordKey};
use sqlx::Row;

use crate::error::DbError;
use crate::sqlite::SqlitePool;

/// Main table name.
pub const LOCATIONS_TABLE: &str = "persistent_locations";

/// Table name of the pre-category schema.
pub const LEGACY_TABLE: &str = "locations";

/// Operations on the location tables of one `SQLite` database.
#[derive(Clone)]
pub struct SqliteLocationStore {
    pool: SqlitePool,
}

impl SqliteLocationStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Return the underlying pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the main table and its lookup index if they are missing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the DDL fails.
    pub async fn create_table_if_absent(&self) -> Result<(), DbError> {
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS persistent_locations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL,
                world TEXT NOT NULL,
                x REAL NOT NULL,
                y REAL NOT NULL,
                z REAL NOT NULL,
                location_type TEXT NOT NULL
              )",
        )
        .execute(self.pool.pool())
        .await?;

        sqlx::query(
            r"CREATE INDEX IF NOT EXISTS idx_persistent_locations_key
              ON persistent_locations (uuid, world, location_type)",
        )
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// Insert a record as a new row and return its row id.
    ///
    /// Any row id already on the record is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn insert(&self, record: &LocationRecord) -> Result<i64, DbError> {
        let result = sqlx::query(
            r"INSERT INTO persistent_locations (uuid, world, x, y, z, location_type)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(record.owner.to_string())
        .bind(&record.world)
        .bind(record.coordinates.x)
        .bind(record.coordinates.y)
        .bind(record.coordinates.z)
        .bind(record.category.as_db_str())
        .execute(self.pool.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert converted legacy records and drop the legacy table in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if any statement fails; nothing is
    /// committed in that case.
    pub async fn commit_legacy_import(&self, records: &[LocationRecord]) -> Result<u64, DbError> {
        let mut tx = self.pool.pool().begin().await?;
        let mut inserted: u64 = 0;
        for record in records {
            let result = sqlx::query(
                r"INSERT INTO persistent_locations (uuid, world, x, y, z, location_type)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(record.owner.to_string())
            .bind(&record.world)
            .bind(record.coordinates.x)
            .bind(record.coordinates.y)
            .bind(record.coordinates.z)
            .bind(record.category.as_db_str())
            .execute(&mut *tx)
            .await?;
            inserted = inserted.saturating_add(result.rows_affected());
        }
        sqlx::query(r"DROP TABLE IF EXISTS locations")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(inserted)
    }

    /// Overwrite the row identified by the record's row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] if the record has no row id.
    /// Returns [`DbError::Sqlite`] if the update fails.
    pub async fn update(&self, record: &LocationRecord) -> Result<(), DbError> {
        let Some(id) = record.id else {
            return Err(DbError::InvalidRow {
                id: 0,
                reason: format!("cannot update unflushed record for {}", record.owner),
            });
        };

        sqlx::query(
            r"UPDATE persistent_locations
              SET uuid = ?1, world = ?2, x = ?3, y = ?4, z = ?5, location_type = ?6
              WHERE id = ?7",
        )
        .bind(record.owner.to_string())
        .bind(&record.world)
        .bind(record.coordinates.x)
        .bind(record.coordinates.y)
        .bind(record.coordinates.z)
        .bind(record.category.as_db_str())
        .bind(id)
        .execute(self.pool.pool())
        .await?;

        Ok(())
    }

    /// Find the row matching a record key, if any.
    ///
    /// If duplicates exist the oldest row wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    /// Returns [`DbError::InvalidRow`] or [`DbError::UnknownCategory`] if the
    /// row cannot be decoded.
    pub async fn find_matching(&self, key: &RecordKey) -> Result<Option<LocationRecord>, DbError> {
        let row = sqlx::query_as::<_, LocationRow>(
            r"SELECT id, uuid, world, x, y, z, location_type
              FROM persistent_locations
              WHERE uuid = ?1 AND world = ?2 AND location_type = ?3
              ORDER BY id
              LIMIT 1",
        )
        .bind(key.owner.to_string())
        .bind(&key.world)
        .bind(key.category.as_db_str())
        .fetch_optional(self.pool.pool())
        .await?;

        row.map(LocationRecord::try_from).transpose()
    }

    /// Fetch every row belonging to an owner.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    /// Returns [`DbError::InvalidRow`] or [`DbError::UnknownCategory`] if a
    /// row cannot be decoded.
    pub async fn find_all_by_owner(&self, owner: OwnerId) -> Result<Vec<LocationRecord>, DbError> {
        let rows = sqlx::query_as::<_, LocationRow>(
            r"SELECT id, uuid, world, x, y, z, location_type
              FROM persistent_locations
              WHERE uuid = ?1
              ORDER BY id",
        )
        .bind(owner.to_string())
        .fetch_all(self.pool.pool())
        .await?;

        rows.into_iter().map(LocationRecord::try_from).collect()
    }

    /// Delete every row in a world and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn delete_where_world(&self, world: &str) -> Result<u64, DbError> {
        let result = sqlx::query(r"DELETE FROM persistent_locations WHERE world = ?1")
            .bind(world)
            .execute(self.pool.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Whether the legacy table exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the catalog query fails.
    pub async fn legacy_table_exists(&self) -> Result<bool, DbError> {
        let row = sqlx::query(r"SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(LEGACY_TABLE)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(row.is_some())
    }

    /// Read every legacy row.
    ///
    /// Rows that fail to decode are returned as errors in place so the
    /// importer can skip them individually.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn fetch_legacy(&self) -> Result<Vec<Result<LegacyRecord, DbError>>, DbError> {
        let rows = sqlx::query_as::<_, LegacyRow>(
            r"SELECT rowid AS id, uuid, world, x, y, z FROM locations ORDER BY rowid",
        )
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows.into_iter().map(LegacyRecord::try_from).collect())
    }

    /// Count rows in the main table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count(&self) -> Result<u64, DbError> {
        let row = sqlx::query(r"SELECT COUNT(*) AS n FROM persistent_locations")
            .fetch_one(self.pool.pool())
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A row from the `persistent_locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRow {
    /// Auto-incremented row id.
    pub id: i64,
    /// Owner UUID in hyphenated text form.
    pub uuid: String,
    /// World name.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Category column value.
    pub location_type: String,
}

impl TryFrom<LocationRow> for LocationRecord {
    type Error = DbError;

    fn try_from(row: LocationRow) -> Result<Self, Self::Error> {
        let owner: OwnerId = row.uuid.parse().map_err(|e| DbError::InvalidRow {
            id: row.id,
            reason: format!("bad owner uuid {:?}: {e}", row.uuid),
        })?;
        let category = row
            .location_type
            .parse()
            .map_err(|source| DbError::UnknownCategory { id: row.id, source })?;

        Ok(Self::new(
            owner,
            row.world,
            Coordinates::new(row.x, row.y, row.z),
            category,
        )
        .with_id(row.id))
    }
}

/// A row from the legacy `locations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LegacyRow {
    /// `SQLite` rowid, kept only for error reporting.
    pub id: i64,
    /// Owner UUID in text form.
    pub uuid: String,
    /// World name.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl TryFrom<LegacyRow> for LegacyRecord {
    type Error = DbError;

    fn try_from(row: LegacyRow) -> Result<Self, Self::Error> {
        let owner: OwnerId = row.uuid.parse().map_err(|e| DbError::InvalidRow {
            id: row.id,
            reason: format!("bad legacy owner uuid {:?}: {e}", row.uuid),
        })?;

        Ok(Self {
            owner,
            world: row.world,
            coordinates: Coordinates::new(row.x, row.y, row.z),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_types::LocationCategory;

    fn row(uuid: &str, location_type: &str) -> LocationRow {
        LocationRow {
            id: 11,
            uuid: uuid.to_owned(),
            world: "world".to_owned(),
            x: 1.0,
            y: 2.0,
            z: 3.0,
            location_type: location_type.to_owned(),
        }
    }

    #[test]
    fn decodes_valid_row() {
        let owner = OwnerId::new();
        let record = LocationRecord::try_from(row(&owner.to_string(), "BED_SPAWN")).ok();
        let expected = LocationRecord::new(
            owner,
            "world",
            Coordinates::new(1.0, 2.0, 3.0),
            LocationCategory::BedSpawn,
        )
        .with_id(11);
        assert_eq!(record, Some(expected));
    }

    #[test]
    fn rejects_bad_uuid() {
        let result = LocationRecord::try_from(row("nope", "BED_SPAWN"));
        assert!(matches!(result, Err(DbError::InvalidRow { id: 11, .. })));
    }

    #[test]
    fn rejects_unknown_category() {
        let result = LocationRecord::try_from(row(&OwnerId::new().to_string(), "WARP"));
        assert!(matches!(
            result,
            Err(DbError::UnknownCategory { id: 11, ref source }) if source.0 == "WARP"
        ));
    }
}
