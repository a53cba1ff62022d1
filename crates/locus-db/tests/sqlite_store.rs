//! End-to-end tests against real `SQLite` databases.
//!
//! In-memory databases cover the pipeline; file-backed databases in a
//! temporary directory cover restarts and the legacy table import.

// Tests use expect/unwrap extensively for clarity -- panicking on failure is
// the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use std::path::Path;

use locus_db::{
    LegacyImport, LocationDatabase, LocationGateway, LocusConfig, SqliteConfig,
    SqliteLocationStore, SqlitePool,
};
use locus_types::{Coordinates, LocationCategory, LocationRecord, OwnerId};

fn config_at(path: &Path) -> LocusConfig {
    let mut config = LocusConfig::default();
    config.database.path = path.to_path_buf();
    config
}

fn in_memory_config() -> LocusConfig {
    config_at(Path::new(":memory:"))
}

fn spawn_point(owner: OwnerId, world: &str, y: f64) -> LocationRecord {
    LocationRecord::new(
        owner,
        world,
        Coordinates::new(-120.5, y, 33.25),
        LocationCategory::BedSpawn,
    )
}

async fn seed_legacy_table(path: &Path, rows: &[(String, &str, f64)]) {
    let pool = SqlitePool::connect(&SqliteConfig::new(path))
        .await
        .expect("open seed database");
    sqlx::query(
        r"CREATE TABLE locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid VARCHAR(36) NOT NULL,
            world VARCHAR(255) NOT NULL,
            x DOUBLE NOT NULL,
            y DOUBLE NOT NULL,
            z DOUBLE NOT NULL
          )",
    )
    .execute(pool.pool())
    .await
    .expect("create legacy table");

    for (uuid, world, y) in rows {
        sqlx::query(r"INSERT INTO locations (uuid, world, x, y, z) VALUES (?1, ?2, 0.5, ?3, 0.5)")
            .bind(uuid)
            .bind(*world)
            .bind(*y)
            .execute(pool.pool())
            .await
            .expect("insert legacy row");
    }
    pool.close().await;
}

#[tokio::test]
async fn in_memory_database_persists_and_converges() {
    let db = LocationDatabase::open(&in_memory_config()).await.unwrap();
    assert_eq!(db.legacy_import(), LegacyImport::NotPresent);
    let owner = OwnerId::new();

    for y in 0..10 {
        db.store(spawn_point(owner, "world", f64::from(y)), true, false);
    }
    db.settle().await;

    let rows = db.gateway().find_all_by_owner(owner).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].coordinates.y, 9.0);
    assert_eq!(rows[0].category, LocationCategory::BedSpawn);
    assert_eq!(
        db.lookup(owner, "world", LocationCategory::BedSpawn).unwrap().id,
        rows[0].id
    );
    db.close().await;
}

#[tokio::test]
async fn world_clear_removes_only_that_world() {
    let db = LocationDatabase::open(&in_memory_config()).await.unwrap();
    let owner = OwnerId::new();
    db.store(spawn_point(owner, "world", 64.0), true, false);
    db.store(spawn_point(owner, "world_nether", 40.0), true, false);
    db.settle().await;

    db.clear_world_from_store("world_nether");
    db.clear_world_from_store("missing_world");
    db.settle().await;

    let rows = db.gateway().find_all_by_owner(owner).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].world, "world");
    db.close().await;
}

#[tokio::test]
async fn records_survive_restart_and_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data").join("storage.db");
    let owner = OwnerId::new();

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    db.store(spawn_point(owner, "world", 70.0), true, false);
    db.store(
        LocationRecord::new(
            owner,
            "world",
            Coordinates::new(1.0, 2.0, 3.0),
            LocationCategory::PlayerLocation,
        ),
        true,
        false,
    );
    db.close().await;

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    assert!(db.cache().is_empty());
    assert_eq!(db.lookup(owner, "world", LocationCategory::BedSpawn), None);

    let loaded = db.locations_for_owner(owner).await.unwrap().unwrap();
    assert_eq!(loaded.len(), 2);
    let bed = db.lookup(owner, "world", LocationCategory::BedSpawn).unwrap();
    assert_eq!(bed.coordinates.y, 70.0);
    assert!(bed.id.is_some());

    // A write after reload updates the existing row instead of adding one.
    db.store(spawn_point(owner, "world", 71.0), true, false);
    db.settle().await;
    assert_eq!(db.gateway().count().await.unwrap(), 2);
    db.close().await;
}

#[tokio::test]
async fn legacy_table_is_imported_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storage.db");
    let alice = OwnerId::new();
    let bob = OwnerId::new();
    seed_legacy_table(
        &path,
        &[
            (alice.to_string(), "world", 64.0),
            (alice.to_string(), "world_nether", 32.0),
            (bob.to_string(), "world", 80.0),
            (String::from("not-a-uuid"), "world", 1.0),
        ],
    )
    .await;

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    assert_eq!(
        db.legacy_import(),
        LegacyImport::Imported {
            imported: 3,
            skipped: 1
        }
    );
    assert_eq!(db.gateway().count().await.unwrap(), 3);
    assert!(!db.gateway().legacy_table_exists().await.unwrap());

    let rows = db.gateway().find_all_by_owner(alice).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|r| r.category == LocationCategory::PlayerLocation));
    db.close().await;

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    assert_eq!(db.legacy_import(), LegacyImport::NotPresent);
    assert_eq!(db.gateway().count().await.unwrap(), 3);
    db.close().await;
}

#[tokio::test]
async fn interrupted_legacy_import_rolls_back_whole() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storage.db");
    seed_legacy_table(
        &path,
        &[
            (OwnerId::new().to_string(), "world", 64.0),
            (OwnerId::new().to_string(), "quarantine", 10.0),
        ],
    )
    .await;

    // Reject the second converted row so the transaction fails after the
    // first insert has already run.
    let store = SqliteLocationStore::new(
        SqlitePool::connect(&SqliteConfig::new(&path))
            .await
            .expect("open"),
    );
    store.create_table_if_absent().await.expect("main table");
    sqlx::query(
        r"CREATE TRIGGER reject_quarantine BEFORE INSERT ON persistent_locations
          WHEN NEW.world = 'quarantine'
          BEGIN SELECT RAISE(ABORT, 'quarantined world'); END",
    )
    .execute(store.pool().pool())
    .await
    .expect("create trigger");

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    assert_eq!(db.legacy_import(), LegacyImport::Failed);
    assert_eq!(db.gateway().count().await.unwrap(), 0);
    assert!(db.gateway().legacy_table_exists().await.unwrap());
    db.close().await;

    sqlx::query(r"DROP TRIGGER reject_quarantine")
        .execute(store.pool().pool())
        .await
        .expect("drop trigger");
    store.close().await;

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();
    assert_eq!(
        db.legacy_import(),
        LegacyImport::Imported {
            imported: 2,
            skipped: 0
        }
    );
    assert_eq!(db.gateway().count().await.unwrap(), 2);
    db.close().await;
}

#[tokio::test]
async fn empty_legacy_table_is_still_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("storage.db");
    seed_legacy_table(&path, &[]).await;

    let db = LocationDatabase::open(&config_at(&path)).await.unwrap();

    assert_eq!(
        db.legacy_import(),
        LegacyImport::Imported {
            imported: 0,
            skipped: 0
        }
    );
    assert!(!db.gateway().legacy_table_exists().await.unwrap());
    db.close().await;
}

#[tokio::test]
async fn unopenable_database_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A directory cannot be opened as a database file.
    let result = LocationDatabase::open(&config_at(dir.path())).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn gateway_reports_sqlite_backend() {
    let gateway = LocationGateway::open_sqlite(&SqliteConfig::in_memory())
        .await
        .unwrap();
    assert_eq!(gateway.name(), "sqlite");
    gateway.create_table_if_absent().await.unwrap();
    assert_eq!(gateway.count().await.unwrap(), 0);
    gateway.close().await;
}
