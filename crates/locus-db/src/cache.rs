//! In-memory location index.
//!
//! One table per [`LocationCategory`], each keyed by owner then world. The
//! tables are created up front from [`LocationCategory::ALL`] and never
//! added or removed afterwards. Reads and writes never touch I/O.
//!
//! Each table sits behind its own `RwLock`: the host's thread and the
//! background flush tasks (which attach row ids) share them.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use locus_types::{LocationCategory, LocationRecord, OwnerId, RecordKey};

/// Records of one category, by owner then world.
type CategoryTable = HashMap<OwnerId, HashMap<String, LocationRecord>>;

/// The synchronous read path: owner locations by category.
#[derive(Debug)]
pub struct LocationCache {
    tables: HashMap<LocationCategory, RwLock<CategoryTable>>,
}

impl Default for LocationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationCache {
    /// Create an empty cache with one table per category.
    pub fn new() -> Self {
        Self {
            tables: LocationCategory::ALL
                .into_iter()
                .map(|category| (category, RwLock::new(CategoryTable::new())))
                .collect(),
        }
    }

    fn read(&self, category: LocationCategory) -> Option<RwLockReadGuard<'_, CategoryTable>> {
        self.tables
            .get(&category)
            .map(|table| table.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, category: LocationCategory) -> Option<RwLockWriteGuard<'_, CategoryTable>> {
        self.tables
            .get(&category)
            .map(|table| table.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Prepare `record` for storage, optionally replacing the cached entry.
    ///
    /// A record without a row id inherits the id of the entry it replaces.
    /// When `update_index` is false the table is left untouched. Returns the
    /// record as it should be flushed.
    pub fn upsert(&self, mut record: LocationRecord, update_index: bool) -> LocationRecord {
        let Some(mut table) = self.write(record.category) else {
            return record;
        };

        if record.id.is_none() {
            record.id = table
                .get(&record.owner)
                .and_then(|worlds| worlds.get(&record.world))
                .and_then(|cached| cached.id);
        }

        if update_index {
            table
                .entry(record.owner)
                .or_default()
                .insert(record.world.clone(), record.clone());
        }

        record
    }

    /// The cached record for `(owner, world, category)`, if any.
    pub fn lookup(
        &self,
        owner: OwnerId,
        world: &str,
        category: LocationCategory,
    ) -> Option<LocationRecord> {
        self.read(category)?
            .get(&owner)
            .and_then(|worlds| worlds.get(world))
            .cloned()
    }

    /// Every cached record for an owner, across all categories.
    pub fn records_for_owner(&self, owner: OwnerId) -> Vec<LocationRecord> {
        LocationCategory::ALL
            .into_iter()
            .filter_map(|category| self.read(category))
            .flat_map(|table| {
                table
                    .get(&owner)
                    .map(|worlds| worlds.values().cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Record the durable row id for a key, if that key is cached.
    ///
    /// Returns whether an entry was updated.
    pub fn attach_id(&self, key: &RecordKey, id: i64) -> bool {
        let Some(mut table) = self.write(key.category) else {
            return false;
        };
        match table
            .get_mut(&key.owner)
            .and_then(|worlds| worlds.get_mut(&key.world))
        {
            Some(cached) => {
                cached.id = Some(id);
                true
            }
            None => false,
        }
    }

    /// Insert records loaded from the backing store, replacing any cached
    /// entry at the same key, including one whose flush is still pending.
    pub fn populate(&self, records: &[LocationRecord]) {
        for record in records {
            if let Some(mut table) = self.write(record.category) {
                table
                    .entry(record.owner)
                    .or_default()
                    .insert(record.world.clone(), record.clone());
            }
        }
    }

    /// Drop every cached entry for an owner in every category.
    ///
    /// Returns how many entries were removed.
    pub fn clear_owner(&self, owner: OwnerId) -> usize {
        LocationCategory::ALL
            .into_iter()
            .filter_map(|category| self.write(category))
            .map(|mut table| table.remove(&owner).map_or(0, |worlds| worlds.len()))
            .sum()
    }

    /// Total number of cached entries.
    pub fn len(&self) -> usize {
        LocationCategory::ALL
            .into_iter()
            .filter_map(|category| self.read(category))
            .map(|table| table.values().map(HashMap::len).sum::<usize>())
            .sum()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_types::Coordinates;

    fn record(owner: OwnerId, world: &str, category: LocationCategory, y: f64) -> LocationRecord {
        LocationRecord::new(owner, world, Coordinates::new(0.0, y, 0.0), category)
    }

    #[test]
    fn lookup_sees_upsert_immediately() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        let stored = record(owner, "world", LocationCategory::PlayerLocation, 70.0);

        cache.upsert(stored.clone(), true);

        assert_eq!(
            cache.lookup(owner, "world", LocationCategory::PlayerLocation),
            Some(stored)
        );
        assert_eq!(cache.lookup(owner, "world", LocationCategory::BedSpawn), None);
    }

    #[test]
    fn replacement_keeps_known_row_id() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        cache.upsert(
            record(owner, "world", LocationCategory::PlayerLocation, 1.0).with_id(42),
            true,
        );

        let flushed = cache.upsert(record(owner, "world", LocationCategory::PlayerLocation, 2.0), true);

        assert_eq!(flushed.id, Some(42));
        let cached = cache.lookup(owner, "world", LocationCategory::PlayerLocation);
        assert_eq!(cached, Some(flushed));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn upsert_without_index_leaves_table_alone() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        let original = record(owner, "world", LocationCategory::PlayerLocation, 1.0).with_id(5);
        cache.upsert(original.clone(), true);

        let flushed = cache.upsert(record(owner, "world", LocationCategory::PlayerLocation, 9.0), false);

        assert_eq!(flushed.id, Some(5));
        assert_eq!(
            cache.lookup(owner, "world", LocationCategory::PlayerLocation),
            Some(original)
        );
    }

    #[test]
    fn clear_owner_spans_categories() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        let other = OwnerId::new();
        cache.upsert(record(owner, "world", LocationCategory::PlayerLocation, 1.0), true);
        cache.upsert(record(owner, "world_nether", LocationCategory::PlayerLocation, 1.0), true);
        cache.upsert(record(owner, "world", LocationCategory::BedSpawn, 1.0), true);
        cache.upsert(record(other, "world", LocationCategory::BedSpawn, 1.0), true);

        assert_eq!(cache.clear_owner(owner), 3);

        assert!(cache.records_for_owner(owner).is_empty());
        assert_eq!(cache.records_for_owner(other).len(), 1);
    }

    #[test]
    fn attach_id_only_hits_cached_keys() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        let stored = record(owner, "world", LocationCategory::BedSpawn, 1.0);
        cache.upsert(stored.clone(), true);

        assert!(cache.attach_id(&stored.key(), 8));
        let mut missing = stored.key();
        missing.world = "elsewhere".to_owned();
        assert!(!cache.attach_id(&missing, 9));

        let cached = cache.lookup(owner, "world", LocationCategory::BedSpawn);
        assert_eq!(cached.and_then(|r| r.id), Some(8));
    }

    #[test]
    fn populate_replaces_newer_unflushed_entry() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        cache.upsert(record(owner, "world", LocationCategory::BedSpawn, 80.0), true);

        let durable = record(owner, "world", LocationCategory::BedSpawn, 64.0).with_id(3);

        cache.populate(std::slice::from_ref(&durable));

        assert_eq!(
            cache.lookup(owner, "world", LocationCategory::BedSpawn),
            Some(durable)
        );
    }

    #[test]
    fn populate_fills_every_category() {
        let cache = LocationCache::new();
        let owner = OwnerId::new();
        cache.populate(&[
            record(owner, "world", LocationCategory::PlayerLocation, 1.0).with_id(1),
            record(owner, "world", LocationCategory::BedSpawn, 2.0).with_id(2),
        ]);

        assert!(cache.lookup(owner, "world", LocationCategory::PlayerLocation).is_some());
        assert!(cache.lookup(owner, "world", LocationCategory::BedSpawn).is_some());
        assert!(!cache.is_empty());
    }
}
