//! Location records and their lookup key.
//!
//! A [`LocationRecord`] is unique within its category by
//! `(owner, world)`. The durable row id is a back-reference into the
//! backing store: absent until the record has been flushed once, and safe to
//! lose (the next flush finds the row again by [`RecordKey`]).

use serde::{Deserialize, Serialize};

use crate::category::LocationCategory;
use crate::ids::OwnerId;

/// A point in a world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    /// East-west component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
    /// North-south component.
    pub z: f64,
}

impl Coordinates {
    /// Create a coordinate triple.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// The natural key of a location record: `(owner, world, category)`.
///
/// Also used as the match probe when a flush looks for an existing row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Owner the record belongs to.
    pub owner: OwnerId,
    /// World name (case-sensitive).
    pub world: String,
    /// Record category.
    pub category: LocationCategory,
}

/// A per-owner, per-world, per-category location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Durable row id, present once the record exists in the backing store.
    pub id: Option<i64>,
    /// Owner the record belongs to.
    pub owner: OwnerId,
    /// World name (case-sensitive).
    pub world: String,
    /// Position within the world.
    pub coordinates: Coordinates,
    /// Record category.
    pub category: LocationCategory,
}

impl LocationRecord {
    /// Create a fresh record that has never been flushed.
    pub fn new(
        owner: OwnerId,
        world: impl Into<String>,
        coordinates: Coordinates,
        category: LocationCategory,
    ) -> Self {
        Self {
            id: None,
            owner,
            world: world.into(),
            coordinates,
            category,
        }
    }

    /// Attach a durable row id.
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// The `(owner, world, category)` key of this record.
    pub fn key(&self) -> RecordKey {
        RecordKey {
            owner: self.owner,
            world: self.world.clone(),
            category: self.category,
        }
    }

    /// Whether `key` addresses this record.
    pub fn matches(&self, key: &RecordKey) -> bool {
        self.owner == key.owner && self.category == key.category && self.world == key.world
    }
}

/// A row from the pre-category schema.
///
/// Legacy rows always describe the owner's last location; they carry no
/// category and no row id worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRecord {
    /// Owner the record belongs to.
    pub owner: OwnerId,
    /// World name.
    pub world: String,
    /// Position within the world.
    pub coordinates: Coordinates,
}

impl From<LegacyRecord> for LocationRecord {
    fn from(legacy: LegacyRecord) -> Self {
        Self::new(
            legacy.owner,
            legacy.world,
            legacy.coordinates,
            LocationCategory::PlayerLocation,
        )
    }
}
