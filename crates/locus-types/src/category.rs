//! The closed set of location record categories.
//!
//! Every cache table and every durable row is partitioned by
//! [`LocationCategory`]. The set is fixed at compile time; the cache builds
//! one table per variant from [`LocationCategory::ALL`] at startup.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// The purpose a stored location serves for its owner.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationCategory {
    /// The last position the owner occupied in a world.
    #[default]
    PlayerLocation,
    /// The owner's respawn point in a world.
    BedSpawn,
}

impl LocationCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 2] = [Self::PlayerLocation, Self::BedSpawn];

    /// The value stored in the `location_type` column.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::PlayerLocation => "PLAYER_LOCATION",
            Self::BedSpawn => "BED_SPAWN",
        }
    }
}

impl fmt::Display for LocationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_db_str())
    }
}

/// A stored category string did not name any [`LocationCategory`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown location category: {0}")]
pub struct CategoryParseError(pub String);

impl FromStr for LocationCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_db_str() == s)
            .ok_or_else(|| CategoryParseError(s.to_owned()))
    }
}
