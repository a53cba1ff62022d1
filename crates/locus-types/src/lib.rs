//! Shared type definitions for the Locus location cache.
//!
//! Types here are shared by the cache, the persistence gateway, and any
//! host that reads or writes owner locations.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for owner identities
//! - [`category`] -- The closed set of record categories
//! - [`record`] -- Location records, legacy records, and record keys
//! - [`safe_destination`] -- Pluggable safe-teleport strategy port

pub mod category;
pub mod ids;
pub mod record;
pub mod safe_destination;

// Re-export all public types at crate root for convenience.
pub use category::{CategoryParseError, LocationCategory};
pub use ids::OwnerId;
pub use record::{Coordinates, LegacyRecord, LocationRecord, RecordKey};
pub use safe_destination::{
    DefaultSafeDestination, SafeDestination, SafeDestinationError, SafeDestinations,
};
