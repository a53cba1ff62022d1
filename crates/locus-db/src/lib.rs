//! Write-behind location cache for Locus.
//!
//! Hosts read and write owner locations synchronously against an in-memory
//! index. Durable I/O happens on background tasks that flush each write to
//! `SQLite`, deduplicating by `(owner, world, category)` so repeated writes
//! converge on one row.
//!
//! # Architecture
//!
//! ```text
//! Host thread
//!     |
//!     +-- lookup / clear_owner ---------> LocationCache (sync)
//!     |
//!     +-- store ----> LocationCache ----> flush task
//!     |                                     |-- KeyLocks (per-key order)
//!     |                                     +-- LocationGateway --> SQLite
//!     |
//!     +-- locations_for_owner ----------> load task --> LocationCache
//!     +-- clear_world_from_store -------> delete task (store only)
//! ```
//!
//! # Modules
//!
//! - [`database`] -- [`LocationDatabase`] facade and the flush pipeline
//! - [`cache`] -- Per-category in-memory index
//! - [`gateway`] -- Enum-dispatched storage port
//! - [`location_store`] -- `SQLite` table operations
//! - [`memory_store`] -- In-memory backend
//! - [`legacy`] -- Startup import of the pre-category table
//! - [`key_lock`] -- Per-key flush serialization
//! - [`sqlite`] -- `SQLite` connection pool and configuration
//! - [`config`] -- YAML configuration
//! - [`error`] -- Shared error types

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod key_lock;
pub mod legacy;
pub mod location_store;
pub mod memory_store;
pub mod sqlite;

// Re-export primary types for convenience.
pub use cache::LocationCache;
pub use config::{ConfigError, LocusConfig};
pub use database::{FlushKind, LocationDatabase, PipelineEvent};
pub use error::DbError;
pub use gateway::LocationGateway;
pub use legacy::LegacyImport;
pub use location_store::SqliteLocationStore;
pub use memory_store::MemoryLocationStore;
pub use sqlite::{SqliteConfig, SqlitePool};
