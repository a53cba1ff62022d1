//! The location database: cache in front, write-behind to the gateway.
//!
//! [`LocationDatabase`] is what the host talks to. Reads come straight from
//! the [`LocationCache`]. Writes land in the cache immediately and are
//! flushed to the [`LocationGateway`] by a background task; the caller never
//! waits on I/O and never sees a flush error.
//!
//! # Flush sequence
//!
//! ```text
//! store(record)
//!   |-- cache.upsert            (sync, read-your-own-writes)
//!   +-- spawn flush task
//!         |-- hold per-key slot
//!         |-- find_matching(owner, world, category)
//!         |-- found  -> adopt row id, update
//!         |-- absent -> insert, new row id
//!         |-- attach row id to cached entry
//!         +-- clear_after? -> cache.clear_owner(owner)
//! ```
//!
//! The host's thread need not be a runtime worker: tasks are spawned onto
//! the runtime handle captured when the database was opened.
//!
//! Submitted tasks are detached. Nothing here can cancel them: dropping the
//! database, or a [`settle`](LocationDatabase::settle) future, only stops
//! waiting.

use std::sync::Arc;

use locus_types::{LocationCategory, LocationRecord, OwnerId, RecordKey};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::cache::LocationCache;
use crate::config::LocusConfig;
use crate::error::DbError;
use crate::gateway::LocationGateway;
use crate::key_lock::KeyLocks;
use crate::legacy::{self, LegacyImport};

/// Default capacity of the pipeline event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// How a successful flush reached the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// No row matched the key; a new row was created.
    Inserted,
    /// An existing row was overwritten.
    Updated,
}

/// Completion notice for a background task.
///
/// Published on a broadcast channel; nobody is required to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A record reached the backing store.
    Flushed {
        /// Key of the flushed record.
        key: RecordKey,
        /// Durable row id now holding the record.
        id: i64,
        /// Whether the row was created or overwritten.
        kind: FlushKind,
    },
    /// A flush failed; the record stays only in the cache.
    FlushFailed {
        /// Key of the record that was not persisted.
        key: RecordKey,
        /// Rendered error.
        error: String,
    },
    /// Durable rows for a world were deleted.
    WorldCleared {
        /// World name.
        world: String,
        /// Rows removed.
        removed: u64,
    },
    /// Deleting a world's rows failed.
    WorldClearFailed {
        /// World name.
        world: String,
        /// Rendered error.
        error: String,
    },
}

/// State shared between the handle and its background tasks.
struct Shared {
    cache: LocationCache,
    gateway: LocationGateway,
    key_locks: KeyLocks,
    events: broadcast::Sender<PipelineEvent>,
}

impl Shared {
    fn publish(&self, event: PipelineEvent) {
        // Err only means nobody is subscribed.
        let _ = self.events.send(event);
    }
}

/// Write-behind location cache over a durable gateway.
pub struct LocationDatabase {
    shared: Arc<Shared>,
    runtime: Handle,
    tasks: TaskTracker,
    legacy_import: LegacyImport,
}

/// The runtime background tasks will be spawned onto.
fn current_runtime() -> Result<Handle, DbError> {
    Handle::try_current().map_err(|e| DbError::NoRuntime(e.to_string()))
}

impl LocationDatabase {
    /// Open the configured `SQLite` database, create the main table, and run
    /// the legacy import.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database cannot be opened or the main
    /// table cannot be created. Legacy import problems are never errors.
    pub async fn open(config: &LocusConfig) -> Result<Self, DbError> {
        let gateway = LocationGateway::open_sqlite(&config.database.to_sqlite_config()).await?;
        Self::with_gateway(gateway, config.pipeline.event_capacity).await
    }

    /// Start on an already-connected gateway.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the main table cannot be created or no tokio
    /// runtime is running.
    pub async fn with_gateway(
        gateway: LocationGateway,
        event_capacity: usize,
    ) -> Result<Self, DbError> {
        let runtime = current_runtime()?;
        gateway.create_table_if_absent().await?;
        let legacy_import = legacy::import_legacy(&gateway).await;

        let (events, _) = broadcast::channel(event_capacity.max(1));
        // Closed from the start: `wait` resolves whenever no task is running,
        // and closing does not stop further spawns from being tracked.
        let tasks = TaskTracker::new();
        tasks.close();
        tracing::info!(backend = gateway.name(), ?legacy_import, "Location database ready");

        Ok(Self {
            shared: Arc::new(Shared {
                cache: LocationCache::new(),
                gateway,
                key_locks: KeyLocks::new(),
                events,
            }),
            runtime,
            tasks,
            legacy_import,
        })
    }

    /// What the startup legacy import did.
    pub const fn legacy_import(&self) -> LegacyImport {
        self.legacy_import
    }

    /// The gateway this database writes to.
    pub fn gateway(&self) -> &LocationGateway {
        &self.shared.gateway
    }

    /// The in-memory index.
    pub fn cache(&self) -> &LocationCache {
        &self.shared.cache
    }

    /// Subscribe to background task completions.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.shared.events.subscribe()
    }

    /// Store a record: update the cache now, persist it in the background.
    ///
    /// With `update_index` false the cached entry is left as it was and only
    /// the durable write happens. With `clear_after` true every cached entry
    /// for the owner is dropped once the write succeeds.
    pub fn store(&self, record: LocationRecord, update_index: bool, clear_after: bool) {
        let record = self.shared.cache.upsert(record, update_index);
        let shared = Arc::clone(&self.shared);
        self.spawn(async move {
            flush(&shared, record, clear_after).await;
        });
    }

    /// The cached record for `(owner, world, category)`.
    ///
    /// Never touches the backing store; use
    /// [`locations_for_owner`](Self::locations_for_owner) to load.
    pub fn lookup(
        &self,
        owner: OwnerId,
        world: &str,
        category: LocationCategory,
    ) -> Option<LocationRecord> {
        self.shared.cache.lookup(owner, world, category)
    }

    /// Load every durable record for an owner into the cache.
    ///
    /// The query starts immediately; the returned handle resolves with the
    /// loaded records once the cache has been repopulated.
    ///
    /// Loaded rows replace cached entries at the same key. If a [`store`]
    /// for that key is still waiting to flush when the load completes, the
    /// cache reverts to the older durable value until the next write.
    ///
    /// [`store`]: Self::store
    pub fn locations_for_owner(
        &self,
        owner: OwnerId,
    ) -> JoinHandle<Result<Vec<LocationRecord>, DbError>> {
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            match shared.gateway.find_all_by_owner(owner).await {
                Ok(records) => {
                    shared.cache.populate(&records);
                    tracing::debug!(%owner, count = records.len(), "Loaded owner locations");
                    Ok(records)
                }
                Err(e) => {
                    tracing::error!(%owner, error = %e, "Failed to load owner locations");
                    Err(e)
                }
            }
        })
    }

    /// Drop every cached entry for an owner. Durable rows are kept.
    pub fn clear_owner(&self, owner: OwnerId) {
        let removed = self.shared.cache.clear_owner(owner);
        tracing::debug!(%owner, removed, "Cleared cached owner locations");
    }

    /// Delete every durable row in a world, in the background.
    ///
    /// Cached entries for the world are deliberately left in place.
    pub fn clear_world_from_store(&self, world: impl Into<String>) {
        let world = world.into();
        let shared = Arc::clone(&self.shared);
        self.spawn(async move {
            match shared.gateway.delete_where_world(&world).await {
                Ok(removed) => {
                    tracing::debug!(world = world.as_str(), removed, "Deleted world locations");
                    shared.publish(PipelineEvent::WorldCleared { world, removed });
                }
                Err(e) => {
                    tracing::error!(
                        world = world.as_str(),
                        error = %e,
                        "Failed to delete world locations"
                    );
                    shared.publish(PipelineEvent::WorldClearFailed {
                        world,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    /// Number of submitted writes and world clears still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every submitted write and world clear to finish.
    ///
    /// Dropping the returned future early leaves the tasks running.
    pub async fn settle(&self) {
        self.tasks.wait().await;
    }

    /// Finish outstanding writes, then close the gateway.
    pub async fn close(self) {
        self.settle().await;
        self.shared.gateway.close().await;
        tracing::info!("Location database closed");
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // The handle is dropped, detaching the task.
        drop(self.tasks.spawn_on(task, &self.runtime));
    }
}

/// Persist one record, reconciling with any existing row for its key.
async fn flush(shared: &Shared, mut record: LocationRecord, clear_after: bool) {
    let key = record.key();
    let result = {
        let _slot = shared.key_locks.acquire(&key).await;
        write_record(&shared.gateway, &mut record).await
    };

    match result {
        Ok((id, kind)) => {
            shared.cache.attach_id(&key, id);
            tracing::debug!(
                owner = %key.owner,
                world = key.world.as_str(),
                category = %key.category,
                id,
                ?kind,
                "Flushed location"
            );
            if clear_after {
                shared.cache.clear_owner(key.owner);
            }
            shared.publish(PipelineEvent::Flushed { key, id, kind });
        }
        Err(e) => {
            tracing::error!(
                owner = %key.owner,
                world = key.world.as_str(),
                category = %key.category,
                error = %e,
                "Failed to flush location"
            );
            shared.publish(PipelineEvent::FlushFailed {
                key,
                error: e.to_string(),
            });
        }
    }
}

async fn write_record(
    gateway: &LocationGateway,
    record: &mut LocationRecord,
) -> Result<(i64, FlushKind), DbError> {
    if let Some(existing) = gateway.find_matching(&record.key()).await? {
        let id = existing.id.ok_or_else(|| DbError::InvalidRow {
            id: 0,
            reason: String::from("matched row has no id"),
        })?;
        record.id = Some(id);
        gateway.update(record).await?;
        return Ok((id, FlushKind::Updated));
    }

    let id = gateway.insert(record).await?;
    record.id = Some(id);
    Ok((id, FlushKind::Inserted))
}
