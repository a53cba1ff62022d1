//! One-time import of the pre-category `locations` table.
//!
//! Runs during startup, before any traffic. Gated on the legacy table
//! existing rather than on a persisted flag: once the table is dropped the
//! import is a no-op on every later startup.
//!
//! Nothing here is fatal. Undecodable rows are skipped with a warning. The
//! bulk insert and the table drop commit together, so a failure leaves both
//! tables as they were and the next startup tries again without duplicating
//! rows.

use locus_types::LocationRecord;

use crate::error::DbError;
use crate::gateway::LocationGateway;

/// What the legacy import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyImport {
    /// No legacy table was present.
    NotPresent,
    /// Rows were carried over and the legacy table was dropped.
    Imported {
        /// Rows written to the main table.
        imported: u64,
        /// Legacy rows that could not be decoded.
        skipped: u64,
    },
    /// The import failed; the legacy table may still exist.
    Failed,
}

/// Import legacy rows under the default category, then drop the table.
///
/// Never returns an error: failures are logged and reported as
/// [`LegacyImport::Failed`].
pub async fn import_legacy(gateway: &LocationGateway) -> LegacyImport {
    match try_import(gateway).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                backend = gateway.name(),
                error = %e,
                "Legacy location import failed"
            );
            LegacyImport::Failed
        }
    }
}

async fn try_import(gateway: &LocationGateway) -> Result<LegacyImport, DbError> {
    if !gateway.legacy_table_exists().await? {
        return Ok(LegacyImport::NotPresent);
    }

    let mut skipped: u64 = 0;
    let mut records = Vec::new();
    for row in gateway.fetch_legacy().await? {
        match row {
            Ok(legacy) => records.push(LocationRecord::from(legacy)),
            Err(e) => {
                skipped = skipped.saturating_add(1);
                tracing::warn!(error = %e, "Skipping unreadable legacy location");
            }
        }
    }

    let imported = gateway.commit_legacy_import(&records).await?;

    tracing::info!(imported, skipped, "Imported legacy locations");

    Ok(LegacyImport::Imported { imported, skipped })
}
