//! Operator binary for the Locus location store.
//!
//! Opening the store creates the main table and carries over any rows from
//! the pre-category `locations` table, so running the binary with no
//! arguments performs the one-time import and reports what it did.
//!
//! # Usage
//!
//! ```text
//! locus-cli                      open the store, run the legacy import
//! locus-cli show <uuid>          print every stored location of an owner
//! locus-cli clear-world <name>   delete every stored location in a world
//! ```
//!
//! The configuration file is read from `$LOCUS_CONFIG`, falling back to
//! `locus-config.yaml`. A missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use locus_db::config::LoggingConfig;
use locus_db::{DbError, LocationDatabase, LocusConfig, PipelineEvent};
use locus_types::OwnerId;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable naming the configuration file.
const CONFIG_PATH_ENV: &str = "LOCUS_CONFIG";

/// Configuration file used when `LOCUS_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "locus-config.yaml";

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Open the store and report the legacy import.
    Status,
    /// Print an owner's stored locations.
    Show(OwnerId),
    /// Delete a world's stored locations.
    ClearWorld(String),
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the arguments are invalid, the configuration cannot
/// be read, or the store cannot be opened.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let command = parse_command(std::env::args().skip(1))?;

    let config_path = config_path(std::env::var(CONFIG_PATH_ENV).ok());
    let config = load_config(&config_path)?;
    init_tracing(&config.logging);

    info!(
        config = %config_path.display(),
        database = %config.database.path.display(),
        "locus-cli starting"
    );

    let db = LocationDatabase::open(&config)
        .await
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;
    info!(legacy_import = ?db.legacy_import(), "Store opened");

    let result = run(&db, command).await;
    db.close().await;
    result
}

async fn run(db: &LocationDatabase, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let rows = db.gateway().count().await.context("failed to count locations")?;
            println!("{rows} stored locations ({:?})", db.legacy_import());
        }
        Command::Show(owner) => {
            let records = db
                .locations_for_owner(owner)
                .await
                .map_err(DbError::Task)?
                .with_context(|| format!("failed to load locations for {owner}"))?;
            if records.is_empty() {
                println!("no stored locations for {owner}");
            }
            for record in records {
                let c = record.coordinates;
                println!(
                    "{:<16} {:<24} {:>10.2} {:>8.2} {:>10.2}",
                    record.category, record.world, c.x, c.y, c.z
                );
            }
        }
        Command::ClearWorld(world) => {
            let mut events = db.subscribe();
            db.clear_world_from_store(world.as_str());
            db.settle().await;
            match events.try_recv() {
                Ok(PipelineEvent::WorldCleared { removed, .. }) => {
                    println!("removed {removed} locations from {world}");
                }
                Ok(PipelineEvent::WorldClearFailed { error, .. }) => {
                    bail!("failed to clear {world}: {error}");
                }
                Ok(other) => bail!("unexpected pipeline event: {other:?}"),
                Err(e) => bail!("no completion reported for {world}: {e}"),
            }
        }
    }
    Ok(())
}

fn parse_command(mut args: impl Iterator<Item = String>) -> anyhow::Result<Command> {
    let command = match args.next().as_deref() {
        None => Command::Status,
        Some("show") => {
            let raw = args.next().context("usage: locus-cli show <uuid>")?;
            let owner = raw
                .parse::<OwnerId>()
                .with_context(|| format!("invalid owner uuid: {raw}"))?;
            Command::Show(owner)
        }
        Some("clear-world") => {
            let world = args.next().context("usage: locus-cli clear-world <name>")?;
            Command::ClearWorld(world)
        }
        Some(other) => bail!("unknown command: {other}"),
    };
    if let Some(extra) = args.next() {
        bail!("unexpected argument: {extra}");
    }
    Ok(command)
}

fn config_path(from_env: Option<String>) -> PathBuf {
    from_env
        .filter(|p| !p.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration, or defaults when the file does not exist.
fn load_config(path: &Path) -> anyhow::Result<LocusConfig> {
    if path.exists() {
        LocusConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))
    } else {
        let mut config = LocusConfig::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
