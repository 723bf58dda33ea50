pub mod metadata;
mod notification;
pub mod resolver;
mod rows;
pub mod storage;
mod writer;

pub use notification::DeliveryNotification;
pub use storage::{ObjectLocation, ObjectStoreFactory, StorageConfig};

use std::path::PathBuf;
use std::time::Duration;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{error, info, warn};
use rocket::tokio;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{GameKey, IngestStore, ReferenceKind, Verification};
use metadata::{ExtractError, FileKind, GameDescriptor, ParsedFile};
use resolver::{Resolution, ResolvedGame};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Attempts per delivered file, including the first
    pub max_attempts: usize,
    /// Delay before retry `n` is `n * retry_backoff_ms`
    pub retry_backoff_ms: u64,
    pub storage: StorageConfig,
    /// Reference data to seed at startup
    pub reference_data: Option<PathBuf>,
    /// Rows per upsert statement
    pub write_chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 250,
            storage: StorageConfig::default(),
            reference_data: None,
            write_chunk_size: 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Unknown {kind} {code:?}. Reference data must be seeded before this file can be ingested")]
    UnknownReference { kind: ReferenceKind, code: String },

    #[error("{count} {verification} games exist for business key {key}")]
    AmbiguousGame {
        key: GameKey,
        verification: Verification,
        count: usize,
    },

    #[error("Game {key} kept changing during resolution ({passes} passes)")]
    ResolveContention { key: GameKey, passes: usize },

    #[error("Error fetching file from object storage: {0}")]
    Fetch(#[from] object_store::Error),

    #[error("Database error: {0}")]
    Database(#[from] DieselError),
}

impl IngestError {
    /// Whether running the whole ingest again could succeed. Anything else
    /// is a defect in the file, the reference data, or the stored games.
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Extract(_)
            | IngestError::UnknownReference { .. }
            | IngestError::AmbiguousGame { .. } => false,
            IngestError::ResolveContention { .. } => true,
            IngestError::Fetch(err) => !matches!(
                err,
                object_store::Error::NotFound { .. } | object_store::Error::InvalidPath { .. }
            ),
            IngestError::Database(err) => is_transient_db_error(err),
        }
    }
}

fn is_transient_db_error(err: &DieselError) -> bool {
    match err {
        DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::ClosedConnection,
            _,
        ) => true,
        // Two sessions inserting the same new game: the loser retries and
        // finds the winner's row
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            info.constraint_name() == Some("game_business_key")
        }
        DieselError::BrokenTransactionManager => true,
        _ => false,
    }
}

fn describe_key(key: &Option<GameDescriptor>) -> String {
    match key {
        Some(descriptor) => format!(" ({descriptor})"),
        None => String::new(),
    }
}

/// A delivery that could not be ingested, with what an operator needs to
/// re-drive it.
#[derive(Debug, Error)]
#[error(
    "Ingesting {location}{} failed after {attempts} attempt(s): {source}",
    describe_key(.key)
)]
pub struct IngestFailure {
    pub location: ObjectLocation,
    pub key: Option<GameDescriptor>,
    pub attempts: usize,
    #[source]
    pub source: IngestError,
}

impl IngestFailure {
    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub location: ObjectLocation,
    pub game_id: i64,
    pub resolution: Resolution,
    pub file_kind: FileKind,
    pub rows_written: usize,
    pub attempts: usize,
}

/// Resolves the file's game and writes its rows as one serializable
/// transaction. Nothing is left behind if either step fails.
pub fn ingest_parsed<S: IngestStore>(
    store: &mut S,
    parsed: &ParsedFile,
    chunk_size: usize,
) -> Result<(ResolvedGame, usize), IngestError> {
    store.serializable(|store| {
        let resolved = resolver::resolve(store, &parsed.descriptor)?;
        let written = writer::write_events(store, resolved.game_id, &parsed.rows, chunk_size)?;
        Ok((resolved, written))
    })
}

async fn attempt_delivery<F, Fut>(
    stores: &dyn ObjectStoreFactory,
    location: &ObjectLocation,
    run: &mut F,
    key: &mut Option<GameDescriptor>,
) -> Result<(ResolvedGame, usize, FileKind), IngestError>
where
    F: FnMut(ParsedFile) -> Fut,
    Fut: Future<Output = Result<(ResolvedGame, usize), IngestError>>,
{
    let fetched = storage::fetch(stores, location).await?;
    let parsed = metadata::read_file(&fetched.filename, &fetched.bytes)?;
    info!(
        "{} is {} with {} rows",
        parsed.filename,
        parsed.descriptor,
        parsed.rows.len(),
    );

    *key = Some(parsed.descriptor.clone());
    let file_kind = parsed.descriptor.file_kind;
    let (resolved, written) = run(parsed).await?;
    Ok((resolved, written, file_kind))
}

/// Ingests one delivered object: fetch, classify, then hand the parsed file
/// to `run`, which resolves and writes it in a transaction. Transient
/// failures start over from the fetch, up to `max_attempts` times.
pub async fn process_delivery<F, Fut>(
    stores: &dyn ObjectStoreFactory,
    config: &IngestConfig,
    location: &ObjectLocation,
    mut run: F,
) -> Result<IngestOutcome, IngestFailure>
where
    F: FnMut(ParsedFile) -> Fut,
    Fut: Future<Output = Result<(ResolvedGame, usize), IngestError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut key = None;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match attempt_delivery(stores, location, &mut run, &mut key).await {
            Ok((resolved, rows_written, file_kind)) => {
                info!(
                    "Ingested {location}: {rows_written} {file_kind} rows into game {} ({})",
                    resolved.game_id, resolved.resolution,
                );
                return Ok(IngestOutcome {
                    location: location.clone(),
                    game_id: resolved.game_id,
                    resolution: resolved.resolution,
                    file_kind,
                    rows_written,
                    attempts: attempt,
                });
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let backoff = Duration::from_millis(config.retry_backoff_ms * attempt as u64);
                warn!(
                    "Attempt {attempt} of {max_attempts} for {location} failed, retrying in \
                    {backoff:?}: {err}"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(source) => {
                let failure = IngestFailure {
                    location: location.clone(),
                    key,
                    attempts: attempt,
                    source,
                };
                error!("{failure}");
                return Err(failure);
            }
        }
    }
}
