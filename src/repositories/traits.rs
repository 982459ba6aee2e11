//! Repository trait definitions
//!
//! Every data-access call takes a [`CancellationToken`]. Implementations race
//! their work against it with [`cancellable`] and report
//! [`RepositoryError::Cancelled`] when the token wins.

use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Comment, Lock, Note, NoteId, NoteResult, Review, Species, SpeciesId};

/// Species reference data store
///
/// Lookups that find nothing return [`RepositoryError::RecordNotFound`].
#[async_trait]
pub trait SpeciesRepository: Send + Sync {
    async fn get_by_id(&self, ctx: &CancellationToken, id: SpeciesId) -> RepositoryResult<Species>;

    async fn get_by_scientific_name(
        &self,
        ctx: &CancellationToken,
        scientific_name: &str,
    ) -> RepositoryResult<Species>;

    async fn get_by_ebird_code(
        &self,
        ctx: &CancellationToken,
        species_code: &str,
    ) -> RepositoryResult<Species>;

    /// Return the stored species with this scientific name, inserting it first
    /// if needed
    ///
    /// Fails with [`RepositoryError::Validation`] when the scientific name is
    /// empty.
    async fn get_or_create(
        &self,
        ctx: &CancellationToken,
        species: &Species,
    ) -> RepositoryResult<Species>;

    /// Species ordered by id
    async fn list(
        &self,
        ctx: &CancellationToken,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Species>>;

    /// Drop whatever the repository itself caches
    ///
    /// Independent of [`crate::species::SpeciesCache::invalidate`].
    async fn invalidate_cache(&self) -> RepositoryResult<()>;
}

/// Persisted detections and their review state
#[async_trait]
pub trait DetectionRepository: Send + Sync {
    /// Store a note and its prediction rows in one transaction
    ///
    /// Returns the assigned note id; `results` are re-keyed to it.
    async fn save(
        &self,
        ctx: &CancellationToken,
        note: &Note,
        results: &[NoteResult],
    ) -> RepositoryResult<NoteId>;

    /// Load a note with its `verified`, `locked` and `comments` projections
    async fn get(&self, ctx: &CancellationToken, id: NoteId) -> RepositoryResult<Note>;

    /// Prediction rows, highest confidence first
    async fn get_results(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
    ) -> RepositoryResult<Vec<NoteResult>>;

    /// Delete a note and everything attached to it
    ///
    /// Locked notes are refused with [`RepositoryError::Conflict`].
    async fn delete(&self, ctx: &CancellationToken, id: NoteId) -> RepositoryResult<()>;

    /// Create or replace the review verdict for a note
    async fn save_review(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
        verified: &str,
    ) -> RepositoryResult<Review>;

    /// Lock a note against deletion; locking twice keeps the first lock
    async fn lock(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<Lock>;

    async fn unlock(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<()>;

    async fn is_locked(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<bool>;

    /// Attach a comment (at most 1000 characters) to a saved note
    async fn add_comment(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
        entry: &str,
    ) -> RepositoryResult<Comment>;

    /// Comments in creation order
    async fn comments(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
    ) -> RepositoryResult<Vec<Comment>>;
}

/// Run `operation` unless `ctx` is cancelled first
pub async fn cancellable<T, F>(
    ctx: &CancellationToken,
    operation: &str,
    future: F,
) -> RepositoryResult<T>
where
    F: Future<Output = RepositoryResult<T>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(RepositoryError::cancelled(operation)),
        result = future => result,
    }
}
