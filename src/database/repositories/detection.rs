//! SeaORM-backed detection repository
//!
//! Notes and their prediction rows are written in one transaction. Saves go
//! through the write retry policy because SQLite reports concurrent writers
//! as "database is locked"; reads and review operations are not retried.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::traits::{BaseSeaOrmRepository, ConversionUtils};
use crate::database::entities::{
    note_comments, note_locks, note_reviews, notes,
    prelude::{NoteComments, NoteLocks, NoteReviews, Notes, Results},
    results,
};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Comment, Lock, Note, NoteId, NoteResult, Review};
use crate::repositories::{DetectionRepository, cancellable};
use crate::utils::{RetryConfig, with_retry};

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Longest comment accepted, in characters
pub const MAX_COMMENT_LENGTH: usize = 1000;

pub struct DetectionSeaOrmRepository {
    base: BaseSeaOrmRepository,
    retry_config: RetryConfig,
}

impl DetectionSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self::with_retry_config(connection, RetryConfig::for_writes())
    }

    pub fn with_retry_config(connection: Arc<DatabaseConnection>, retry_config: RetryConfig) -> Self {
        Self {
            base: BaseSeaOrmRepository::new(connection),
            retry_config,
        }
    }

    fn connection(&self) -> &DatabaseConnection {
        &self.base.connection
    }

    async fn save_once(&self, note: &Note, results: &[NoteResult]) -> RepositoryResult<NoteId> {
        let txn = self.connection().begin().await?;

        let saved = notes::ActiveModel {
            id: NotSet,
            source_node: Set(note.source_node.clone()),
            date: Set(note.date.clone()),
            time: Set(note.time.clone()),
            begin_time: Set(note.begin_time),
            end_time: Set(note.end_time),
            species_code: Set(note.species_code.clone()),
            scientific_name: Set(note.scientific_name.clone()),
            common_name: Set(note.common_name.clone()),
            confidence: Set(note.confidence),
            latitude: Set(note.latitude),
            longitude: Set(note.longitude),
            threshold: Set(note.threshold),
            sensitivity: Set(note.sensitivity),
            clip_name: Set(note.clip_name.clone()),
            processing_time_ns: Set(ConversionUtils::duration_to_nanos(note.processing_time)),
        }
        .insert(&txn)
        .await?;

        if !results.is_empty() {
            let rows = results.iter().map(|result| results::ActiveModel {
                id: NotSet,
                note_id: Set(saved.id),
                species: Set(result.species.clone()),
                confidence: Set(result.confidence),
            });
            Results::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        let id = ConversionUtils::id_from_db(saved.id, "notes.id")?;
        debug!(
            "Saved note {} ({}) with {} results",
            id,
            note.scientific_name,
            results.len()
        );
        Ok(id)
    }

    async fn require_note<C: ConnectionTrait>(&self, conn: &C, id: NoteId) -> RepositoryResult<notes::Model> {
        Notes::find_by_id(ConversionUtils::id_to_db(id, "note_id")?)
            .one(conn)
            .await?
            .ok_or_else(|| RepositoryError::not_found("notes", "id", id))
    }

    async fn find_lock<C: ConnectionTrait>(&self, conn: &C, note_id: i32) -> RepositoryResult<Option<note_locks::Model>> {
        Ok(NoteLocks::find()
            .filter(note_locks::Column::NoteId.eq(note_id))
            .one(conn)
            .await?)
    }

    async fn load_note(&self, id: NoteId) -> RepositoryResult<Note> {
        let model = self.require_note(self.connection(), id).await?;

        let verified = NoteReviews::find()
            .filter(note_reviews::Column::NoteId.eq(model.id))
            .one(self.connection())
            .await?
            .map(|review| review.verified)
            .unwrap_or_default();
        let locked = self.find_lock(self.connection(), model.id).await?.is_some();
        let comments = self.load_comments(model.id).await?;

        Ok(Note {
            id: ConversionUtils::id_from_db(model.id, "notes.id")?,
            source_node: model.source_node,
            date: model.date,
            time: model.time,
            begin_time: model.begin_time,
            end_time: model.end_time,
            species_code: model.species_code,
            scientific_name: model.scientific_name,
            common_name: model.common_name,
            confidence: model.confidence,
            latitude: model.latitude,
            longitude: model.longitude,
            threshold: model.threshold,
            sensitivity: model.sensitivity,
            clip_name: model.clip_name,
            processing_time: ConversionUtils::duration_from_nanos(model.processing_time_ns),
            verified,
            locked,
            comments,
        })
    }

    async fn load_results(&self, note_id: NoteId) -> RepositoryResult<Vec<NoteResult>> {
        Results::find()
            .filter(results::Column::NoteId.eq(ConversionUtils::id_to_db(note_id, "note_id")?))
            .order_by_desc(results::Column::Confidence)
            .order_by_asc(results::Column::Id)
            .all(self.connection())
            .await?
            .into_iter()
            .map(|row| {
                Ok(NoteResult {
                    id: ConversionUtils::id_from_db(row.id, "results.id")?,
                    note_id,
                    species: row.species,
                    confidence: row.confidence,
                })
            })
            .collect()
    }

    async fn delete_note(&self, id: NoteId) -> RepositoryResult<()> {
        let txn = self.connection().begin().await?;

        let note = self.require_note(&txn, id).await?;
        if self.find_lock(&txn, note.id).await?.is_some() {
            return Err(RepositoryError::conflict(
                format!("note {id}"),
                "note is locked and cannot be deleted",
            ));
        }

        Results::delete_many()
            .filter(results::Column::NoteId.eq(note.id))
            .exec(&txn)
            .await?;
        NoteReviews::delete_many()
            .filter(note_reviews::Column::NoteId.eq(note.id))
            .exec(&txn)
            .await?;
        NoteComments::delete_many()
            .filter(note_comments::Column::NoteId.eq(note.id))
            .exec(&txn)
            .await?;
        Notes::delete_by_id(note.id).exec(&txn).await?;

        txn.commit().await?;
        info!("Deleted note {}", id);
        Ok(())
    }

    async fn update_review(
        &self,
        review: note_reviews::Model,
        verified: &str,
    ) -> RepositoryResult<note_reviews::Model> {
        let mut active: note_reviews::ActiveModel = review.into();
        active.verified = Set(verified.to_string());
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.connection()).await?)
    }

    async fn upsert_review(&self, note_id: NoteId, verified: &str) -> RepositoryResult<Review> {
        let note = self.require_note(self.connection(), note_id).await?;
        let now = Utc::now();

        let existing = NoteReviews::find()
            .filter(note_reviews::Column::NoteId.eq(note.id))
            .one(self.connection())
            .await?;

        let saved = match existing {
            Some(review) => self.update_review(review, verified).await?,
            None => {
                let inserted = note_reviews::ActiveModel {
                    id: NotSet,
                    note_id: Set(note.id),
                    verified: Set(verified.to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(self.connection())
                .await;

                match inserted {
                    Ok(review) => review,
                    // another reviewer created the row first
                    Err(err) if is_unique_violation(&err) => {
                        let review = NoteReviews::find()
                            .filter(note_reviews::Column::NoteId.eq(note.id))
                            .one(self.connection())
                            .await?
                            .ok_or_else(|| RepositoryError::not_found("note_reviews", "note_id", note_id))?;
                        self.update_review(review, verified).await?
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        Ok(Review {
            note_id,
            verified: saved.verified,
            created_at: saved.created_at,
            updated_at: saved.updated_at,
        })
    }

    async fn lock_note(&self, note_id: NoteId) -> RepositoryResult<Lock> {
        let note = self.require_note(self.connection(), note_id).await?;

        let lock = match self.find_lock(self.connection(), note.id).await? {
            Some(lock) => lock,
            None => {
                let inserted = note_locks::ActiveModel {
                    id: NotSet,
                    note_id: Set(note.id),
                    locked_at: Set(Utc::now()),
                }
                .insert(self.connection())
                .await;

                match inserted {
                    Ok(lock) => lock,
                    // lost the race; the first lock time wins
                    Err(err) if is_unique_violation(&err) => self
                        .find_lock(self.connection(), note.id)
                        .await?
                        .ok_or_else(|| RepositoryError::not_found("note_locks", "note_id", note_id))?,
                    Err(err) => return Err(err.into()),
                }
            }
        };

        Ok(Lock {
            note_id,
            locked_at: lock.locked_at,
        })
    }

    async fn unlock_note(&self, note_id: NoteId) -> RepositoryResult<()> {
        NoteLocks::delete_many()
            .filter(note_locks::Column::NoteId.eq(ConversionUtils::id_to_db(note_id, "note_id")?))
            .exec(self.connection())
            .await?;
        Ok(())
    }

    async fn note_is_locked(&self, note_id: NoteId) -> RepositoryResult<bool> {
        let count = NoteLocks::find()
            .filter(note_locks::Column::NoteId.eq(ConversionUtils::id_to_db(note_id, "note_id")?))
            .count(self.connection())
            .await?;
        Ok(count > 0)
    }

    async fn insert_comment(&self, note_id: NoteId, entry: &str) -> RepositoryResult<Comment> {
        if note_id == 0 {
            return Err(RepositoryError::validation("note_id", "note id is required"));
        }
        if entry.chars().count() > MAX_COMMENT_LENGTH {
            return Err(RepositoryError::validation(
                "entry",
                format!("comment exceeds {MAX_COMMENT_LENGTH} characters"),
            ));
        }

        let note = self.require_note(self.connection(), note_id).await?;
        let now = Utc::now();
        let saved = note_comments::ActiveModel {
            id: NotSet,
            note_id: Set(note.id),
            entry: Set(entry.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.connection())
        .await?;

        Self::comment_to_domain(saved)
    }

    async fn load_comments(&self, note_id: i32) -> RepositoryResult<Vec<Comment>> {
        NoteComments::find()
            .filter(note_comments::Column::NoteId.eq(note_id))
            .order_by_asc(note_comments::Column::CreatedAt)
            .order_by_asc(note_comments::Column::Id)
            .all(self.connection())
            .await?
            .into_iter()
            .map(Self::comment_to_domain)
            .collect()
    }

    fn comment_to_domain(model: note_comments::Model) -> RepositoryResult<Comment> {
        Ok(Comment {
            id: ConversionUtils::id_from_db(model.id, "note_comments.id")?,
            entry: model.entry,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[async_trait]
impl DetectionRepository for DetectionSeaOrmRepository {
    async fn save(
        &self,
        ctx: &CancellationToken,
        note: &Note,
        results: &[NoteResult],
    ) -> RepositoryResult<NoteId> {
        cancellable(
            ctx,
            "save_note",
            with_retry(&self.retry_config, || self.save_once(note, results), "save_note"),
        )
        .await
    }

    async fn get(&self, ctx: &CancellationToken, id: NoteId) -> RepositoryResult<Note> {
        cancellable(ctx, "get_note", self.load_note(id)).await
    }

    async fn get_results(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
    ) -> RepositoryResult<Vec<NoteResult>> {
        cancellable(ctx, "get_note_results", self.load_results(note_id)).await
    }

    async fn delete(&self, ctx: &CancellationToken, id: NoteId) -> RepositoryResult<()> {
        cancellable(ctx, "delete_note", self.delete_note(id)).await
    }

    async fn save_review(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
        verified: &str,
    ) -> RepositoryResult<Review> {
        cancellable(ctx, "save_review", self.upsert_review(note_id, verified)).await
    }

    async fn lock(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<Lock> {
        cancellable(ctx, "lock_note", self.lock_note(note_id)).await
    }

    async fn unlock(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<()> {
        cancellable(ctx, "unlock_note", self.unlock_note(note_id)).await
    }

    async fn is_locked(&self, ctx: &CancellationToken, note_id: NoteId) -> RepositoryResult<bool> {
        cancellable(ctx, "is_note_locked", self.note_is_locked(note_id)).await
    }

    async fn add_comment(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
        entry: &str,
    ) -> RepositoryResult<Comment> {
        cancellable(ctx, "add_comment", self.insert_comment(note_id, entry)).await
    }

    async fn comments(
        &self,
        ctx: &CancellationToken,
        note_id: NoteId,
    ) -> RepositoryResult<Vec<Comment>> {
        let note_id = ConversionUtils::id_to_db(note_id, "note_id")?;
        cancellable(ctx, "list_comments", self.load_comments(note_id)).await
    }
}
