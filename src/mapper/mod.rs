//! Detection ↔ note mapping
//!
//! Field policy:
//!
//! | field | to note | from note |
//! |---|---|---|
//! | id, source node, date/time, begin/end | copied | copied |
//! | species identity fields | copied | copied; a species value is synthesized when the scientific name is set |
//! | confidence, threshold, sensitivity, latitude, longitude | copied | copied |
//! | clip name, processing time | copied | copied |
//! | audio source | dropped | supplied by the caller |
//! | occurrence | dropped | left at 0 |
//! | verified, locked, comments | not written | copied |
//!
//! Predictions are stored as [`NoteResult`] rows keyed by the composite
//! species key of [`format_species_key`], with single-precision confidence.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::CacheResult;
use crate::models::{AudioSource, Detection, Note, NoteId, NoteResult, Prediction, Species};
use crate::species::{SpeciesCache, format_species_key, parse_species_string};

#[derive(Debug, Clone, Default)]
pub struct DetectionMapper {
    species_cache: Option<Arc<SpeciesCache>>,
}

impl DetectionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper that can resolve canonical species through `cache`
    pub fn with_cache(cache: Arc<SpeciesCache>) -> Self {
        Self {
            species_cache: Some(cache),
        }
    }

    pub fn species_cache(&self) -> Option<&Arc<SpeciesCache>> {
        self.species_cache.as_ref()
    }

    pub fn to_datastore(&self, detection: &Detection) -> Note {
        Note {
            id: detection.id,
            source_node: detection.source_node.clone(),
            date: detection.date.clone(),
            time: detection.time.clone(),
            begin_time: detection.begin_time,
            end_time: detection.end_time,
            species_code: detection.species_code.clone(),
            scientific_name: detection.scientific_name.clone(),
            common_name: detection.common_name.clone(),
            confidence: detection.confidence,
            latitude: detection.latitude,
            longitude: detection.longitude,
            threshold: detection.threshold,
            sensitivity: detection.sensitivity,
            clip_name: detection.clip_name.clone(),
            processing_time: detection.processing_time,
            ..Note::default()
        }
    }

    /// Rebuild a detection from a stored note
    ///
    /// `source` is attached as-is. Occurrence stays 0 until the caller
    /// recomputes it.
    pub fn from_datastore(&self, note: &Note, source: &AudioSource) -> Detection {
        let species = (!note.scientific_name.is_empty()).then(|| {
            Arc::new(Species::new(
                note.scientific_name.clone(),
                note.common_name.clone(),
                note.species_code.clone(),
            ))
        });

        Detection {
            id: note.id,
            source_node: note.source_node.clone(),
            date: note.date.clone(),
            time: note.time.clone(),
            begin_time: note.begin_time,
            end_time: note.end_time,
            species,
            scientific_name: note.scientific_name.clone(),
            common_name: note.common_name.clone(),
            species_code: note.species_code.clone(),
            confidence: note.confidence,
            threshold: note.threshold,
            sensitivity: note.sensitivity,
            latitude: note.latitude,
            longitude: note.longitude,
            clip_name: note.clip_name.clone(),
            processing_time: note.processing_time,
            source: source.clone(),
            occurrence: 0.0,
            verified: note.verified.clone(),
            locked: note.locked,
            comments: note.comments.clone(),
            predictions: Vec::new(),
        }
    }

    pub fn to_datastore_batch(&self, detections: &[Detection]) -> Vec<Note> {
        detections.iter().map(|d| self.to_datastore(d)).collect()
    }

    pub fn from_datastore_batch(&self, notes: &[Note], source: &AudioSource) -> Vec<Detection> {
        notes
            .iter()
            .map(|note| self.from_datastore(note, source))
            .collect()
    }

    /// Prediction rows for `note_id`; confidence is narrowed to `f32`
    pub fn to_prediction_entities(&self, note_id: NoteId, predictions: &[Prediction]) -> Vec<NoteResult> {
        predictions
            .iter()
            .map(|prediction| NoteResult {
                id: 0,
                note_id,
                species: format_species_key(&prediction.species),
                confidence: prediction.confidence as f32,
            })
            .collect()
    }

    /// Predictions from stored rows; rank is the 1-based row position
    pub fn from_prediction_entities(&self, results: &[NoteResult]) -> Vec<Prediction> {
        results
            .iter()
            .enumerate()
            .map(|(position, result)| Prediction {
                species: Arc::new(parse_species_string(&result.species).into_species()),
                confidence: f64::from(result.confidence),
                rank: position + 1,
            })
            .collect()
    }

    /// Swap the species on `detection` and its predictions for the cache's
    /// canonical instances
    ///
    /// Without a cache this is a no-op. Species without a scientific name
    /// cannot be stored and are left as they are.
    pub async fn canonicalize(&self, ctx: &CancellationToken, detection: &mut Detection) -> CacheResult<()> {
        let Some(cache) = &self.species_cache else {
            return Ok(());
        };

        if !detection.scientific_name.is_empty() {
            let species = cache.get_or_create(ctx, &detection.species_value()).await?;
            detection.attach_species(species);
        } else {
            debug!(
                "Detection of '{}' has no scientific name, keeping it unresolved",
                detection.common_name
            );
        }

        for prediction in &mut detection.predictions {
            if !prediction.species.scientific_name.is_empty() && !prediction.species.is_persisted() {
                prediction.species = cache.get_or_create(ctx, &prediction.species).await?;
            }
        }
        Ok(())
    }
}
