//! Persisted record shapes
//!
//! A [`Note`] is what the detection repository stores for one detection and
//! a [`NoteResult`] is one ranked prediction row. Neither carries the audio
//! source or the occurrence probability; `verified`, `locked` and `comments`
//! are read-only projections of the review, lock and comment tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::detection::Comment;

/// Note identifier assigned on save (0 = unsaved)
pub type NoteId = u32;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub source_node: String,
    /// `%Y-%m-%d`
    pub date: String,
    /// `%H:%M:%S`
    pub time: String,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub species_code: String,
    pub scientific_name: String,
    pub common_name: String,
    pub confidence: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub threshold: f64,
    pub sensitivity: f64,
    pub clip_name: String,
    pub processing_time: Duration,

    // Populated from relationships on read, ignored on write
    pub verified: String,
    pub locked: bool,
    pub comments: Vec<Comment>,
}

/// One stored prediction; `species` is the composite species key
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NoteResult {
    pub id: u32,
    pub note_id: NoteId,
    pub species: String,
    pub confidence: f32,
}
