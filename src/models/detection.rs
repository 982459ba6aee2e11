//! Runtime detection model
//!
//! A [`Detection`] is one classification event. It is created transiently
//! per classification, validated at construction, persisted once through the
//! mapper and the detection repository, and gets its id after the save.

use chrono::{DateTime, Local, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::note::NoteId;
use super::species::Species;
use crate::config::StationConfig;
use crate::errors::ValidationError;
use crate::species::parse_species_string;

/// Date layout of the persisted `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Time layout of the persisted `time` column
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Classifier output lags the audio it describes
const DETECTION_TIME_OFFSET_SECS: i64 = 2;

/// Review tag for a confirmed detection
pub const VERIFIED_CORRECT: &str = "correct";
/// Review tag for a rejected detection
pub const VERIFIED_FALSE_POSITIVE: &str = "false_positive";

/// Where the audio came from. Runtime only: it may embed connection
/// credentials and is rebuilt from configuration, so only the source node
/// label is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub safe_string: String,
    pub display_name: String,
}

/// One ranked candidate species (rank 1 = highest confidence)
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub species: Arc<Species>,
    pub confidence: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Comment {
    pub id: u32,
    pub entry: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub note_id: NoteId,
    /// Free-form tag, usually [`VERIFIED_CORRECT`] or [`VERIFIED_FALSE_POSITIVE`]
    pub verified: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub note_id: NoteId,
    pub locked_at: DateTime<Utc>,
}

/// A single classification event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    /// 0 until the detection repository has saved it
    pub id: NoteId,
    pub source_node: String,
    pub date: String,
    pub time: String,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// Canonical species shared with the species cache, when resolved
    pub species: Option<Arc<Species>>,
    pub scientific_name: String,
    pub common_name: String,
    pub species_code: String,

    pub confidence: f64,
    pub threshold: f64,
    pub sensitivity: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub clip_name: String,
    pub processing_time: Duration,

    /// Runtime only
    pub source: AudioSource,
    /// Derived occurrence probability in [0, 1]; runtime only
    pub occurrence: f64,

    // Projections of review/lock/comment relationships
    pub verified: String,
    pub locked: bool,
    pub comments: Vec<Comment>,

    pub predictions: Vec<Prediction>,
}

/// Inputs for [`Detection::new`]
#[derive(Debug, Clone, Default)]
pub struct DetectionParams {
    pub source_node: String,
    pub date: String,
    pub time: String,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// When set, empty name/code fields below are filled from it
    pub species: Option<Arc<Species>>,
    pub scientific_name: String,
    pub common_name: String,
    pub species_code: String,
    pub confidence: f64,
    pub threshold: f64,
    pub sensitivity: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub clip_name: String,
    pub processing_time: Duration,
    pub source: AudioSource,
    pub occurrence: f64,
    pub predictions: Vec<Prediction>,
}

/// Raw classifier output for one detection window
#[derive(Debug, Clone, Default)]
pub struct ClassificationInput {
    /// Classifier label, e.g. `Turdus migratorius_American Robin_amerobin`
    pub species: String,
    pub confidence: f64,
    pub begin_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub source: AudioSource,
    pub clip_name: String,
    pub processing_time: Duration,
    /// Occurrence probability; clamped into [0, 1]
    pub occurrence: f64,
}

fn in_unit_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl Detection {
    /// Validate and build a detection
    ///
    /// Fails when the source node is empty, when neither species name is
    /// given, when confidence or occurrence fall outside [0, 1], or when both
    /// timestamps are set and the end precedes the begin.
    pub fn new(params: DetectionParams) -> Result<Self, ValidationError> {
        let DetectionParams {
            source_node,
            date,
            time,
            begin_time,
            end_time,
            species,
            mut scientific_name,
            mut common_name,
            mut species_code,
            confidence,
            threshold,
            sensitivity,
            latitude,
            longitude,
            clip_name,
            processing_time,
            source,
            occurrence,
            predictions,
        } = params;

        if let Some(species) = &species {
            if scientific_name.is_empty() {
                scientific_name.clone_from(&species.scientific_name);
            }
            if common_name.is_empty() {
                common_name.clone_from(&species.common_name);
            }
            if species_code.is_empty() {
                species_code.clone_from(&species.species_code);
            }
        }

        if source_node.is_empty() {
            return Err(ValidationError::EmptySourceNode);
        }
        if scientific_name.is_empty() && common_name.is_empty() {
            return Err(ValidationError::MissingSpeciesName);
        }
        if !in_unit_range(confidence) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence));
        }
        if !in_unit_range(occurrence) {
            return Err(ValidationError::OccurrenceOutOfRange(occurrence));
        }
        if let (Some(begin), Some(end)) = (begin_time, end_time)
            && end < begin
        {
            return Err(ValidationError::EndBeforeBegin { begin, end });
        }

        Ok(Self {
            id: 0,
            source_node,
            date,
            time,
            begin_time,
            end_time,
            species,
            scientific_name,
            common_name,
            species_code,
            confidence,
            threshold,
            sensitivity,
            latitude,
            longitude,
            clip_name,
            processing_time,
            source,
            occurrence,
            verified: String::new(),
            locked: false,
            comments: Vec::new(),
            predictions,
        })
    }

    /// Build a detection from raw classifier output, stamped with the current time
    pub fn from_classification(
        input: ClassificationInput,
        station: &StationConfig,
    ) -> Result<Self, ValidationError> {
        Self::from_classification_at(input, station, Local::now())
    }

    /// Build a detection from raw classifier output at a given wall-clock instant
    ///
    /// The label is parsed into species fields, confidence is rounded to two
    /// decimals, the recorded time is `now` minus the classifier lag, and the
    /// occurrence value is clamped into [0, 1].
    pub fn from_classification_at(
        input: ClassificationInput,
        station: &StationConfig,
        now: DateTime<Local>,
    ) -> Result<Self, ValidationError> {
        let parsed = parse_species_string(&input.species);
        let detected_at = now - TimeDelta::seconds(DETECTION_TIME_OFFSET_SECS);

        Self::new(DetectionParams {
            source_node: station.node_name.clone(),
            date: now.format(DATE_FORMAT).to_string(),
            time: detected_at.format(TIME_FORMAT).to_string(),
            begin_time: input.begin_time,
            end_time: input.end_time,
            species: None,
            scientific_name: parsed.scientific_name,
            common_name: parsed.common_name,
            species_code: parsed.species_code,
            confidence: (input.confidence * 100.0).round() / 100.0,
            threshold: station.threshold,
            sensitivity: station.sensitivity,
            latitude: station.latitude,
            longitude: station.longitude,
            clip_name: input.clip_name,
            processing_time: input.processing_time,
            source: input.source,
            occurrence: clamp_unit(input.occurrence),
            predictions: Vec::new(),
        })
    }

    /// Recompute the derived occurrence probability, clamped into [0, 1]
    pub fn set_occurrence(&mut self, occurrence: f64) {
        self.occurrence = clamp_unit(occurrence);
    }

    /// Point the detection at a canonical species and mirror its identity fields
    pub fn attach_species(&mut self, species: Arc<Species>) {
        self.scientific_name.clone_from(&species.scientific_name);
        self.common_name.clone_from(&species.common_name);
        self.species_code.clone_from(&species.species_code);
        self.species = Some(species);
    }

    /// Species value describing this detection, canonical when attached
    pub fn species_value(&self) -> Species {
        match &self.species {
            Some(species) => species.as_ref().clone(),
            None => Species::new(
                self.scientific_name.clone(),
                self.common_name.clone(),
                self.species_code.clone(),
            ),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id != 0
    }
}

/// NaN stays NaN so that validation still rejects it
fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn valid_params() -> DetectionParams {
        let begin = Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 0).unwrap();
        DetectionParams {
            source_node: "garden-pi".to_string(),
            date: "2025-01-15".to_string(),
            time: "14:30:00".to_string(),
            begin_time: Some(begin),
            end_time: Some(begin + TimeDelta::seconds(3)),
            scientific_name: "Corvus brachyrhynchos".to_string(),
            common_name: "American Crow".to_string(),
            species_code: "amecro".to_string(),
            confidence: 0.91,
            threshold: 0.8,
            sensitivity: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_detection_is_unsaved() {
        let detection = Detection::new(valid_params()).unwrap();
        assert_eq!(detection.id, 0);
        assert!(!detection.is_saved());
        assert_eq!(detection.common_name, "American Crow");
    }

    #[rstest]
    #[case::confidence_above_one(DetectionParams { confidence: 1.5, ..valid_params() }, ValidationError::ConfidenceOutOfRange(1.5))]
    #[case::negative_occurrence(DetectionParams { occurrence: -0.1, ..valid_params() }, ValidationError::OccurrenceOutOfRange(-0.1))]
    #[case::empty_source_node(DetectionParams { source_node: String::new(), ..valid_params() }, ValidationError::EmptySourceNode)]
    #[case::no_species_names(DetectionParams { scientific_name: String::new(), common_name: String::new(), ..valid_params() }, ValidationError::MissingSpeciesName)]
    fn test_construction_rejected(#[case] params: DetectionParams, #[case] expected: ValidationError) {
        assert_eq!(Detection::new(params).unwrap_err(), expected);
    }

    #[test]
    fn test_end_before_begin_rejected() {
        let begin = Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, 3).unwrap();
        let end = begin - TimeDelta::seconds(3);
        let params = DetectionParams {
            begin_time: Some(begin),
            end_time: Some(end),
            ..valid_params()
        };

        assert_eq!(
            Detection::new(params).unwrap_err(),
            ValidationError::EndBeforeBegin { begin, end }
        );
    }

    #[test]
    fn test_unset_timestamp_skips_ordering_check() {
        let params = DetectionParams {
            begin_time: None,
            ..valid_params()
        };
        assert!(Detection::new(params).is_ok());

        let params = DetectionParams {
            end_time: None,
            ..valid_params()
        };
        assert!(Detection::new(params).is_ok());
    }

    #[test]
    fn test_scientific_name_only_is_accepted() {
        let params = DetectionParams {
            common_name: String::new(),
            species_code: String::new(),
            ..valid_params()
        };

        let detection = Detection::new(params).unwrap();
        assert_eq!(detection.scientific_name, "Corvus brachyrhynchos");
        assert!(detection.common_name.is_empty());
    }

    #[test]
    fn test_nan_confidence_rejected() {
        let params = DetectionParams {
            confidence: f64::NAN,
            ..valid_params()
        };
        assert!(matches!(
            Detection::new(params),
            Err(ValidationError::ConfidenceOutOfRange(_))
        ));
    }

    #[test]
    fn test_names_filled_from_attached_species() {
        let crow = Arc::new(Species::new("Corvus corax", "Common Raven", "comrav").with_id(7));
        let params = DetectionParams {
            species: Some(crow.clone()),
            scientific_name: String::new(),
            common_name: String::new(),
            species_code: String::new(),
            ..valid_params()
        };

        let detection = Detection::new(params).unwrap();
        assert_eq!(detection.scientific_name, "Corvus corax");
        assert_eq!(detection.species_code, "comrav");
        assert!(Arc::ptr_eq(detection.species.as_ref().unwrap(), &crow));
    }

    #[test]
    fn test_from_classification_parses_rounds_and_clamps() {
        let station = StationConfig {
            node_name: "garden-pi".to_string(),
            latitude: 60.17,
            longitude: 24.94,
            threshold: 0.7,
            sensitivity: 1.25,
        };
        let now = Local.with_ymd_and_hms(2025, 5, 1, 6, 15, 1).unwrap();
        let input = ClassificationInput {
            species: "Turdus migratorius_American Robin_amerobin".to_string(),
            confidence: 0.87654,
            occurrence: 1.7,
            ..Default::default()
        };

        let detection = Detection::from_classification_at(input, &station, now).unwrap();

        assert_eq!(detection.scientific_name, "Turdus migratorius");
        assert_eq!(detection.common_name, "American Robin");
        assert_eq!(detection.species_code, "amerobin");
        assert_eq!(detection.confidence, 0.88);
        assert_eq!(detection.occurrence, 1.0);
        assert_eq!(detection.date, "2025-05-01");
        assert_eq!(detection.time, "06:14:59");
        assert_eq!(detection.source_node, "garden-pi");
        assert_eq!(detection.threshold, 0.7);
        assert_eq!(detection.latitude, 60.17);
    }

    #[test]
    fn test_set_occurrence_clamps() {
        let mut detection = Detection::new(valid_params()).unwrap();
        detection.set_occurrence(-3.0);
        assert_eq!(detection.occurrence, 0.0);
        detection.set_occurrence(0.42);
        assert_eq!(detection.occurrence, 0.42);
    }
}
