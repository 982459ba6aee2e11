//! Domain model for detections and the species they reference
//!
//! - [`species`]: canonical species identity
//! - [`detection`]: runtime detection, predictions, review/lock/comment state
//! - [`note`]: persisted record shapes produced and consumed by the mapper

pub mod detection;
pub mod note;
pub mod species;

pub use detection::*;
pub use note::*;
pub use species::*;
