//! SeaORM entities for the detection datastore schema

pub mod prelude;

pub mod note_comments;
pub mod note_locks;
pub mod note_reviews;
pub mod notes;
pub mod results;
pub mod species;
