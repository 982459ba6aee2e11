//! Species resolution
//!
//! - [`parser`]: decodes classifier labels and composite species keys
//! - [`cache`]: multi-index, TTL-bounded cache in front of a species repository

pub mod cache;
pub mod parser;

pub use cache::{SpeciesCache, SpeciesCacheStats};
pub use parser::{ParsedSpecies, SPECIES_KEY_DELIMITER, format_species_key, parse_species_string};
