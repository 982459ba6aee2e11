//! Species cache, detection mapper and SeaORM persistence for bird sound
//! classification results.
//!
//! Classifier output flows through this crate as:
//! raw label → [`species::parse_species_string`] → [`species::SpeciesCache`]
//! → [`models::Detection`] → [`mapper::DetectionMapper`] →
//! [`repositories::DetectionRepository`].

pub mod config;
pub mod database;
pub mod errors;
pub mod mapper;
pub mod models;
pub mod repositories;
pub mod species;
pub mod utils;
