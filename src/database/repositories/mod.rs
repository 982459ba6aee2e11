//! SeaORM implementations of the repository traits

pub mod detection;
pub mod species;
pub mod traits;

pub use detection::DetectionSeaOrmRepository;
pub use species::SpeciesSeaOrmRepository;
