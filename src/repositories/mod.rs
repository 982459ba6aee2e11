//! Repository abstractions
//!
//! The species cache and the detection pipeline only depend on the traits in
//! [`traits`]. [`memory`] provides an in-process species repository with call
//! counters and failure injection; the SeaORM-backed implementations live in
//! [`crate::database::repositories`].

pub mod memory;
pub mod traits;

pub use memory::{InMemorySpeciesRepository, SpeciesRepoMethod};
pub use traits::{DetectionRepository, SpeciesRepository, cancellable};
