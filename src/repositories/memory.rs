//! In-process species repository
//!
//! Holds species in a `Vec` behind a mutex and records how often each method
//! was called. Tests use the counters to assert cache behaviour and
//! [`InMemorySpeciesRepository::set_fail`] to drive failure paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::traits::{SpeciesRepository, cancellable};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Species, SpeciesId};

/// Repository method, for call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SpeciesRepoMethod {
    GetById,
    GetByScientificName,
    GetByEbirdCode,
    GetOrCreate,
    List,
    InvalidateCache,
}

#[derive(Debug, Default)]
struct MemoryState {
    species: Vec<Species>,
    calls: HashMap<SpeciesRepoMethod, usize>,
    fail: bool,
}

impl MemoryState {
    fn next_id(&self) -> SpeciesId {
        self.species.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Default)]
pub struct InMemorySpeciesRepository {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl InMemorySpeciesRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository seeded with `species`; zero ids are assigned in order
    pub fn with_species<I>(species: I) -> Self
    where
        I: IntoIterator<Item = Species>,
    {
        let repo = Self::new();
        for s in species {
            repo.add_species(s);
        }
        repo
    }

    /// Delay every call by `latency` before it answers
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or replace a species without counting a call
    pub fn add_species(&self, mut species: Species) -> Species {
        let mut state = self.lock();
        if species.id == 0 {
            species.id = state.next_id();
        }
        state.species.retain(|s| s.id != species.id);
        state.species.push(species.clone());
        species
    }

    pub fn remove_species(&self, id: SpeciesId) -> Option<Species> {
        let mut state = self.lock();
        let position = state.species.iter().position(|s| s.id == id)?;
        Some(state.species.remove(position))
    }

    /// Make every subsequent call fail until reset
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    pub fn call_count(&self, method: SpeciesRepoMethod) -> usize {
        self.lock().calls.get(&method).copied().unwrap_or(0)
    }

    /// Calls across every lookup method (`get_by_*` and `get_or_create`)
    pub fn lookup_calls(&self) -> usize {
        [
            SpeciesRepoMethod::GetById,
            SpeciesRepoMethod::GetByScientificName,
            SpeciesRepoMethod::GetByEbirdCode,
            SpeciesRepoMethod::GetOrCreate,
        ]
        .into_iter()
        .map(|method| self.call_count(method))
        .sum()
    }

    pub fn reset_call_counts(&self) {
        self.lock().calls.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The mutex only guards plain data, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call, wait out the latency, then check the failure toggle
    async fn enter(&self, ctx: &CancellationToken, method: SpeciesRepoMethod) -> RepositoryResult<()> {
        *self.lock().calls.entry(method).or_default() += 1;
        trace!("In-memory species repository call: {}", method);

        let latency = self.latency;
        cancellable(ctx, method.as_ref(), async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            Ok::<_, RepositoryError>(())
        })
        .await?;

        if self.lock().fail {
            return Err(RepositoryError::ConnectionFailed {
                message: format!("forced failure in {method}"),
            });
        }
        Ok(())
    }

    fn find<P>(&self, field: &str, value: &str, predicate: P) -> RepositoryResult<Species>
    where
        P: Fn(&Species) -> bool,
    {
        self.lock()
            .species
            .iter()
            .find(|s| predicate(s))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("species", field, value))
    }
}

#[async_trait]
impl SpeciesRepository for InMemorySpeciesRepository {
    async fn get_by_id(&self, ctx: &CancellationToken, id: SpeciesId) -> RepositoryResult<Species> {
        self.enter(ctx, SpeciesRepoMethod::GetById).await?;
        self.find("id", &id.to_string(), |s| s.id == id)
    }

    async fn get_by_scientific_name(
        &self,
        ctx: &CancellationToken,
        scientific_name: &str,
    ) -> RepositoryResult<Species> {
        self.enter(ctx, SpeciesRepoMethod::GetByScientificName).await?;
        self.find("scientific_name", scientific_name, |s| {
            s.scientific_name == scientific_name
        })
    }

    async fn get_by_ebird_code(
        &self,
        ctx: &CancellationToken,
        species_code: &str,
    ) -> RepositoryResult<Species> {
        self.enter(ctx, SpeciesRepoMethod::GetByEbirdCode).await?;
        self.find("species_code", species_code, |s| {
            !s.species_code.is_empty() && s.species_code == species_code
        })
    }

    async fn get_or_create(
        &self,
        ctx: &CancellationToken,
        species: &Species,
    ) -> RepositoryResult<Species> {
        self.enter(ctx, SpeciesRepoMethod::GetOrCreate).await?;
        if species.scientific_name.is_empty() {
            return Err(RepositoryError::validation(
                "scientific_name",
                "scientific name is required",
            ));
        }

        let mut state = self.lock();
        if let Some(existing) = state
            .species
            .iter()
            .find(|s| s.scientific_name == species.scientific_name)
        {
            return Ok(existing.clone());
        }

        let created = Species {
            id: state.next_id(),
            ..species.clone()
        };
        state.species.push(created.clone());
        Ok(created)
    }

    async fn list(
        &self,
        ctx: &CancellationToken,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Species>> {
        self.enter(ctx, SpeciesRepoMethod::List).await?;

        let mut species = self.lock().species.clone();
        species.sort_by_key(|s| s.id);
        Ok(species
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn invalidate_cache(&self) -> RepositoryResult<()> {
        let mut state = self.lock();
        *state.calls.entry(SpeciesRepoMethod::InvalidateCache).or_default() += 1;
        if state.fail {
            return Err(RepositoryError::ConnectionFailed {
                message: format!("forced failure in {}", SpeciesRepoMethod::InvalidateCache),
            });
        }
        Ok(())
    }
}
