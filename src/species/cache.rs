//! Multi-index species cache
//!
//! Canonical species are held as `Arc<Species>` in three indexes (id,
//! scientific name, eBird code) that live together behind one
//! [`tokio::sync::RwLock`]. A species is inserted into every index for which
//! it has a key, always under the write guard, so no reader can see it in
//! some indexes but not others.
//!
//! Misses follow a double-checked protocol: release the read guard, take the
//! write guard, look again, and only then call the repository. The repository
//! call happens while the write guard is held, so N concurrent first lookups
//! for one key cost one repository call.
//!
//! Waiting for the write guard is raced against the caller's cancellation
//! token, so a cancelled caller does not queue behind another key's load.
//!
//! Repository errors are never retried or cached; they reach the caller with
//! the lookup kind and key attached.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::SpeciesCacheConfig;
use crate::config::duration_serde;
use crate::errors::{CacheResult, LookupKind, RepositoryResult, SpeciesCacheError};
use crate::models::{Species, SpeciesId};
use crate::repositories::{SpeciesRepository, cancellable};

#[derive(Debug, Default)]
struct SpeciesIndex {
    by_id: HashMap<SpeciesId, Arc<Species>>,
    by_scientific_name: HashMap<String, Arc<Species>>,
    by_ebird_code: HashMap<String, Arc<Species>>,
    loaded_at: Option<Instant>,
    loaded_at_wall: Option<DateTime<Utc>>,
}

impl SpeciesIndex {
    fn insert(&mut self, species: Species) -> Arc<Species> {
        let species = Arc::new(species);
        if species.id != 0 {
            self.by_id.insert(species.id, species.clone());
        }
        if !species.scientific_name.is_empty() {
            self.by_scientific_name
                .insert(species.scientific_name.clone(), species.clone());
        }
        if !species.species_code.is_empty() {
            self.by_ebird_code
                .insert(species.species_code.clone(), species.clone());
        }
        species
    }

    fn lookup(&self, key: &LookupKey<'_>) -> Option<Arc<Species>> {
        match key {
            LookupKey::Id(id) => self.by_id.get(id),
            LookupKey::ScientificName(name) => self.by_scientific_name.get(*name),
            LookupKey::EbirdCode(code) => self.by_ebird_code.get(*code),
        }
        .cloned()
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.loaded_at.is_none_or(|loaded_at| loaded_at.elapsed() > ttl)
    }
}

#[derive(Debug, Clone, Copy)]
enum LookupKey<'a> {
    Id(SpeciesId),
    ScientificName(&'a str),
    EbirdCode(&'a str),
}

impl LookupKey<'_> {
    fn kind(&self) -> LookupKind {
        match self {
            Self::Id(_) => LookupKind::Id,
            Self::ScientificName(_) => LookupKind::ScientificName,
            Self::EbirdCode(_) => LookupKind::EbirdCode,
        }
    }
}

impl fmt::Display for LookupKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::ScientificName(key) | Self::EbirdCode(key) => f.write_str(key),
        }
    }
}

/// Point-in-time view of the cache for observability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesCacheStats {
    /// Species in the id index
    pub size: usize,
    pub by_id_count: usize,
    pub by_scientific_name_count: usize,
    pub by_ebird_code_count: usize,
    pub is_expired: bool,
    #[serde(with = "duration_serde::duration")]
    pub ttl: Duration,
    /// Wall-clock time of the last successful refresh
    pub last_loaded_at: Option<DateTime<Utc>>,
    #[serde(with = "duration_serde::option_duration")]
    pub age: Option<Duration>,
}

pub struct SpeciesCache {
    repository: Arc<dyn SpeciesRepository>,
    ttl: Duration,
    refresh_limit: u64,
    index: RwLock<SpeciesIndex>,
}

impl fmt::Debug for SpeciesCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeciesCache")
            .field("ttl", &self.ttl)
            .field("refresh_limit", &self.refresh_limit)
            .finish_non_exhaustive()
    }
}

impl SpeciesCache {
    /// Empty cache; it is expired until the first successful [`refresh`](Self::refresh)
    pub fn new(repository: Arc<dyn SpeciesRepository>, ttl: Duration) -> Self {
        Self::from_config(
            repository,
            &SpeciesCacheConfig {
                ttl,
                ..SpeciesCacheConfig::default()
            },
        )
    }

    pub fn from_config(repository: Arc<dyn SpeciesRepository>, config: &SpeciesCacheConfig) -> Self {
        Self {
            repository,
            ttl: config.ttl,
            refresh_limit: config.refresh_limit,
            index: RwLock::new(SpeciesIndex::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get_by_id(&self, ctx: &CancellationToken, id: SpeciesId) -> CacheResult<Arc<Species>> {
        self.resolve(ctx, LookupKey::Id(id)).await
    }

    pub async fn get_by_scientific_name(
        &self,
        ctx: &CancellationToken,
        scientific_name: &str,
    ) -> CacheResult<Arc<Species>> {
        self.resolve(ctx, LookupKey::ScientificName(scientific_name))
            .await
    }

    pub async fn get_by_ebird_code(
        &self,
        ctx: &CancellationToken,
        species_code: &str,
    ) -> CacheResult<Arc<Species>> {
        self.resolve(ctx, LookupKey::EbirdCode(species_code)).await
    }

    async fn write_index(&self, ctx: &CancellationToken) -> RepositoryResult<RwLockWriteGuard<'_, SpeciesIndex>> {
        cancellable(ctx, "species cache write", async { Ok(self.index.write().await) }).await
    }

    async fn resolve(&self, ctx: &CancellationToken, key: LookupKey<'_>) -> CacheResult<Arc<Species>> {
        if let Some(species) = self.index.read().await.lookup(&key) {
            trace!("Species cache hit by {}: {}", key.kind(), key);
            return Ok(species);
        }

        let mut index = self
            .write_index(ctx)
            .await
            .map_err(|source| SpeciesCacheError::Lookup {
                kind: key.kind(),
                key: key.to_string(),
                source,
            })?;
        if let Some(species) = index.lookup(&key) {
            trace!("Species cache hit by {} after lock upgrade: {}", key.kind(), key);
            return Ok(species);
        }

        debug!("Species cache miss by {}: {}, loading from repository", key.kind(), key);
        let loaded = match key {
            LookupKey::Id(id) => self.repository.get_by_id(ctx, id).await,
            LookupKey::ScientificName(name) => {
                self.repository.get_by_scientific_name(ctx, name).await
            }
            LookupKey::EbirdCode(code) => self.repository.get_by_ebird_code(ctx, code).await,
        };

        match loaded {
            Ok(species) => Ok(index.insert(species)),
            Err(source) => {
                warn!("Species lookup by {} '{}' failed: {}", key.kind(), key, source);
                Err(SpeciesCacheError::Lookup {
                    kind: key.kind(),
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Canonical instance for `species`, created in the repository if needed
    ///
    /// A species whose scientific name is already indexed is returned without
    /// a repository call. Repository errors (including the rejection of an
    /// empty scientific name) are returned unchanged.
    pub async fn get_or_create(&self, ctx: &CancellationToken, species: &Species) -> CacheResult<Arc<Species>> {
        let key = LookupKey::ScientificName(&species.scientific_name);
        if !species.scientific_name.is_empty()
            && let Some(cached) = self.index.read().await.lookup(&key)
        {
            trace!("Species cache hit for get-or-create: {}", species.scientific_name);
            return Ok(cached);
        }

        let mut index = self.write_index(ctx).await?;
        if !species.scientific_name.is_empty()
            && let Some(cached) = index.lookup(&key)
        {
            return Ok(cached);
        }

        debug!("Species get-or-create via repository: {}", species);
        let created = self
            .repository
            .get_or_create(ctx, species)
            .await
            .inspect_err(|e| warn!("Species get-or-create for '{}' failed: {}", species, e))?;
        Ok(index.insert(created))
    }

    /// Replace every index with one bulk listing from the repository
    ///
    /// The listing runs before the write guard is taken; on failure the
    /// current contents and load time are left untouched.
    pub async fn refresh(&self, ctx: &CancellationToken) -> CacheResult<()> {
        info!("Refreshing species cache (limit {})", self.refresh_limit);
        let start_time = Instant::now();

        let listed = self
            .repository
            .list(ctx, self.refresh_limit, 0)
            .await
            .map_err(|source| {
                warn!("Species cache refresh failed: {}", source);
                SpeciesCacheError::Refresh { source }
            })?;

        if listed.len() as u64 >= self.refresh_limit {
            warn!(
                "Species listing returned {} records, the refresh limit; the cache may be incomplete",
                listed.len()
            );
        }

        let mut fresh = SpeciesIndex::default();
        for species in listed {
            fresh.insert(species);
        }
        fresh.loaded_at = Some(Instant::now());
        fresh.loaded_at_wall = Some(Utc::now());

        let loaded = fresh.by_id.len();
        *self.index.write().await = fresh;

        info!(
            "Species cache refreshed: {} species in {:.2}s",
            loaded,
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Drop every cached species and mark the cache as never loaded
    pub async fn invalidate(&self) {
        let mut index = self.index.write().await;
        let dropped = index.by_id.len();
        *index = SpeciesIndex::default();
        info!("Species cache invalidated ({} species dropped)", dropped);
    }

    /// True before the first refresh and once the TTL has elapsed since the last one
    ///
    /// Advisory: nothing refreshes the cache on its own.
    pub async fn is_expired(&self) -> bool {
        self.index.read().await.is_expired(self.ttl)
    }

    /// Number of species in the id index
    pub async fn size(&self) -> usize {
        self.index.read().await.by_id.len()
    }

    pub async fn stats(&self) -> SpeciesCacheStats {
        let index = self.index.read().await;
        SpeciesCacheStats {
            size: index.by_id.len(),
            by_id_count: index.by_id.len(),
            by_scientific_name_count: index.by_scientific_name.len(),
            by_ebird_code_count: index.by_ebird_code.len(),
            is_expired: index.is_expired(self.ttl),
            ttl: self.ttl,
            last_loaded_at: index.loaded_at_wall,
            age: index.loaded_at.map(|loaded_at| loaded_at.elapsed()),
        }
    }
}
