//! SeaORM-backed species repository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::traits::{BaseSeaOrmRepository, ConversionUtils};
use crate::database::entities::{prelude::Species as SpeciesEntity, species};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::models::{Species, SpeciesId};
use crate::repositories::{SpeciesRepository, cancellable};

pub struct SpeciesSeaOrmRepository {
    base: BaseSeaOrmRepository,
}

impl SpeciesSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseSeaOrmRepository::new(connection),
        }
    }

    fn connection(&self) -> &DatabaseConnection {
        &self.base.connection
    }

    async fn find_by_column(
        &self,
        column: species::Column,
        value: &str,
    ) -> RepositoryResult<Option<Species>> {
        SpeciesEntity::find()
            .filter(column.eq(value))
            .one(self.connection())
            .await?
            .map(Self::model_to_domain)
            .transpose()
    }

    async fn fetch_by_id(&self, id: SpeciesId) -> RepositoryResult<Species> {
        SpeciesEntity::find_by_id(ConversionUtils::id_to_db(id, "id")?)
            .one(self.connection())
            .await?
            .map(Self::model_to_domain)
            .transpose()?
            .ok_or_else(|| RepositoryError::not_found("species", "id", id))
    }

    async fn find_required(
        &self,
        column: species::Column,
        field: &str,
        value: &str,
    ) -> RepositoryResult<Species> {
        self.find_by_column(column, value)
            .await?
            .ok_or_else(|| RepositoryError::not_found("species", field, value))
    }

    async fn insert_or_fetch(&self, species: &Species) -> RepositoryResult<Species> {
        if species.scientific_name.is_empty() {
            return Err(RepositoryError::validation(
                "scientific_name",
                "scientific name is required",
            ));
        }

        if let Some(existing) = self
            .find_by_column(species::Column::ScientificName, &species.scientific_name)
            .await?
        {
            return Ok(existing);
        }

        let model = species::ActiveModel {
            id: NotSet,
            scientific_name: Set(species.scientific_name.clone()),
            common_name: Set(species.common_name.clone()),
            species_code: Set(species.species_code.clone()),
            created_at: Set(Utc::now()),
        };

        match model.insert(self.connection()).await {
            Ok(created) => {
                debug!("Created species {} ({})", created.scientific_name, created.id);
                Self::model_to_domain(created)
            }
            // another writer inserted the same name first
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                self.find_required(
                    species::Column::ScientificName,
                    "scientific_name",
                    &species.scientific_name,
                )
                .await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_page(&self, limit: u64, offset: u64) -> RepositoryResult<Vec<Species>> {
        SpeciesEntity::find()
            .order_by_asc(species::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.connection())
            .await?
            .into_iter()
            .map(Self::model_to_domain)
            .collect()
    }

    fn model_to_domain(model: species::Model) -> RepositoryResult<Species> {
        Ok(Species {
            id: ConversionUtils::id_from_db(model.id, "species.id")?,
            scientific_name: model.scientific_name,
            common_name: model.common_name,
            species_code: model.species_code,
        })
    }
}

#[async_trait]
impl SpeciesRepository for SpeciesSeaOrmRepository {
    async fn get_by_id(&self, ctx: &CancellationToken, id: SpeciesId) -> RepositoryResult<Species> {
        cancellable(ctx, "get_species_by_id", self.fetch_by_id(id)).await
    }

    async fn get_by_scientific_name(
        &self,
        ctx: &CancellationToken,
        scientific_name: &str,
    ) -> RepositoryResult<Species> {
        cancellable(
            ctx,
            "get_species_by_scientific_name",
            self.find_required(
                species::Column::ScientificName,
                "scientific_name",
                scientific_name,
            ),
        )
        .await
    }

    async fn get_by_ebird_code(
        &self,
        ctx: &CancellationToken,
        species_code: &str,
    ) -> RepositoryResult<Species> {
        if species_code.is_empty() {
            return Err(RepositoryError::not_found("species", "species_code", ""));
        }
        cancellable(
            ctx,
            "get_species_by_ebird_code",
            self.find_required(species::Column::SpeciesCode, "species_code", species_code),
        )
        .await
    }

    async fn get_or_create(
        &self,
        ctx: &CancellationToken,
        species: &Species,
    ) -> RepositoryResult<Species> {
        cancellable(ctx, "get_or_create_species", self.insert_or_fetch(species)).await
    }

    async fn list(
        &self,
        ctx: &CancellationToken,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Species>> {
        cancellable(ctx, "list_species", self.list_page(limit, offset)).await
    }

    async fn invalidate_cache(&self) -> RepositoryResult<()> {
        debug!("SeaORM species repository holds no cache, nothing to invalidate");
        Ok(())
    }
}
