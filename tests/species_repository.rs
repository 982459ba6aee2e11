//! SeaORM species repository and the species cache on top of it

mod common;

use std::sync::Arc;
use std::time::Duration;

use birdnet_datastore::{
    database::repositories::SpeciesSeaOrmRepository,
    errors::{RepositoryError, SpeciesCacheError},
    models::Species,
    repositories::SpeciesRepository,
    species::SpeciesCache,
};
use tokio_util::sync::CancellationToken;

async fn repository() -> SpeciesSeaOrmRepository {
    let database = common::migrated_database().await;
    SpeciesSeaOrmRepository::new(database.connection())
}

fn robin() -> Species {
    Species::new("Turdus migratorius", "American Robin", "amerobin")
}

fn crow() -> Species {
    Species::new("Corvus brachyrhynchos", "American Crow", "amecro")
}

#[tokio::test]
async fn get_or_create_inserts_once() {
    let repo = repository().await;
    let ctx = CancellationToken::new();

    let created = repo.get_or_create(&ctx, &robin()).await.unwrap();
    assert!(created.is_persisted());
    assert_eq!(created.scientific_name, "Turdus migratorius");

    let again = repo.get_or_create(&ctx, &robin()).await.unwrap();
    assert_eq!(again, created);
    assert_eq!(repo.list(&ctx, 100, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_or_create_rejects_empty_scientific_name() {
    let repo = repository().await;
    let err = repo
        .get_or_create(&CancellationToken::new(), &Species::new("", "Common Blackbird", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Validation { ref field, .. } if field == "scientific_name"));
}

#[tokio::test]
async fn lookups_by_every_key() {
    let repo = repository().await;
    let ctx = CancellationToken::new();
    let created = repo.get_or_create(&ctx, &crow()).await.unwrap();

    assert_eq!(repo.get_by_id(&ctx, created.id).await.unwrap(), created);
    assert_eq!(
        repo.get_by_scientific_name(&ctx, "Corvus brachyrhynchos")
            .await
            .unwrap(),
        created
    );
    assert_eq!(repo.get_by_ebird_code(&ctx, "amecro").await.unwrap(), created);
}

#[tokio::test]
async fn missing_species_is_not_found() {
    let repo = repository().await;
    let ctx = CancellationToken::new();
    repo.get_or_create(&ctx, &Species::new("Dog bark", "Dog", "")).await.unwrap();

    assert!(repo.get_by_id(&ctx, 999).await.unwrap_err().is_not_found());
    assert!(repo
        .get_by_scientific_name(&ctx, "Corvus corax")
        .await
        .unwrap_err()
        .is_not_found());
    // species without a code are never found by an empty code
    assert!(repo.get_by_ebird_code(&ctx, "").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn list_orders_by_id_and_pages() {
    let repo = repository().await;
    let ctx = CancellationToken::new();
    for i in 0..5 {
        repo.get_or_create(&ctx, &Species::new(format!("Genus species{i}"), format!("Bird {i}"), ""))
            .await
            .unwrap();
    }

    let all = repo.list(&ctx, 50_000, 0).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|pair| pair[0].id < pair[1].id));

    let page = repo.list(&ctx, 2, 3).await.unwrap();
    assert_eq!(page, all[3..5].to_vec());
}

#[tokio::test]
async fn cancelled_token_stops_lookup() {
    let repo = repository().await;
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = repo.get_by_id(&ctx, 1).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn invalidate_cache_is_a_no_op() {
    let repo = repository().await;
    repo.invalidate_cache().await.unwrap();
}

#[tokio::test]
async fn cache_refresh_over_database() {
    let repo = Arc::new(repository().await);
    let ctx = CancellationToken::new();
    for species in [robin(), crow(), Species::new("Dog bark", "Dog", "")] {
        repo.get_or_create(&ctx, &species).await.unwrap();
    }

    let cache = SpeciesCache::new(repo.clone(), Duration::from_secs(3600));
    assert!(cache.is_expired().await);
    cache.refresh(&ctx).await.unwrap();

    let stats = cache.stats().await;
    assert_eq!(stats.size, 3);
    assert_eq!(stats.by_ebird_code_count, 2);
    assert!(!stats.is_expired);

    let by_code = cache.get_by_ebird_code(&ctx, "amerobin").await.unwrap();
    let by_name = cache
        .get_by_scientific_name(&ctx, "Turdus migratorius")
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&by_code, &by_name));

    let err = cache.get_by_ebird_code(&ctx, "nosuch").await.unwrap_err();
    assert!(matches!(err, SpeciesCacheError::Lookup { .. }));
    assert!(err.is_not_found());
}
