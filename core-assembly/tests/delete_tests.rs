//! Integration tests for sector deletion

mod common;

use bridge_traits::CatalogueStore;
use common::*;
use core_model::{DatasetKey, ImportState, JobKind, Name, Rank, SectorKey, SectorMode, SimpleName};
use core_runtime::AssemblyEvent;

const CEDRUS_SOURCE: DatasetKey = DatasetKey(101);
const DEODARA_SOURCE: DatasetKey = DatasetKey(102);

fn source_name(dataset_key: DatasetKey, mut name: Name) -> Name {
    name.dataset_key = dataset_key;
    name
}

/// Three nested sectors: Pinaceae, Cedrus below Pinaceae and Cedrus deodara below Cedrus
async fn nested_fixture() -> Fixture {
    let fx = Fixture::new(1000).await;
    add_pinaceae(&fx.store).await;
    fx.store
        .add_sector(sector(1, pinaceae_subject(), target(), SectorMode::Attach))
        .await;
    assert!(fx.sync(SECTOR).await.is_success());

    let mut cedrus = source_taxon(
        "cedrus",
        None,
        source_name(CEDRUS_SOURCE, uninomial("cedrus", Rank::Genus, "Cedrus")),
    );
    cedrus.base.dataset_key = CEDRUS_SOURCE;
    fx.store.add_usage(cedrus).await;
    let mut s = sector(
        2,
        SimpleName::new("cedrus", "Cedrus", Rank::Genus),
        fx.find("Pinaceae").await.to_simple_name(),
        SectorMode::Attach,
    );
    s.subject_dataset_key = CEDRUS_SOURCE;
    fx.store.add_sector(s).await;
    assert!(fx.sync(SectorKey(2)).await.is_success());

    let mut deodara = source_taxon(
        "deodara",
        None,
        source_name(
            DEODARA_SOURCE,
            binomial("deodara", Rank::Species, "Cedrus", "deodara", None),
        ),
    );
    deodara.base.dataset_key = DEODARA_SOURCE;
    fx.store.add_usage(deodara).await;
    let mut s = sector(
        3,
        SimpleName::new("deodara", "Cedrus deodara", Rank::Species),
        fx.find("Cedrus").await.to_simple_name(),
        SectorMode::Attach,
    );
    s.subject_dataset_key = DEODARA_SOURCE;
    fx.store.add_sector(s).await;
    assert!(fx.sync(SectorKey(3)).await.is_success());
    fx
}

#[tokio::test]
async fn test_delete_removes_nested_sectors_bottom_up() {
    let fx = nested_fixture().await;
    assert_eq!(fx.sector_usages(SectorKey(2)).await.len(), 1);
    assert_eq!(fx.sector_usages(SectorKey(3)).await.len(), 1);

    let report = fx.delete(SECTOR).await;
    assert!(report.is_success(), "{:?}", report.outcome);
    assert_eq!(report.attempt.state, ImportState::Finished);
    assert_eq!(report.attempt.job, JobKind::Delete);

    for key in [1, 2, 3] {
        let key = SectorKey(key);
        assert!(fx.sector_usages(key).await.is_empty(), "usages of {key} left");
        assert!(fx.store.sector(key).await.is_none());
        assert!(fx.store.list_attempts(key).await.unwrap().is_empty());
    }
    assert_eq!(
        fx.index.deleted().await,
        vec![SectorKey(3), SectorKey(2), SectorKey(1)]
    );
    for dataset in [SOURCE, CEDRUS_SOURCE, DEODARA_SOURCE] {
        assert_eq!(fx.store.sector_count(CATALOGUE, dataset).await, 0);
    }

    // only the catalogue root survives
    let remaining = fx.store.usages(CATALOGUE).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), "cat-root");
}

#[tokio::test]
async fn test_delete_leaf_sector_keeps_parents() {
    let fx = nested_fixture().await;
    assert!(fx.delete(SectorKey(3)).await.is_success());

    assert!(fx.sector_usages(SectorKey(3)).await.is_empty());
    assert_eq!(fx.sector_usages(SectorKey(2)).await.len(), 1);
    assert_eq!(fx.sector_usages(SECTOR).await.len(), 11);
    assert!(fx.store.sector(SectorKey(2)).await.is_some());
    assert_eq!(fx.index.deleted().await, vec![SectorKey(3)]);
    assert_eq!(fx.store.sector_count(CATALOGUE, SOURCE).await, 1);
}

#[tokio::test]
async fn test_delete_does_not_require_valid_target() {
    let fx = Fixture::new(1000).await;
    add_pinaceae(&fx.store).await;
    fx.store
        .add_sector(sector(
            1,
            pinaceae_subject(),
            SimpleName::new("gone", "Coniferae", Rank::Class),
            SectorMode::Attach,
        ))
        .await;

    let report = fx.delete(SECTOR).await;
    assert!(report.is_success(), "{:?}", report.outcome);
    assert!(fx.store.sector(SECTOR).await.is_none());
    assert_eq!(fx.index.deleted().await, vec![SECTOR]);
}

#[tokio::test]
async fn test_scheduled_delete_completes() {
    let fx = nested_fixture().await;
    let scheduler = fx.scheduler();
    let mut rx = fx.events.subscribe();

    assert!(scheduler.submit_delete(SectorKey(2), curator()).await.unwrap());
    scheduler.start().await;
    match terminal_event(&mut rx, SectorKey(2)).await {
        AssemblyEvent::Completed { job, .. } => assert_eq!(job, JobKind::Delete),
        other => panic!("unexpected event {other:?}"),
    }
    scheduler.shutdown().await;

    assert!(fx.sector_usages(SectorKey(2)).await.is_empty());
    assert!(fx.sector_usages(SectorKey(3)).await.is_empty());
    assert_eq!(fx.sector_usages(SECTOR).await.len(), 11);
    assert_eq!(fx.metrics.completed(JobKind::Delete), 1);
}
