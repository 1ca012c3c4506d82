//! Shared fixtures for the assembly integration tests

#![allow(dead_code)]

use bridge_memory::{
    MemoryNameMatcher, MemoryStore, RecordCopier, RecordingSearchIndex, RecordingSnapshots,
    SimpleNameParser, StaticImportMonitor,
};
use bridge_traits::CatalogueStore;
use core_assembly::{JobReport, SectorDeleteJob, SectorJobScheduler, SectorRunnable, SectorSyncJob};
use core_model::{
    DatasetKey, JobKind, Name, NameType, NameUsage, Rank, Reference, Sector, SectorKey,
    SectorMode, SimpleName, Synonym, Taxon, User,
};
use core_runtime::{AssemblyConfig, AssemblyEvent, AssemblyMetrics, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

pub const SOURCE: DatasetKey = DatasetKey(100);
pub const CATALOGUE: DatasetKey = DatasetKey(3);
pub const SECTOR: SectorKey = SectorKey(1);

pub struct Fixture {
    pub store: MemoryStore,
    pub index: Arc<RecordingSearchIndex>,
    pub snapshots: Arc<RecordingSnapshots>,
    pub monitor: Arc<StaticImportMonitor>,
    pub events: EventBus,
    pub metrics: AssemblyMetrics,
    pub config: AssemblyConfig,
}

impl Fixture {
    /// Empty catalogue holding only the order Pinales as attachment point
    pub async fn new(batch_size: usize) -> Self {
        let store = MemoryStore::new();
        store
            .add_usage(Taxon::new(
                "cat-root",
                CATALOGUE,
                Name::new("cat-n0", CATALOGUE, "Pinales", Rank::Order),
                None,
            ))
            .await;

        let index = Arc::new(RecordingSearchIndex::new(store.clone()));
        let snapshots = Arc::new(RecordingSnapshots::new());
        let monitor = Arc::new(StaticImportMonitor::new());
        let shared: Arc<dyn CatalogueStore> = Arc::new(store.clone());
        let config = AssemblyConfig::builder()
            .catalogue_key(CATALOGUE)
            .batch_size(batch_size)
            .relink_commit_interval(2)
            .shutdown_timeout(Duration::from_secs(5))
            .store(Arc::clone(&shared))
            .copier(Arc::new(RecordCopier::new(shared)))
            .search_index(index.clone())
            .matcher(Arc::new(MemoryNameMatcher::new(store.clone())))
            .parser(Arc::new(SimpleNameParser::new()))
            .import_monitor(monitor.clone())
            .snapshots(snapshots.clone())
            .build()
            .expect("valid config");

        Self {
            store,
            index,
            snapshots,
            monitor,
            events: EventBus::new(1000),
            metrics: AssemblyMetrics::unregistered(),
            config,
        }
    }

    pub fn scheduler(&self) -> SectorJobScheduler {
        SectorJobScheduler::new(self.config.clone(), self.events.clone(), self.metrics.clone())
            .expect("valid scheduler")
    }

    pub async fn sync(&self, sector_key: SectorKey) -> JobReport {
        let run = SectorRunnable::prepare(
            self.config.clone(),
            self.events.clone(),
            sector_key,
            JobKind::Sync,
            curator(),
        )
        .await
        .expect("sector exists");
        SectorSyncJob::new(run).run().await
    }

    pub async fn delete(&self, sector_key: SectorKey) -> JobReport {
        let run = SectorRunnable::prepare(
            self.config.clone(),
            self.events.clone(),
            sector_key,
            JobKind::Delete,
            curator(),
        )
        .await
        .expect("sector exists");
        SectorDeleteJob::new(run).run().await
    }

    /// Catalogue usages owned by a sector
    pub async fn sector_usages(&self, sector_key: SectorKey) -> Vec<NameUsage> {
        self.store.usages_of_sector(CATALOGUE, sector_key).await
    }

    /// Catalogue usage by scientific name, failing on ambiguity
    pub async fn find(&self, scientific_name: &str) -> NameUsage {
        let mut found: Vec<NameUsage> = self
            .store
            .usages(CATALOGUE)
            .await
            .into_iter()
            .filter(|u| u.name().scientific_name == scientific_name)
            .collect();
        assert_eq!(found.len(), 1, "expected one usage named {}", scientific_name);
        found.remove(0)
    }

    pub async fn find_all(&self, scientific_name: &str) -> Vec<NameUsage> {
        self.store
            .usages(CATALOGUE)
            .await
            .into_iter()
            .filter(|u| u.name().scientific_name == scientific_name)
            .collect()
    }

    /// Names from a catalogue usage up to the catalogue root
    pub async fn classification(&self, usage: &NameUsage) -> Vec<String> {
        let mut names = vec![usage.name().scientific_name.clone()];
        let mut parent = usage.parent_id().map(str::to_string);
        while let Some(id) = parent {
            let Some(p) = self.store.get_usage(CATALOGUE, &id).await.unwrap() else {
                break;
            };
            names.push(p.name().scientific_name.clone());
            parent = p.parent_id().map(str::to_string);
        }
        names
    }
}

pub fn curator() -> User {
    User::new(7, "curator")
}

pub fn sector(key: i32, subject: SimpleName, target: SimpleName, mode: SectorMode) -> Sector {
    Sector {
        key: SectorKey(key),
        dataset_key: CATALOGUE,
        subject_dataset_key: SOURCE,
        subject,
        target: Some(target),
        mode,
        code: None,
        note: None,
    }
}

pub fn target() -> SimpleName {
    SimpleName::new("cat-root", "Pinales", Rank::Order)
}

pub fn uninomial(id: &str, rank: Rank, value: &str) -> Name {
    let mut name = Name::new(format!("n-{id}"), SOURCE, "", rank);
    name.uninomial = Some(value.to_string());
    name.update_name_cache();
    name
}

pub fn binomial(id: &str, rank: Rank, genus: &str, epithet: &str, infra: Option<&str>) -> Name {
    let mut name = Name::new(format!("n-{id}"), SOURCE, "", rank);
    name.genus = Some(genus.to_string());
    name.specific_epithet = Some(epithet.to_string());
    name.infraspecific_epithet = infra.map(str::to_string);
    name.update_name_cache();
    name
}

pub fn source_taxon(id: &str, parent: Option<&str>, name: Name) -> Taxon {
    Taxon::new(id, SOURCE, name, parent.map(str::to_string))
}

/// Source tree of the pine family
///
/// ```text
/// Pinaceae
/// ├── Abies
/// │   ├── Abies alba          (cites r1)
/// │   │   └── = Abies pectinata
/// │   └── Abies grandis       (cites r2, same citation as r1)
/// ├── Incertae sedis          (placeholder)
/// │   └── Larix decidua
/// ├── Picea abies
/// └── Pinus
///     └── Pinus sylvestris
/// ```
pub async fn add_pinaceae(store: &MemoryStore) {
    store
        .add_usage(source_taxon("root", None, uninomial("root", Rank::Family, "Pinaceae")))
        .await;
    store
        .add_usage(source_taxon("abies", Some("root"), uninomial("abies", Rank::Genus, "Abies")))
        .await;

    let mut alba = source_taxon("abies-alba", Some("abies"), binomial("abies-alba", Rank::Species, "Abies", "alba", None));
    alba.base.reference_ids = vec!["r1".to_string()];
    store.add_usage(alba).await;
    store
        .add_usage(Synonym::new(
            "abies-pectinata",
            SOURCE,
            binomial("abies-pectinata", Rank::Species, "Abies", "pectinata", None),
            "abies-alba",
        ))
        .await;
    let mut grandis = source_taxon(
        "abies-grandis",
        Some("abies"),
        binomial("abies-grandis", Rank::Species, "Abies", "grandis", None),
    );
    grandis.base.reference_ids = vec!["r2".to_string()];
    store.add_usage(grandis).await;

    let mut placeholder = Name::new("n-incertae", SOURCE, "Incertae sedis", Rank::Genus);
    placeholder.name_type = NameType::Placeholder;
    store
        .add_usage(source_taxon("incertae", Some("root"), placeholder))
        .await;
    store
        .add_usage(source_taxon(
            "larix-decidua",
            Some("incertae"),
            binomial("larix-decidua", Rank::Species, "Larix", "decidua", None),
        ))
        .await;
    store
        .add_usage(source_taxon(
            "picea-abies",
            Some("root"),
            binomial("picea-abies", Rank::Species, "Picea", "abies", None),
        ))
        .await;
    store
        .add_usage(source_taxon("pinus", Some("root"), uninomial("pinus", Rank::Genus, "Pinus")))
        .await;
    store
        .add_usage(source_taxon(
            "pinus-sylvestris",
            Some("pinus"),
            binomial("pinus-sylvestris", Rank::Species, "Pinus", "sylvestris", None),
        ))
        .await;

    store
        .add_reference(Reference::new("r1", SOURCE, "Miller, P. (1768) The Gardeners Dictionary."))
        .await;
    store
        .add_reference(Reference::new("r2", SOURCE, "miller, p. (1768) the gardeners dictionary"))
        .await;
}

pub fn pinaceae_subject() -> SimpleName {
    SimpleName::new("root", "Pinaceae", Rank::Family)
}

/// Next terminal event of a sector
pub async fn terminal_event(rx: &mut Receiver<AssemblyEvent>, sector_key: SectorKey) -> AssemblyEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = rx.recv().await.expect("event bus open");
            if event.is_terminal() && event.sector_key() == sector_key {
                return event;
            }
        }
    })
    .await
    .expect("job finished in time")
}
