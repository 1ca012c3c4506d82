//! Record Store Abstractions
//!
//! The record store holds every dataset partition: source checklists and the
//! assembled catalogue alike. Reads go straight through [`CatalogueStore`],
//! writes are staged in a [`UnitOfWork`] and become visible to other readers
//! only once committed.

use async_trait::async_trait;
use core_model::{
    DatasetKey, Distribution, EditorialDecision, Name, NameUsage, Reference, Sector, SectorKey,
    SectorMetrics, SyncAttempt, VernacularName,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;

/// Parameters of a subtree traversal
#[derive(Debug, Clone, Default)]
pub struct TreeTraversal {
    pub dataset_key: DatasetKey,
    /// Root of the subtree, included in the traversal
    pub root_id: String,
    /// Usages whose whole subtree must be excluded
    pub blocked_ids: HashSet<String>,
}

/// Row counts removed by [`UnitOfWork::delete_by_sector`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedCounts {
    pub usages: u64,
    pub names: u64,
    pub references: u64,
    pub vernaculars: u64,
    pub distributions: u64,
}

impl DeletedCounts {
    pub fn total(&self) -> u64 {
        self.usages + self.names + self.references + self.vernaculars + self.distributions
    }
}

/// Streaming cursor over a subtree in pre-order.
///
/// Every usage is returned after its parent. Synonyms of a taxon come right
/// after the taxon itself, before its children.
#[async_trait]
pub trait UsageCursor: Send {
    /// Fetch up to `limit` further usages. An empty batch ends the traversal.
    async fn next_batch(&mut self, limit: usize) -> Result<Vec<NameUsage>>;
}

/// Read access to all dataset partitions
///
/// # Example
///
/// ```ignore
/// use bridge_traits::store::CatalogueStore;
///
/// async fn subject_exists(store: &dyn CatalogueStore, sector: &Sector) -> Result<bool> {
///     let id = sector.subject_id().unwrap_or_default();
///     Ok(store.get_usage(sector.subject_dataset_key, id).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait CatalogueStore: Send + Sync {
    /// Whether the dataset holds at least one usage.
    ///
    /// Fails with [`BridgeError::NoPartition`](crate::BridgeError::NoPartition)
    /// if the dataset was never imported.
    async fn has_data(&self, dataset_key: DatasetKey) -> Result<bool>;

    async fn get_sector(&self, key: SectorKey) -> Result<Option<Sector>>;

    /// All sectors of a catalogue
    async fn list_sectors(&self, catalogue_key: DatasetKey) -> Result<Vec<Sector>>;

    /// Sectors of a catalogue whose subject lives in the given source dataset
    async fn list_sectors_by_subject_dataset(
        &self,
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    ) -> Result<Vec<Sector>>;

    /// Sectors whose target usage belongs to the content of `sector_key`
    async fn child_sectors(
        &self,
        catalogue_key: DatasetKey,
        sector_key: SectorKey,
    ) -> Result<Vec<Sector>>;

    /// Editorial decisions of a catalogue for one source dataset
    async fn decisions(
        &self,
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    ) -> Result<Vec<EditorialDecision>>;

    async fn get_usage(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<NameUsage>>;

    async fn get_reference(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<Reference>>;

    async fn vernaculars(&self, dataset_key: DatasetKey, taxon_id: &str)
        -> Result<Vec<VernacularName>>;

    async fn distributions(&self, dataset_key: DatasetKey, taxon_id: &str)
        -> Result<Vec<Distribution>>;

    /// Catalogue usages outside `sector_key` whose parent belongs to it
    async fn foreign_children(
        &self,
        catalogue_key: DatasetKey,
        sector_key: SectorKey,
    ) -> Result<Vec<NameUsage>>;

    /// Open a pre-order cursor over a subtree, skipping blocked branches
    async fn open_tree(&self, traversal: TreeTraversal) -> Result<Box<dyn UsageCursor>>;

    /// Aggregate counts over the catalogue content of one sector
    async fn sector_metrics(
        &self,
        catalogue_key: DatasetKey,
        sector_key: SectorKey,
    ) -> Result<SectorMetrics>;

    /// Number for the next attempt of a sector, one above the last persisted one
    async fn next_attempt(&self, sector_key: SectorKey) -> Result<u32>;

    async fn list_attempts(&self, sector_key: SectorKey) -> Result<Vec<SyncAttempt>>;

    /// Start a new unit of work
    async fn begin(&self) -> Result<Arc<dyn UnitOfWork>>;
}

/// Transactional batch of writes.
///
/// Lookups on a unit of work see its own uncommitted writes. Committing
/// applies all staged writes atomically and leaves the unit usable for the
/// next batch.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn create_name(&self, name: Name) -> Result<()>;

    async fn create_usage(&self, usage: NameUsage) -> Result<()>;

    async fn create_reference(&self, reference: Reference) -> Result<()>;

    async fn create_vernacular(&self, vernacular: VernacularName) -> Result<()>;

    async fn create_distribution(&self, distribution: Distribution) -> Result<()>;

    /// Persist a sync attempt, replacing one with the same sector and attempt number
    async fn save_attempt(&self, attempt: SyncAttempt) -> Result<()>;

    async fn get_reference(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<Reference>>;

    /// References of a sector whose normalized citation equals `normalized_citation`
    async fn find_references(
        &self,
        dataset_key: DatasetKey,
        sector_key: SectorKey,
        normalized_citation: &str,
    ) -> Result<Vec<Reference>>;

    async fn update_parent(
        &self,
        dataset_key: DatasetKey,
        usage_id: &str,
        parent_id: &str,
    ) -> Result<()>;

    async fn update_sector(&self, sector: Sector) -> Result<()>;

    /// Remove all usages, names, references and owned entities of a sector
    async fn delete_by_sector(
        &self,
        dataset_key: DatasetKey,
        sector_key: SectorKey,
    ) -> Result<DeletedCounts>;

    async fn delete_sector(&self, sector_key: SectorKey) -> Result<()>;

    async fn delete_attempts(&self, sector_key: SectorKey) -> Result<()>;

    /// Decrease the per source dataset sector count of a catalogue
    async fn decrement_sector_count(
        &self,
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    ) -> Result<()>;

    /// Apply all staged writes, returning how many were applied
    async fn commit(&self) -> Result<usize>;
}
