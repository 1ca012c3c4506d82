//! In-process record store
//!
//! Keeps every dataset partition in ordered maps behind a single lock.
//! Units of work stage their writes and apply them to a copy of the state
//! on commit, swapping it in only when every write succeeded.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    store::{CatalogueStore, DeletedCounts, TreeTraversal, UnitOfWork, UsageCursor},
};
use core_model::{
    reference::normalize_citation, DatasetKey, Distribution, EditorialDecision, Name, NameUsage,
    Reference, Sector, SectorKey, SectorMetrics, SyncAttempt, VernacularName,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Callback invoked before a cursor hands out a batch, with the number of
/// usages delivered so far
pub type BatchHook = Arc<dyn Fn(usize) + Send + Sync>;

#[derive(Debug, Clone, Default)]
struct Partition {
    usages: BTreeMap<String, NameUsage>,
    names: BTreeMap<String, Name>,
    references: BTreeMap<String, Reference>,
    vernaculars: BTreeMap<String, VernacularName>,
    distributions: BTreeMap<String, Distribution>,
}

impl Partition {
    fn delete_by_sector(&mut self, sector_key: SectorKey) -> DeletedCounts {
        let owned = |key: Option<SectorKey>| key == Some(sector_key);
        let mut counts = DeletedCounts::default();

        let before = self.usages.len();
        self.usages.retain(|_, u| !owned(u.sector_key()));
        counts.usages = (before - self.usages.len()) as u64;

        let before = self.names.len();
        self.names.retain(|_, n| !owned(n.sector_key));
        counts.names = (before - self.names.len()) as u64;

        let before = self.references.len();
        self.references.retain(|_, r| !owned(r.sector_key));
        counts.references = (before - self.references.len()) as u64;

        let before = self.vernaculars.len();
        self.vernaculars.retain(|_, v| !owned(v.sector_key));
        counts.vernaculars = (before - self.vernaculars.len()) as u64;

        let before = self.distributions.len();
        self.distributions.retain(|_, d| !owned(d.sector_key));
        counts.distributions = (before - self.distributions.len()) as u64;

        counts
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    partitions: HashMap<DatasetKey, Partition>,
    sectors: BTreeMap<SectorKey, Sector>,
    decisions: Vec<EditorialDecision>,
    attempts: BTreeMap<(SectorKey, u32), SyncAttempt>,
    sector_counts: HashMap<(DatasetKey, DatasetKey), i64>,
    commits: usize,
}

impl State {
    fn partition_mut(&mut self, dataset_key: DatasetKey) -> &mut Partition {
        self.partitions.entry(dataset_key).or_default()
    }

    fn usage(&self, dataset_key: DatasetKey, id: &str) -> Option<&NameUsage> {
        self.partitions.get(&dataset_key)?.usages.get(id)
    }

    fn apply(&mut self, op: Op) -> Result<()> {
        match op {
            Op::CreateName(name) => {
                self.partition_mut(name.dataset_key)
                    .names
                    .insert(name.id.clone(), name);
            }
            Op::CreateUsage(usage) => {
                let dataset_key = usage.base().dataset_key;
                self.partition_mut(dataset_key)
                    .usages
                    .insert(usage.id().to_string(), usage);
            }
            Op::CreateReference(reference) => {
                self.partition_mut(reference.dataset_key)
                    .references
                    .insert(reference.id.clone(), reference);
            }
            Op::CreateVernacular(vernacular) => {
                self.partition_mut(vernacular.dataset_key)
                    .vernaculars
                    .insert(vernacular.id.clone(), vernacular);
            }
            Op::CreateDistribution(distribution) => {
                self.partition_mut(distribution.dataset_key)
                    .distributions
                    .insert(distribution.id.clone(), distribution);
            }
            Op::SaveAttempt(attempt) => {
                self.attempts
                    .insert((attempt.sector_key, attempt.attempt), attempt);
            }
            Op::UpdateParent {
                dataset_key,
                usage_id,
                parent_id,
            } => {
                let usage = self
                    .partitions
                    .get_mut(&dataset_key)
                    .and_then(|p| p.usages.get_mut(&usage_id))
                    .ok_or_else(|| BridgeError::not_found("Usage", &usage_id))?;
                usage.base_mut().parent_id = Some(parent_id);
            }
            Op::UpdateSector(sector) => {
                if !self.sectors.contains_key(&sector.key) {
                    return Err(BridgeError::not_found("Sector", sector.key));
                }
                self.sectors.insert(sector.key, sector);
            }
            Op::DeleteBySector {
                dataset_key,
                sector_key,
            } => {
                if let Some(partition) = self.partitions.get_mut(&dataset_key) {
                    partition.delete_by_sector(sector_key);
                }
            }
            Op::DeleteSector(key) => {
                self.sectors.remove(&key);
            }
            Op::DeleteAttempts(key) => {
                self.attempts.retain(|(sector_key, _), _| *sector_key != key);
            }
            Op::DecrementSectorCount {
                catalogue_key,
                subject_dataset_key,
            } => {
                let count = self
                    .sector_counts
                    .entry((catalogue_key, subject_dataset_key))
                    .or_insert(0);
                *count = (*count - 1).max(0);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    CreateName(Name),
    CreateUsage(NameUsage),
    CreateReference(Reference),
    CreateVernacular(VernacularName),
    CreateDistribution(Distribution),
    SaveAttempt(SyncAttempt),
    UpdateParent {
        dataset_key: DatasetKey,
        usage_id: String,
        parent_id: String,
    },
    UpdateSector(Sector),
    DeleteBySector {
        dataset_key: DatasetKey,
        sector_key: SectorKey,
    },
    DeleteSector(SectorKey),
    DeleteAttempts(SectorKey),
    DecrementSectorCount {
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    },
}

/// Record store keeping all datasets in memory
///
/// Cloning is cheap and yields a handle to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    batch_hook: Arc<Mutex<Option<BatchHook>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty partition so the dataset counts as imported
    pub async fn create_partition(&self, dataset_key: DatasetKey) {
        self.state.write().await.partition_mut(dataset_key);
    }

    /// Insert a usage together with its name
    pub async fn add_usage(&self, usage: impl Into<NameUsage>) {
        let usage = usage.into();
        let mut state = self.state.write().await;
        let partition = state.partition_mut(usage.base().dataset_key);
        let name = usage.name().clone();
        partition.names.insert(name.id.clone(), name);
        partition.usages.insert(usage.id().to_string(), usage);
    }

    pub async fn add_reference(&self, reference: Reference) {
        let mut state = self.state.write().await;
        state
            .partition_mut(reference.dataset_key)
            .references
            .insert(reference.id.clone(), reference);
    }

    pub async fn add_vernacular(&self, vernacular: VernacularName) {
        let mut state = self.state.write().await;
        state
            .partition_mut(vernacular.dataset_key)
            .vernaculars
            .insert(vernacular.id.clone(), vernacular);
    }

    pub async fn add_distribution(&self, distribution: Distribution) {
        let mut state = self.state.write().await;
        state
            .partition_mut(distribution.dataset_key)
            .distributions
            .insert(distribution.id.clone(), distribution);
    }

    /// Register a sector and count it for its source dataset
    pub async fn add_sector(&self, sector: Sector) {
        let mut state = self.state.write().await;
        *state
            .sector_counts
            .entry((sector.dataset_key, sector.subject_dataset_key))
            .or_insert(0) += 1;
        state.sectors.insert(sector.key, sector);
    }

    pub async fn add_decision(&self, decision: EditorialDecision) {
        self.state.write().await.decisions.push(decision);
    }

    pub async fn sector(&self, key: SectorKey) -> Option<Sector> {
        self.state.read().await.sectors.get(&key).cloned()
    }

    pub async fn sector_count(&self, catalogue_key: DatasetKey, subject_dataset_key: DatasetKey) -> i64 {
        self.state
            .read()
            .await
            .sector_counts
            .get(&(catalogue_key, subject_dataset_key))
            .copied()
            .unwrap_or(0)
    }

    /// All usages of a dataset ordered by id
    pub async fn usages(&self, dataset_key: DatasetKey) -> Vec<NameUsage> {
        self.state
            .read()
            .await
            .partitions
            .get(&dataset_key)
            .map(|p| p.usages.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn usages_of_sector(&self, dataset_key: DatasetKey, sector_key: SectorKey) -> Vec<NameUsage> {
        self.usages(dataset_key)
            .await
            .into_iter()
            .filter(|u| u.sector_key() == Some(sector_key))
            .collect()
    }

    pub async fn references(&self, dataset_key: DatasetKey) -> Vec<Reference> {
        self.state
            .read()
            .await
            .partitions
            .get(&dataset_key)
            .map(|p| p.references.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn vernacular_names(&self, dataset_key: DatasetKey) -> Vec<VernacularName> {
        self.state
            .read()
            .await
            .partitions
            .get(&dataset_key)
            .map(|p| p.vernaculars.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful commits so far
    pub async fn commit_count(&self) -> usize {
        self.state.read().await.commits
    }

    /// Install a hook called before each cursor batch is handed out
    pub async fn set_batch_hook(&self, hook: BatchHook) {
        *self.batch_hook.lock().await = Some(hook);
    }

    /// Pre-order listing of a subtree. Synonyms precede child taxa,
    /// siblings are ordered by id.
    fn pre_order(state: &State, traversal: &TreeTraversal) -> Result<Vec<NameUsage>> {
        let partition = state
            .partitions
            .get(&traversal.dataset_key)
            .ok_or(BridgeError::NoPartition(traversal.dataset_key))?;
        let root = partition
            .usages
            .get(&traversal.root_id)
            .ok_or_else(|| BridgeError::not_found("Usage", &traversal.root_id))?;

        let mut children: HashMap<&str, Vec<&NameUsage>> = HashMap::new();
        for usage in partition.usages.values() {
            if let Some(parent_id) = usage.parent_id() {
                children.entry(parent_id).or_default().push(usage);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by(|a, b| a.is_taxon().cmp(&b.is_taxon()).then(a.id().cmp(b.id())));
        }

        let mut ordered = Vec::new();
        let mut stack = vec![root];
        while let Some(usage) = stack.pop() {
            if traversal.blocked_ids.contains(usage.id()) {
                continue;
            }
            ordered.push(usage.clone());
            if let Some(kids) = children.get(usage.id()) {
                stack.extend(kids.iter().rev());
            }
        }
        Ok(ordered)
    }
}

#[async_trait]
impl CatalogueStore for MemoryStore {
    async fn has_data(&self, dataset_key: DatasetKey) -> Result<bool> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(&dataset_key)
            .ok_or(BridgeError::NoPartition(dataset_key))?;
        Ok(!partition.usages.is_empty())
    }

    async fn get_sector(&self, key: SectorKey) -> Result<Option<Sector>> {
        Ok(self.sector(key).await)
    }

    async fn list_sectors(&self, catalogue_key: DatasetKey) -> Result<Vec<Sector>> {
        let state = self.state.read().await;
        Ok(state
            .sectors
            .values()
            .filter(|s| s.dataset_key == catalogue_key)
            .cloned()
            .collect())
    }

    async fn list_sectors_by_subject_dataset(
        &self,
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    ) -> Result<Vec<Sector>> {
        let state = self.state.read().await;
        Ok(state
            .sectors
            .values()
            .filter(|s| s.dataset_key == catalogue_key && s.subject_dataset_key == subject_dataset_key)
            .cloned()
            .collect())
    }

    async fn child_sectors(&self, catalogue_key: DatasetKey, sector_key: SectorKey) -> Result<Vec<Sector>> {
        let state = self.state.read().await;
        Ok(state
            .sectors
            .values()
            .filter(|s| s.dataset_key == catalogue_key && s.key != sector_key)
            .filter(|s| {
                s.target_id()
                    .and_then(|id| state.usage(catalogue_key, id))
                    .map(|target| target.sector_key() == Some(sector_key))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn decisions(
        &self,
        catalogue_key: DatasetKey,
        subject_dataset_key: DatasetKey,
    ) -> Result<Vec<EditorialDecision>> {
        let state = self.state.read().await;
        Ok(state
            .decisions
            .iter()
            .filter(|d| d.dataset_key == catalogue_key && d.subject_dataset_key == subject_dataset_key)
            .cloned()
            .collect())
    }

    async fn get_usage(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<NameUsage>> {
        Ok(self.state.read().await.usage(dataset_key, id).cloned())
    }

    async fn get_reference(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<Reference>> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&dataset_key)
            .and_then(|p| p.references.get(id))
            .cloned())
    }

    async fn vernaculars(&self, dataset_key: DatasetKey, taxon_id: &str) -> Result<Vec<VernacularName>> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&dataset_key)
            .map(|p| {
                p.vernaculars
                    .values()
                    .filter(|v| v.taxon_id == taxon_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn distributions(&self, dataset_key: DatasetKey, taxon_id: &str) -> Result<Vec<Distribution>> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&dataset_key)
            .map(|p| {
                p.distributions
                    .values()
                    .filter(|d| d.taxon_id == taxon_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn foreign_children(&self, catalogue_key: DatasetKey, sector_key: SectorKey) -> Result<Vec<NameUsage>> {
        let state = self.state.read().await;
        let Some(partition) = state.partitions.get(&catalogue_key) else {
            return Ok(Vec::new());
        };
        Ok(partition
            .usages
            .values()
            .filter(|u| u.sector_key() != Some(sector_key))
            .filter(|u| {
                u.parent_id()
                    .and_then(|pid| partition.usages.get(pid))
                    .map(|parent| parent.sector_key() == Some(sector_key))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn open_tree(&self, traversal: TreeTraversal) -> Result<Box<dyn UsageCursor>> {
        let usages = {
            let state = self.state.read().await;
            Self::pre_order(&state, &traversal)?
        };
        debug!(
            dataset = %traversal.dataset_key,
            root = %traversal.root_id,
            blocked = traversal.blocked_ids.len(),
            usages = usages.len(),
            "Opened tree cursor"
        );
        let hook = self.batch_hook.lock().await.clone();
        Ok(Box::new(MemoryCursor {
            usages: usages.into_iter(),
            delivered: 0,
            hook,
        }))
    }

    async fn sector_metrics(&self, catalogue_key: DatasetKey, sector_key: SectorKey) -> Result<SectorMetrics> {
        let state = self.state.read().await;
        let mut metrics = SectorMetrics::default();
        let Some(partition) = state.partitions.get(&catalogue_key) else {
            return Ok(metrics);
        };
        let owned = |key: Option<SectorKey>| key == Some(sector_key);

        for usage in partition.usages.values().filter(|u| owned(u.sector_key())) {
            if usage.is_taxon() {
                metrics.taxon_count += 1;
                *metrics.taxa_by_rank.entry(usage.rank()).or_default() += 1;
            } else {
                metrics.synonym_count += 1;
            }
            *metrics.usages_by_status.entry(usage.status()).or_default() += 1;
            for issue in &usage.base().issues {
                *metrics.issues.entry(*issue).or_default() += 1;
            }
        }
        for name in partition.names.values().filter(|n| owned(n.sector_key)) {
            metrics.name_count += 1;
            *metrics.names_by_type.entry(name.name_type).or_default() += 1;
            *metrics.names_by_origin.entry(name.origin).or_default() += 1;
        }
        metrics.reference_count = partition.references.values().filter(|r| owned(r.sector_key)).count() as u64;
        metrics.vernacular_count = partition.vernaculars.values().filter(|v| owned(v.sector_key)).count() as u64;
        metrics.distribution_count = partition.distributions.values().filter(|d| owned(d.sector_key)).count() as u64;
        Ok(metrics)
    }

    async fn next_attempt(&self, sector_key: SectorKey) -> Result<u32> {
        let state = self.state.read().await;
        let last = state
            .attempts
            .keys()
            .filter(|(key, _)| *key == sector_key)
            .map(|(_, attempt)| *attempt)
            .max()
            .unwrap_or(0);
        Ok(last + 1)
    }

    async fn list_attempts(&self, sector_key: SectorKey) -> Result<Vec<SyncAttempt>> {
        let state = self.state.read().await;
        Ok(state
            .attempts
            .values()
            .filter(|a| a.sector_key == sector_key)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Arc<dyn UnitOfWork>> {
        Ok(Arc::new(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            staged: Mutex::new(Vec::new()),
        }))
    }
}

struct MemoryCursor {
    usages: std::vec::IntoIter<NameUsage>,
    delivered: usize,
    hook: Option<BatchHook>,
}

#[async_trait]
impl UsageCursor for MemoryCursor {
    async fn next_batch(&mut self, limit: usize) -> Result<Vec<NameUsage>> {
        let batch: Vec<NameUsage> = self.usages.by_ref().take(limit.max(1)).collect();
        if !batch.is_empty() {
            if let Some(hook) = &self.hook {
                hook(self.delivered);
            }
            self.delivered += batch.len();
        }
        Ok(batch)
    }
}

/// Unit of work staging writes against a [`MemoryStore`]
pub struct MemoryUnitOfWork {
    state: Arc<RwLock<State>>,
    staged: Mutex<Vec<Op>>,
}

impl MemoryUnitOfWork {
    async fn stage(&self, op: Op) -> Result<()> {
        self.staged.lock().await.push(op);
        Ok(())
    }

    pub async fn staged_len(&self) -> usize {
        self.staged.lock().await.len()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn create_name(&self, name: Name) -> Result<()> {
        self.stage(Op::CreateName(name)).await
    }

    async fn create_usage(&self, usage: NameUsage) -> Result<()> {
        self.stage(Op::CreateUsage(usage)).await
    }

    async fn create_reference(&self, reference: Reference) -> Result<()> {
        self.stage(Op::CreateReference(reference)).await
    }

    async fn create_vernacular(&self, vernacular: VernacularName) -> Result<()> {
        self.stage(Op::CreateVernacular(vernacular)).await
    }

    async fn create_distribution(&self, distribution: Distribution) -> Result<()> {
        self.stage(Op::CreateDistribution(distribution)).await
    }

    async fn save_attempt(&self, attempt: SyncAttempt) -> Result<()> {
        self.stage(Op::SaveAttempt(attempt)).await
    }

    async fn get_reference(&self, dataset_key: DatasetKey, id: &str) -> Result<Option<Reference>> {
        {
            let staged = self.staged.lock().await;
            let found = staged.iter().rev().find_map(|op| match op {
                Op::CreateReference(r) if r.dataset_key == dataset_key && r.id == id => Some(r.clone()),
                _ => None,
            });
            if found.is_some() {
                return Ok(found);
            }
        }
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(&dataset_key)
            .and_then(|p| p.references.get(id))
            .cloned())
    }

    async fn find_references(
        &self,
        dataset_key: DatasetKey,
        sector_key: SectorKey,
        normalized_citation: &str,
    ) -> Result<Vec<Reference>> {
        let matches = |r: &Reference| {
            r.dataset_key == dataset_key
                && r.sector_key == Some(sector_key)
                && normalize_citation(&r.citation) == normalized_citation
        };
        let mut found: BTreeMap<String, Reference> = BTreeMap::new();
        {
            let state = self.state.read().await;
            if let Some(partition) = state.partitions.get(&dataset_key) {
                for r in partition.references.values().filter(|r| matches(r)) {
                    found.insert(r.id.clone(), r.clone());
                }
            }
        }
        let staged = self.staged.lock().await;
        for op in staged.iter() {
            if let Op::CreateReference(r) = op {
                if matches(r) {
                    found.insert(r.id.clone(), r.clone());
                }
            }
        }
        Ok(found.into_values().collect())
    }

    async fn update_parent(&self, dataset_key: DatasetKey, usage_id: &str, parent_id: &str) -> Result<()> {
        self.stage(Op::UpdateParent {
            dataset_key,
            usage_id: usage_id.to_string(),
            parent_id: parent_id.to_string(),
        })
        .await
    }

    async fn update_sector(&self, sector: Sector) -> Result<()> {
        self.stage(Op::UpdateSector(sector)).await
    }

    /// Counts reflect committed rows at the time of the call
    async fn delete_by_sector(&self, dataset_key: DatasetKey, sector_key: SectorKey) -> Result<DeletedCounts> {
        let counts = {
            let state = self.state.read().await;
            state
                .partitions
                .get(&dataset_key)
                .map(|p| p.clone().delete_by_sector(sector_key))
                .unwrap_or_default()
        };
        self.stage(Op::DeleteBySector {
            dataset_key,
            sector_key,
        })
        .await?;
        Ok(counts)
    }

    async fn delete_sector(&self, sector_key: SectorKey) -> Result<()> {
        self.stage(Op::DeleteSector(sector_key)).await
    }

    async fn delete_attempts(&self, sector_key: SectorKey) -> Result<()> {
        self.stage(Op::DeleteAttempts(sector_key)).await
    }

    async fn decrement_sector_count(&self, catalogue_key: DatasetKey, subject_dataset_key: DatasetKey) -> Result<()> {
        self.stage(Op::DecrementSectorCount {
            catalogue_key,
            subject_dataset_key,
        })
        .await
    }

    async fn commit(&self) -> Result<usize> {
        let ops: Vec<Op> = std::mem::take(&mut *self.staged.lock().await);
        let applied = ops.len();
        let mut state = self.state.write().await;
        let mut next = state.clone();
        for op in ops {
            next.apply(op)?;
        }
        next.commits += 1;
        *state = next;
        debug!(applied, "Committed unit of work");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{Rank, Synonym, Taxon};
    use std::collections::HashSet;

    const SRC: DatasetKey = DatasetKey(100);

    fn taxon(id: &str, parent: Option<&str>, name: &str, rank: Rank) -> Taxon {
        Taxon::new(id, SRC, Name::new(format!("n-{id}"), SRC, name, rank), parent.map(str::to_string))
    }

    async fn tree() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_usage(taxon("root", None, "Pinaceae", Rank::Family)).await;
        store.add_usage(taxon("g2", Some("root"), "Picea", Rank::Genus)).await;
        store.add_usage(taxon("g1", Some("root"), "Abies", Rank::Genus)).await;
        store.add_usage(taxon("s1", Some("g1"), "Abies alba", Rank::Species)).await;
        store
            .add_usage(Synonym::new("syn", SRC, Name::new("n-syn", SRC, "Abietella", Rank::Genus), "g1"))
            .await;
        store
    }

    async fn drain(cursor: &mut Box<dyn UsageCursor>, limit: usize) -> Vec<String> {
        let mut ids = Vec::new();
        loop {
            let batch = cursor.next_batch(limit).await.unwrap();
            if batch.is_empty() {
                return ids;
            }
            ids.extend(batch.iter().map(|u| u.id().to_string()));
        }
    }

    #[tokio::test]
    async fn test_pre_order_with_synonyms_first() {
        let store = tree().await;
        let mut cursor = store
            .open_tree(TreeTraversal {
                dataset_key: SRC,
                root_id: "root".into(),
                blocked_ids: HashSet::new(),
            })
            .await
            .unwrap();
        assert_eq!(drain(&mut cursor, 2).await, vec!["root", "g1", "syn", "s1", "g2"]);
    }

    #[tokio::test]
    async fn test_blocked_subtree_is_excluded() {
        let store = tree().await;
        let mut cursor = store
            .open_tree(TreeTraversal {
                dataset_key: SRC,
                root_id: "root".into(),
                blocked_ids: HashSet::from(["g1".to_string()]),
            })
            .await
            .unwrap();
        assert_eq!(drain(&mut cursor, 10).await, vec!["root", "g2"]);
    }

    #[tokio::test]
    async fn test_has_data_without_partition() {
        let store = MemoryStore::new();
        let err = store.has_data(DatasetKey(5)).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoPartition(DatasetKey(5))));
        store.create_partition(DatasetKey(5)).await;
        assert!(!store.has_data(DatasetKey(5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unit_of_work_reads_its_own_writes() {
        let store = MemoryStore::new();
        let uow = store.begin().await.unwrap();
        let mut r = Reference::new("r1", DatasetKey(3), "Mill. Gard. Dict.");
        r.sector_key = Some(SectorKey(1));
        uow.create_reference(r).await.unwrap();

        assert!(uow.get_reference(DatasetKey(3), "r1").await.unwrap().is_some());
        assert!(store.get_reference(DatasetKey(3), "r1").await.unwrap().is_none());
        let found = uow
            .find_references(DatasetKey(3), SectorKey(1), "mill. gard. dict")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        assert_eq!(uow.commit().await.unwrap(), 1);
        assert!(store.get_reference(DatasetKey(3), "r1").await.unwrap().is_some());
        assert_eq!(store.commit_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let store = tree().await;
        let uow = store.begin().await.unwrap();
        uow.update_parent(SRC, "s1", "g2").await.unwrap();
        uow.update_parent(SRC, "missing", "g2").await.unwrap();
        assert!(uow.commit().await.is_err());
        let s1 = store.get_usage(SRC, "s1").await.unwrap().unwrap();
        assert_eq!(s1.parent_id(), Some("g1"));
    }

    #[tokio::test]
    async fn test_next_attempt_counts_up() {
        let store = MemoryStore::new();
        assert_eq!(store.next_attempt(SectorKey(1)).await.unwrap(), 1);
        let uow = store.begin().await.unwrap();
        let mut attempt = SyncAttempt::new(
            SectorKey(1),
            SRC,
            core_model::JobKind::Sync,
            core_model::User::new(1, "curator"),
        );
        attempt.attempt = 1;
        uow.save_attempt(attempt).await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(store.next_attempt(SectorKey(1)).await.unwrap(), 2);
    }
}
