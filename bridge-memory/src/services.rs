//! Recording implementations of the search index, import monitor and
//! snapshot services.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    monitor::{ImportMonitor, TreeSnapshots},
    search::SearchIndex,
};
use core_model::{DatasetKey, Sector, SectorKey};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::debug;

use crate::store::MemoryStore;

/// Search index that records which sectors were indexed or dropped
pub struct RecordingSearchIndex {
    store: MemoryStore,
    indexed: Mutex<Vec<SectorKey>>,
    deleted: Mutex<Vec<SectorKey>>,
}

impl RecordingSearchIndex {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            indexed: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub async fn indexed(&self) -> Vec<SectorKey> {
        self.indexed.lock().await.clone()
    }

    pub async fn deleted(&self) -> Vec<SectorKey> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl SearchIndex for RecordingSearchIndex {
    async fn index_sector(&self, sector: &Sector) -> Result<u64> {
        let count = self
            .store
            .usages_of_sector(sector.dataset_key, sector.key)
            .await
            .len() as u64;
        self.indexed.lock().await.push(sector.key);
        debug!(sector = %sector.key, usages = count, "Indexed sector");
        Ok(count)
    }

    async fn delete_sector(&self, sector_key: SectorKey) -> Result<()> {
        self.deleted.lock().await.push(sector_key);
        debug!(sector = %sector_key, "Removed sector from index");
        Ok(())
    }
}

/// Import monitor driven by tests or an embedding host
#[derive(Default)]
pub struct StaticImportMonitor {
    importing: Mutex<HashSet<DatasetKey>>,
}

impl StaticImportMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_importing(&self, dataset_key: DatasetKey, importing: bool) {
        let mut set = self.importing.lock().await;
        if importing {
            set.insert(dataset_key);
        } else {
            set.remove(&dataset_key);
        }
    }
}

#[async_trait]
impl ImportMonitor for StaticImportMonitor {
    async fn is_importing(&self, dataset_key: DatasetKey) -> bool {
        self.importing.lock().await.contains(&dataset_key)
    }
}

/// Snapshot service recording refresh requests, optionally failing them
#[derive(Default)]
pub struct RecordingSnapshots {
    calls: Mutex<Vec<(SectorKey, u32)>>,
    fail: Mutex<bool>,
}

impl RecordingSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following refresh fail
    pub async fn fail_with_error(&self, fail: bool) {
        *self.fail.lock().await = fail;
    }

    pub async fn calls(&self) -> Vec<(SectorKey, u32)> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, sector_key: SectorKey, attempt: u32) -> Result<u64> {
        if *self.fail.lock().await {
            return Err(BridgeError::Unavailable("snapshot storage offline".to_string()));
        }
        self.calls.lock().await.push((sector_key, attempt));
        Ok(0)
    }
}

#[async_trait]
impl TreeSnapshots for RecordingSnapshots {
    async fn update_sector_tree(&self, sector_key: SectorKey, attempt: u32) -> Result<u64> {
        self.record(sector_key, attempt).await
    }

    async fn update_sector_names(&self, sector_key: SectorKey, attempt: u32) -> Result<u64> {
        self.record(sector_key, attempt).await
    }
}
