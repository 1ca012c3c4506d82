//! Dataset import monitoring and cached tree snapshots.

use async_trait::async_trait;
use core_model::{DatasetKey, SectorKey};

use crate::error::Result;

/// Reports whether a source dataset is currently being (re)imported
#[async_trait]
pub trait ImportMonitor: Send + Sync {
    async fn is_importing(&self, dataset_key: DatasetKey) -> bool;
}

/// Cached textual exports of a sector attempt
#[async_trait]
pub trait TreeSnapshots: Send + Sync {
    /// Store the classification tree of a sector attempt, returning the number of lines written
    async fn update_sector_tree(&self, sector_key: SectorKey, attempt: u32) -> Result<u64>;

    /// Store the sorted name list of a sector attempt, returning the number of names written
    async fn update_sector_names(&self, sector_key: SectorKey, attempt: u32) -> Result<u64>;
}
