//! Search Index Abstraction

use async_trait::async_trait;
use core_model::{Sector, SectorKey};

use crate::error::Result;

/// Full text index over catalogue usages
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// (Re)index all catalogue content of a sector, returning the number of indexed usages
    async fn index_sector(&self, sector: &Sector) -> Result<u64>;

    /// Remove all documents of a sector
    async fn delete_sector(&self, sector_key: SectorKey) -> Result<()>;
}
