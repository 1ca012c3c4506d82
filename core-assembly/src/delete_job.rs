//! Removal of a sector, its catalogue content and every sector nested below it.

use crate::error::Result;
use crate::runnable::{run_work, JobReport, SectorRunnable, SectorWork};
use async_trait::async_trait;
use core_model::{ImportState, Sector, SectorKey};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Job deleting a sector tree
pub struct SectorDeleteJob {
    run: SectorRunnable,
    deleted: Vec<SectorKey>,
}

impl SectorDeleteJob {
    pub fn new(run: SectorRunnable) -> Self {
        Self {
            run,
            deleted: Vec::new(),
        }
    }

    /// Run the deletion to completion
    pub async fn run(self) -> JobReport {
        run_work(self).await
    }

    /// The sector and all sectors targeting its content, children before parents
    async fn collect_sectors(&self) -> Result<Vec<Sector>> {
        let store = &self.run.config.store;
        let catalogue_key = self.run.catalogue_key();
        let mut visited = HashSet::from([self.run.sector.key]);
        let mut pending = vec![self.run.sector.clone()];
        let mut ordered = Vec::new();

        while let Some(sector) = pending.pop() {
            let children = if sector.key == self.run.sector.key {
                self.run.child_sectors.clone()
            } else {
                store.child_sectors(catalogue_key, sector.key).await?
            };
            for child in children {
                if visited.insert(child.key) {
                    pending.push(child);
                } else {
                    debug!("Sector {} was already visited", child.key);
                }
            }
            ordered.push(sector);
        }
        ordered.reverse();
        Ok(ordered)
    }

    async fn delete_sector(&mut self, sector: &Sector) -> Result<()> {
        let catalogue_key = self.run.catalogue_key();
        let uow = self.run.config.store.begin().await?;
        let counts = uow.delete_by_sector(catalogue_key, sector.key).await?;
        uow.decrement_sector_count(catalogue_key, sector.subject_dataset_key)
            .await?;
        uow.delete_attempts(sector.key).await?;
        uow.delete_sector(sector.key).await?;
        uow.commit().await?;
        info!(
            usages = counts.usages,
            names = counts.names,
            references = counts.references,
            "Deleted {} with {} records",
            sector,
            counts.total()
        );
        self.deleted.push(sector.key);
        Ok(())
    }
}

#[async_trait]
impl SectorWork for SectorDeleteJob {
    fn runnable(&mut self) -> &mut SectorRunnable {
        &mut self.run
    }

    fn validate_sector(&self) -> bool {
        false
    }

    #[instrument(skip(self), fields(sector = %self.run.sector.key))]
    async fn do_work(&mut self) -> Result<()> {
        self.run.set_state(ImportState::Deleting)?;
        let sectors = self.collect_sectors().await?;
        if sectors.len() > 1 {
            info!(
                "Delete sector {} with {} nested sectors",
                self.run.sector.key,
                sectors.len() - 1
            );
        }
        for sector in &sectors {
            self.run.check_cancelled()?;
            self.delete_sector(sector).await?;
        }

        self.run.set_state(ImportState::Indexing)?;
        let index = std::sync::Arc::clone(&self.run.config.search_index);
        for key in &self.deleted {
            if let Err(e) = index.delete_sector(*key).await {
                warn!("Failed to remove sector {} from the search index: {}", key, e);
            }
        }
        self.run.set_state(ImportState::Finished)
    }

    /// A deleted sector keeps no attempt history
    async fn final_work(&mut self) -> Result<()> {
        debug!(
            "Deleted sectors {:?} in state {}",
            self.deleted, self.run.attempt.state
        );
        Ok(())
    }
}
