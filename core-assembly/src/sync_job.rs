//! # Sector Sync
//!
//! Rebuilds the catalogue content of one sector from its source subtree.
//!
//! ## Overview
//!
//! A sync replaces everything the sector contributed before:
//!
//! 1. **Deleting**: catalogue usages of other sectors that hang below this
//!    sector are moved onto the sector target, then the old sector content
//!    is deleted
//! 2. **Copying**: the source subtree is streamed in pre-order through a
//!    [`TreeCopyHandler`], skipping branches blocked by editorial decisions
//! 3. **Relinking**: the moved usages are placed below the matching new
//!    usages again, and sectors attached below this one get their target
//!    rematched
//! 4. **Indexing**: the new content is indexed for search, sector metrics
//!    are collected and tree snapshots refreshed
//!
//! Relinking and indexing also run when copying failed or was cancelled,
//! since the deleting step already changed the catalogue.
//!
//! The attempt record is persisted whatever the outcome.

use crate::error::{AssemblyError, Result};
use crate::references::ReferenceResolver;
use crate::runnable::{run_work, JobReport, SectorRunnable, SectorWork};
use crate::tree_copy::{CopyServices, TreeCopyHandler, Usage};
use async_trait::async_trait;
use bridge_traits::{TreeTraversal, UsageCursor};
use core_model::{DecisionMode, ImportState, SimpleName};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Job rebuilding the catalogue content of a sector
pub struct SectorSyncJob {
    run: SectorRunnable,
    /// Former parent of each relinked foreign child, by child id
    foreign_parents: HashMap<String, SimpleName>,
}

impl SectorSyncJob {
    pub fn new(run: SectorRunnable) -> Self {
        Self {
            run,
            foreign_parents: HashMap::new(),
        }
    }

    /// Run the sync to completion
    pub async fn run(self) -> JobReport {
        run_work(self).await
    }

    /// Move children of other sectors onto the sector target before the old content goes
    async fn relink_foreign_children(&mut self) -> Result<()> {
        let run = &self.run;
        let Some(target_id) = run.sector.target_id().map(str::to_string) else {
            return Ok(());
        };
        let catalogue_key = run.catalogue_key();
        let store = &run.config.store;
        let interval = run.config.relink_commit_interval.max(1);
        let uow = store.begin().await?;

        let mut relinked = 0usize;
        for child in &run.foreign_children {
            let Some(parent_id) = child.parent_id() else {
                continue;
            };
            let Some(parent) = store.get_usage(catalogue_key, parent_id).await? else {
                continue;
            };
            self.foreign_parents
                .insert(child.id().to_string(), parent.to_simple_name());
            uow.update_parent(catalogue_key, child.id(), &target_id).await?;
            relinked += 1;
            if relinked % interval == 0 {
                uow.commit().await?;
            }
        }
        uow.commit().await?;
        info!(
            "Temporarily relinked {} foreign children of sector {} to target {}",
            relinked, run.sector.key, target_id
        );
        Ok(())
    }

    async fn delete_old(&mut self) -> Result<()> {
        let run = &self.run;
        let uow = run.config.store.begin().await?;
        let deleted = uow
            .delete_by_sector(run.catalogue_key(), run.sector.key)
            .await?;
        uow.commit().await?;
        info!(
            usages = deleted.usages,
            names = deleted.names,
            references = deleted.references,
            vernaculars = deleted.vernaculars,
            distributions = deleted.distributions,
            "Deleted {} existing records of sector {}",
            deleted.total(),
            run.sector.key
        );
        Ok(())
    }

    async fn process_tree(&mut self) -> Result<()> {
        let run = &mut self.run;
        let sector = &run.sector;
        let catalogue_key = run.catalogue_key();
        let store = Arc::clone(&run.config.store);

        let target_id = sector
            .target_id()
            .ok_or_else(|| AssemblyError::invalid_sector(sector.key, "sector does not have any target"))?;
        let target = store
            .get_usage(catalogue_key, target_id)
            .await?
            .map(|u| Usage {
                id: u.id().to_string(),
                rank: u.rank(),
                status: u.status(),
            })
            .ok_or_else(|| {
                AssemblyError::invalid_sector(
                    sector.key,
                    format!("non existing target {} for dataset {}", target_id, catalogue_key),
                )
            })?;
        let root_id = sector
            .subject_id()
            .ok_or_else(|| AssemblyError::invalid_sector(sector.key, "sector does not have any subject"))?
            .to_string();

        let blocked_ids: HashSet<String> = run
            .decisions
            .values()
            .filter(|d| d.mode == DecisionMode::Block)
            .filter_map(|d| d.subject_id().map(str::to_string))
            .collect();
        debug!(
            blocked = blocked_ids.len(),
            "Traverse subtree {} of dataset {}", root_id, sector.subject_dataset_key
        );

        let mut cursor = store
            .open_tree(TreeTraversal {
                dataset_key: sector.subject_dataset_key,
                root_id,
                blocked_ids,
            })
            .await?;

        let uow = store.begin().await?;
        let services = CopyServices {
            copier: Arc::clone(&run.config.copier),
            parser: Arc::clone(&run.config.parser),
            uow: Arc::clone(&uow),
            references: ReferenceResolver::new(
                Arc::clone(&store),
                uow,
                sector.subject_dataset_key,
                catalogue_key,
                sector.key,
            ),
        };
        let batch_size = run.config.batch_size;
        let mut handler = TreeCopyHandler::new(
            catalogue_key,
            sector,
            target,
            &run.decisions,
            services,
            batch_size,
        );

        let outcome = copy_all(run, cursor.as_mut(), &mut handler, batch_size).await;
        let counts = handler.counts();
        drop(handler);

        run.attempt.taxon_count = counts.taxa;
        run.attempt.synonym_count = counts.synonyms;
        run.attempt.ignored_usage_count = counts.ignored;
        outcome
    }

    /// Place moved children below the new usage matching their former parent
    async fn rematch_foreign_children(&mut self) -> Result<()> {
        let run = &mut self.run;
        let catalogue_key = run.catalogue_key();
        let sector_key = run.sector.key;
        let interval = run.config.relink_commit_interval.max(1);
        let matcher = Arc::clone(&run.config.matcher);
        let uow = run.config.store.begin().await?;

        let children: Vec<(String, String)> = run
            .foreign_children
            .iter()
            .map(|c| (c.id().to_string(), c.name().label()))
            .collect();
        let mut rematched = 0usize;
        let mut warnings = Vec::new();
        for (child_id, label) in children {
            let Some(parent) = self.foreign_parents.get(&child_id) else {
                continue;
            };
            let matches = matcher.match_sector(parent, sector_key).await?;
            let Some(first) = matches.first() else {
                warnings.push(format!(
                    "{} with parent {} in sector {} cannot be rematched",
                    label, parent, sector_key
                ));
                continue;
            };
            if matches.len() > 1 {
                warnings.push(format!(
                    "{} with parent {} in sector {} matches {} times - pick first {}",
                    label,
                    parent,
                    sector_key,
                    matches.len(),
                    first
                ));
            }
            let Some(new_parent) = first.id.as_deref() else {
                continue;
            };
            uow.update_parent(catalogue_key, &child_id, new_parent).await?;
            rematched += 1;
            if rematched % interval == 0 {
                uow.commit().await?;
            }
        }
        uow.commit().await?;
        for warning in warnings {
            run.warn(warning);
        }
        info!(
            "Rematched {} of {} foreign children of sector {}",
            rematched,
            run.foreign_children.len(),
            sector_key
        );
        Ok(())
    }

    /// Point sectors attached below this one to the matching new usage
    async fn relink_attached_sectors(&mut self) -> Result<()> {
        let run = &mut self.run;
        let sector_key = run.sector.key;
        let matcher = Arc::clone(&run.config.matcher);
        let uow = run.config.store.begin().await?;

        let children = std::mem::take(&mut run.child_sectors);
        let mut updated = Vec::with_capacity(children.len());
        for mut child in children {
            let Some(mut target) = child.target.take() else {
                updated.push(child);
                continue;
            };
            let matches = matcher.match_sector(&target, sector_key).await?;
            if matches.len() == 1 {
                target.id = matches[0].id.clone();
            } else {
                let reason = if matches.is_empty() {
                    format!("lost {}", target)
                } else {
                    format!("multiple names like {}", target)
                };
                run.warn(format!(
                    "Child sector {} cannot be rematched to synced sector {} - {}",
                    child.key, sector_key, reason
                ));
                target.id = None;
            }
            child.target = Some(target);
            uow.update_sector(child.clone()).await?;
            updated.push(child);
        }
        uow.commit().await?;
        info!("Updated targets of {} child sectors of sector {}", updated.len(), sector_key);
        run.child_sectors = updated;
        Ok(())
    }

    async fn relink(&mut self) -> Result<()> {
        self.run.set_state(ImportState::Relinking)?;
        self.rematch_foreign_children().await?;
        self.relink_attached_sectors().await
    }

    async fn index_and_measure(&mut self) -> Result<()> {
        let run = &mut self.run;
        run.set_state(ImportState::Indexing)?;
        let indexed = run.config.search_index.index_sector(&run.sector).await?;
        info!("Indexed {} usages of sector {}", indexed, run.sector.key);

        run.attempt.metrics = run
            .config
            .store
            .sector_metrics(run.catalogue_key(), run.sector.key)
            .await?;

        if let Some(snapshots) = run.config.snapshots.clone() {
            let key = run.sector.key;
            let attempt = run.attempt.attempt;
            match snapshots.update_sector_tree(key, attempt).await {
                Ok(n) => debug!("Tree snapshot of sector {} holds {} usages", key, n),
                Err(e) => error!("Failed to update tree snapshot of sector {}: {}", key, e),
            }
            match snapshots.update_sector_names(key, attempt).await {
                Ok(n) => debug!("Name snapshot of sector {} holds {} names", key, n),
                Err(e) => error!("Failed to update name snapshot of sector {}: {}", key, e),
            }
        }
        Ok(())
    }
}

/// Feed the whole cursor through the handler, checking for cancellation between batches
async fn copy_all(
    run: &SectorRunnable,
    cursor: &mut dyn UsageCursor,
    handler: &mut TreeCopyHandler<'_>,
    batch_size: usize,
) -> Result<()> {
    loop {
        run.check_cancelled()?;
        let batch = cursor.next_batch(batch_size.max(1)).await?;
        if batch.is_empty() {
            break;
        }
        for usage in batch {
            handler.accept(usage).await?;
        }
    }
    handler.finish().await
}

#[async_trait]
impl SectorWork for SectorSyncJob {
    fn runnable(&mut self) -> &mut SectorRunnable {
        &mut self.run
    }

    fn validate_sector(&self) -> bool {
        true
    }

    async fn prepare_work(&mut self) -> Result<()> {
        self.run.block_other_sector_subjects().await
    }

    #[instrument(skip(self), fields(sector = %self.run.sector.key, attempt = self.run.attempt.attempt))]
    async fn do_work(&mut self) -> Result<()> {
        self.run.set_state(ImportState::Deleting)?;
        self.relink_foreign_children().await?;

        let copied = async {
            self.delete_old().await?;
            self.run.check_cancelled()?;
            self.run.set_state(ImportState::Copying)?;
            self.process_tree().await?;
            self.run.check_cancelled()
        }
        .await;
        if copied.is_err() {
            self.run.remember_stop();
        }

        let relinked = self.relink().await;
        if relinked.is_err() {
            self.run.remember_stop();
        }
        let indexed = self.index_and_measure().await;

        // the earliest failure wins, later ones are only logged
        let key = self.run.sector.key;
        match (copied, relinked, indexed) {
            (Ok(()), Ok(()), Ok(())) => self.run.set_state(ImportState::Finished),
            (Err(e), relinked, indexed) => {
                if let Err(relink_error) = relinked {
                    error!("Relinking sector {} after an aborted copy failed: {}", key, relink_error);
                }
                if let Err(index_error) = indexed {
                    error!("Indexing sector {} after an aborted copy failed: {}", key, index_error);
                }
                Err(e)
            }
            (Ok(()), Err(e), indexed) => {
                if let Err(index_error) = indexed {
                    error!("Indexing sector {} after a failed relink failed: {}", key, index_error);
                }
                Err(e)
            }
            (Ok(()), Ok(()), Err(e)) => Err(e),
        }
    }

    async fn final_work(&mut self) -> Result<()> {
        let uow = self.run.config.store.begin().await?;
        uow.save_attempt(self.run.attempt.clone()).await?;
        uow.commit().await?;
        debug!(
            "Saved attempt {} of sector {} in state {}",
            self.run.attempt.attempt, self.run.sector.key, self.run.attempt.state
        );
        Ok(())
    }
}
