//! # Sector Job Lifecycle
//!
//! Shared run loop of sync and delete jobs.
//!
//! ## Overview
//!
//! Every job runs through the same steps:
//!
//! 1. `init`: reload the sector, optionally validate its subject and target,
//!    load decisions, foreign children and child sectors (`Preparing`)
//! 2. `do_work`: the job specific algorithm
//! 3. on error: mark the attempt `Canceled` or `Failed`, remembering the
//!    state it stopped in
//! 4. `final_work`: always runs, e.g. to persist the attempt
//!
//! A [`SectorRunnable`] carries everything that lives exactly as long as one
//! run: the reloaded sector, its decisions, the attempt record, the
//! cancellation token and the state channel observed by the scheduler.

use crate::error::{AssemblyError, Result};
use async_trait::async_trait;
use core_model::{
    DatasetKey, DecisionMode, EditorialDecision, ImportState, JobKind, NameUsage, Sector,
    SectorKey, SyncAttempt, User,
};
use core_runtime::{AssemblyConfig, AssemblyEvent, EventBus};
use std::collections::HashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of one job run
#[derive(Debug)]
pub struct JobReport {
    /// The attempt record at the end of the run
    pub attempt: SyncAttempt,
    pub outcome: Result<()>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(&self.outcome, Err(e) if e.is_cancellation())
    }
}

/// Per run state shared by all sector jobs
pub struct SectorRunnable {
    pub(crate) config: AssemblyConfig,
    events: EventBus,
    cancel: CancellationToken,
    progress: watch::Sender<ImportState>,
    pub(crate) sector: Sector,
    pub(crate) attempt: SyncAttempt,
    /// Decisions keyed by the source usage id they apply to
    pub(crate) decisions: HashMap<String, EditorialDecision>,
    pub(crate) foreign_children: Vec<NameUsage>,
    pub(crate) child_sectors: Vec<Sector>,
}

impl SectorRunnable {
    /// Create a run for a sector loaded beforehand.
    ///
    /// The attempt number is taken from the store, one above the last
    /// persisted attempt.
    pub async fn prepare(
        config: AssemblyConfig,
        events: EventBus,
        sector_key: SectorKey,
        job: JobKind,
        user: User,
    ) -> Result<Self> {
        let sector = config.store.get_sector(sector_key).await?.ok_or_else(|| {
            AssemblyError::rejected(sector_key, crate::error::RejectionReason::SectorNotFound)
        })?;
        let mut attempt = SyncAttempt::new(sector.key, sector.subject_dataset_key, job, user);
        attempt.attempt = config.store.next_attempt(sector.key).await?;
        let (progress, _) = watch::channel(ImportState::Waiting);

        Ok(Self {
            config,
            events,
            cancel: CancellationToken::new(),
            progress,
            sector,
            attempt,
            decisions: HashMap::new(),
            foreign_children: Vec::new(),
            child_sectors: Vec::new(),
        })
    }

    pub fn sector_key(&self) -> SectorKey {
        self.sector.key
    }

    /// Source dataset of the sector
    pub fn dataset_key(&self) -> DatasetKey {
        self.sector.subject_dataset_key
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn attempt(&self) -> &SyncAttempt {
        &self.attempt
    }

    /// Token cancelling this run at its next checkpoint
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver following the state of this run
    pub fn watch_state(&self) -> watch::Receiver<ImportState> {
        self.progress.subscribe()
    }

    pub(crate) fn catalogue_key(&self) -> DatasetKey {
        self.config.catalogue_key
    }

    pub(crate) fn set_state(&mut self, state: ImportState) -> Result<()> {
        self.attempt.transition(state)?;
        self.progress.send_replace(state);
        debug!(state = %state, "Sector {} changed state", self.sector.key);
        self.events
            .emit(AssemblyEvent::StateChanged {
                sector_key: self.sector.key,
                attempt: self.attempt.attempt,
                state,
            })
            .ok();
        Ok(())
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AssemblyError::Cancelled {
                sector_key: self.sector.key,
            });
        }
        Ok(())
    }

    /// Record the state the job is leaving because of an error
    pub(crate) fn remember_stop(&mut self) {
        if self.attempt.stopped_in.is_none() {
            self.attempt.stopped_in = Some(self.attempt.state);
        }
    }

    pub(crate) fn warn(&mut self, warning: String) {
        warn!("{}", warning);
        self.attempt.add_warning(warning);
    }

    async fn init(&mut self, validate: bool) -> Result<()> {
        self.set_state(ImportState::Preparing)?;
        self.sector = self.load_sector(validate).await?;

        let store = &self.config.store;
        let catalogue_key = self.config.catalogue_key;
        for decision in store
            .decisions(catalogue_key, self.sector.subject_dataset_key)
            .await?
        {
            if let Some(id) = decision.subject_id() {
                self.decisions.insert(id.to_string(), decision);
            }
        }
        info!(
            "Loaded {} editorial decisions for sector {}",
            self.decisions.len(),
            self.sector.key
        );

        self.foreign_children = store.foreign_children(catalogue_key, self.sector.key).await?;
        info!(
            "Loaded {} children from other sectors with a parent from sector {}",
            self.foreign_children.len(),
            self.sector.key
        );

        self.child_sectors = store.child_sectors(catalogue_key, self.sector.key).await?;
        info!(
            "Loaded {} sectors targeting taxa from sector {}",
            self.child_sectors.len(),
            self.sector.key
        );

        self.check_cancelled()
    }

    /// Block the subjects of all other sectors sourcing from the same dataset
    pub(crate) async fn block_other_sector_subjects(&mut self) -> Result<()> {
        let sectors = self
            .config
            .store
            .list_sectors_by_subject_dataset(self.config.catalogue_key, self.sector.subject_dataset_key)
            .await?;
        let mut blocked = 0;
        for other in sectors.into_iter().filter(|s| s.key != self.sector.key) {
            let Some(id) = other.subject_id().map(str::to_string) else {
                continue;
            };
            if Some(id.as_str()) == self.sector.subject_id() {
                continue;
            }
            let mut decision = EditorialDecision::new(
                0,
                self.config.catalogue_key,
                self.sector.subject_dataset_key,
                other.subject.clone(),
                DecisionMode::Block,
            );
            decision.note = Some(format!("Auto blocked subject of sector {}", other.key));
            self.decisions.insert(id, decision);
            blocked += 1;
        }
        info!("Loaded {} sector subjects for auto blocking", blocked);
        Ok(())
    }

    /// Reload the sector to pick up the latest target
    async fn load_sector(&self, validate: bool) -> Result<Sector> {
        let key = self.sector.key;
        let store = &self.config.store;
        let sector = store
            .get_sector(key)
            .await?
            .ok_or_else(|| AssemblyError::invalid_sector(key, "sector does not exist"))?;
        if !validate {
            return Ok(sector);
        }

        let target_id = sector
            .target_id()
            .ok_or_else(|| AssemblyError::invalid_sector(key, "sector does not have any target"))?;
        if store.get_usage(self.config.catalogue_key, target_id).await?.is_none() {
            return Err(AssemblyError::invalid_sector(
                key,
                format!(
                    "non existing target {} for dataset {}",
                    target_id, self.config.catalogue_key
                ),
            ));
        }

        let subject_id = sector
            .subject_id()
            .ok_or_else(|| AssemblyError::invalid_sector(key, "sector does not have any subject"))?;
        if store
            .get_usage(sector.subject_dataset_key, subject_id)
            .await?
            .is_none()
        {
            return Err(AssemblyError::invalid_sector(
                key,
                format!(
                    "non existing subject {} for dataset {}",
                    sector.subject, sector.subject_dataset_key
                ),
            ));
        }
        Ok(sector)
    }

    fn stop(&mut self, state: ImportState, error: Option<String>) {
        if let Err(e) = self.attempt.stop(state, error) {
            warn!("Cannot stop attempt of sector {}: {}", self.sector.key, e);
        }
        self.progress.send_replace(self.attempt.state);
    }
}

/// Job specific steps plugged into the shared lifecycle
#[async_trait]
pub(crate) trait SectorWork: Send {
    fn runnable(&mut self) -> &mut SectorRunnable;

    /// Whether subject and target must exist before the job starts
    fn validate_sector(&self) -> bool;

    /// Extra preparation after the common `init`
    async fn prepare_work(&mut self) -> Result<()> {
        Ok(())
    }

    async fn do_work(&mut self) -> Result<()>;

    /// Runs after success, failure or cancellation alike
    async fn final_work(&mut self) -> Result<()>;
}

/// Run a job through init, work and final work
pub(crate) async fn run_work<W: SectorWork>(mut work: W) -> JobReport {
    let validate = work.validate_sector();
    {
        let run = work.runnable();
        run.attempt.mark_started();
        info!(
            "Started {} of sector {} by {}",
            run.attempt.job, run.sector, run.attempt.created_by
        );
    }

    let mut outcome = work.runnable().init(validate).await;
    if outcome.is_ok() {
        outcome = work.prepare_work().await;
    }
    if outcome.is_ok() {
        outcome = work.do_work().await;
    }

    {
        let run = work.runnable();
        match &outcome {
            Ok(()) => {}
            Err(e) if e.is_cancellation() => {
                warn!("Interrupted {} of sector {}", run.attempt.job, run.sector.key);
                run.stop(ImportState::Canceled, None);
            }
            Err(e) => {
                error!("Error running {} of sector {}: {}", run.attempt.job, run.sector.key, e);
                run.stop(ImportState::Failed, Some(e.to_string()));
            }
        }
        run.attempt.mark_finished();
        info!(
            "Completed {} of sector {} in state {}",
            run.attempt.job, run.sector.key, run.attempt.state
        );
    }

    if let Err(e) = work.final_work().await {
        error!("Final work of sector {} failed: {}", work.runnable().sector.key, e);
    }

    JobReport {
        attempt: work.runnable().attempt.clone(),
        outcome,
    }
}
