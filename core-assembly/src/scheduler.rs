//! # Sector Job Scheduler
//!
//! Admits sync and delete requests and runs them strictly one after another.
//!
//! ## Overview
//!
//! Requests are checked synchronously on the caller's task. Admitted jobs are
//! registered by sector key and pushed onto an unbounded FIFO queue that a
//! single worker task drains after [`SectorJobScheduler::start`]. At most one
//! job mutates the catalogue at any time, which is what keeps concurrent
//! sector jobs from corrupting each other's subtrees. Each job runs in a task
//! of its own that the worker awaits, so a panicking job is reported as
//! failed and the queue moves on.
//!
//! The registry lock only guards registration, removal and cancellation.
//! Admission checks read the store without it.
//!
//! A sector can be registered only once. Submitting a sector that is queued
//! or running is a silent no-op.
//!
//! ## Cancellation
//!
//! [`SectorJobScheduler::cancel`] removes the registration and cancels the
//! job's token. A queued job is then discarded by the worker without running;
//! a running job stops at its next checkpoint and goes through the same
//! cleanup as a failure.
//!
//! ## Usage
//!
//! ```ignore
//! use core_assembly::SectorJobScheduler;
//! use core_runtime::{AssemblyMetrics, EventBus};
//!
//! let scheduler = SectorJobScheduler::new(config, EventBus::default(), AssemblyMetrics::unregistered())?;
//! scheduler.start().await;
//! scheduler.submit_sync(SectorKey(12), user).await?;
//! for job in scheduler.status().await {
//!     println!("{} {}", job.sector_key, job.state);
//! }
//! scheduler.shutdown().await;
//! ```

use crate::delete_job::SectorDeleteJob;
use crate::error::{AssemblyError, RejectionReason, Result};
use crate::runnable::{JobReport, SectorRunnable};
use crate::sync_job::SectorSyncJob;
use bridge_traits::BridgeError;
use core_model::{DatasetKey, ImportState, JobKind, Sector, SectorKey, User};
use core_runtime::logging::sector_span;
use core_runtime::{AssemblyConfig, AssemblyEvent, AssemblyMetrics, EventBus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Snapshot of a registered job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub sector_key: SectorKey,
    /// Source dataset of the sector
    pub dataset_key: DatasetKey,
    pub state: ImportState,
    pub is_delete: bool,
}

/// Registry entry of a queued or running job
struct RegisteredJob {
    id: u64,
    dataset_key: DatasetKey,
    job: JobKind,
    attempt: u32,
    cancellation_token: CancellationToken,
    state: watch::Receiver<ImportState>,
    started: bool,
}

enum QueuedWork {
    Sync(SectorSyncJob),
    Delete(SectorDeleteJob),
}

impl QueuedWork {
    async fn run(self) -> JobReport {
        match self {
            QueuedWork::Sync(job) => job.run().await,
            QueuedWork::Delete(job) => job.run().await,
        }
    }
}

struct QueuedJob {
    id: u64,
    sector_key: SectorKey,
    attempt: u32,
    job: JobKind,
    work: QueuedWork,
}

type Registry = Arc<Mutex<HashMap<SectorKey, RegisteredJob>>>;

/// Serializing scheduler of sector sync and delete jobs
pub struct SectorJobScheduler {
    config: AssemblyConfig,
    events: EventBus,
    metrics: AssemblyMetrics,
    registry: Registry,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueuedJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl SectorJobScheduler {
    /// Create a stopped scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AssemblyConfig, events: EventBus, metrics: AssemblyMetrics) -> Result<Self> {
        config.validate()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            events,
            metrics,
            registry: Arc::new(Mutex::new(HashMap::new())),
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// Spawn the worker. Jobs submitted earlier run in submission order.
    pub async fn start(&self) {
        let Some(receiver) = self.receiver.lock().await.take() else {
            warn!("Sector job worker already started");
            return;
        };
        let worker = Worker {
            registry: Arc::clone(&self.registry),
            events: self.events.clone(),
            metrics: self.metrics.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver));
        *self.worker.lock().await = Some(handle);
        info!("Started sector job worker for catalogue {}", self.config.catalogue_key);
    }

    /// Queue a sync of one sector.
    ///
    /// Returns `false` if the sector is already queued or running.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::AdmissionRejected`] if the sector does not
    /// exist, its source dataset is being imported or holds no data.
    #[instrument(skip(self, user), fields(sector_key = %sector_key))]
    pub async fn submit_sync(&self, sector_key: SectorKey, user: User) -> Result<bool> {
        self.submit(sector_key, user, JobKind::Sync).await
    }

    /// Queue the deletion of a sector and all sectors nested below it
    #[instrument(skip(self, user), fields(sector_key = %sector_key))]
    pub async fn submit_delete(&self, sector_key: SectorKey, user: User) -> Result<bool> {
        self.submit(sector_key, user, JobKind::Delete).await
    }

    /// Queue a sync of every sector of the catalogue.
    ///
    /// Rejected sectors are logged and skipped. Returns the number of queued jobs.
    pub async fn submit_all(&self, user: User) -> Result<usize> {
        let sectors = self.config.store.list_sectors(self.config.catalogue_key).await?;
        info!(
            "Sync all {} sectors of catalogue {}",
            sectors.len(),
            self.config.catalogue_key
        );
        Ok(self.submit_sectors(sectors, user).await)
    }

    /// Queue a sync of every sector whose subject lives in `dataset_key`
    pub async fn submit_dataset(&self, dataset_key: DatasetKey, user: User) -> Result<usize> {
        let sectors = self
            .config
            .store
            .list_sectors_by_subject_dataset(self.config.catalogue_key, dataset_key)
            .await?;
        info!("Sync {} sectors of dataset {}", sectors.len(), dataset_key);
        Ok(self.submit_sectors(sectors, user).await)
    }

    async fn submit_sectors(&self, mut sectors: Vec<Sector>, user: User) -> usize {
        sectors.sort_by(Sector::target_order);
        // Sorting by target does not place parent sectors before the sectors nested in them
        debug!(
            order = ?sectors.iter().map(|s| s.key.0).collect::<Vec<_>>(),
            "Submitting sectors in target order"
        );
        let mut queued = 0;
        for sector in sectors {
            match self.submit_sync(sector.key, user.clone()).await {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(e) => warn!("Skip sync of {}: {}", sector, e),
            }
        }
        queued
    }

    async fn submit(&self, sector_key: SectorKey, user: User, job: JobKind) -> Result<bool> {
        if self.is_registered(sector_key, job, &user).await {
            return Ok(false);
        }

        // admission reads the store without holding the registry lock
        let run = SectorRunnable::prepare(
            self.config.clone(),
            self.events.clone(),
            sector_key,
            job,
            user,
        )
        .await?;
        let dataset_key = run.dataset_key();
        if job == JobKind::Sync {
            self.assert_stable_data(sector_key, dataset_key).await?;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let attempt = run.attempt().attempt;
        let entry = RegisteredJob {
            id,
            dataset_key,
            job,
            attempt,
            cancellation_token: run.cancellation_token(),
            state: run.watch_state(),
            started: false,
        };
        let work = match job {
            JobKind::Sync => QueuedWork::Sync(SectorSyncJob::new(run)),
            JobKind::Delete => QueuedWork::Delete(SectorDeleteJob::new(run)),
        };

        let mut registry = self.registry.lock().await;
        if let Some(existing) = registry.get(&sector_key) {
            info!(
                "Sector {} got a {} job while admitting a {} request. Ignore it",
                sector_key, existing.job, job
            );
            return Ok(false);
        }
        {
            let sender = self.sender.lock().await;
            let sender = sender.as_ref().ok_or(AssemblyError::SchedulerClosed)?;
            sender
                .send(QueuedJob {
                    id,
                    sector_key,
                    attempt,
                    job,
                    work,
                })
                .map_err(|_| AssemblyError::SchedulerClosed)?;
        }
        registry.insert(sector_key, entry);

        self.events
            .emit(AssemblyEvent::Queued {
                sector_key,
                dataset_key,
                job,
            })
            .ok();
        info!("Queued {} job of sector {} as attempt {}", job, sector_key, attempt);
        Ok(true)
    }

    async fn is_registered(&self, sector_key: SectorKey, job: JobKind, user: &User) -> bool {
        let registry = self.registry.lock().await;
        match registry.get(&sector_key) {
            Some(existing) => {
                info!(
                    "Sector {} already busy with a {} job. Ignore {} request by {}",
                    sector_key, existing.job, job, user
                );
                true
            }
            None => false,
        }
    }

    /// Reject syncs of datasets being imported or without any data
    async fn assert_stable_data(&self, sector_key: SectorKey, dataset_key: DatasetKey) -> Result<()> {
        if let Some(monitor) = &self.config.import_monitor {
            if monitor.is_importing(dataset_key).await {
                return Err(AssemblyError::rejected(
                    sector_key,
                    RejectionReason::DatasetImporting(dataset_key),
                ));
            }
        }
        match self.config.store.has_data(dataset_key).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(BridgeError::NoPartition(_)) => Err(AssemblyError::rejected(
                sector_key,
                RejectionReason::DatasetEmpty(dataset_key),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Cancel a queued or running job.
    ///
    /// Returns `false` if no job is registered for the sector.
    #[instrument(skip(self), fields(sector_key = %sector_key))]
    pub async fn cancel(&self, sector_key: SectorKey) -> bool {
        let removed = self.registry.lock().await.remove(&sector_key);
        let Some(entry) = removed else {
            debug!("No job registered for sector {}", sector_key);
            return false;
        };
        entry.cancellation_token.cancel();
        if entry.started {
            info!("Requested cancellation of running {} job of sector {}", entry.job, sector_key);
        } else {
            self.events
                .emit(AssemblyEvent::Cancelled {
                    sector_key,
                    attempt: entry.attempt,
                    job: entry.job,
                })
                .ok();
            self.metrics.record_cancelled(entry.job);
            info!("Discarded queued {} job of sector {}", entry.job, sector_key);
        }
        true
    }

    /// Registered jobs ordered by sector key
    pub async fn status(&self) -> Vec<JobStatus> {
        let registry = self.registry.lock().await;
        let mut jobs: Vec<JobStatus> = registry
            .iter()
            .map(|(key, entry)| JobStatus {
                sector_key: *key,
                dataset_key: entry.dataset_key,
                state: *entry.state.borrow(),
                is_delete: entry.job == JobKind::Delete,
            })
            .collect();
        jobs.sort_by_key(|j| j.sector_key);
        jobs
    }

    /// A sector of `dataset_key` with a registered sync, if any
    pub async fn syncing_sector(&self, dataset_key: DatasetKey) -> Option<SectorKey> {
        let registry = self.registry.lock().await;
        registry
            .iter()
            .filter(|(_, entry)| entry.job == JobKind::Sync && entry.dataset_key == dataset_key)
            .map(|(key, _)| *key)
            .min()
    }

    /// Whether sector `sector_key` of dataset `dataset_key` has a registered sync
    pub async fn is_syncing(&self, sector_key: SectorKey, dataset_key: DatasetKey) -> bool {
        let registry = self.registry.lock().await;
        registry
            .get(&sector_key)
            .map(|entry| entry.job == JobKind::Sync && entry.dataset_key == dataset_key)
            .unwrap_or(false)
    }

    /// Cancel every job, close the queue and wait for the worker
    pub async fn shutdown(&self) {
        let keys: Vec<SectorKey> = self.registry.lock().await.keys().copied().collect();
        for key in keys {
            self.cancel(key).await;
        }
        self.sender.lock().await.take();

        let Some(mut handle) = self.worker.lock().await.take() else {
            info!("Sector job scheduler closed before its worker started");
            return;
        };
        match timeout(self.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => info!("Sector job worker stopped"),
            Ok(Err(e)) => error!("Sector job worker ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Sector job worker did not stop within {:?}. Abort it",
                    self.config.shutdown_timeout
                );
                handle.abort();
            }
        }
    }
}

/// The single task executing queued jobs
struct Worker {
    registry: Registry,
    events: EventBus,
    metrics: AssemblyMetrics,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<QueuedJob>) {
        while let Some(queued) = receiver.recv().await {
            if !self.mark_started(&queued).await {
                debug!("Skip cancelled {} job of sector {}", queued.job, queued.sector_key);
                continue;
            }
            let QueuedJob {
                id,
                sector_key,
                attempt,
                job,
                work,
            } = queued;

            self.events
                .emit(AssemblyEvent::Started {
                    sector_key,
                    attempt,
                    job,
                })
                .ok();
            let handle = tokio::spawn(work.run().instrument(sector_span(sector_key, attempt, job)));
            let report = handle.await;

            {
                let mut registry = self.registry.lock().await;
                if registry.get(&sector_key).map(|e| e.id) == Some(id) {
                    registry.remove(&sector_key);
                }
            }
            match report {
                Ok(report) => self.record(sector_key, job, report),
                Err(e) => self.record_aborted(sector_key, attempt, job, e),
            }
        }
        debug!("Sector job queue closed");
    }

    /// Flag a job as running unless it was cancelled while queued
    async fn mark_started(&self, queued: &QueuedJob) -> bool {
        let mut registry = self.registry.lock().await;
        match registry.get_mut(&queued.sector_key) {
            Some(entry) if entry.id == queued.id && !entry.cancellation_token.is_cancelled() => {
                entry.started = true;
                true
            }
            _ => false,
        }
    }

    /// The job task panicked or was aborted before producing a report
    fn record_aborted(&self, sector_key: SectorKey, attempt: u32, job: JobKind, e: JoinError) {
        let message = if e.is_panic() {
            format!("{} job panicked", job)
        } else {
            format!("{} job was aborted", job)
        };
        error!("Failed {} job of sector {} attempt {}: {}", job, sector_key, attempt, message);
        self.metrics.record_failed(job);
        self.events
            .emit(AssemblyEvent::Failed {
                sector_key,
                attempt,
                job,
                message,
            })
            .ok();
    }

    fn record(&self, sector_key: SectorKey, job: JobKind, report: JobReport) {
        let attempt = &report.attempt;
        match &report.outcome {
            Ok(()) => {
                let queued = attempt.queued_duration().unwrap_or_default();
                let run = attempt.run_duration().unwrap_or_default();
                info!(
                    "Completed {} job of sector {} attempt {}: queued {} min, ran {} min",
                    job,
                    sector_key,
                    attempt.attempt,
                    queued.num_minutes(),
                    run.num_minutes()
                );
                self.metrics.record_completed(
                    job,
                    queued.to_std().unwrap_or_default(),
                    run.to_std().unwrap_or_default(),
                );
                self.events
                    .emit(AssemblyEvent::Completed {
                        sector_key,
                        attempt: attempt.attempt,
                        job,
                        queued_ms: queued.num_milliseconds().max(0) as u64,
                        run_ms: run.num_milliseconds().max(0) as u64,
                        taxa: attempt.taxon_count,
                        synonyms: attempt.synonym_count,
                    })
                    .ok();
            }
            Err(e) if e.is_cancellation() => {
                info!("Cancelled {} job of sector {} attempt {}", job, sector_key, attempt.attempt);
                self.metrics.record_cancelled(job);
                self.events
                    .emit(AssemblyEvent::Cancelled {
                        sector_key,
                        attempt: attempt.attempt,
                        job,
                    })
                    .ok();
            }
            Err(e) => {
                error!(
                    "Failed {} job of sector {} attempt {}: {}",
                    job, sector_key, attempt.attempt, e
                );
                self.metrics.record_failed(job);
                self.events
                    .emit(AssemblyEvent::Failed {
                        sector_key,
                        attempt: attempt.attempt,
                        job,
                        message: e.to_string(),
                    })
                    .ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_memory::{
        MemoryNameMatcher, MemoryStore, RecordCopier, RecordingSearchIndex, SimpleNameParser,
    };
    use core_model::{Name, Rank, SectorMode, SimpleName, Taxon};

    const SRC: DatasetKey = DatasetKey(100);
    const CAT: DatasetKey = DatasetKey(3);

    async fn fixture() -> (MemoryStore, SectorJobScheduler) {
        let store = MemoryStore::new();
        store
            .add_usage(Taxon::new("cat-root", CAT, Name::new("n0", CAT, "Pinales", Rank::Order), None))
            .await;
        store
            .add_usage(Taxon::new("root", SRC, Name::new("n1", SRC, "Pinaceae", Rank::Family), None))
            .await;
        store
            .add_sector(Sector {
                key: SectorKey(1),
                dataset_key: CAT,
                subject_dataset_key: SRC,
                subject: SimpleName::new("root", "Pinaceae", Rank::Family),
                target: Some(SimpleName::new("cat-root", "Pinales", Rank::Order)),
                mode: SectorMode::Attach,
                code: None,
                note: None,
            })
            .await;

        let shared: Arc<dyn bridge_traits::CatalogueStore> = Arc::new(store.clone());
        let config = AssemblyConfig::builder()
            .catalogue_key(CAT)
            .store(Arc::clone(&shared))
            .copier(Arc::new(RecordCopier::new(shared)))
            .search_index(Arc::new(RecordingSearchIndex::new(store.clone())))
            .matcher(Arc::new(MemoryNameMatcher::new(store.clone())))
            .parser(Arc::new(SimpleNameParser::new()))
            .build()
            .unwrap();
        let scheduler =
            SectorJobScheduler::new(config, EventBus::default(), AssemblyMetrics::unregistered()).unwrap();
        (store, scheduler)
    }

    fn user() -> User {
        User::new(1, "curator")
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_ignored() {
        let (_store, scheduler) = fixture().await;
        assert!(scheduler.submit_sync(SectorKey(1), user()).await.unwrap());
        assert!(!scheduler.submit_sync(SectorKey(1), user()).await.unwrap());
        assert!(!scheduler.submit_delete(SectorKey(1), user()).await.unwrap());

        let status = scheduler.status().await;
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].state, ImportState::Waiting);
        assert!(!status[0].is_delete);
        assert_eq!(scheduler.syncing_sector(SRC).await, Some(SectorKey(1)));
        assert!(scheduler.is_syncing(SectorKey(1), SRC).await);
        assert!(!scheduler.is_syncing(SectorKey(1), CAT).await);
    }

    #[tokio::test]
    async fn test_cancel_before_start_discards_job() {
        let (store, scheduler) = fixture().await;
        let events = scheduler.events.clone();
        let mut rx = events.subscribe();

        scheduler.submit_sync(SectorKey(1), user()).await.unwrap();
        assert!(scheduler.cancel(SectorKey(1)).await);
        assert!(!scheduler.cancel(SectorKey(1)).await);
        assert!(scheduler.status().await.is_empty());

        scheduler.start().await;
        scheduler.shutdown().await;

        assert!(store.usages(CAT).await.len() == 1);
        assert!(matches!(rx.recv().await.unwrap(), AssemblyEvent::Queued { .. }));
        assert!(matches!(rx.recv().await.unwrap(), AssemblyEvent::Cancelled { attempt: 1, .. }));
        assert_eq!(scheduler.metrics.cancelled(JobKind::Sync), 1);
    }

    #[tokio::test]
    async fn test_missing_sector_is_rejected() {
        let (_store, scheduler) = fixture().await;
        let err = scheduler.submit_sync(SectorKey(9), user()).await.unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::AdmissionRejected {
                reason: RejectionReason::SectorNotFound,
                ..
            }
        ));
        assert!(scheduler.status().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let (_store, scheduler) = fixture().await;
        scheduler.start().await;
        scheduler.shutdown().await;
        let err = scheduler.submit_sync(SectorKey(1), user()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::SchedulerClosed));
        assert!(scheduler.status().await.is_empty());
    }
}
