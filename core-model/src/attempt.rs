//! # Sync Attempt
//!
//! Audit record of one sector job run, created when the job starts and
//! persisted at whatever state it reaches.
//!
//! ## State Machine
//!
//! ```text
//! Waiting → Preparing → Deleting → Copying → Relinking → Indexing → Finished
//!                          │  └──────────────────↑          ↑
//!                          └────────────────────────────────┘ (delete jobs)
//!
//! any non-terminal state → Failed | Canceled
//! ```
//!
//! `Deleting → Relinking` is taken by a sync whose delete step failed: the
//! cleanup states still run before the attempt is marked failed.

use crate::error::{ModelError, Result};
use crate::keys::{DatasetKey, SectorKey, User};
use crate::vocab::{Issue, NameType, Origin, Rank, TaxonomicStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of sector job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Sync,
    Delete,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Sync => "sync",
            JobKind::Delete => "delete",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress state of a sector job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    /// Queued, not yet picked up by the worker
    Waiting,
    /// Loading sector, decisions and foreign children
    Preparing,
    Deleting,
    Copying,
    Relinking,
    Indexing,
    Finished,
    Canceled,
    Failed,
}

impl ImportState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportState::Finished | ImportState::Canceled | ImportState::Failed
        )
    }

    /// Whether the job is doing work, i.e. neither waiting nor done
    pub fn is_running(&self) -> bool {
        !self.is_terminal() && *self != ImportState::Waiting
    }

    /// Get the string representation for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportState::Waiting => "waiting",
            ImportState::Preparing => "preparing",
            ImportState::Deleting => "deleting",
            ImportState::Copying => "copying",
            ImportState::Relinking => "relinking",
            ImportState::Indexing => "indexing",
            ImportState::Finished => "finished",
            ImportState::Canceled => "canceled",
            ImportState::Failed => "failed",
        }
    }

    fn can_transition_to(&self, to: ImportState) -> bool {
        use ImportState::*;
        match (*self, to) {
            (from, Failed | Canceled) => !from.is_terminal(),
            (Waiting, Preparing) => true,
            (Preparing, Deleting) => true,
            (Deleting, Copying | Relinking | Indexing) => true,
            (Copying, Relinking) => true,
            (Relinking, Indexing) => true,
            (Indexing, Finished) => true,
            _ => false,
        }
    }
}

impl FromStr for ImportState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(ImportState::Waiting),
            "preparing" => Ok(ImportState::Preparing),
            "deleting" => Ok(ImportState::Deleting),
            "copying" => Ok(ImportState::Copying),
            "relinking" => Ok(ImportState::Relinking),
            "indexing" => Ok(ImportState::Indexing),
            "finished" => Ok(ImportState::Finished),
            "canceled" | "cancelled" => Ok(ImportState::Canceled),
            "failed" => Ok(ImportState::Failed),
            _ => Err(ModelError::InvalidValue {
                field: "ImportState".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counts over the catalogue content of one sector
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectorMetrics {
    pub taxon_count: u64,
    pub synonym_count: u64,
    pub name_count: u64,
    pub reference_count: u64,
    pub vernacular_count: u64,
    pub distribution_count: u64,
    pub taxa_by_rank: BTreeMap<Rank, u64>,
    pub usages_by_status: BTreeMap<TaxonomicStatus, u64>,
    pub names_by_type: BTreeMap<NameType, u64>,
    pub names_by_origin: BTreeMap<Origin, u64>,
    pub issues: BTreeMap<Issue, u64>,
}

/// Audit record of a single sector job execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub sector_key: SectorKey,
    /// Source dataset of the sector
    pub dataset_key: DatasetKey,
    pub attempt: u32,
    pub job: JobKind,
    pub state: ImportState,
    pub created: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub created_by: User,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub taxon_count: u64,
    pub synonym_count: u64,
    /// Visited source usages that were not copied
    pub ignored_usage_count: u64,
    /// State reached when a failed or cancelled attempt stopped
    pub stopped_in: Option<ImportState>,
    pub metrics: SectorMetrics,
}

impl SyncAttempt {
    /// Create a new attempt in `Waiting` state
    pub fn new(sector_key: SectorKey, dataset_key: DatasetKey, job: JobKind, user: User) -> Self {
        Self {
            sector_key,
            dataset_key,
            attempt: 0,
            job,
            state: ImportState::Waiting,
            created: Utc::now(),
            started: None,
            finished: None,
            created_by: user,
            error: None,
            warnings: Vec::new(),
            taxon_count: 0,
            synonym_count: 0,
            ignored_usage_count: 0,
            stopped_in: None,
            metrics: SectorMetrics::default(),
        }
    }

    /// Move to a new state.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed by the state machine.
    pub fn transition(&mut self, to: ImportState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(ModelError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition {} attempt from {} to {}",
                    self.job,
                    self.state.as_str(),
                    to.as_str()
                ),
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn mark_started(&mut self) {
        self.started = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        self.finished = Some(Utc::now());
    }

    /// Terminate the attempt as failed or cancelled, remembering where it stopped.
    ///
    /// A state already recorded in `stopped_in` is kept.
    pub fn stop(&mut self, state: ImportState, error: Option<String>) -> Result<()> {
        if self.stopped_in.is_none() {
            self.stopped_in = Some(self.state);
        }
        if error.is_some() {
            self.error = error;
        }
        self.transition(state)
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn queued_duration(&self) -> Option<chrono::Duration> {
        self.started.map(|started| started - self.created)
    }

    pub fn run_duration(&self) -> Option<chrono::Duration> {
        match (self.started, self.finished) {
            (Some(started), Some(finished)) => Some(finished - started),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(job: JobKind) -> SyncAttempt {
        SyncAttempt::new(SectorKey(7), DatasetKey(100), job, User::new(1, "curator"))
    }

    #[test]
    fn test_new_attempt_is_waiting() {
        let a = attempt(JobKind::Sync);
        assert_eq!(a.state, ImportState::Waiting);
        assert!(a.started.is_none());
        assert!(a.stopped_in.is_none());
    }

    #[test]
    fn test_full_sync_lifecycle() {
        let mut a = attempt(JobKind::Sync);
        for s in [
            ImportState::Preparing,
            ImportState::Deleting,
            ImportState::Copying,
            ImportState::Relinking,
            ImportState::Indexing,
            ImportState::Finished,
        ] {
            a.transition(s).unwrap();
        }
        assert!(a.state.is_terminal());
    }

    #[test]
    fn test_delete_lifecycle_skips_copying() {
        let mut a = attempt(JobKind::Delete);
        a.transition(ImportState::Preparing).unwrap();
        a.transition(ImportState::Deleting).unwrap();
        a.transition(ImportState::Indexing).unwrap();
        a.transition(ImportState::Finished).unwrap();
    }

    #[test]
    fn test_invalid_transition() {
        let mut a = attempt(JobKind::Sync);
        let err = a.transition(ImportState::Copying).unwrap_err();
        assert!(matches!(err, ModelError::InvalidStateTransition { .. }));
        assert_eq!(a.state, ImportState::Waiting);
    }

    #[test]
    fn test_terminal_states_cannot_transition() {
        let mut a = attempt(JobKind::Sync);
        a.transition(ImportState::Canceled).unwrap();
        assert!(a.transition(ImportState::Failed).is_err());
        assert!(a.transition(ImportState::Preparing).is_err());
    }

    #[test]
    fn test_stop_keeps_first_stopping_point() {
        let mut a = attempt(JobKind::Sync);
        a.transition(ImportState::Preparing).unwrap();
        a.transition(ImportState::Deleting).unwrap();
        a.transition(ImportState::Copying).unwrap();
        a.stopped_in = Some(ImportState::Copying);
        a.transition(ImportState::Relinking).unwrap();
        a.transition(ImportState::Indexing).unwrap();
        a.stop(ImportState::Canceled, Some("cancelled".to_string())).unwrap();
        assert_eq!(a.state, ImportState::Canceled);
        assert_eq!(a.stopped_in, Some(ImportState::Copying));
        assert_eq!(a.error.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!("COPYING".parse::<ImportState>().unwrap(), ImportState::Copying);
        assert_eq!("cancelled".parse::<ImportState>().unwrap(), ImportState::Canceled);
        assert!("unknown".parse::<ImportState>().is_err());
    }

    #[test]
    fn test_durations() {
        let mut a = attempt(JobKind::Sync);
        assert!(a.queued_duration().is_none());
        a.mark_started();
        a.mark_finished();
        assert!(a.queued_duration().unwrap() >= chrono::Duration::zero());
        assert!(a.run_duration().unwrap() >= chrono::Duration::zero());
    }
}
