use bridge_traits::BridgeError;
use core_model::{DatasetKey, ModelError, SectorKey};
use std::fmt;
use thiserror::Error;

/// Why a job was refused before entering the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    SectorNotFound,
    /// The source dataset is being imported right now
    DatasetImporting(DatasetKey),
    /// The source dataset holds no records or was never imported
    DatasetEmpty(DatasetKey),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::SectorNotFound => write!(f, "sector does not exist"),
            RejectionReason::DatasetImporting(key) => {
                write!(f, "dataset {} currently being imported", key)
            }
            RejectionReason::DatasetEmpty(key) => write!(f, "dataset {} is empty", key),
        }
    }
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Cannot run job for sector {sector_key}: {reason}")]
    AdmissionRejected {
        sector_key: SectorKey,
        reason: RejectionReason,
    },

    #[error("Sector {sector_key} is invalid: {message}")]
    InvalidSector { sector_key: SectorKey, message: String },

    #[error("Job of sector {sector_key} was cancelled")]
    Cancelled { sector_key: SectorKey },

    /// A usage blocked by an editorial decision reached the copy step
    #[error("Blocked usage {id} must not be traversed")]
    BlockedUsageTraversed { id: String },

    #[error("Parent {parent_id} of usage {id} was not copied before its child")]
    UnresolvedParent { id: String, parent_id: String },

    #[error("Scheduler is shut down")]
    SchedulerClosed,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),
}

impl AssemblyError {
    pub(crate) fn rejected(sector_key: SectorKey, reason: RejectionReason) -> Self {
        AssemblyError::AdmissionRejected { sector_key, reason }
    }

    pub(crate) fn invalid_sector(sector_key: SectorKey, message: impl Into<String>) -> Self {
        AssemblyError::InvalidSector {
            sector_key,
            message: message.into(),
        }
    }

    /// True if the job stopped because it was asked to
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AssemblyError::Cancelled { .. })
    }
}

pub type Result<T> = std::result::Result<T, AssemblyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        let err = AssemblyError::rejected(SectorKey(7), RejectionReason::DatasetImporting(DatasetKey(100)));
        assert_eq!(
            err.to_string(),
            "Cannot run job for sector 7: dataset 100 currently being imported"
        );
        let err = AssemblyError::rejected(SectorKey(7), RejectionReason::DatasetEmpty(DatasetKey(100)));
        assert_eq!(err.to_string(), "Cannot run job for sector 7: dataset 100 is empty");
    }

    #[test]
    fn test_only_cancelled_is_cancellation() {
        assert!(AssemblyError::Cancelled { sector_key: SectorKey(1) }.is_cancellation());
        assert!(!AssemblyError::SchedulerClosed.is_cancellation());
        let bridge: AssemblyError = BridgeError::Database("timeout".into()).into();
        assert!(!bridge.is_cancellation());
    }
}
