//! # Sector Assembly Engine
//!
//! Keeps the sectors of an assembled catalogue in sync with their source datasets.
//!
//! ## Overview
//!
//! A sector maps a subject usage of a source checklist onto a target usage of
//! the catalogue. This crate copies or removes such subtrees:
//! - Admitting, queueing and serially executing sector jobs
//! - Rebuilding a sector from its source, honoring editorial decisions
//! - Creating implicit genus, subgenus and species taxa
//! - Collapsing bibliographically identical references
//! - Relinking catalogue content of other sectors after a rebuild
//! - Deleting a sector together with all sectors nested below it
//!
//! ## Components
//!
//! - **Scheduler** (`scheduler`): Admission checks, registry, FIFO worker and cancellation
//! - **Job Lifecycle** (`runnable`): Shared init, error handling and attempt bookkeeping
//! - **Sector Sync** (`sync_job`): Delete, copy, relink and index a sector
//! - **Tree Copy** (`tree_copy`): Per usage copy visitor with implicit taxa
//! - **Decisions** (`decisions`): Editorial overrides applied before copying
//! - **References** (`references`): Reference translation and deduplication
//! - **Sector Delete** (`delete_job`): Bottom-up removal of nested sectors

pub mod decisions;
pub mod delete_job;
pub mod error;
pub mod references;
pub mod runnable;
pub mod scheduler;
pub mod sync_job;
pub mod tree_copy;

pub use decisions::apply_decision;
pub use delete_job::SectorDeleteJob;
pub use error::{AssemblyError, RejectionReason, Result};
pub use references::ReferenceResolver;
pub use runnable::{JobReport, SectorRunnable};
pub use scheduler::{JobStatus, SectorJobScheduler};
pub use sync_job::SectorSyncJob;
pub use tree_copy::{CopyCounts, CopyServices, TreeCopyHandler, Usage};
