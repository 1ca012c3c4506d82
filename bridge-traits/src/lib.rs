//! # Collaborator Bridge Traits
//!
//! Contracts for every collaborator the assembly engine depends on but does
//! not implement itself.
//!
//! ## Overview
//!
//! The engine copies and removes sector subtrees. It relies on a record store
//! for all persistence, on a copy routine that physically duplicates records,
//! and on a handful of services for search indexing, name matching and name
//! parsing. Each of these is a trait here so hosts can plug in a database
//! backed implementation while tests use the in-process one from
//! `bridge-memory`.
//!
//! ## Traits
//!
//! ### Persistence
//! - [`CatalogueStore`](store::CatalogueStore) - Reads across all dataset partitions, tree cursors
//! - [`UnitOfWork`](store::UnitOfWork) - Staged writes committed as one unit
//! - [`UsageCursor`](store::UsageCursor) - Batched pre-order traversal of a subtree
//!
//! ### Copying
//! - [`UsageCopier`](copy::UsageCopier) - Duplicate a usage with its owned entities
//! - [`ReferenceLookup`](copy::ReferenceLookup) - Reference translation callback used while copying
//!
//! ### Services
//! - [`SearchIndex`](search::SearchIndex) - Index or drop sector content
//! - [`NameMatcher`](names::NameMatcher) - Find sector usages by name
//! - [`NameParser`](names::NameParser) - Parse scientific names and authorships
//! - [`ImportMonitor`](monitor::ImportMonitor) - Detect datasets being imported
//! - [`TreeSnapshots`](monitor::TreeSnapshots) - Refresh cached tree and name exports
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). A store must
//! report a dataset without any partition as
//! [`BridgeError::NoPartition`](error::BridgeError::NoPartition) so callers
//! can treat it like an empty dataset.
//!
//! ## Thread Safety
//!
//! All service traits require `Send + Sync`; they are shared as `Arc<dyn _>`
//! between the scheduler and its worker task.

pub mod copy;
pub mod error;
pub mod monitor;
pub mod names;
pub mod search;
pub mod store;

pub use error::{BridgeError, Result};

pub use copy::{CopiedUsage, ReferenceLookup, UsageCopier};
pub use monitor::{ImportMonitor, TreeSnapshots};
pub use names::{NameMatcher, NameParser};
pub use search::SearchIndex;
pub use store::{CatalogueStore, DeletedCounts, TreeTraversal, UnitOfWork, UsageCursor};
