//! # In-Memory Bridge Implementations
//!
//! In-process implementations of every collaborator trait from
//! `bridge-traits`.
//!
//! ## Overview
//!
//! - `CatalogueStore` / `UnitOfWork` using ordered maps behind a `tokio` lock,
//!   with staged writes applied atomically on commit
//! - `UsageCopier` copying usages, names, vernacular names and distributions
//! - `NameMatcher` matching canonical names and ranks within a sector
//! - `NameParser` for uninomials, binomials and trinomials
//! - `SearchIndex`, `ImportMonitor` and `TreeSnapshots` that record calls
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_memory::{MemoryStore, RecordCopier, MemoryNameMatcher, SimpleNameParser};
//! use std::sync::Arc;
//!
//! let store = MemoryStore::new();
//! let copier = RecordCopier::new(Arc::new(store.clone()));
//! let matcher = MemoryNameMatcher::new(store.clone());
//! // hand them to AssemblyConfig::builder()
//! ```

mod copier;
mod matcher;
mod parser;
mod services;
mod store;

pub use copier::RecordCopier;
pub use matcher::MemoryNameMatcher;
pub use parser::SimpleNameParser;
pub use services::{RecordingSearchIndex, RecordingSnapshots, StaticImportMonitor};
pub use store::{BatchHook, MemoryStore, MemoryUnitOfWork};
