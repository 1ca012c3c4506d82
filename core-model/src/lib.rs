//! # Catalogue Domain Model
//!
//! Shared domain types for assembling a master taxonomic catalogue out of
//! independently maintained source checklists.
//!
//! ## Overview
//!
//! - **Keys** (`keys`): dataset, sector and user keys plus dataset scoped ids
//! - **Vocabularies** (`vocab`): ranks, nomenclatural codes, name types, statuses
//! - **Names & usages** (`name`, `usage`): parsed scientific names and the
//!   taxon/synonym nodes that place them in a tree
//! - **Bibliography** (`reference`): references, vernacular names, distributions
//! - **Sectors & decisions** (`sector`, `decision`): subtree mappings from a source
//!   dataset into the catalogue and per-node curator overrides
//! - **Sync attempts** (`attempt`): the audit record of one sector job run

pub mod attempt;
pub mod decision;
pub mod error;
pub mod keys;
pub mod name;
pub mod reference;
pub mod sector;
pub mod usage;
pub mod vocab;

pub use attempt::{ImportState, JobKind, SectorMetrics, SyncAttempt};
pub use decision::{DecisionMode, EditorialDecision, NameOverride};
pub use error::{ModelError, Result};
pub use keys::{DatasetKey, DatasetScopedId, SectorKey, User, UserKey};
pub use name::{Authorship, Name, ParsedAuthorship};
pub use reference::{Distribution, Reference, VernacularName};
pub use sector::{Sector, SectorMode, SimpleName};
pub use usage::{NameUsage, Synonym, Taxon, UsageBase};
pub use vocab::{
    EntityType, Issue, Lifezone, NameType, NomCode, NomStatus, Origin, Rank, TaxonomicStatus,
};

/// Generate a fresh record identifier for newly created catalogue records.
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
