//! Record Copy Abstraction
//!
//! Physically duplicates a source usage with its name and owned entities into
//! the catalogue. Reference ids found on the copied records are translated
//! through a caller supplied [`ReferenceLookup`], which decides whether an
//! existing catalogue reference is reused or a new one is created.

use async_trait::async_trait;
use core_model::{DatasetScopedId, EntityType, NameUsage, Reference};

use crate::error::Result;
use crate::store::UnitOfWork;

/// Ids of a copied usage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopiedUsage {
    pub original_id: String,
    pub new_id: String,
}

/// Translates source references into catalogue references during a copy
#[async_trait]
pub trait ReferenceLookup: Send {
    /// Catalogue reference id for a source reference id, if the source
    /// reference exists
    async fn by_id(&mut self, reference_id: &str) -> Result<Option<String>>;

    /// Catalogue reference id for a full source reference
    async fn by_reference(&mut self, reference: Reference) -> Result<String>;
}

#[async_trait]
pub trait UsageCopier: Send + Sync {
    /// Copy `usage` below `parent` in the parent's dataset.
    ///
    /// The usage keeps its sector key and nomenclatural code. New ids are
    /// assigned to the usage, its name and every copied entity listed in
    /// `entities`.
    async fn copy_usage(
        &self,
        uow: &dyn UnitOfWork,
        usage: NameUsage,
        parent: &DatasetScopedId,
        entities: &[EntityType],
        references: &mut dyn ReferenceLookup,
    ) -> Result<CopiedUsage>;
}
