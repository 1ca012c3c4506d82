//! Reference translation during a sector copy.
//!
//! Source references are resolved to catalogue references of the same
//! sector. Bibliographically identical references, i.e. with equal
//! normalized citations, collapse into one catalogue record.

use async_trait::async_trait;
use bridge_traits::{CatalogueStore, ReferenceLookup, UnitOfWork};
use core_model::{new_record_id, DatasetKey, Reference, SectorKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Run scoped reference cache and lookup
pub struct ReferenceResolver {
    store: Arc<dyn CatalogueStore>,
    uow: Arc<dyn UnitOfWork>,
    source_key: DatasetKey,
    catalogue_key: DatasetKey,
    sector_key: SectorKey,
    /// Catalogue reference id by reference id, `None` for references missing in the source
    ids: HashMap<String, Option<String>>,
}

impl ReferenceResolver {
    pub fn new(
        store: Arc<dyn CatalogueStore>,
        uow: Arc<dyn UnitOfWork>,
        source_key: DatasetKey,
        catalogue_key: DatasetKey,
        sector_key: SectorKey,
    ) -> Self {
        Self {
            store,
            uow,
            source_key,
            catalogue_key,
            sector_key,
            ids: HashMap::new(),
        }
    }

    /// Number of distinct reference ids seen so far
    pub fn cached(&self) -> usize {
        self.ids.len()
    }
}

#[async_trait]
impl ReferenceLookup for ReferenceResolver {
    async fn by_id(&mut self, reference_id: &str) -> bridge_traits::Result<Option<String>> {
        if let Some(known) = self.ids.get(reference_id) {
            return Ok(known.clone());
        }
        match self.store.get_reference(self.source_key, reference_id).await? {
            Some(reference) => self.by_reference(reference).await.map(Some),
            None => {
                warn!(
                    "Reference {} is missing in source dataset {}",
                    reference_id, self.source_key
                );
                self.ids.insert(reference_id.to_string(), None);
                Ok(None)
            }
        }
    }

    async fn by_reference(&mut self, mut reference: Reference) -> bridge_traits::Result<String> {
        if let Some(Some(known)) = self.ids.get(&reference.id) {
            return Ok(known.clone());
        }
        let original_id = reference.id.clone();
        let normalized = reference.normalized_citation();
        let matches = self
            .uow
            .find_references(self.catalogue_key, self.sector_key, &normalized)
            .await?;

        let new_id = match matches.first() {
            Some(existing) => {
                if matches.len() > 1 {
                    warn!(
                        "{} references in sector {} match citation {}. Use first {}",
                        matches.len(),
                        self.sector_key,
                        reference.citation,
                        existing.id
                    );
                }
                existing.id.clone()
            }
            None => {
                reference.id = new_record_id();
                reference.dataset_key = self.catalogue_key;
                reference.sector_key = Some(self.sector_key);
                let id = reference.id.clone();
                self.uow.create_reference(reference).await?;
                debug!("Copied reference {} as {}", original_id, id);
                id
            }
        };
        self.ids.insert(original_id, Some(new_id.clone()));
        self.ids.insert(new_id.clone(), Some(new_id.clone()));
        Ok(new_id)
    }
}
