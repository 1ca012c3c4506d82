//! Record copy routine
//!
//! Duplicates a source usage, its name and the entities it owns into the
//! parent's dataset, assigning fresh ids and translating every reference id
//! through the supplied [`ReferenceLookup`].

use async_trait::async_trait;
use bridge_traits::{
    copy::{CopiedUsage, ReferenceLookup, UsageCopier},
    error::Result,
    store::{CatalogueStore, UnitOfWork},
};
use core_model::{new_record_id, DatasetScopedId, EntityType, Issue, NameUsage};
use std::sync::Arc;
use tracing::trace;

/// Copier reading owned entities from any [`CatalogueStore`]
pub struct RecordCopier {
    store: Arc<dyn CatalogueStore>,
}

impl RecordCopier {
    pub fn new(store: Arc<dyn CatalogueStore>) -> Self {
        Self { store }
    }

    /// Translate an optional reference id, flagging ids the lookup cannot resolve
    async fn translate(
        references: &mut dyn ReferenceLookup,
        id: Option<String>,
        invalid: &mut bool,
    ) -> Result<Option<String>> {
        let Some(id) = id else {
            return Ok(None);
        };
        let translated = references.by_id(&id).await?;
        if translated.is_none() {
            *invalid = true;
        }
        Ok(translated)
    }
}

#[async_trait]
impl UsageCopier for RecordCopier {
    async fn copy_usage(
        &self,
        uow: &dyn UnitOfWork,
        mut usage: NameUsage,
        parent: &DatasetScopedId,
        entities: &[EntityType],
        references: &mut dyn ReferenceLookup,
    ) -> Result<CopiedUsage> {
        let source_key = usage.base().dataset_key;
        let original_id = usage.id().to_string();
        let new_id = new_record_id();
        let copy_refs = entities.contains(&EntityType::Reference);
        let mut invalid_ref = false;

        let base = usage.base_mut();
        let sector_key = base.sector_key;
        base.id = new_id.clone();
        base.dataset_key = parent.dataset_key;
        base.parent_id = Some(parent.id.clone());
        base.name.id = new_record_id();
        base.name.dataset_key = parent.dataset_key;
        base.name.sector_key = sector_key;

        if copy_refs {
            base.according_to_id =
                Self::translate(references, base.according_to_id.take(), &mut invalid_ref).await?;
            base.name.published_in_id =
                Self::translate(references, base.name.published_in_id.take(), &mut invalid_ref)
                    .await?;
            let mut ids = Vec::with_capacity(base.reference_ids.len());
            for id in std::mem::take(&mut base.reference_ids) {
                if let Some(id) = Self::translate(references, Some(id), &mut invalid_ref).await? {
                    ids.push(id);
                }
            }
            base.reference_ids = ids;
        } else {
            base.according_to_id = None;
            base.name.published_in_id = None;
            base.reference_ids.clear();
        }
        if invalid_ref {
            base.issues.insert(Issue::ReferenceIdInvalid);
        }

        uow.create_name(base.name.clone()).await?;
        let is_taxon = usage.is_taxon();
        uow.create_usage(usage).await?;

        if is_taxon && entities.contains(&EntityType::Vernacular) {
            for mut v in self.store.vernaculars(source_key, &original_id).await? {
                v.id = new_record_id();
                v.dataset_key = parent.dataset_key;
                v.sector_key = sector_key;
                v.taxon_id = new_id.clone();
                v.reference_id = if copy_refs {
                    Self::translate(references, v.reference_id.take(), &mut invalid_ref).await?
                } else {
                    None
                };
                uow.create_vernacular(v).await?;
            }
        }
        if is_taxon && entities.contains(&EntityType::Distribution) {
            for mut d in self.store.distributions(source_key, &original_id).await? {
                d.id = new_record_id();
                d.dataset_key = parent.dataset_key;
                d.sector_key = sector_key;
                d.taxon_id = new_id.clone();
                d.reference_id = if copy_refs {
                    Self::translate(references, d.reference_id.take(), &mut invalid_ref).await?
                } else {
                    None
                };
                uow.create_distribution(d).await?;
            }
        }

        trace!(from = %original_id, to = %new_id, parent = %parent, "Copied usage");
        Ok(CopiedUsage {
            original_id,
            new_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use core_model::{DatasetKey, Name, Rank, Reference, SectorKey, Taxon, VernacularName};
    use std::collections::HashMap;

    struct MapLookup(HashMap<String, String>);

    #[async_trait]
    impl ReferenceLookup for MapLookup {
        async fn by_id(&mut self, reference_id: &str) -> Result<Option<String>> {
            Ok(self.0.get(reference_id).cloned())
        }

        async fn by_reference(&mut self, reference: Reference) -> Result<String> {
            Ok(reference.id)
        }
    }

    #[tokio::test]
    async fn test_copy_assigns_new_ids_and_translates_references() {
        let store = MemoryStore::new();
        let src = DatasetKey(100);
        let mut taxon = Taxon::new("t1", src, Name::new("n1", src, "Abies", Rank::Genus), None);
        taxon.base.sector_key = Some(SectorKey(1));
        taxon.base.reference_ids = vec!["r1".into(), "r-missing".into()];
        store
            .add_vernacular(VernacularName {
                id: "v1".into(),
                dataset_key: src,
                sector_key: None,
                taxon_id: "t1".into(),
                name: "Fir".into(),
                language: Some("eng".into()),
                reference_id: Some("r1".into()),
            })
            .await;

        let copier = RecordCopier::new(Arc::new(store.clone()));
        let uow = store.begin().await.unwrap();
        let mut lookup = MapLookup(HashMap::from([("r1".to_string(), "cat-r1".to_string())]));
        let copied = copier
            .copy_usage(
                uow.as_ref(),
                taxon.into(),
                &DatasetScopedId::new(DatasetKey(3), "target"),
                &[EntityType::Reference, EntityType::Vernacular],
                &mut lookup,
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();

        assert_eq!(copied.original_id, "t1");
        let copy = store.get_usage(DatasetKey(3), &copied.new_id).await.unwrap().unwrap();
        assert_eq!(copy.parent_id(), Some("target"));
        assert_eq!(copy.base().reference_ids, vec!["cat-r1".to_string()]);
        assert!(copy.base().issues.contains(&Issue::ReferenceIdInvalid));
        assert_eq!(copy.name().sector_key, Some(SectorKey(1)));

        let vernaculars = store.vernacular_names(DatasetKey(3)).await;
        assert_eq!(vernaculars.len(), 1);
        assert_eq!(vernaculars[0].taxon_id, copied.new_id);
        assert_eq!(vernaculars[0].reference_id.as_deref(), Some("cat-r1"));
    }
}
