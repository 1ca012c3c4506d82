//! Name matching against the catalogue content of a sector.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    names::NameMatcher,
    store::CatalogueStore,
};
use core_model::{NameUsage, Rank, SectorKey, SimpleName};

use crate::store::MemoryStore;

/// Matches by canonical name and rank, ignoring case.
///
/// Authorships are compared only when both sides carry one. Accepted
/// usages are returned before synonyms.
pub struct MemoryNameMatcher {
    store: MemoryStore,
}

impl MemoryNameMatcher {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    fn matches(usage: &NameUsage, name: &SimpleName) -> bool {
        let candidate = usage.name();
        if !candidate.scientific_name.eq_ignore_ascii_case(name.name.trim()) {
            return false;
        }
        if name.rank != Rank::Unranked && candidate.rank != Rank::Unranked && candidate.rank != name.rank {
            return false;
        }
        match (candidate.authorship.as_deref(), name.authorship.as_deref()) {
            (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
            _ => true,
        }
    }
}

#[async_trait]
impl NameMatcher for MemoryNameMatcher {
    async fn match_sector(&self, name: &SimpleName, sector_key: SectorKey) -> Result<Vec<SimpleName>> {
        let sector = self
            .store
            .get_sector(sector_key)
            .await?
            .ok_or_else(|| BridgeError::not_found("Sector", sector_key))?;
        let mut candidates: Vec<NameUsage> = self
            .store
            .usages_of_sector(sector.dataset_key, sector_key)
            .await
            .into_iter()
            .filter(|u| Self::matches(u, name))
            .collect();
        candidates.sort_by(|a, b| {
            b.is_taxon()
                .cmp(&a.is_taxon())
                .then_with(|| a.status().cmp(&b.status()))
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(candidates.iter().map(NameUsage::to_simple_name).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{DatasetKey, Name, Sector, SectorMode, Taxon};

    async fn store_with(names: &[(&str, &str, Rank)]) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_sector(Sector {
                key: SectorKey(1),
                dataset_key: DatasetKey(3),
                subject_dataset_key: DatasetKey(100),
                subject: SimpleName::new("root", "Pinaceae", Rank::Family),
                target: None,
                mode: SectorMode::Attach,
                code: None,
                note: None,
            })
            .await;
        for (id, sciname, rank) in names {
            let mut t = Taxon::new(*id, DatasetKey(3), Name::new(*id, DatasetKey(3), *sciname, *rank), None);
            t.base.sector_key = Some(SectorKey(1));
            store.add_usage(t).await;
        }
        store
    }

    #[tokio::test]
    async fn test_match_by_name_and_rank() {
        let store = store_with(&[("a", "Abies", Rank::Genus), ("b", "Abies", Rank::Subgenus)]).await;
        let matcher = MemoryNameMatcher::new(store);
        let found = matcher
            .match_sector(&SimpleName::new("x", "abies", Rank::Genus), SectorKey(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_unranked_matches_any_rank() {
        let store = store_with(&[("a", "Abies", Rank::Genus), ("b", "Abies", Rank::Subgenus)]).await;
        let matcher = MemoryNameMatcher::new(store);
        let found = matcher
            .match_sector(&SimpleName::new("x", "Abies", Rank::Unranked), SectorKey(1))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_sector_fails() {
        let matcher = MemoryNameMatcher::new(MemoryStore::new());
        let err = matcher
            .match_sector(&SimpleName::new("x", "Abies", Rank::Genus), SectorKey(9))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { .. }));
    }
}
