//! Name usages: taxa and synonyms placed in a classification tree.

use crate::error::{ModelError, Result};
use crate::keys::{DatasetKey, SectorKey};
use crate::name::Name;
use crate::sector::SimpleName;
use crate::vocab::{Issue, Lifezone, Origin, Rank, TaxonomicStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Properties shared by taxa and synonyms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBase {
    pub id: String,
    pub dataset_key: DatasetKey,
    pub sector_key: Option<SectorKey>,
    /// Parent taxon for taxa, accepted taxon for synonyms
    pub parent_id: Option<String>,
    pub name: Name,
    pub status: TaxonomicStatus,
    pub origin: Origin,
    pub according_to_id: Option<String>,
    pub reference_ids: Vec<String>,
    pub issues: BTreeSet<Issue>,
    pub remarks: Option<String>,
}

impl UsageBase {
    fn new(
        id: impl Into<String>,
        dataset_key: DatasetKey,
        name: Name,
        parent_id: Option<String>,
        status: TaxonomicStatus,
    ) -> Self {
        Self {
            id: id.into(),
            dataset_key,
            sector_key: None,
            parent_id,
            name,
            status,
            origin: Origin::Source,
            according_to_id: None,
            reference_ids: Vec::new(),
            issues: BTreeSet::new(),
            remarks: None,
        }
    }
}

/// An accepted (or provisionally accepted) usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    #[serde(flatten)]
    pub base: UsageBase,
    pub extinct: Option<bool>,
    pub lifezones: BTreeSet<Lifezone>,
}

impl Taxon {
    pub fn new(
        id: impl Into<String>,
        dataset_key: DatasetKey,
        name: Name,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            base: UsageBase::new(id, dataset_key, name, parent_id, TaxonomicStatus::Accepted),
            extinct: None,
            lifezones: BTreeSet::new(),
        }
    }
}

/// A synonym pointing to its accepted taxon through `parent_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    #[serde(flatten)]
    pub base: UsageBase,
}

impl Synonym {
    pub fn new(
        id: impl Into<String>,
        dataset_key: DatasetKey,
        name: Name,
        accepted_id: impl Into<String>,
    ) -> Self {
        Self {
            base: UsageBase::new(
                id,
                dataset_key,
                name,
                Some(accepted_id.into()),
                TaxonomicStatus::Synonym,
            ),
        }
    }
}

/// A node of a classification: either a taxon or a synonym
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NameUsage {
    Taxon(Taxon),
    Synonym(Synonym),
}

impl NameUsage {
    pub fn base(&self) -> &UsageBase {
        match self {
            NameUsage::Taxon(t) => &t.base,
            NameUsage::Synonym(s) => &s.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut UsageBase {
        match self {
            NameUsage::Taxon(t) => &mut t.base,
            NameUsage::Synonym(s) => &mut s.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.base().parent_id.as_deref()
    }

    pub fn name(&self) -> &Name {
        &self.base().name
    }

    pub fn name_mut(&mut self) -> &mut Name {
        &mut self.base_mut().name
    }

    pub fn rank(&self) -> Rank {
        self.base().name.rank
    }

    pub fn status(&self) -> TaxonomicStatus {
        self.base().status
    }

    pub fn sector_key(&self) -> Option<SectorKey> {
        self.base().sector_key
    }

    pub fn is_taxon(&self) -> bool {
        matches!(self, NameUsage::Taxon(_))
    }

    pub fn as_taxon_mut(&mut self) -> Option<&mut Taxon> {
        match self {
            NameUsage::Taxon(t) => Some(t),
            NameUsage::Synonym(_) => None,
        }
    }

    /// Change the taxonomic status.
    ///
    /// # Errors
    ///
    /// Returns an error if the status does not fit the usage variant, e.g. a
    /// synonym status on a taxon.
    pub fn set_status(&mut self, status: TaxonomicStatus) -> Result<()> {
        let fits = match self {
            NameUsage::Taxon(_) => !status.is_synonym(),
            NameUsage::Synonym(_) => status.is_synonym(),
        };
        if !fits {
            return Err(ModelError::IncompatibleStatus {
                usage: format!("{} {}", self.rank(), self.name().label()),
                status: status.to_string(),
            });
        }
        self.base_mut().status = status;
        Ok(())
    }

    /// Minimal projection used for sector subjects/targets and name matching
    pub fn to_simple_name(&self) -> SimpleName {
        let name = self.name();
        SimpleName {
            id: Some(self.id().to_string()),
            name: name.scientific_name.clone(),
            authorship: name.authorship.clone(),
            rank: name.rank,
            code: name.code,
            status: Some(self.status()),
        }
    }
}

impl From<Taxon> for NameUsage {
    fn from(t: Taxon) -> Self {
        NameUsage::Taxon(t)
    }
}

impl From<Synonym> for NameUsage {
    fn from(s: Synonym) -> Self {
        NameUsage::Synonym(s)
    }
}
