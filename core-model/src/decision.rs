//! Curator overrides applied to single source nodes during assembly.

use crate::keys::DatasetKey;
use crate::sector::SimpleName;
use crate::vocab::{Lifezone, NameType, NomCode, NomStatus, Rank, TaxonomicStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMode {
    /// Exclude the node and its whole subtree
    Block,
    /// Override selected properties of the node
    Update,
    /// Curator has looked at the node, nothing changes
    Reviewed,
}

impl DecisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionMode::Block => "block",
            DecisionMode::Update => "update",
            DecisionMode::Reviewed => "reviewed",
        }
    }
}

/// Name properties to override. Unset fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameOverride {
    /// Full replacement name, reparsed when set
    pub scientific_name: Option<String>,
    pub authorship: Option<String>,
    pub rank: Option<Rank>,
    pub code: Option<NomCode>,
    pub nom_status: Option<NomStatus>,
    pub name_type: Option<NameType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorialDecision {
    pub key: i32,
    /// The catalogue the decision belongs to
    pub dataset_key: DatasetKey,
    pub subject_dataset_key: DatasetKey,
    pub subject: SimpleName,
    pub mode: DecisionMode,
    pub name: Option<NameOverride>,
    pub status: Option<TaxonomicStatus>,
    pub extinct: Option<bool>,
    pub lifezones: Option<BTreeSet<Lifezone>>,
    pub note: Option<String>,
}

impl EditorialDecision {
    pub fn new(
        key: i32,
        dataset_key: DatasetKey,
        subject_dataset_key: DatasetKey,
        subject: SimpleName,
        mode: DecisionMode,
    ) -> Self {
        Self {
            key,
            dataset_key,
            subject_dataset_key,
            subject,
            mode,
            name: None,
            status: None,
            extinct: None,
            lifezones: None,
            note: None,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        self.subject.id.as_deref()
    }
}
