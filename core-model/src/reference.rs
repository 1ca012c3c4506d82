//! Bibliographic references and other entities owned by a usage.

use crate::keys::{DatasetKey, SectorKey};
use crate::vocab::Lifezone;
use serde::{Deserialize, Serialize};

/// A bibliographic reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub dataset_key: DatasetKey,
    pub sector_key: Option<SectorKey>,
    pub citation: String,
    pub year: Option<i32>,
}

impl Reference {
    pub fn new(id: impl Into<String>, dataset_key: DatasetKey, citation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dataset_key,
            sector_key: None,
            citation: citation.into(),
            year: None,
        }
    }

    /// Citation lowercased with whitespace collapsed and trailing dots removed.
    ///
    /// Two references with equal normalized citations are bibliographically identical.
    pub fn normalized_citation(&self) -> String {
        normalize_citation(&self.citation)
    }
}

pub fn normalize_citation(citation: &str) -> String {
    let collapsed = citation
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.trim_end_matches('.').trim_end().to_string()
}

/// A common name of a taxon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VernacularName {
    pub id: String,
    pub dataset_key: DatasetKey,
    pub sector_key: Option<SectorKey>,
    pub taxon_id: String,
    pub name: String,
    pub language: Option<String>,
    pub reference_id: Option<String>,
}

/// An area a taxon occurs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: String,
    pub dataset_key: DatasetKey,
    pub sector_key: Option<SectorKey>,
    pub taxon_id: String,
    pub area: String,
    pub lifezone: Option<Lifezone>,
    pub reference_id: Option<String>,
}
