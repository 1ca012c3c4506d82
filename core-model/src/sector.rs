//! Sectors map a subtree of a source dataset into the catalogue.

use crate::keys::{DatasetKey, SectorKey};
use crate::vocab::{NomCode, Rank, TaxonomicStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Minimal name reference used for sector subjects and targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleName {
    pub id: Option<String>,
    pub name: String,
    pub authorship: Option<String>,
    pub rank: Rank,
    pub code: Option<NomCode>,
    pub status: Option<TaxonomicStatus>,
}

impl SimpleName {
    pub fn new(id: impl Into<String>, name: impl Into<String>, rank: Rank) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
            authorship: None,
            rank,
            code: None,
            status: None,
        }
    }
}

impl fmt::Display for SimpleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.rank, self.name)?;
        if let Some(authorship) = &self.authorship {
            write!(f, " {}", authorship)?;
        }
        if let Some(id) = &self.id {
            write!(f, " [{}]", id)?;
        }
        Ok(())
    }
}

/// How a sector subject is attached to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorMode {
    /// The subject itself is copied below the target
    #[default]
    Attach,
    /// Only the subject's descendants are copied, directly below the target
    Union,
    Merge,
}

impl SectorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectorMode::Attach => "attach",
            SectorMode::Union => "union",
            SectorMode::Merge => "merge",
        }
    }
}

impl fmt::Display for SectorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub key: SectorKey,
    /// The catalogue the sector assembles into
    pub dataset_key: DatasetKey,
    pub subject_dataset_key: DatasetKey,
    pub subject: SimpleName,
    pub target: Option<SimpleName>,
    pub mode: SectorMode,
    /// Nomenclatural code stamped on every copied name
    pub code: Option<NomCode>,
    pub note: Option<String>,
}

impl Sector {
    pub fn subject_id(&self) -> Option<&str> {
        self.subject.id.as_deref()
    }

    pub fn target_id(&self) -> Option<&str> {
        self.target.as_ref().and_then(|t| t.id.as_deref())
    }

    /// Deterministic processing order: by target id, sectors without a
    /// target id last, ties broken by sector key.
    pub fn target_order(a: &Sector, b: &Sector) -> Ordering {
        match (a.target_id(), b.target_id()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then(a.key.cmp(&b.key))
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sector {} ({})", self.key, self.subject.name)
    }
}
