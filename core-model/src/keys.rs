//! Key types shared across the catalogue and its source datasets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a dataset, either a source checklist or the assembled catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetKey(pub i32);

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for DatasetKey {
    fn from(key: i32) -> Self {
        Self(key)
    }
}

/// Key of a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorKey(pub i32);

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SectorKey {
    fn from(key: i32) -> Self {
        Self(key)
    }
}

/// Key of a registered user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(pub i32);

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user triggering a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub key: UserKey,
    pub username: String,
}

impl User {
    pub fn new(key: i32, username: impl Into<String>) -> Self {
        Self {
            key: UserKey(key),
            username: username.into(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.key)
    }
}

/// A record id scoped to the dataset it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetScopedId {
    pub dataset_key: DatasetKey,
    pub id: String,
}

impl DatasetScopedId {
    pub fn new(dataset_key: DatasetKey, id: impl Into<String>) -> Self {
        Self {
            dataset_key,
            id: id.into(),
        }
    }
}

impl fmt::Display for DatasetScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dataset_key, self.id)
    }
}
