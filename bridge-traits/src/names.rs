//! Name Matching and Parsing
//!
//! Provides the name lookups used to relink catalogue content after a sector
//! was rebuilt, and the scientific name parser used when curators replace a name.

use async_trait::async_trait;
use core_model::{Name, NomCode, ParsedAuthorship, Rank, SectorKey, SimpleName};

use crate::error::Result;

/// Finds catalogue usages of a sector by name
#[async_trait]
pub trait NameMatcher: Send + Sync {
    /// Usages of the sector matching the given name, best candidates first
    async fn match_sector(&self, name: &SimpleName, sector_key: SectorKey)
        -> Result<Vec<SimpleName>>;
}

/// Scientific name parser.
///
/// Parsing is CPU bound and synchronous.
pub trait NameParser: Send + Sync {
    /// Parse a full scientific name. Returns `None` if the text is unparsable.
    fn parse(&self, text: &str, rank: Rank, code: Option<NomCode>) -> Option<Name>;

    /// Parse a bare authorship string
    fn parse_authorship(&self, authorship: &str) -> Option<ParsedAuthorship>;
}
