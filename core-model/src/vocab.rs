//! Controlled vocabularies used by names, usages and sectors.
//!
//! Every vocabulary is a closed enum with a lowercase string form used for
//! persistence and parsing. Declaration order is meaningful for [`Rank`]:
//! earlier variants are higher ranks.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// All values in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Get the string representation for storage
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self> {
                let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
                $(
                    if normalized == $label {
                        return Ok($name::$variant);
                    }
                )+
                Err(ModelError::InvalidValue {
                    field: stringify!($name).to_string(),
                    value: s.to_string(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Taxonomic rank, ordered from highest to lowest
    Rank {
        Domain => "domain",
        Kingdom => "kingdom",
        Phylum => "phylum",
        Class => "class",
        Order => "order",
        Superfamily => "superfamily",
        Family => "family",
        Subfamily => "subfamily",
        Tribe => "tribe",
        Genus => "genus",
        Subgenus => "subgenus",
        Section => "section",
        Series => "series",
        Species => "species",
        Subspecies => "subspecies",
        Variety => "variety",
        Subvariety => "subvariety",
        Form => "form",
        CultivarGroup => "cultivar_group",
        Cultivar => "cultivar",
        /// Rank unknown or deliberately left open. Never higher than anything.
        Unranked => "unranked",
    }
}

impl Rank {
    /// True if this rank is strictly higher than `other`.
    ///
    /// `Unranked` is neither higher nor lower than any rank.
    pub fn higher_than(&self, other: Rank) -> bool {
        *self != Rank::Unranked && other != Rank::Unranked && *self < other
    }

    pub fn is_species_or_below(&self) -> bool {
        *self != Rank::Unranked && *self >= Rank::Species
    }

    pub fn is_infraspecific(&self) -> bool {
        *self != Rank::Unranked && *self > Rank::Species
    }

    /// Ranks between genus and species, exclusive
    pub fn is_infrageneric_strictly(&self) -> bool {
        *self > Rank::Genus && *self < Rank::Species
    }

    pub fn is_cultivar_rank(&self) -> bool {
        matches!(self, Rank::Cultivar | Rank::CultivarGroup)
    }

    /// Marker used in scientific names of infraspecific ranks, if any
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Rank::Subspecies => Some("subsp."),
            Rank::Variety => Some("var."),
            Rank::Subvariety => Some("subvar."),
            Rank::Form => Some("f."),
            _ => None,
        }
    }
}

impl Default for Rank {
    fn default() -> Self {
        Rank::Unranked
    }
}

vocabulary! {
    /// Nomenclatural code governing a name
    NomCode {
        Bacterial => "bacterial",
        Botanical => "botanical",
        Cultivars => "cultivars",
        Phytosociological => "phytosociological",
        Virus => "virus",
        Zoological => "zoological",
    }
}

vocabulary! {
    /// Structural type of a name
    NameType {
        Scientific => "scientific",
        Virus => "virus",
        HybridFormula => "hybrid_formula",
        Informal => "informal",
        Otu => "otu",
        Placeholder => "placeholder",
        NoName => "no_name",
    }
}

impl NameType {
    /// Whether names of this type are expected to be parsed into parts
    pub fn is_parsable(&self) -> bool {
        matches!(self, NameType::Scientific | NameType::Informal)
    }
}

impl Default for NameType {
    fn default() -> Self {
        NameType::Scientific
    }
}

vocabulary! {
    /// Nomenclatural status of a name
    NomStatus {
        Established => "established",
        NotEstablished => "not_established",
        Acceptable => "acceptable",
        Unacceptable => "unacceptable",
        Conserved => "conserved",
        Rejected => "rejected",
        Doubtful => "doubtful",
        Manuscript => "manuscript",
        /// A citation of a name by another author, not a name of its own
        Chresonym => "chresonym",
    }
}

vocabulary! {
    /// Taxonomic status of a usage
    TaxonomicStatus {
        Accepted => "accepted",
        ProvisionallyAccepted => "provisionally_accepted",
        Synonym => "synonym",
        AmbiguousSynonym => "ambiguous_synonym",
        Misapplied => "misapplied",
    }
}

impl TaxonomicStatus {
    pub fn is_synonym(&self) -> bool {
        matches!(
            self,
            TaxonomicStatus::Synonym | TaxonomicStatus::AmbiguousSynonym | TaxonomicStatus::Misapplied
        )
    }
}

vocabulary! {
    /// Where a catalogue record came from
    Origin {
        Source => "source",
        /// Synthesized intermediate rank inserted during assembly
        Implicit => "implicit",
        Other => "other",
    }
}

impl Default for Origin {
    fn default() -> Self {
        Origin::Source
    }
}

vocabulary! {
    /// Sub-entities that can be copied together with a usage
    EntityType {
        Reference => "reference",
        Vernacular => "vernacular",
        Distribution => "distribution",
        Media => "media",
        Description => "description",
    }
}

vocabulary! {
    /// Habitat tags of a taxon
    Lifezone {
        Brackish => "brackish",
        Freshwater => "freshwater",
        Marine => "marine",
        Terrestrial => "terrestrial",
    }
}

vocabulary! {
    /// Data quality flags attached to usages
    Issue {
        UnparsableName => "unparsable_name",
        InconsistentAuthorship => "inconsistent_authorship",
        ParentNameMismatch => "parent_name_mismatch",
        ReferenceIdInvalid => "reference_id_invalid",
        SynonymParentMissing => "synonym_parent_missing",
    }
}
