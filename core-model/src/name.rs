//! Scientific names, parsed into their atomic parts where possible.

use crate::keys::{DatasetKey, SectorKey};
use crate::vocab::{NameType, NomCode, NomStatus, Origin, Rank};
use serde::{Deserialize, Serialize};

/// Authors, ex authors and year of a name or combination
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Authorship {
    pub authors: Vec<String>,
    pub ex_authors: Vec<String>,
    pub year: Option<String>,
}

impl Authorship {
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty() && self.ex_authors.is_empty() && self.year.is_none()
    }

    /// Render as e.g. `Miller ex L., 1753`
    pub fn label(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut label = String::new();
        if !self.ex_authors.is_empty() {
            label.push_str(&self.ex_authors.join(" & "));
            label.push_str(" ex ");
        }
        label.push_str(&self.authors.join(" & "));
        if let Some(year) = &self.year {
            if !label.is_empty() {
                label.push_str(", ");
            }
            label.push_str(year);
        }
        Some(label)
    }
}

/// Authorship parts produced by parsing a bare authorship string
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedAuthorship {
    pub combination: Authorship,
    pub basionym: Authorship,
    pub sanctioning_author: Option<String>,
}

/// A scientific name with its parsed parts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Name {
    pub id: String,
    pub dataset_key: DatasetKey,
    pub sector_key: Option<SectorKey>,
    pub scientific_name: String,
    pub authorship: Option<String>,
    pub rank: Rank,
    pub code: Option<NomCode>,
    pub name_type: NameType,
    pub nom_status: Option<NomStatus>,
    pub uninomial: Option<String>,
    pub genus: Option<String>,
    pub infrageneric_epithet: Option<String>,
    pub specific_epithet: Option<String>,
    pub infraspecific_epithet: Option<String>,
    pub cultivar_epithet: Option<String>,
    pub candidatus: bool,
    pub combination_authorship: Authorship,
    pub basionym_authorship: Authorship,
    pub sanctioning_author: Option<String>,
    pub appended_phrase: Option<String>,
    pub origin: Origin,
    pub published_in_id: Option<String>,
}

impl Name {
    /// Create an unparsed name carrying only its full text and rank
    pub fn new(
        id: impl Into<String>,
        dataset_key: DatasetKey,
        scientific_name: impl Into<String>,
        rank: Rank,
    ) -> Self {
        Self {
            id: id.into(),
            dataset_key,
            scientific_name: scientific_name.into(),
            rank,
            ..Default::default()
        }
    }

    /// Whether any atomic name part is known
    pub fn is_parsed(&self) -> bool {
        self.uninomial.is_some()
            || self.genus.is_some()
            || self.infrageneric_epithet.is_some()
            || self.specific_epithet.is_some()
            || self.infraspecific_epithet.is_some()
    }

    /// True for parsed names lacking the epithet their rank requires,
    /// e.g. `Abies sp.` at species rank.
    ///
    /// Unparsed names are never considered indeterminate.
    pub fn is_indetermined(&self) -> bool {
        if !self.is_parsed() {
            return false;
        }
        if self.rank.is_infrageneric_strictly()
            && self.uninomial.is_none()
            && self.infrageneric_epithet.is_none()
            && self.specific_epithet.is_none()
        {
            return true;
        }
        if self.rank.is_species_or_below()
            && !self.rank.is_cultivar_rank()
            && self.specific_epithet.is_none()
        {
            return true;
        }
        self.rank.is_infraspecific()
            && !self.rank.is_cultivar_rank()
            && self.infraspecific_epithet.is_none()
    }

    /// Rebuild `scientific_name` from the parsed parts.
    ///
    /// Leaves the name untouched when it is not parsed.
    pub fn update_name_cache(&mut self) {
        if !self.is_parsed() {
            return;
        }
        let mut parts: Vec<String> = Vec::new();
        if self.candidatus {
            parts.push("Candidatus".to_string());
        }
        if let Some(uninomial) = &self.uninomial {
            parts.push(uninomial.clone());
        } else {
            if let Some(genus) = &self.genus {
                parts.push(genus.clone());
            }
            if let Some(infrageneric) = &self.infrageneric_epithet {
                parts.push(format!("({})", infrageneric));
            }
            if let Some(specific) = &self.specific_epithet {
                parts.push(specific.clone());
            }
            if let Some(infraspecific) = &self.infraspecific_epithet {
                if self.code != Some(NomCode::Zoological) {
                    if let Some(marker) = self.rank.marker() {
                        parts.push(marker.to_string());
                    }
                }
                parts.push(infraspecific.clone());
            }
        }
        if let Some(cultivar) = &self.cultivar_epithet {
            parts.push(format!("'{}'", cultivar));
        }
        self.scientific_name = parts.join(" ");
    }

    /// Scientific name followed by its authorship, if any
    pub fn label(&self) -> String {
        match self.authorship.as_deref().map(str::trim) {
            Some(authorship) if !authorship.is_empty() => {
                format!("{} {}", self.scientific_name, authorship)
            }
            _ => self.scientific_name.clone(),
        }
    }

    /// Replace all pure name properties with those of `other`.
    ///
    /// Keys, provenance and status are kept.
    pub fn copy_name_parts(&mut self, other: &Name) {
        self.scientific_name = other.scientific_name.clone();
        self.authorship = other.authorship.clone();
        self.name_type = other.name_type;
        self.rank = other.rank;
        self.uninomial = other.uninomial.clone();
        self.genus = other.genus.clone();
        self.infrageneric_epithet = other.infrageneric_epithet.clone();
        self.specific_epithet = other.specific_epithet.clone();
        self.infraspecific_epithet = other.infraspecific_epithet.clone();
        self.cultivar_epithet = other.cultivar_epithet.clone();
        self.candidatus = other.candidatus;
        self.combination_authorship = other.combination_authorship.clone();
        self.basionym_authorship = other.basionym_authorship.clone();
        self.sanctioning_author = other.sanctioning_author.clone();
        self.appended_phrase = other.appended_phrase.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(genus: &str, epithet: Option<&str>) -> Name {
        let mut n = Name::new("n1", DatasetKey(1), "", Rank::Species);
        n.genus = Some(genus.to_string());
        n.specific_epithet = epithet.map(str::to_string);
        n.update_name_cache();
        n
    }

    #[test]
    fn test_name_cache_for_binomial() {
        let n = species("Abies", Some("alba"));
        assert_eq!(n.scientific_name, "Abies alba");
        assert!(n.is_parsed());
        assert!(!n.is_indetermined());
    }

    #[test]
    fn test_indetermined_species() {
        let n = species("Abies", None);
        assert!(n.is_indetermined());
    }

    #[test]
    fn test_unparsed_name_is_not_indetermined() {
        let n = Name::new("n1", DatasetKey(1), "Abies sp.", Rank::Species);
        assert!(!n.is_parsed());
        assert!(!n.is_indetermined());
    }

    #[test]
    fn test_infraspecific_marker() {
        let mut n = species("Abies", Some("alba"));
        n.rank = Rank::Variety;
        n.infraspecific_epithet = Some("nana".to_string());
        n.update_name_cache();
        assert_eq!(n.scientific_name, "Abies alba var. nana");

        n.code = Some(NomCode::Zoological);
        n.rank = Rank::Subspecies;
        n.update_name_cache();
        assert_eq!(n.scientific_name, "Abies alba nana");
    }

    #[test]
    fn test_subgenus_in_name_cache() {
        let mut n = species("Aus", Some("bus"));
        n.infrageneric_epithet = Some("Cus".to_string());
        n.update_name_cache();
        assert_eq!(n.scientific_name, "Aus (Cus) bus");
    }

    #[test]
    fn test_label_with_authorship() {
        let mut n = species("Abies", Some("alba"));
        n.authorship = Some("Mill.".to_string());
        assert_eq!(n.label(), "Abies alba Mill.");
        n.authorship = Some("  ".to_string());
        assert_eq!(n.label(), "Abies alba");
    }

    #[test]
    fn test_authorship_label() {
        let a = Authorship {
            authors: vec!["L.".to_string()],
            ex_authors: vec!["Miller".to_string()],
            year: Some("1753".to_string()),
        };
        assert_eq!(a.label().unwrap(), "Miller ex L., 1753");
        assert!(Authorship::default().label().is_none());
    }
}
