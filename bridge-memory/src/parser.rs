//! Minimal scientific name parser
//!
//! Handles uninomials, binomials and trinomials with optional rank markers
//! and a trailing authorship. Anything else is reported as unparsable.

use bridge_traits::names::NameParser;
use core_model::{Authorship, Name, NameType, NomCode, ParsedAuthorship, Rank};

#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleNameParser;

impl SimpleNameParser {
    pub fn new() -> Self {
        Self
    }

    fn is_monomial(word: &str) -> bool {
        let mut chars = word.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_lowercase() || c == '-')
    }

    fn is_epithet(word: &str) -> bool {
        !word.is_empty() && word.chars().all(|c| c.is_ascii_lowercase() || c == '-')
    }

    fn marker_rank(word: &str) -> Option<Rank> {
        match word {
            "subsp." | "ssp." => Some(Rank::Subspecies),
            "var." => Some(Rank::Variety),
            "subvar." => Some(Rank::Subvariety),
            "f." | "fo." | "forma" => Some(Rank::Form),
            _ => None,
        }
    }

    fn parse_authors(team: &str) -> Vec<String> {
        team.split(['&', ','])
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn parse_team(text: &str) -> Authorship {
        let text = text.trim();
        let (team, year) = match text.rsplit_once(',') {
            Some((team, year)) if year.trim().chars().all(|c| c.is_ascii_digit()) && !year.trim().is_empty() => {
                (team, Some(year.trim().to_string()))
            }
            _ => (text, None),
        };
        let (ex_authors, authors) = match team.split_once(" ex ") {
            Some((ex, authors)) => (Self::parse_authors(ex), Self::parse_authors(authors)),
            None => (Vec::new(), Self::parse_authors(team)),
        };
        Authorship {
            authors,
            ex_authors,
            year,
        }
    }
}

impl NameParser for SimpleNameParser {
    fn parse(&self, text: &str, rank: Rank, code: Option<NomCode>) -> Option<Name> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let first = *words.first()?;
        if !Self::is_monomial(first) {
            return None;
        }

        let mut name = Name {
            code,
            name_type: NameType::Scientific,
            ..Default::default()
        };
        let mut rest = &words[1..];
        let mut inferred = Rank::Unranked;

        match rest.first() {
            Some(&("sp." | "spec." | "spp.")) => {
                name.genus = Some(first.to_string());
                inferred = Rank::Species;
                rest = &rest[1..];
            }
            Some(word) if Self::is_epithet(word) => {
                name.genus = Some(first.to_string());
                name.specific_epithet = Some(word.to_string());
                inferred = Rank::Species;
                rest = &rest[1..];
                if let Some(marker) = rest.first().and_then(|w| Self::marker_rank(w)) {
                    let epithet = rest.get(1).filter(|w| Self::is_epithet(w))?;
                    name.infraspecific_epithet = Some(epithet.to_string());
                    inferred = marker;
                    rest = &rest[2..];
                } else if let Some(epithet) = rest.first().filter(|w| Self::is_epithet(w)) {
                    name.infraspecific_epithet = Some(epithet.to_string());
                    inferred = Rank::Subspecies;
                    rest = &rest[1..];
                }
            }
            _ => {
                name.uninomial = Some(first.to_string());
            }
        }

        name.rank = if rank == Rank::Unranked { inferred } else { rank };
        if !rest.is_empty() {
            let authorship = rest.join(" ");
            if let Some(parsed) = self.parse_authorship(&authorship) {
                name.combination_authorship = parsed.combination;
                name.basionym_authorship = parsed.basionym;
                name.sanctioning_author = parsed.sanctioning_author;
            }
            name.authorship = Some(authorship);
        }
        name.update_name_cache();
        Some(name)
    }

    fn parse_authorship(&self, authorship: &str) -> Option<ParsedAuthorship> {
        let text = authorship.trim();
        if text.is_empty() {
            return None;
        }
        let mut parsed = ParsedAuthorship::default();
        let remainder = if let Some(inner) = text.strip_prefix('(') {
            let (basionym, rest) = inner.split_once(')')?;
            parsed.basionym = Self::parse_team(basionym);
            rest
        } else {
            text
        };
        let remainder = match remainder.split_once(" : ") {
            Some((team, sanctioning)) => {
                parsed.sanctioning_author = Some(sanctioning.trim().to_string());
                team
            }
            None => remainder,
        };
        parsed.combination = Self::parse_team(remainder);
        Some(parsed)
    }
}
