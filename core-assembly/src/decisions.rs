//! Application of editorial decisions to source usages before they are copied.

use crate::error::{AssemblyError, Result};
use bridge_traits::NameParser;
use core_model::{
    DecisionMode, EditorialDecision, Issue, Name, NameOverride, NameType, NameUsage, Rank,
};
use tracing::{debug, warn};

/// Apply a decision to a usage in place.
///
/// # Errors
///
/// Fails with [`AssemblyError::BlockedUsageTraversed`] for a `Block`
/// decision: blocked usages are excluded from the traversal and must never
/// reach this point.
pub fn apply_decision(
    usage: &mut NameUsage,
    decision: &EditorialDecision,
    parser: &dyn NameParser,
) -> Result<()> {
    match decision.mode {
        DecisionMode::Block => {
            return Err(AssemblyError::BlockedUsageTraversed {
                id: usage.id().to_string(),
            })
        }
        DecisionMode::Reviewed => {}
        DecisionMode::Update => {
            if let Some(overrides) = &decision.name {
                update_name(usage, overrides, parser);
            }
            if let Some(status) = decision.status {
                if let Err(e) = usage.set_status(status) {
                    warn!("Cannot apply status of decision {} to usage {}: {}", decision.key, usage.id(), e);
                }
            }
            if let Some(taxon) = usage.as_taxon_mut() {
                if let Some(lifezones) = &decision.lifezones {
                    taxon.lifezones = lifezones.clone();
                }
                if let Some(extinct) = decision.extinct {
                    taxon.extinct = Some(extinct);
                }
            }
        }
    }

    if let Some(note) = decision.note.as_deref().filter(|n| !n.trim().is_empty()) {
        let base = usage.base_mut();
        base.remarks = Some(match base.remarks.take() {
            Some(remarks) if !remarks.is_empty() => format!("{} {}", remarks, note),
            _ => note.to_string(),
        });
    }
    debug!(mode = decision.mode.as_str(), "Applied decision {} to usage {}", decision.key, usage.id());
    Ok(())
}

fn update_name(usage: &mut NameUsage, overrides: &NameOverride, parser: &dyn NameParser) {
    let mut unparsable = false;
    {
        let name = usage.name_mut();
        if let Some(sciname) = overrides.scientific_name.as_deref() {
            let rank = overrides.rank.unwrap_or(name.rank);
            let code = overrides.code.or(name.code);
            let full = match overrides.authorship.as_deref() {
                Some(authorship) => format!("{} {}", sciname, authorship),
                None => sciname.to_string(),
            };
            let parsed = match parser.parse(&full, rank, code) {
                Some(parsed) => parsed,
                None => {
                    warn!("Unparsable decision name {}. Keep it unparsed", full);
                    unparsable = true;
                    unparsed_name(sciname, overrides.authorship.clone(), rank, name.name_type)
                }
            };
            name.copy_name_parts(&parsed);
        } else if let Some(authorship) = overrides.authorship.as_deref() {
            name.authorship = Some(authorship.to_string());
            match parser.parse_authorship(authorship) {
                Some(parsed) => {
                    name.combination_authorship = parsed.combination;
                    name.basionym_authorship = parsed.basionym;
                    name.sanctioning_author = parsed.sanctioning_author;
                }
                None => {
                    warn!("Unparsable decision authorship {}", authorship);
                    name.combination_authorship = Default::default();
                    name.combination_authorship.authors = vec![authorship.to_string()];
                    name.basionym_authorship = Default::default();
                    name.sanctioning_author = None;
                }
            }
        }

        if let Some(code) = overrides.code {
            name.code = Some(code);
        }
        if let Some(rank) = overrides.rank.filter(|r| *r != Rank::Unranked) {
            name.rank = rank;
        }
        if let Some(nom_status) = overrides.nom_status {
            name.nom_status = Some(nom_status);
        }
        if let Some(name_type) = overrides.name_type {
            name.name_type = name_type;
        }
    }
    if unparsable {
        usage.base_mut().issues.insert(Issue::UnparsableName);
    }
}

/// Name keeping the raw replacement text without any parsed parts
fn unparsed_name(
    sciname: &str,
    authorship: Option<String>,
    rank: Rank,
    name_type: NameType,
) -> Name {
    Name {
        scientific_name: sciname.to_string(),
        authorship,
        rank,
        name_type,
        ..Default::default()
    }
}
