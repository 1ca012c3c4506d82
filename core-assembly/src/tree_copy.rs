//! # Tree Copy Handler
//!
//! Streaming visitor copying a source subtree into the catalogue.
//!
//! ## Overview
//!
//! The handler is fed every usage of the subject subtree in pre-order, so a
//! usage's parent has always been visited before the usage itself. For each
//! usage it:
//!
//! 1. stamps the sector key and the sector's nomenclatural code
//! 2. applies the editorial decision for the source id, if any
//! 3. skips names that cannot be placed in a scientific classification,
//!    mapping the skipped id to its parent's copy so children move up a level
//! 4. resolves the new parent, creating implicit genus, subgenus and species
//!    taxa between the parent and a species or infraspecific taxon
//! 5. copies the usage with its references, vernacular names and
//!    distributions, remembering the new id for its children
//!
//! Writes go to one unit of work that is committed every `batch_size`
//! copied usages and once more by [`TreeCopyHandler::finish`].

use crate::decisions::apply_decision;
use crate::error::{AssemblyError, Result};
use crate::references::ReferenceResolver;
use bridge_traits::{NameParser, UnitOfWork, UsageCopier};
use core_model::{
    new_record_id, DatasetKey, DatasetScopedId, EditorialDecision, EntityType, Name, NameType,
    NameUsage, NomCode, NomStatus, Origin, Rank, Sector, SectorKey, SectorMode, Taxon,
    TaxonomicStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Entities copied together with each usage
const COPIED_ENTITIES: &[EntityType] = &[
    EntityType::Reference,
    EntityType::Vernacular,
    EntityType::Distribution,
];

/// Ranks that may be created implicitly, highest first
const IMPLICIT_RANKS: [Rank; 3] = [Rank::Genus, Rank::Subgenus, Rank::Species];

/// Minimal projection of a catalogue usage used to place children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub id: String,
    pub rank: Rank,
    pub status: TaxonomicStatus,
}

/// Collaborators used by a [`TreeCopyHandler`]
pub struct CopyServices {
    pub copier: Arc<dyn UsageCopier>,
    pub parser: Arc<dyn NameParser>,
    pub uow: Arc<dyn UnitOfWork>,
    pub references: ReferenceResolver,
}

/// Counters of one copy run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyCounts {
    pub taxa: u64,
    pub synonyms: u64,
    pub ignored: u64,
    pub implicit: u64,
    pub decisions: u64,
}

pub struct TreeCopyHandler<'a> {
    catalogue_key: DatasetKey,
    sector: &'a Sector,
    decisions: &'a HashMap<String, EditorialDecision>,
    services: CopyServices,
    batch_size: usize,
    target: Usage,
    /// Copied usage by source id
    ids: HashMap<String, Usage>,
    /// Implicit taxa by rank and scientific name
    implicits: HashMap<(Rank, String), Usage>,
    counts: CopyCounts,
}

impl<'a> TreeCopyHandler<'a> {
    /// Create a handler copying below `target`, a usage of the catalogue
    pub fn new(
        catalogue_key: DatasetKey,
        sector: &'a Sector,
        target: Usage,
        decisions: &'a HashMap<String, EditorialDecision>,
        services: CopyServices,
        batch_size: usize,
    ) -> Self {
        Self {
            catalogue_key,
            sector,
            decisions,
            services,
            batch_size: batch_size.max(1),
            target,
            ids: HashMap::new(),
            implicits: HashMap::new(),
            counts: CopyCounts::default(),
        }
    }

    pub fn counts(&self) -> CopyCounts {
        self.counts
    }

    /// Catalogue usage a source id was copied to or mapped onto
    pub fn mapped(&self, source_id: &str) -> Option<&Usage> {
        self.ids.get(source_id)
    }

    fn sector_key(&self) -> SectorKey {
        self.sector.key
    }

    /// Visit one usage of the source subtree
    pub async fn accept(&mut self, mut usage: NameUsage) -> Result<()> {
        let sector_key = self.sector_key();
        {
            let base = usage.base_mut();
            base.sector_key = Some(sector_key);
            base.name.sector_key = Some(sector_key);
            if let Some(code) = self.sector.code {
                base.name.code = Some(code);
            }
        }

        if let Some(decision) = self.decisions.get(usage.id()) {
            apply_decision(&mut usage, decision, self.services.parser.as_ref())?;
            self.counts.decisions += 1;
        }

        let is_subject = self.sector.subject_id() == Some(usage.id());

        if let Some(reason) = skip_reason(usage.name()) {
            let parent = if is_subject {
                self.target.clone()
            } else {
                self.mapped_parent(&usage)?
            };
            debug!(
                "Ignore {} usage {} {}: {}",
                usage.rank(),
                usage.id(),
                usage.name().label(),
                reason
            );
            self.ids.insert(usage.id().to_string(), parent);
            self.counts.ignored += 1;
            return Ok(());
        }

        let mut parent = if is_subject {
            if self.sector.mode == SectorMode::Union {
                trace!("Union sector {} skips its subject {}", sector_key, usage.id());
                self.ids.insert(usage.id().to_string(), self.target.clone());
                return Ok(());
            }
            self.target.clone()
        } else {
            self.mapped_parent(&usage)?
        };

        if usage.is_taxon() && usage.rank().is_species_or_below() {
            parent = self.create_implicit(parent, usage.name()).await?;
        }

        let rank = usage.rank();
        let status = usage.status();
        let is_taxon = usage.is_taxon();
        let destination = DatasetScopedId::new(self.catalogue_key, parent.id.clone());
        let copied = self
            .services
            .copier
            .copy_usage(
                self.services.uow.as_ref(),
                usage,
                &destination,
                COPIED_ENTITIES,
                &mut self.services.references,
            )
            .await?;
        self.ids.insert(
            copied.original_id,
            Usage {
                id: copied.new_id,
                rank,
                status,
            },
        );

        if is_taxon {
            self.counts.taxa += 1;
        } else {
            self.counts.synonyms += 1;
        }
        if (self.counts.taxa + self.counts.synonyms) % self.batch_size as u64 == 0 {
            self.commit().await?;
        }
        Ok(())
    }

    /// Commit the remaining writes
    pub async fn finish(&mut self) -> Result<()> {
        self.commit().await?;
        info!(
            "Copied {} taxa and {} synonyms, ignored {} usages and created {} implicit taxa in sector {}",
            self.counts.taxa,
            self.counts.synonyms,
            self.counts.ignored,
            self.counts.implicit,
            self.sector_key()
        );
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let applied = self.services.uow.commit().await?;
        debug!(
            applied,
            usages = self.counts.taxa + self.counts.synonyms,
            "Committed copy batch of sector {}",
            self.sector_key()
        );
        Ok(())
    }

    /// Copy of the usage's source parent, visited earlier in pre-order
    fn mapped_parent(&self, usage: &NameUsage) -> Result<Usage> {
        let parent_id = usage.parent_id().unwrap_or_default();
        self.ids
            .get(parent_id)
            .cloned()
            .ok_or_else(|| AssemblyError::UnresolvedParent {
                id: usage.id().to_string(),
                parent_id: parent_id.to_string(),
            })
    }

    /// Create missing genus, subgenus or species taxa between `parent` and a taxon name.
    ///
    /// Returns the usage the taxon should be placed under.
    async fn create_implicit(&mut self, mut parent: Usage, name: &Name) -> Result<Usage> {
        if !name.is_parsed() || name.is_indetermined() {
            return Ok(parent);
        }

        for rank in IMPLICIT_RANKS {
            if !(parent.rank.higher_than(rank) && rank.higher_than(name.rank)) {
                continue;
            }
            let Some(mut implicit) = self.implicit_name(rank, name) else {
                continue;
            };
            if implicit.scientific_name.is_empty() {
                warn!("Cannot create implicit {} for {}", rank, name.label());
                continue;
            }

            let key = (rank, implicit.scientific_name.clone());
            if let Some(existing) = self.implicits.get(&key) {
                parent = existing.clone();
                continue;
            }

            implicit.id = new_record_id();
            implicit.dataset_key = self.catalogue_key;
            implicit.origin = Origin::Implicit;
            let mut taxon = Taxon::new(
                new_record_id(),
                self.catalogue_key,
                implicit,
                Some(parent.id.clone()),
            );
            taxon.base.sector_key = Some(self.sector_key());
            taxon.base.origin = Origin::Implicit;
            taxon.base.status = TaxonomicStatus::Accepted;

            let created = Usage {
                id: taxon.base.id.clone(),
                rank,
                status: TaxonomicStatus::Accepted,
            };
            debug!("Create implicit {} {} below {}", rank, key.1, parent.id);
            self.services.uow.create_name(taxon.base.name.clone()).await?;
            self.services.uow.create_usage(taxon.into()).await?;
            self.implicits.insert(key, created.clone());
            self.counts.implicit += 1;
            parent = created;
        }
        Ok(parent)
    }

    fn implicit_name(&self, rank: Rank, name: &Name) -> Option<Name> {
        let mut implicit = Name {
            rank,
            name_type: NameType::Scientific,
            sector_key: Some(self.sector_key()),
            code: name.code,
            ..Default::default()
        };
        match rank {
            Rank::Genus => implicit.uninomial = name.genus.clone(),
            Rank::Subgenus => implicit.uninomial = Some(name.infrageneric_epithet.clone()?),
            _ => {
                implicit.genus = name.genus.clone();
                implicit.specific_epithet = name.specific_epithet.clone();
            }
        }
        implicit.update_name_cache();
        Some(implicit)
    }
}

/// Why a name is not copied, if it is not
fn skip_reason(name: &Name) -> Option<&'static str> {
    match name.name_type {
        NameType::Placeholder | NameType::NoName | NameType::HybridFormula | NameType::Informal => {
            return Some(name.name_type.as_str());
        }
        _ => {}
    }
    if name.nom_status == Some(NomStatus::Chresonym) {
        return Some("chresonym");
    }
    if name.cultivar_epithet.is_some()
        || name.code == Some(NomCode::Cultivars)
        || name.rank.is_cultivar_rank()
    {
        return Some("cultivar");
    }
    if name.name_type.is_parsable() && name.is_indetermined() {
        return Some("indetermined");
    }
    None
}
