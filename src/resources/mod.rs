// ==============================================================================
// resources/mod.rs - Reference Resources Manager
// ==============================================================================
// Description: Lazily fetched, disk-cached and memoized genomic reference data
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Lookup order per resource: memory -> disk -> download. A failed load returns
// an empty value and is not memoized, so the next call tries again.
// ==============================================================================

pub mod assembly;
pub mod download;
pub mod reference;
pub mod tables;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ResourcesConfig;
use crate::models::{Assembly, Chromosome, InvalidAssembly};

pub use assembly::{AssemblyMapping, Lifted, MappingBlock, Region, UnmappedPolicy};
pub use download::{Downloader, ResourceStore};
pub use reference::{ReferencePaths, ReferenceSequence, SequenceState};
pub use tables::{ChromPos, CytoBand, GeneticMap, GeneticMapEntry, GsaResources, KgXref, KnownGene};

/// Resource loading errors
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Downloads are disabled and {0} is not cached")]
    DownloadsDisabled(String),

    #[error("No URL given")]
    EmptyUrl,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid resource: {0}")]
    Invalid(String),

    #[error(transparent)]
    Assembly(#[from] InvalidAssembly),
}

/// Every tabular resource plus all assembly mappings
#[derive(Debug, Clone, Default)]
pub struct AllResources {
    pub genetic_map_hapmap2_grch37: Arc<GeneticMap>,
    pub cytoband_hg19: Arc<Vec<CytoBand>>,
    pub known_gene_hg19: Arc<Vec<KnownGene>>,
    pub kg_xref_hg19: Arc<Vec<KgXref>>,
    pub gsa: Arc<GsaResources>,
    pub assembly_mappings: BTreeMap<(Assembly, Assembly), Arc<AssemblyMapping>>,
}

/// Resource cache for one session
///
/// Getters are idempotent: the first successful load is kept in memory and
/// shared through `Arc`.
#[derive(Debug)]
pub struct Resources {
    store: ResourceStore,
    genetic_map_hapmap2_grch37: Option<Arc<GeneticMap>>,
    cytoband_hg19: Option<Arc<Vec<CytoBand>>>,
    known_gene_hg19: Option<Arc<Vec<KnownGene>>>,
    kg_xref_hg19: Option<Arc<Vec<KgXref>>>,
    gsa: Option<Arc<GsaResources>>,
    assembly_mappings: HashMap<(Assembly, Assembly), Arc<AssemblyMapping>>,
    reference_sequences: HashMap<Assembly, BTreeMap<Chromosome, ReferenceSequence>>,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new(ResourcesConfig::default())
    }
}

/// Return the memoized value, or load and memoize it; failures yield an empty value
fn memoize<T: Default>(
    slot: &mut Option<Arc<T>>,
    name: &str,
    load: impl FnOnce() -> Result<T, ResourceError>,
) -> Arc<T> {
    if let Some(cached) = slot {
        return Arc::clone(cached);
    }

    match load() {
        Ok(value) => {
            info!("Loaded {}", name);
            let value = Arc::new(value);
            *slot = Some(Arc::clone(&value));
            value
        }
        Err(e) => {
            warn!("{} unavailable: {}", name, e);
            Arc::new(T::default())
        }
    }
}

impl Resources {
    pub fn new(config: ResourcesConfig) -> Self {
        Self {
            store: ResourceStore::new(&config),
            genetic_map_hapmap2_grch37: None,
            cytoband_hg19: None,
            known_gene_hg19: None,
            kg_xref_hg19: None,
            gsa: None,
            assembly_mappings: HashMap::new(),
            reference_sequences: HashMap::new(),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Drop every in-memory value; files on disk are kept
    pub fn clear_cache(&mut self) {
        self.genetic_map_hapmap2_grch37 = None;
        self.cytoband_hg19 = None;
        self.known_gene_hg19 = None;
        self.kg_xref_hg19 = None;
        self.gsa = None;
        self.assembly_mappings.clear();
        self.reference_sequences.clear();
    }

    /// HapMap II genetic map (GRCh37); 23 chromosomes when complete
    pub fn get_genetic_map_hapmap2_grch37(&mut self) -> Arc<GeneticMap> {
        let store = &self.store;
        memoize(&mut self.genetic_map_hapmap2_grch37, "HapMapII genetic map", || {
            tables::load_genetic_map_hapmap2(store)
        })
    }

    pub fn get_cytoband_hg19(&mut self) -> Arc<Vec<CytoBand>> {
        let store = &self.store;
        memoize(&mut self.cytoband_hg19, "cytoBand_hg19", || tables::load_cytoband_hg19(store))
    }

    pub fn get_known_gene_hg19(&mut self) -> Arc<Vec<KnownGene>> {
        let store = &self.store;
        memoize(&mut self.known_gene_hg19, "knownGene_hg19", || tables::load_known_gene_hg19(store))
    }

    pub fn get_kg_xref_hg19(&mut self) -> Arc<Vec<KgXref>> {
        let store = &self.store;
        memoize(&mut self.kg_xref_hg19, "kgXref_hg19", || tables::load_kg_xref_hg19(store))
    }

    /// GSA marker name maps used by Illumina GSA reports
    pub fn get_gsa_resources(&mut self) -> Arc<GsaResources> {
        let store = &self.store;
        memoize(&mut self.gsa, "GSA resources", || tables::load_gsa_resources(store))
    }

    /// Interval mapping from `source` to `target` ("NCBI36", "GRCh37", "GRCh38")
    ///
    /// Unknown labels and `source == target` give an empty mapping.
    pub fn get_assembly_mapping_data(&mut self, source: &str, target: &str) -> Arc<AssemblyMapping> {
        let pair = match (source.parse::<Assembly>(), target.parse::<Assembly>()) {
            (Ok(s), Ok(t)) if s != t => (s, t),
            (Ok(_), Ok(_)) => {
                warn!("Assembly mapping requested from {} to itself", source);
                return Arc::default();
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("{}", e);
                return Arc::default();
            }
        };

        if let Some(cached) = self.assembly_mappings.get(&pair) {
            return Arc::clone(cached);
        }

        match assembly::load_assembly_mapping(&self.store, pair.0, pair.1) {
            Ok(mapping) => {
                info!("Loaded {} -> {} mapping ({} chromosomes)", pair.0, pair.1, mapping.len());
                let mapping = Arc::new(mapping);
                self.assembly_mappings.insert(pair, Arc::clone(&mapping));
                mapping
            }
            Err(e) => {
                warn!("{} -> {} mapping unavailable: {}", pair.0, pair.1, e);
                Arc::default()
            }
        }
    }

    /// Resolve URLs and cache paths for reference sequences
    pub fn get_paths_reference_sequences(&self, assembly: &str, chroms: &[Chromosome]) -> ReferencePaths {
        reference::get_paths_reference_sequences(&self.store, assembly, chroms)
    }

    /// Build (download if needed) reference sequence entities for resolved paths
    pub fn create_reference_sequences(&self, paths: &ReferencePaths) -> BTreeMap<Chromosome, ReferenceSequence> {
        reference::create_reference_sequences(self.store.downloader(), paths)
    }

    /// Reference sequences for `chroms` (all 25 when empty) on `assembly`
    ///
    /// Entities are cached per assembly; missing ones are rebuilt. Sequences
    /// are decoded on first access.
    pub fn get_reference_sequences(
        &mut self,
        assembly: &str,
        chroms: &[Chromosome],
    ) -> BTreeMap<Chromosome, &mut ReferenceSequence> {
        let paths = self.get_paths_reference_sequences(assembly, chroms);
        let Some(assembly) = paths.assembly else {
            return BTreeMap::new();
        };
        self.ensure_reference_sequences(&paths);

        let wanted = paths.chroms;
        match self.reference_sequences.get_mut(&assembly) {
            Some(cached) => cached
                .iter_mut()
                .filter(|(chrom, _)| wanted.contains(chrom))
                .map(|(chrom, seq)| (*chrom, seq))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    /// Reference sequences for `chroms` on every assembly
    pub fn get_all_reference_sequences(
        &mut self,
        chroms: &[Chromosome],
    ) -> BTreeMap<Assembly, BTreeMap<Chromosome, &mut ReferenceSequence>> {
        let mut wanted = Vec::new();
        for assembly in Assembly::ALL {
            let paths = self.get_paths_reference_sequences(assembly.as_str(), chroms);
            self.ensure_reference_sequences(&paths);
            wanted = paths.chroms;
        }

        self.reference_sequences
            .iter_mut()
            .map(|(assembly, cached)| {
                let selected = cached
                    .iter_mut()
                    .filter(|(chrom, _)| wanted.contains(chrom))
                    .map(|(chrom, seq)| (*chrom, seq))
                    .collect();
                (*assembly, selected)
            })
            .collect()
    }

    /// Create cache entries for any requested chromosome not held in memory
    fn ensure_reference_sequences(&mut self, paths: &ReferencePaths) {
        let Some(assembly) = paths.assembly else {
            return;
        };
        let cached = self.reference_sequences.entry(assembly).or_default();

        let mut missing = ReferencePaths {
            assembly: Some(assembly),
            ..ReferencePaths::default()
        };
        for ((chrom, url), path) in paths.chroms.iter().zip(&paths.urls).zip(&paths.paths) {
            if !cached.contains_key(chrom) {
                missing.chroms.push(*chrom);
                missing.urls.push(url.clone());
                missing.paths.push(path.clone());
            }
        }

        if !missing.chroms.is_empty() {
            let created = reference::create_reference_sequences(self.store.downloader(), &missing);
            cached.extend(created);
        }
    }

    /// Remove one cached reference sequence entity (it is rebuilt on next request)
    pub fn evict_reference_sequence(&mut self, assembly: Assembly, chrom: Chromosome) -> Option<ReferenceSequence> {
        self.reference_sequences.get_mut(&assembly)?.remove(&chrom)
    }

    /// Load every tabular resource and all six assembly mapping pairs
    pub fn get_all_resources(&mut self) -> AllResources {
        let mut assembly_mappings = BTreeMap::new();
        for source in Assembly::ALL {
            for target in Assembly::ALL {
                if source != target {
                    let mapping = self.get_assembly_mapping_data(source.as_str(), target.as_str());
                    assembly_mappings.insert((source, target), mapping);
                }
            }
        }

        AllResources {
            genetic_map_hapmap2_grch37: self.get_genetic_map_hapmap2_grch37(),
            cytoband_hg19: self.get_cytoband_hg19(),
            known_gene_hg19: self.get_known_gene_hg19(),
            kg_xref_hg19: self.get_kg_xref_hg19(),
            gsa: self.get_gsa_resources(),
            assembly_mappings,
        }
    }
}
