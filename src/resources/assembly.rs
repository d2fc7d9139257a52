// ==============================================================================
// assembly.rs - Assembly Mapping Engine
// ==============================================================================
// Description: Ensembl assembly-to-assembly interval mappings and coordinate lift
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Mapping data comes from the Ensembl REST endpoint
//   GET {rest}/map/human/{source}/{chrom}/{target}
// One JSON document per chromosome is packed into {source}_{target}.tar.gz as
// {source}_{target}/{chrom}.json. An archive missing any of 1-22, X, Y, MT is
// rejected and rebuilt.
// ==============================================================================

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::models::{Assembly, Chromosome, VariantRecord};
use crate::resources::download::{is_present, write_atomic, ResourceStore};
use crate::resources::ResourceError;

// ==============================================================================
// ENSEMBL JSON
// ==============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsemblMappingResponse {
    pub mappings: Vec<EnsemblMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsemblMapping {
    pub original: EnsemblRegion,
    pub mapped: EnsemblRegion,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsemblRegion {
    pub seq_region_name: String,
    pub start: u64,
    pub end: u64,
    pub strand: i8,
    #[serde(default)]
    pub coord_system: String,
    #[serde(default)]
    pub assembly: String,
}

// ==============================================================================
// MAPPING MODEL
// ==============================================================================

/// Closed interval on one assembly (1-based, inclusive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub chromosome: Chromosome,
    pub start: u64,
    pub end: u64,
    /// 1 forward, -1 reverse
    pub strand: i8,
    pub assembly: String,
}

impl Region {
    fn from_ensembl(region: &EnsemblRegion) -> Option<Self> {
        Some(Self {
            chromosome: region.seq_region_name.parse().ok()?,
            start: region.start,
            end: region.end,
            strand: region.strand,
            assembly: region.assembly.clone(),
        })
    }

    pub fn contains(&self, position: u64) -> bool {
        (self.start..=self.end).contains(&position)
    }
}

/// One aligned block: `original` on the source assembly maps onto `mapped`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingBlock {
    pub original: Region,
    pub mapped: Region,
}

impl MappingBlock {
    fn is_reverse(&self) -> bool {
        self.original.strand * self.mapped.strand < 0
    }
}

/// Result of lifting one coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifted {
    pub chromosome: Chromosome,
    pub position: u64,
    /// The target interval runs on the opposite strand
    pub reverse: bool,
}

/// What to do with records that fall outside every mapped block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmappedPolicy {
    /// Keep the record at its original coordinates
    #[default]
    Keep,
    Drop,
}

/// Interval mapping between two assemblies, keyed by source chromosome
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssemblyMapping {
    pub source: Option<Assembly>,
    pub target: Option<Assembly>,
    blocks: BTreeMap<Chromosome, Vec<MappingBlock>>,
}

impl AssemblyMapping {
    pub fn new(source: Assembly, target: Assembly) -> Self {
        Self {
            source: Some(source),
            target: Some(target),
            blocks: BTreeMap::new(),
        }
    }

    /// Number of chromosomes with mapping data
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &Chromosome> {
        self.blocks.keys()
    }

    pub fn blocks(&self, chromosome: Chromosome) -> &[MappingBlock] {
        self.blocks.get(&chromosome).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Index one chromosome's Ensembl response; blocks are sorted by source start
    pub fn insert_response(&mut self, chromosome: Chromosome, response: &EnsemblMappingResponse) {
        let mut blocks: Vec<MappingBlock> = response
            .mappings
            .iter()
            .filter_map(|m| {
                Some(MappingBlock {
                    original: Region::from_ensembl(&m.original)?,
                    mapped: Region::from_ensembl(&m.mapped)?,
                })
            })
            .collect();

        let dropped = response.mappings.len() - blocks.len();
        if dropped > 0 {
            debug!("chr{}: {} blocks map to non-chromosome regions", chromosome, dropped);
        }

        blocks.sort_by_key(|b| b.original.start);
        self.blocks.insert(chromosome, blocks);
    }

    /// Project a source coordinate onto the target assembly
    pub fn lift(&self, chromosome: Chromosome, position: u64) -> Option<Lifted> {
        let blocks = self.blocks.get(&chromosome)?;

        // Last block starting at or before `position`
        let idx = blocks.partition_point(|b| b.original.start <= position);
        let block = blocks[..idx].last()?;
        if !block.original.contains(position) {
            return None;
        }

        let offset = position - block.original.start;
        let reverse = block.is_reverse();
        let lifted = if reverse {
            block.mapped.end.checked_sub(offset)?
        } else {
            block.mapped.start + offset
        };

        Some(Lifted {
            chromosome: block.mapped.chromosome,
            position: lifted,
            reverse,
        })
    }

    /// Lift every record, complementing genotypes on reverse-strand blocks
    ///
    /// Returns the remapped records and the number that could not be lifted.
    pub fn remap_records(&self, records: &[VariantRecord], policy: UnmappedPolicy) -> (Vec<VariantRecord>, usize) {
        let mut remapped = Vec::with_capacity(records.len());
        let mut unmapped = 0usize;

        for record in records {
            match self.lift(record.chromosome, record.position) {
                Some(lifted) => remapped.push(VariantRecord {
                    rsid: record.rsid.clone(),
                    chromosome: lifted.chromosome,
                    position: lifted.position,
                    genotype: if lifted.reverse {
                        record.genotype.as_ref().map(|g| g.complement())
                    } else {
                        record.genotype.clone()
                    },
                }),
                None => {
                    unmapped += 1;
                    if policy == UnmappedPolicy::Keep {
                        remapped.push(record.clone());
                    }
                }
            }
        }

        if unmapped > 0 {
            info!("{} of {} records could not be remapped", unmapped, records.len());
        }
        (remapped, unmapped)
    }
}

// ==============================================================================
// ARCHIVE
// ==============================================================================

pub fn archive_name(source: Assembly, target: Assembly) -> String {
    format!("{}_{}.tar.gz", source, target)
}

fn member_prefix(source: Assembly, target: Assembly) -> String {
    format!("{}_{}", source, target)
}

/// Chromosome labels an archive must carry
pub fn required_chroms() -> Vec<String> {
    Chromosome::mapped().iter().map(|c| c.to_string()).collect()
}

/// Whether the archive holds `{prefix}/{chrom}.json` for every requested chromosome
pub fn all_chroms_in_archive(path: &Path, prefix: &str, chroms: &[String]) -> bool {
    match archive_members(path) {
        Ok(members) => chroms
            .iter()
            .all(|chrom| members.contains(&format!("{}/{}.json", prefix, chrom))),
        Err(e) => {
            debug!("{}: unreadable archive: {}", path.display(), e);
            false
        }
    }
}

fn archive_members(path: &Path) -> Result<HashSet<String>, ResourceError> {
    let mut archive = tar::Archive::new(MultiGzDecoder::new(BufReader::new(File::open(path)?)));
    let mut members = HashSet::new();
    for entry in archive.entries()? {
        let entry = entry?;
        members.insert(entry.path()?.to_string_lossy().into_owned());
    }
    Ok(members)
}

/// Load mapping data, rebuilding the archive when absent or incomplete
pub fn load_assembly_mapping(
    store: &ResourceStore,
    source: Assembly,
    target: Assembly,
) -> Result<AssemblyMapping, ResourceError> {
    let path = store.path(archive_name(source, target));
    let prefix = member_prefix(source, target);

    if !(is_present(&path) && all_chroms_in_archive(&path, &prefix, &required_chroms())) {
        if path.exists() {
            warn!("{}: incomplete mapping archive, refetching", path.display());
        }
        let bytes = build_archive(store, source, target)?;
        write_atomic(&path, &bytes)?;
    }

    read_archive(&path, source, target)
}

/// Fetch every chromosome's mapping and pack them into a tar.gz
fn build_archive(store: &ResourceStore, source: Assembly, target: Assembly) -> Result<Vec<u8>, ResourceError> {
    let prefix = member_prefix(source, target);
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for chrom in required_chroms() {
        let url = format!(
            "{}/map/human/{}/{}/{}?content-type=application/json",
            store.ensembl_rest_url(),
            source,
            chrom,
            target
        );
        let body = store.downloader().fetch_json(&url)?;

        // Reject error pages before they are cached
        serde_json::from_slice::<EnsemblMappingResponse>(&body)?;

        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, format!("{}/{}.json", prefix, chrom), &body[..])?;
    }

    Ok(builder.into_inner()?.finish()?)
}

fn read_archive(path: &Path, source: Assembly, target: Assembly) -> Result<AssemblyMapping, ResourceError> {
    let prefix = format!("{}/", member_prefix(source, target));
    let mut archive = tar::Archive::new(MultiGzDecoder::new(BufReader::new(File::open(path)?)));
    let mut mapping = AssemblyMapping::new(source, target);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let Some(chrom) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|label| label.parse::<Chromosome>().ok())
        else {
            continue;
        };

        let mut body = Vec::new();
        entry.read_to_end(&mut body)?;
        let response: EnsemblMappingResponse = serde_json::from_slice(&body)?;
        mapping.insert_response(chrom, &response);
    }

    Ok(mapping)
}
