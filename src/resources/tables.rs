// ==============================================================================
// tables.rs - Tabular Reference Resources
// ==============================================================================
// Description: HapMap II genetic map, UCSC hg19 tables and GSA coordinate maps
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Sources:
// - HapMap II genetic map (GRCh37), NCBI
// - UCSC hg19 cytoBand, knownGene and kgXref tables
// - Illumina GSA marker name -> rsid and marker name -> chr:pos maps
// ==============================================================================

use csv::ReaderBuilder;
use flate2::read::MultiGzDecoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::models::Chromosome;
use crate::resources::download::ResourceStore;
use crate::resources::ResourceError;

pub const HAPMAP2_URL: &str =
    "ftp://ftp.ncbi.nlm.nih.gov/hapmap/recombination/2011-01_phaseII_B37/genetic_map_HapMapII_GRCh37.tar.gz";
pub const HAPMAP2_FILE: &str = "genetic_map_HapMapII_GRCh37.tar.gz";

pub const CYTOBAND_URL: &str = "ftp://hgdownload.cse.ucsc.edu/goldenPath/hg19/database/cytoBand.txt.gz";
pub const CYTOBAND_FILE: &str = "cytoBand_hg19.txt.gz";

pub const KNOWN_GENE_URL: &str = "ftp://hgdownload.cse.ucsc.edu/goldenPath/hg19/database/knownGene.txt.gz";
pub const KNOWN_GENE_FILE: &str = "knownGene_hg19.txt.gz";

pub const KG_XREF_URL: &str = "ftp://hgdownload.cse.ucsc.edu/goldenPath/hg19/database/kgXref.txt.gz";
pub const KG_XREF_FILE: &str = "kgXref_hg19.txt.gz";

pub const GSA_RSID_URL: &str = "https://sano-public.s3.eu-west-2.amazonaws.com/gsa_rsid_map.txt.gz";
pub const GSA_RSID_FILE: &str = "gsa_rsid_map.txt.gz";

pub const GSA_CHRPOS_URL: &str = "https://sano-public.s3.eu-west-2.amazonaws.com/gsa_chrpos_map.txt.gz";
pub const GSA_CHRPOS_FILE: &str = "gsa_chrpos_map.txt.gz";

// ==============================================================================
// GENETIC MAP
// ==============================================================================

/// One row of a HapMap genetic map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticMapEntry {
    pub position: u64,
    /// Recombination rate (cM/Mb)
    pub rate: f64,
    /// Cumulative genetic distance (cM)
    pub map: f64,
}

/// Genetic map per chromosome; the X pseudo-autosomal pieces are merged into X
pub type GeneticMap = BTreeMap<Chromosome, Vec<GeneticMapEntry>>;

#[derive(Debug, Deserialize)]
struct HapMapRow {
    #[serde(rename = "Chromosome")]
    _chromosome: String,
    #[serde(rename = "Position(bp)")]
    position: u64,
    #[serde(rename = "Rate(cM/Mb)")]
    rate: f64,
    #[serde(rename = "Map(cM)")]
    map: f64,
}

pub fn load_genetic_map_hapmap2(store: &ResourceStore) -> Result<GeneticMap, ResourceError> {
    let path = store.download_file(HAPMAP2_URL, HAPMAP2_FILE, false)?;
    read_genetic_map_archive(&path)
}

/// Read a tar.gz of `genetic_map_GRCh37_chr{N}.txt` members
pub fn read_genetic_map_archive(path: &Path) -> Result<GeneticMap, ResourceError> {
    let mut archive = tar::Archive::new(MultiGzDecoder::new(BufReader::new(File::open(path)?)));
    let mut map = GeneticMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let Some(chrom) = genetic_map_member_chromosome(&name) else {
            debug!("Skipping genetic map member {}", name);
            continue;
        };

        let mut text = String::new();
        entry.read_to_string(&mut text)?;

        let rows: Vec<HapMapRow> = read_tsv(text.as_bytes(), true)?;
        map.entry(chrom).or_default().extend(rows.into_iter().map(|row| GeneticMapEntry {
            position: row.position,
            rate: row.rate,
            map: row.map,
        }));
    }

    if map.is_empty() {
        return Err(ResourceError::Invalid(format!("{}: no genetic map members", path.display())));
    }

    // X pieces may arrive in any member order
    for entries in map.values_mut() {
        entries.sort_by_key(|e| e.position);
    }

    Ok(map)
}

/// "genetic_map_GRCh37_chrX_par1.txt" -> X
fn genetic_map_member_chromosome(name: &str) -> Option<Chromosome> {
    let file = name.rsplit('/').next()?;
    let stem = file.strip_suffix(".txt")?;
    let label = stem.rsplit_once("_chr").map(|(_, label)| label)?;
    let label = label
        .strip_suffix("_par1")
        .or_else(|| label.strip_suffix("_par2"))
        .unwrap_or(label);
    label.parse().ok()
}

// ==============================================================================
// UCSC TABLES
// ==============================================================================

/// hg19 cytogenetic band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CytoBand {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub gie_stain: String,
}

/// hg19 UCSC known gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownGene {
    pub name: String,
    pub chrom: String,
    pub strand: String,
    pub tx_start: u64,
    pub tx_end: u64,
    pub cds_start: u64,
    pub cds_end: u64,
    pub exon_count: u32,
    pub exon_starts: String,
    pub exon_ends: String,
    pub protein_id: String,
    pub align_id: String,
}

/// hg19 known gene cross reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgXref {
    pub kg_id: String,
    pub mrna: String,
    pub sp_id: String,
    pub sp_display_id: String,
    pub gene_symbol: String,
    pub refseq: String,
    pub prot_acc: String,
    pub description: String,
    pub rfam_acc: String,
    pub trna_name: String,
}

pub fn load_cytoband_hg19(store: &ResourceStore) -> Result<Vec<CytoBand>, ResourceError> {
    let path = store.download_file(CYTOBAND_URL, CYTOBAND_FILE, false)?;
    read_gz_table(&path, false)
}

pub fn load_known_gene_hg19(store: &ResourceStore) -> Result<Vec<KnownGene>, ResourceError> {
    let path = store.download_file(KNOWN_GENE_URL, KNOWN_GENE_FILE, false)?;
    read_gz_table(&path, false)
}

pub fn load_kg_xref_hg19(store: &ResourceStore) -> Result<Vec<KgXref>, ResourceError> {
    let path = store.download_file(KG_XREF_URL, KG_XREF_FILE, false)?;
    read_gz_table(&path, false)
}

// ==============================================================================
// GSA MAPS
// ==============================================================================

/// Coordinates of a GSA marker on GRCh37
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromPos {
    pub chromosome: Chromosome,
    pub position: u64,
}

/// Illumina GSA marker lookups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GsaResources {
    /// Marker name -> rsid
    pub rsid_map: HashMap<String, String>,
    /// Marker name -> GRCh37 coordinates
    pub chrpos_map: HashMap<String, ChromPos>,
}

impl GsaResources {
    pub fn is_empty(&self) -> bool {
        self.rsid_map.is_empty() || self.chrpos_map.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RsidRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "RsID")]
    rsid: String,
}

#[derive(Debug, Deserialize)]
struct ChrPosRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Chr")]
    chr: String,
    #[serde(rename = "MapInfo")]
    map_info: u64,
}

pub fn load_gsa_resources(store: &ResourceStore) -> Result<GsaResources, ResourceError> {
    let rsid_path = store.download_file(GSA_RSID_URL, GSA_RSID_FILE, false)?;
    let chrpos_path = store.download_file(GSA_CHRPOS_URL, GSA_CHRPOS_FILE, false)?;

    let rsid_map = read_gz_table::<RsidRow>(&rsid_path, true)?
        .into_iter()
        .map(|row| (row.name, row.rsid))
        .collect();

    let chrpos_map = read_gz_table::<ChrPosRow>(&chrpos_path, true)?
        .into_iter()
        .filter_map(|row| {
            let chromosome = row.chr.parse().ok()?;
            Some((
                row.name,
                ChromPos {
                    chromosome,
                    position: row.map_info,
                },
            ))
        })
        .collect();

    Ok(GsaResources { rsid_map, chrpos_map })
}

// ==============================================================================
// HELPERS
// ==============================================================================

/// Deserialize a gzipped tab-separated table
fn read_gz_table<T: DeserializeOwned>(path: &Path, has_headers: bool) -> Result<Vec<T>, ResourceError> {
    let mut text = Vec::new();
    MultiGzDecoder::new(BufReader::new(File::open(path)?)).read_to_end(&mut text)?;
    read_tsv(&text[..], has_headers)
}

/// Deserialize tab-separated rows; rows that do not fit `T` are skipped
fn read_tsv<T: DeserializeOwned>(bytes: &[u8], has_headers: bool) -> Result<Vec<T>, ResourceError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .quoting(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in reader.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                skipped += 1;
                debug!("Skipping table row: {}", e);
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} unreadable table rows", skipped);
    }
    if rows.is_empty() {
        return Err(ResourceError::Invalid("table contains no rows".to_string()));
    }
    Ok(rows)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::config::ResourcesConfig;
    use tempfile::tempdir;

    fn offline_store(dir: &Path) -> ResourceStore {
        ResourceStore::new(&ResourcesConfig::offline(dir))
    }

    #[test]
    fn test_genetic_map_merges_x_pieces() {
        let dir = tempdir().unwrap();
        write_hapmap_archive(dir.path());

        let map = load_genetic_map_hapmap2(&offline_store(dir.path())).unwrap();
        assert_eq!(map.len(), 23);

        let x = &map[&Chromosome::X];
        let positions: Vec<u64> = x.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![150000, 3000000, 155000000]);
        assert_eq!(map[&Chromosome::Autosome(1)][1].map, 0.1);
    }

    #[test]
    fn test_member_names() {
        assert_eq!(
            genetic_map_member_chromosome("genetic_map_GRCh37_chr7.txt"),
            Some(Chromosome::Autosome(7))
        );
        assert_eq!(
            genetic_map_member_chromosome("dir/genetic_map_GRCh37_chrX_par1.txt"),
            Some(Chromosome::X)
        );
        assert_eq!(genetic_map_member_chromosome("README.txt"), None);
    }

    #[test]
    fn test_ucsc_tables() {
        let dir = tempdir().unwrap();
        write_gz(
            dir.path(),
            CYTOBAND_FILE,
            "chr1\t0\t2300000\tp36.33\tgneg\nchr1\t2300000\t5400000\tp36.32\tgpos25\n",
        );
        write_gz(
            dir.path(),
            KNOWN_GENE_FILE,
            "uc001aaa.3\tchr1\t+\t11873\t14409\t11873\t11873\t3\t11873,12612,13220,\t12227,12721,14409,\t\tuc001aaa.3\n",
        );
        write_gz(
            dir.path(),
            KG_XREF_FILE,
            "uc001aaa.3\tBC032353\t\t\tDDX11L1\t\t\tHomo sapiens \"DEAD\" box\t\t\n",
        );
        let store = offline_store(dir.path());

        let bands = load_cytoband_hg19(&store).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].name, "p36.32");
        assert_eq!(bands[1].gie_stain, "gpos25");

        let genes = load_known_gene_hg19(&store).unwrap();
        assert_eq!(genes[0].exon_count, 3);
        assert_eq!(genes[0].protein_id, "");

        let xref = load_kg_xref_hg19(&store).unwrap();
        assert_eq!(xref[0].gene_symbol, "DDX11L1");
        assert!(xref[0].description.contains("\"DEAD\""));
    }

    #[test]
    fn test_gsa_maps() {
        let dir = tempdir().unwrap();
        write_gsa_maps(dir.path());

        let gsa = load_gsa_resources(&offline_store(dir.path())).unwrap();
        assert_eq!(gsa.rsid_map["GSA-rs1"], "rs1");
        assert_eq!(
            gsa.chrpos_map["GSA-rs2"],
            ChromPos {
                chromosome: Chromosome::X,
                position: 102
            }
        );
        assert!(!gsa.is_empty());
    }

    #[test]
    fn test_missing_offline_resource_is_error() {
        let dir = tempdir().unwrap();
        assert!(load_cytoband_hg19(&offline_store(dir.path())).is_err());
    }
}
