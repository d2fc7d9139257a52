// ==============================================================================
// models.rs - Canonical Variant Data Models
// ==============================================================================
// Description: Assemblies, chromosomes, genotypes and the canonical variant table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Human reference genome assembly (build)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Assembly {
    /// NCBI Build 36 (hg18)
    #[serde(rename = "NCBI36")]
    Ncbi36,
    /// GRCh37 (hg19)
    GRCh37,
    /// GRCh38 (hg38)
    GRCh38,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid assembly: '{0}' (expected NCBI36, GRCh37 or GRCh38)")]
pub struct InvalidAssembly(pub String);

impl Assembly {
    pub const ALL: [Assembly; 3] = [Assembly::Ncbi36, Assembly::GRCh37, Assembly::GRCh38];

    pub fn as_str(&self) -> &'static str {
        match self {
            Assembly::Ncbi36 => "NCBI36",
            Assembly::GRCh37 => "GRCh37",
            Assembly::GRCh38 => "GRCh38",
        }
    }

    /// Short build label used by reference sequence metadata ("B36", "B37", "B38")
    pub fn build_label(&self) -> &'static str {
        match self {
            Assembly::Ncbi36 => "B36",
            Assembly::GRCh37 => "B37",
            Assembly::GRCh38 => "B38",
        }
    }

    pub fn build_number(&self) -> u8 {
        match self {
            Assembly::Ncbi36 => 36,
            Assembly::GRCh37 => 37,
            Assembly::GRCh38 => 38,
        }
    }

    pub fn from_build_number(build: u8) -> Option<Self> {
        match build {
            36 => Some(Assembly::Ncbi36),
            37 => Some(Assembly::GRCh37),
            38 => Some(Assembly::GRCh38),
            _ => None,
        }
    }
}

impl fmt::Display for Assembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Assembly {
    type Err = InvalidAssembly;

    /// Only full assembly names are accepted; bare build numbers like "36" are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NCBI36" => Ok(Assembly::Ncbi36),
            "GRCH37" => Ok(Assembly::GRCh37),
            "GRCH38" => Ok(Assembly::GRCh38),
            _ => Err(InvalidAssembly(s.to_string())),
        }
    }
}

/// Chromosome label from the bounded alphabet {1..22, X, Y, MT, PAR}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Chromosome {
    Autosome(u8),
    X,
    Y,
    MT,
    /// Pseudo-autosomal region
    PAR,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid chromosome: '{0}'")]
pub struct ParseChromosomeError(pub String);

impl Chromosome {
    /// Chromosomes carried by assembly mapping archives (1-22, X, Y, MT)
    pub fn mapped() -> Vec<Chromosome> {
        (1..=22)
            .map(Chromosome::Autosome)
            .chain([Chromosome::X, Chromosome::Y, Chromosome::MT])
            .collect()
    }

    pub fn is_autosome(&self) -> bool {
        matches!(self, Chromosome::Autosome(_))
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chromosome::Autosome(n) => write!(f, "{}", n),
            Chromosome::X => f.write_str("X"),
            Chromosome::Y => f.write_str("Y"),
            Chromosome::MT => f.write_str("MT"),
            Chromosome::PAR => f.write_str("PAR"),
        }
    }
}

impl FromStr for Chromosome {
    type Err = ParseChromosomeError;

    /// Accepts "chr" prefixes and the numeric codes some vendors use for
    /// sex chromosomes (23 = X, 24 = Y, 25 = PAR, 26 = MT).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');
        let label = trimmed
            .strip_prefix("chr")
            .or_else(|| trimmed.strip_prefix("CHR"))
            .or_else(|| trimmed.strip_prefix("Chr"))
            .unwrap_or(trimmed)
            .to_ascii_uppercase();

        match label.as_str() {
            "X" | "23" => Ok(Chromosome::X),
            "Y" | "24" => Ok(Chromosome::Y),
            "XY" | "PAR" | "25" => Ok(Chromosome::PAR),
            "MT" | "M" | "26" => Ok(Chromosome::MT),
            other => match other.parse::<u8>() {
                Ok(n) if (1..=22).contains(&n) => Ok(Chromosome::Autosome(n)),
                _ => Err(ParseChromosomeError(s.to_string())),
            },
        }
    }
}

impl From<Chromosome> for String {
    fn from(chrom: Chromosome) -> Self {
        chrom.to_string()
    }
}

impl TryFrom<String> for Chromosome {
    type Error = ParseChromosomeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Allele symbols allowed in a canonical genotype
const ALLELES: &[char] = &['A', 'C', 'G', 'T', 'D', 'I', 'N'];

/// One or two allele symbols (haploid calls keep a single symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype(String);

impl Genotype {
    /// Normalize a raw genotype string.
    ///
    /// Returns `None` for no-calls ("--", "-", "0", "00", ".", "") and for
    /// anything outside the canonical allele alphabet.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .trim_matches('"')
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if cleaned.is_empty() || cleaned.len() > 2 {
            return None;
        }

        if cleaned.chars().any(|c| matches!(c, '-' | '0' | '.')) {
            return None;
        }

        if !cleaned.chars().all(|c| ALLELES.contains(&c)) {
            return None;
        }

        Some(Genotype(cleaned))
    }

    /// Build a genotype from two separately reported alleles.
    /// A no-call on either allele makes the whole genotype a no-call.
    pub fn from_alleles(allele1: &str, allele2: &str) -> Option<Self> {
        let a1 = allele1.trim().trim_matches('"');
        let a2 = allele2.trim().trim_matches('"');
        if a1.len() != 1 || a2.len() != 1 {
            return None;
        }
        Self::parse(&format!("{}{}", a1, a2))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn alleles(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }

    pub fn is_haploid(&self) -> bool {
        self.0.len() == 1
    }

    /// Reverse-strand genotype (A <-> T, C <-> G); D, I and N are unchanged
    pub fn complement(&self) -> Genotype {
        Genotype(
            self.0
                .chars()
                .map(|c| match c {
                    'A' => 'T',
                    'T' => 'A',
                    'C' => 'G',
                    'G' => 'C',
                    other => other,
                })
                .collect(),
        )
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the canonical variant table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    /// Marker identifier (e.g., "rs548049170", "i713426")
    pub rsid: String,
    pub chromosome: Chromosome,
    /// 1-based position on the detected build
    pub position: u64,
    /// `None` for no-calls
    pub genotype: Option<Genotype>,
}

impl VariantRecord {
    pub fn new(
        rsid: impl Into<String>,
        chromosome: Chromosome,
        position: u64,
        genotype: Option<Genotype>,
    ) -> Self {
        Self {
            rsid: rsid.into(),
            chromosome,
            position,
            genotype,
        }
    }
}

/// Canonical variant table produced by one parse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantTable {
    pub records: Vec<VariantRecord>,
    /// Source label of the detected format ("" when unrecognized)
    pub source: String,
    /// Detected build, `None` when unknown
    pub build: Option<Assembly>,
    /// Whether alleles carry a deterministic haplotype order
    pub phased: bool,
    /// VCF whose records carried no identifiers
    pub unannotated_vcf: bool,
}

impl VariantTable {
    /// Empty table that still reports which format was recognized
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Empty table for content no detector recognized
    pub fn unrecognized() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariantRecord> {
        self.records.iter()
    }

    pub fn get(&self, rsid: &str) -> Option<&VariantRecord> {
        self.records.iter().find(|r| r.rsid == rsid)
    }

    /// Number of records with a called genotype
    pub fn called_count(&self) -> usize {
        self.records.iter().filter(|r| r.genotype.is_some()).count()
    }
}

impl<'a> IntoIterator for &'a VariantTable {
    type Item = &'a VariantRecord;
    type IntoIter = std::slice::Iter<'a, VariantRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
