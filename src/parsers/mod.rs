// ==============================================================================
// parsers/mod.rs - Format detection and vendor parsers
// ==============================================================================
// Description: Ordered detector table and per-vendor parsers for raw genotype data
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================
// Detection order: VCF and every vendor signature first, generic delimiter
// sniffing last. The first matching predicate wins.
// ==============================================================================

pub mod ancestry;
pub mod ftdna;
pub mod generic;
pub mod genome23andme;
pub mod gsa;
pub mod mapmygenome;
pub mod myheritage;
pub mod vcf;

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Assembly, Chromosome, ParseChromosomeError, VariantRecord, VariantTable};
use crate::resources::Resources;

pub use vcf::VcfParser;

/// Single-row parse failure; the row is skipped and parsing continues
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Expected at least {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error(transparent)]
    InvalidChromosome(#[from] ParseChromosomeError),

    #[error("Invalid position value: '{0}'")]
    InvalidPosition(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Allele index {0} out of range")]
    AlleleIndex(usize),

    #[error("Unreadable row: {0}")]
    InvalidRow(String),
}

/// Supported input layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Vcf,
    TwentyThreeAndMe,
    AncestryDna,
    Ftdna,
    FtdnaFamfinder,
    MyHeritage,
    LivingDna,
    Mapmygenome,
    NativeCsv,
    TellmeGen,
    GenesForGood,
    DnaLand,
    Codigo46,
    Sano,
    Gsa,
    Generic,
}

impl Format {
    /// Source label reported on the parsed table.
    /// Native CSV files carry their own label in the header comments.
    pub fn label(&self) -> &'static str {
        match self {
            Format::Vcf => "vcf",
            Format::TwentyThreeAndMe => "23andMe",
            Format::AncestryDna => "AncestryDNA",
            Format::Ftdna | Format::FtdnaFamfinder => "FTDNA",
            Format::MyHeritage => "MyHeritage",
            Format::LivingDna => "LivingDNA",
            Format::Mapmygenome => "Mapmygenome",
            Format::NativeCsv => "",
            Format::TellmeGen => "tellmeGen",
            Format::GenesForGood => "GenesForGood",
            Format::DnaLand => "DNA.Land",
            Format::Codigo46 => "Codigo46",
            Format::Sano => "Sano",
            Format::Gsa => "GSA",
            Format::Generic => "generic",
        }
    }

    /// Run the parser for this format over already-decompressed text
    pub fn parse(&self, text: &str, peek: &Peek<'_>, ctx: &mut ParseContext<'_>) -> VariantTable {
        let mut table = match self {
            Format::Vcf => VcfParser::new().parse_str(text, ctx.rsids.as_ref()),
            Format::TwentyThreeAndMe
            | Format::LivingDna
            | Format::TellmeGen
            | Format::GenesForGood
            | Format::DnaLand => genome23andme::parse(text, self.label(), ctx.rsids.as_ref()),
            Format::AncestryDna => ancestry::parse(text, ctx.rsids.as_ref()),
            Format::Ftdna => ftdna::parse(text, ctx.rsids.as_ref()),
            Format::FtdnaFamfinder => ftdna::parse_famfinder(text, ctx.rsids.as_ref()),
            Format::MyHeritage => myheritage::parse(text, ctx.rsids.as_ref()),
            Format::Mapmygenome => mapmygenome::parse(text, ctx.rsids.as_ref()),
            Format::NativeCsv => generic::parse_native(text, peek, ctx.rsids.as_ref()),
            Format::Codigo46 | Format::Sano | Format::Gsa => {
                gsa::parse(text, self.label(), ctx.resources.as_deref_mut(), ctx.rsids.as_ref())
            }
            Format::Generic => generic::parse(text, ctx.rsids.as_ref()),
        };

        if table.build.is_none() {
            table.build = detect_build_from_comments(&peek.comments, &table.source);
        }
        table
    }
}

/// Detector predicate over the peeked head of a file
pub type Detector = fn(&Peek<'_>) -> bool;

/// Ordered strategy table: first match wins
pub const DETECTORS: &[(Format, Detector)] = &[
    (Format::Vcf, is_vcf),
    (Format::TwentyThreeAndMe, is_23andme),
    (Format::AncestryDna, is_ancestry),
    (Format::Ftdna, is_ftdna),
    (Format::FtdnaFamfinder, is_ftdna_famfinder),
    (Format::MyHeritage, is_myheritage),
    (Format::LivingDna, is_livingdna),
    (Format::Mapmygenome, is_mapmygenome),
    (Format::NativeCsv, is_native_csv),
    (Format::TellmeGen, is_tellmegen),
    (Format::GenesForGood, is_genes_for_good),
    (Format::DnaLand, is_dnaland),
    (Format::Codigo46, is_codigo46),
    (Format::Sano, is_sano),
    (Format::Gsa, is_gsa),
    (Format::Generic, is_generic),
];

fn is_vcf(p: &Peek<'_>) -> bool {
    p.first_line.contains("##fileformat=VCF") || p.comments.contains("##fileformat=VCF")
}

fn is_23andme(p: &Peek<'_>) -> bool {
    p.first_line.contains("23andMe")
}

fn is_ancestry(p: &Peek<'_>) -> bool {
    p.first_line.contains("Ancestry")
}

fn is_ftdna(p: &Peek<'_>) -> bool {
    p.first_line.starts_with("RSID")
}

fn is_ftdna_famfinder(p: &Peek<'_>) -> bool {
    p.first_line.contains("famfinder")
}

fn is_myheritage(p: &Peek<'_>) -> bool {
    p.first_line.contains("MyHeritage")
}

fn is_livingdna(p: &Peek<'_>) -> bool {
    p.first_line.contains("Living DNA")
}

fn is_mapmygenome(p: &Peek<'_>) -> bool {
    p.first_line.contains("SNP Name\trsID") || p.first_line.contains("SNP.Name\tSample.ID")
}

fn is_native_csv(p: &Peek<'_>) -> bool {
    p.first_line.contains("Generated by") && p.comments.contains("Source(s):")
}

fn is_tellmegen(p: &Peek<'_>) -> bool {
    p.first_line.trim_end() == "rsid\tChromosome\tposition\tgenotype"
}

fn is_genes_for_good(p: &Peek<'_>) -> bool {
    p.comments.contains("Genes for Good") || p.comments.contains("PLINK")
}

fn is_dnaland(p: &Peek<'_>) -> bool {
    p.comments.contains("DNA.Land")
}

fn is_codigo46(p: &Peek<'_>) -> bool {
    p.is_illumina_report() && p.comments.contains("CODIGO46")
}

fn is_sano(p: &Peek<'_>) -> bool {
    p.is_illumina_report() && p.comments.contains("SANO")
}

fn is_gsa(p: &Peek<'_>) -> bool {
    p.is_illumina_report() && p.comments.contains("GSA")
}

fn is_generic(p: &Peek<'_>) -> bool {
    generic::sniff(p).is_some()
}

/// Select a parser for the peeked content, `None` when unrecognized
pub fn detect(peek: &Peek<'_>) -> Option<Format> {
    DETECTORS
        .iter()
        .find(|(_, matches)| matches(peek))
        .map(|(format, _)| *format)
}

/// Head of a file as seen by the detectors
#[derive(Debug, Clone)]
pub struct Peek<'a> {
    pub first_line: &'a str,
    /// Leading "#" lines, or the Illumina [Header] block
    pub comments: String,
    /// First lines after the comment block (at most two)
    pub data_lines: Vec<&'a str>,
}

impl<'a> Peek<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));
        let first_line = lines.next().unwrap_or("").trim_start_matches('\u{feff}');

        let mut comments = String::new();
        let mut data_lines = Vec::with_capacity(2);

        if first_line.starts_with('#') {
            comments.push_str(first_line);
            comments.push('\n');
            for line in lines.by_ref() {
                if line.starts_with('#') {
                    comments.push_str(line);
                    comments.push('\n');
                } else {
                    if !line.trim().is_empty() {
                        data_lines.push(line);
                    }
                    break;
                }
            }
        } else if first_line.starts_with("[Header]") {
            comments.push_str(first_line);
            comments.push('\n');
            for line in lines.by_ref() {
                if line.starts_with("[Data]") {
                    break;
                }
                comments.push_str(line);
                comments.push('\n');
            }
        } else if !first_line.trim().is_empty() {
            data_lines.push(first_line);
        }

        data_lines.extend(lines.filter(|l| !l.trim().is_empty()).take(2 - data_lines.len().min(2)));

        Self {
            first_line,
            comments,
            data_lines,
        }
    }

    pub fn is_illumina_report(&self) -> bool {
        self.first_line.starts_with("[Header]")
    }
}

/// Per-call inputs shared by all parsers
#[derive(Default)]
pub struct ParseContext<'r> {
    /// Restrict output to these identifiers
    pub rsids: Option<HashSet<String>>,
    /// Needed by GSA-array formats for coordinate lookup
    pub resources: Option<&'r mut Resources>,
}

/// Accumulates records for one parse, enforcing locus uniqueness and the rsid filter
pub(crate) struct TableBuilder<'a> {
    source: String,
    records: Vec<VariantRecord>,
    seen: HashSet<(Chromosome, u64)>,
    rsids: Option<&'a HashSet<String>>,
    malformed: usize,
    duplicates: usize,
}

impl<'a> TableBuilder<'a> {
    pub(crate) fn new(source: impl Into<String>, rsids: Option<&'a HashSet<String>>) -> Self {
        Self {
            source: source.into(),
            records: Vec::new(),
            seen: HashSet::new(),
            rsids,
            malformed: 0,
            duplicates: 0,
        }
    }

    /// Add the records produced by one input row.
    /// Records from the same row may share a locus (multi-rsid rows); a row whose
    /// locus was already emitted by an earlier row is dropped.
    pub(crate) fn push_row(&mut self, row: Vec<VariantRecord>) {
        let Some(first) = row.first() else {
            return;
        };

        let locus = (first.chromosome, first.position);
        if self.seen.contains(&locus) {
            self.duplicates += 1;
            debug!("Duplicate locus {}:{} ({}), row dropped", locus.0, locus.1, first.rsid);
            return;
        }

        let mut emitted = false;
        for record in row {
            if let Some(filter) = self.rsids {
                if !filter.contains(&record.rsid) {
                    continue;
                }
            }
            self.records.push(record);
            emitted = true;
        }

        if emitted {
            self.seen.insert(locus);
        }
    }

    pub(crate) fn push(&mut self, record: VariantRecord) {
        self.push_row(vec![record]);
    }

    pub(crate) fn malformed(&mut self, line_number: usize, error: &RecordError) {
        self.malformed += 1;
        debug!("{}: skipping line {}: {}", self.source, line_number, error);
    }

    pub(crate) fn finish(self, build: Option<Assembly>, phased: bool) -> VariantTable {
        if self.malformed > 0 || self.duplicates > 0 {
            warn!(
                "{}: skipped {} malformed and {} duplicate rows",
                self.source, self.malformed, self.duplicates
            );
        }

        VariantTable {
            records: self.records,
            source: self.source,
            build,
            phased,
            unannotated_vcf: false,
        }
    }
}

pub(crate) fn parse_chromosome(raw: &str) -> Result<Chromosome, RecordError> {
    Ok(raw.parse::<Chromosome>()?)
}

/// 1-based position; zero is rejected
pub(crate) fn parse_position(raw: &str) -> Result<u64, RecordError> {
    let value = raw.trim().trim_matches('"');
    match value.parse::<u64>() {
        Ok(pos) if pos > 0 => Ok(pos),
        _ => Err(RecordError::InvalidPosition(value.to_string())),
    }
}

pub(crate) fn is_numeric(raw: &str) -> bool {
    let value = raw.trim().trim_matches('"');
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Infer the build from free-text header comments
pub fn detect_build_from_comments(comments: &str, source: &str) -> Option<Assembly> {
    let comments = comments.to_lowercase();

    let rules: &[(&[&str], Assembly)] = &[
        (&["build 37"], Assembly::GRCh37),
        (&["build 36"], Assembly::Ncbi36),
        (&["build 38"], Assembly::GRCh38),
        (&["grch38", "hg38"], Assembly::GRCh38),
        (&["grch37", "hg19", "b37"], Assembly::GRCh37),
        (&["ncbi36", "hg18", "b36"], Assembly::Ncbi36),
        // Length of chromosome 1 in each assembly (VCF contig lines)
        (&["247249719"], Assembly::Ncbi36),
        (&["249250621"], Assembly::GRCh37),
        (&["248956422"], Assembly::GRCh38),
    ];

    for (needles, assembly) in rules {
        if needles.iter().any(|n| comments.contains(n)) {
            return Some(*assembly);
        }
    }

    match source {
        "LivingDNA" => Some(Assembly::GRCh37),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect_text(text: &str) -> Option<Format> {
        detect(&Peek::new(text))
    }

    #[test]
    fn test_peek_comment_block() {
        let text = "# line one\n# line two\nrs1\t1\t101\tAA\nrs2\t1\t102\tCC\nrs3\t1\t103\tGG\n";
        let peek = Peek::new(text);
        assert_eq!(peek.first_line, "# line one");
        assert_eq!(peek.comments, "# line one\n# line two\n");
        assert_eq!(peek.data_lines, vec!["rs1\t1\t101\tAA", "rs2\t1\t102\tCC"]);
    }

    #[test]
    fn test_peek_illumina_header() {
        let text = "[Header]\nContent\tGSA-24v2\n[Data]\nSNP Name\tAllele1 - Plus\nGSA-rs1\tA\n";
        let peek = Peek::new(text);
        assert!(peek.is_illumina_report());
        assert!(peek.comments.contains("GSA-24v2"));
        assert_eq!(peek.data_lines, vec!["SNP Name\tAllele1 - Plus", "GSA-rs1\tA"]);
    }

    #[test]
    fn test_peek_plain_first_line() {
        let peek = Peek::new("\u{feff}RSID,CHROMOSOME\r\nrs1,1\r\n");
        assert_eq!(peek.first_line, "RSID,CHROMOSOME");
        assert!(peek.comments.is_empty());
        assert_eq!(peek.data_lines, vec!["RSID,CHROMOSOME", "rs1,1"]);
    }

    #[test]
    fn test_detect_vendor_signatures() {
        assert_eq!(
            detect_text("##fileformat=VCFv4.2\n#CHROM\tPOS\n"),
            Some(Format::Vcf)
        );
        assert_eq!(
            detect_text("# This data file generated by 23andMe at: Mon\nrs1\t1\t1\tAA\n"),
            Some(Format::TwentyThreeAndMe)
        );
        assert_eq!(
            detect_text("#AncestryDNA raw data download\nrsid\tchromosome\n"),
            Some(Format::AncestryDna)
        );
        assert_eq!(
            detect_text("RSID,CHROMOSOME,POSITION,RESULT\n\"rs1\",\"1\",\"101\",\"AA\"\n"),
            Some(Format::Ftdna)
        );
        assert_eq!(
            detect_text("# famfinder export\nrs1\t1\t101\tA\tA\n"),
            Some(Format::FtdnaFamfinder)
        );
        assert_eq!(
            detect_text("# MyHeritage DNA raw data.\nRSID,CHROMOSOME,POSITION,RESULT\n"),
            Some(Format::MyHeritage)
        );
        assert_eq!(
            detect_text("# Living DNA customer genotype data download file\nrs1\t1\t101\tAA\n"),
            Some(Format::LivingDna)
        );
        assert_eq!(
            detect_text("SNP Name\trsID\tSample.ID\n"),
            Some(Format::Mapmygenome)
        );
        assert_eq!(
            detect_text("# Generated by snps v2.0\n# Source(s): 23andMe\nrsid,chromosome,position,genotype\n"),
            Some(Format::NativeCsv)
        );
        assert_eq!(
            detect_text("rsid\tChromosome\tposition\tgenotype\nrs1\t1\t101\tAA\n"),
            Some(Format::TellmeGen)
        );
        assert_eq!(
            detect_text("# Genes for Good v1\nrs1\t1\t101\tAA\n"),
            Some(Format::GenesForGood)
        );
        assert_eq!(
            detect_text("# DNA.Land genotype file\nrs1\t1\t101\tAA\n"),
            Some(Format::DnaLand)
        );
        assert_eq!(
            detect_text("[Header]\nSource\tCODIGO46\n[Data]\nSNP Name\n"),
            Some(Format::Codigo46)
        );
        assert_eq!(
            detect_text("[Header]\nSource\tSANO\n[Data]\nSNP Name\n"),
            Some(Format::Sano)
        );
        assert_eq!(
            detect_text("[Header]\nContent\tGSA-24v3-0_A1.bpm\n[Data]\nSNP Name\n"),
            Some(Format::Gsa)
        );
    }

    #[test]
    fn test_detect_generic_fallback() {
        assert_eq!(
            detect_text("rsid,chromosome,position,genotype\nrs1,1,101,AA\n"),
            Some(Format::Generic)
        );
        assert_eq!(detect_text("rs1\t1\t101\tAA\n"), Some(Format::Generic));
        assert_eq!(detect_text("hello world\nthis is not genotype data\n"), None);
        assert_eq!(detect_text(""), None);
    }

    #[test]
    fn test_capitalized_chromosome_column_is_generic() {
        assert_eq!(
            detect_text("rsid\tChromosome\tPosition\tGenotype\nrs1\t1\t101\tAA\nrs2\t1\t102\tCC\n"),
            Some(Format::Generic)
        );
        assert_eq!(
            detect_text("\u{feff}rsid\tChromosome\tposition\tgenotype\r\nrs1\t1\t101\tAA\r\n"),
            Some(Format::TellmeGen)
        );
    }

    #[test]
    fn test_vendor_checks_precede_generic() {
        // A 23andMe file is also valid generic TSV; the vendor signature must win
        let text = "# 23andMe\nrs1\t1\t101\tAA\n";
        assert_eq!(detect_text(text), Some(Format::TwentyThreeAndMe));
        assert_eq!(
            DETECTORS.last().map(|(format, _)| *format),
            Some(Format::Generic)
        );
    }

    #[test]
    fn test_detect_build_from_comments() {
        assert_eq!(
            detect_build_from_comments("# human reference build 37.1", "AncestryDNA"),
            Some(Assembly::GRCh37)
        );
        assert_eq!(
            detect_build_from_comments("##reference=GRCh38", "vcf"),
            Some(Assembly::GRCh38)
        );
        assert_eq!(
            detect_build_from_comments("##contig=<ID=1,length=247249719>", "vcf"),
            Some(Assembly::Ncbi36)
        );
        assert_eq!(detect_build_from_comments("", "LivingDNA"), Some(Assembly::GRCh37));
        assert_eq!(detect_build_from_comments("", "generic"), None);
    }

    #[test]
    fn test_table_builder_locus_and_filter() {
        use crate::models::Genotype;

        let filter: HashSet<String> = ["rs1".to_string(), "rs3".to_string()].into_iter().collect();
        let mut builder = TableBuilder::new("test", Some(&filter));
        builder.push(VariantRecord::new("rs1", Chromosome::Autosome(1), 101, Genotype::parse("AA")));
        builder.push(VariantRecord::new("rs2", Chromosome::Autosome(1), 102, Genotype::parse("CC")));
        builder.push(VariantRecord::new("rs3", Chromosome::Autosome(1), 101, Genotype::parse("GG")));
        let table = builder.finish(None, false);

        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].rsid, "rs1");
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!(parse_position("\"101\"").unwrap(), 101);
        assert!(parse_position("0").is_err());
        assert!(parse_position("-5").is_err());
        assert!(parse_position("abc").is_err());
    }
}
