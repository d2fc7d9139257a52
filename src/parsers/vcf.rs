// ==============================================================================
// parsers/vcf.rs - VCF file parser
// ==============================================================================
// Description: Line-oriented VCF genotype parser (first sample, GT field)
// Author: Matt Barham
// Created: 2025-11-03
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================
// References:
// - VCF 4.2 Spec: https://samtools.github.io/hts-specs/VCFv4.2.pdf
//
// States: meta lines (##) -> column header (#CHROM) -> records.
// QUAL, FILTER and INFO are optional; FORMAT and the sample are located by
// header name. Indels and structural alleles collapse to D/I/N sentinels.
// ==============================================================================

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Genotype, VariantRecord, VariantTable};
use crate::parsers::{detect_build_from_comments, parse_chromosome, parse_position, RecordError, TableBuilder};

pub const SOURCE: &str = "vcf";

/// Structural problems that make the whole file unusable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VcfHeaderError {
    #[error("No #CHROM column header line found")]
    MissingColumnHeader,

    #[error("Column header lacks required column: {0}")]
    MissingColumn(&'static str),

    #[error("Column header declares no sample columns")]
    NoSamples,
}

/// Parser state
#[derive(Debug, Clone, Copy)]
enum State {
    /// Reading "##" meta lines
    Meta,
    /// Column header seen; reading data records
    Records(Columns),
}

/// Column positions resolved from the #CHROM header
#[derive(Debug, Clone, Copy)]
struct Columns {
    chrom: usize,
    pos: usize,
    id: usize,
    reference: usize,
    alt: usize,
    format: usize,
    /// First sample column (others are ignored)
    sample: usize,
}

impl Columns {
    fn from_header(line: &str) -> Result<(Self, usize), VcfHeaderError> {
        let names: Vec<&str> = line.trim_start_matches('#').split('\t').map(str::trim).collect();
        let find = |name: &'static str| {
            names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(name))
                .ok_or(VcfHeaderError::MissingColumn(name))
        };

        let format = find("FORMAT")?;
        let sample_count = names.len().saturating_sub(format + 1);
        if sample_count == 0 {
            return Err(VcfHeaderError::NoSamples);
        }

        Ok((
            Self {
                chrom: find("CHROM")?,
                pos: find("POS")?,
                id: find("ID")?,
                reference: find("REF")?,
                alt: find("ALT")?,
                format,
                sample: format + 1,
            },
            sample_count,
        ))
    }

    /// Fields a record needs to reach every located column
    fn width(&self) -> usize {
        [self.chrom, self.pos, self.id, self.reference, self.alt, self.format, self.sample]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Outcome of one data line
enum Parsed {
    Record(Vec<VariantRecord>, Phasing),
    /// ID column was "."
    NoId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phasing {
    Phased,
    Unphased,
    /// Haploid or absent call; does not affect the table flag
    Neutral,
}

/// VCF parser with per-parse counters
#[derive(Debug, Default)]
pub struct VcfParser {
    /// Records skipped for lack of an identifier
    pub skipped_count: usize,

    /// Records that failed to parse
    pub error_count: usize,
}

impl VcfParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse decompressed VCF text into a variant table
    ///
    /// Structural failures (no column header, no sample) produce an empty
    /// table that is still labelled "vcf".
    pub fn parse_str(&mut self, text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
        self.skipped_count = 0;
        self.error_count = 0;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut builder = TableBuilder::new(SOURCE, rsids);
        let mut meta = String::new();
        let mut state = State::Meta;
        let mut records_seen = 0usize;
        let mut saw_phased = false;
        let mut saw_unphased = false;

        for (idx, line) in text.lines().enumerate() {
            let line_number = idx + 1;
            if line.trim().is_empty() {
                continue;
            }

            match state {
                State::Meta => {
                    if line.starts_with("##") {
                        meta.push_str(line);
                        meta.push('\n');
                    } else if line.starts_with("#CHROM") || line.starts_with("#chrom") {
                        match Columns::from_header(line) {
                            Ok((columns, samples)) => {
                                if samples > 1 {
                                    debug!("VCF has {} samples, using the first", samples);
                                }
                                state = State::Records(columns);
                            }
                            Err(e) => {
                                warn!("Unusable VCF: {}", e);
                                return builder.finish(None, false);
                            }
                        }
                    } else {
                        warn!("Unusable VCF: {}", VcfHeaderError::MissingColumnHeader);
                        return builder.finish(None, false);
                    }
                }
                State::Records(columns) => {
                    if line.starts_with('#') {
                        continue;
                    }
                    records_seen += 1;

                    match parse_record(line, &columns) {
                        Ok(Parsed::Record(row, phasing)) => {
                            let wanted = rsids
                                .map(|filter| row.iter().any(|r| filter.contains(&r.rsid)))
                                .unwrap_or(true);
                            if wanted {
                                match phasing {
                                    Phasing::Phased => saw_phased = true,
                                    Phasing::Unphased => saw_unphased = true,
                                    Phasing::Neutral => {}
                                }
                            }
                            builder.push_row(row);
                        }
                        Ok(Parsed::NoId) => self.skipped_count += 1,
                        Err(e) => {
                            self.error_count += 1;
                            builder.malformed(line_number, &e);
                        }
                    }
                }
            }
        }

        if matches!(state, State::Meta) && !meta.is_empty() {
            warn!("Unusable VCF: {}", VcfHeaderError::MissingColumnHeader);
        }

        let build = detect_build_from_comments(&meta, SOURCE);
        let mut table = builder.finish(build, saw_phased && !saw_unphased);

        if records_seen > 0 && self.skipped_count == records_seen {
            warn!("VCF records carry no identifiers ({} records)", records_seen);
            table.unannotated_vcf = true;
        } else if self.skipped_count > 0 {
            debug!("Skipped {} VCF records without identifiers", self.skipped_count);
        }

        table
    }
}

fn parse_record(line: &str, columns: &Columns) -> Result<Parsed, RecordError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let width = columns.width();
    if fields.len() < width {
        return Err(RecordError::FieldCount {
            expected: width,
            found: fields.len(),
        });
    }

    let id = fields[columns.id].trim();
    if id.is_empty() || id == "." {
        return Ok(Parsed::NoId);
    }

    let chromosome = parse_chromosome(fields[columns.chrom])?;
    let position = parse_position(fields[columns.pos])?;

    let reference = fields[columns.reference].trim();
    let alts: Vec<&str> = fields[columns.alt]
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != ".")
        .collect();
    let symbols = allele_symbols(reference, &alts);

    let gt = genotype_field(fields[columns.format], fields[columns.sample]);
    let (genotype, phasing) = match gt {
        Some(gt) => decode_gt(gt, &symbols)?,
        None => (None, Phasing::Neutral),
    };

    let row = id
        .split(';')
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .map(|i| VariantRecord::new(i, chromosome, position, genotype.clone()))
        .collect();

    Ok(Parsed::Record(row, phasing))
}

/// GT value of the sample, located through the FORMAT keys
fn genotype_field<'a>(format: &str, sample: &'a str) -> Option<&'a str> {
    let index = format.split(':').position(|key| key == "GT")?;
    sample.split(':').nth(index).map(str::trim)
}

/// Translate a GT value ("0|1", "1/1", "0", "./.") into a genotype
fn decode_gt(gt: &str, symbols: &[char]) -> Result<(Option<Genotype>, Phasing), RecordError> {
    let indexes: Vec<&str> = gt.split(|c: char| c == '|' || c == '/').collect();

    if indexes.iter().any(|i| *i == "." || i.is_empty()) {
        return Ok((None, Phasing::Neutral));
    }

    let mut alleles = String::with_capacity(indexes.len());
    for raw in &indexes {
        let index: usize = raw
            .parse()
            .map_err(|_| RecordError::InvalidRow(format!("GT '{}'", gt)))?;
        let symbol = symbols.get(index).ok_or(RecordError::AlleleIndex(index))?;
        alleles.push(*symbol);
    }

    let phasing = if indexes.len() < 2 {
        Phasing::Neutral
    } else if gt.contains('|') {
        Phasing::Phased
    } else {
        Phasing::Unphased
    };

    Ok((Genotype::parse(&alleles), phasing))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlleleKind {
    Sequence,
    Deletion,
    Insertion,
    /// Symbolic allele with no D/I meaning (<NON_REF>, <*>, <CNV>, ...)
    Other,
}

fn allele_kind(allele: &str) -> AlleleKind {
    if allele == "*" {
        return AlleleKind::Deletion;
    }
    if allele.starts_with('<') {
        let upper = allele.to_ascii_uppercase();
        if upper.starts_with("<DEL") {
            return AlleleKind::Deletion;
        }
        if upper.starts_with("<INS") || upper.starts_with("<DUP") {
            return AlleleKind::Insertion;
        }
        return AlleleKind::Other;
    }
    AlleleKind::Sequence
}

/// Single-letter symbol per allele index (0 = REF, then ALTs in order)
///
/// Each ALT is classed by its length against REF: shorter is D, longer is I,
/// equal keeps its base (N for multi-base substitutions). REF keeps its base
/// when any ALT has the same length; at a pure indel site it is D when the
/// ALTs are longer and I otherwise. When the only ALTs are symbolic indels,
/// REF takes the opposite symbol.
fn allele_symbols(reference: &str, alts: &[&str]) -> Vec<char> {
    let reference_len = reference.len();
    let kinds: Vec<AlleleKind> = alts.iter().map(|a| allele_kind(a)).collect();

    let sequence_lengths: Vec<usize> = alts
        .iter()
        .zip(&kinds)
        .filter(|(_, kind)| **kind == AlleleKind::Sequence)
        .map(|(a, _)| a.len())
        .collect();

    let reference_symbol = if sequence_lengths.is_empty() {
        match kinds.iter().find(|k| matches!(k, AlleleKind::Deletion | AlleleKind::Insertion)) {
            Some(AlleleKind::Deletion) => 'I',
            Some(_) => 'D',
            None => single_base(reference),
        }
    } else if sequence_lengths.contains(&reference_len) {
        single_base(reference)
    } else if sequence_lengths.iter().any(|len| *len < reference_len) {
        'I'
    } else {
        'D'
    };

    std::iter::once(reference_symbol)
        .chain(alts.iter().zip(&kinds).map(|(allele, kind)| match kind {
            AlleleKind::Deletion => 'D',
            AlleleKind::Insertion => 'I',
            AlleleKind::Other => 'N',
            AlleleKind::Sequence => match allele.len().cmp(&reference_len) {
                std::cmp::Ordering::Less => 'D',
                std::cmp::Ordering::Greater => 'I',
                std::cmp::Ordering::Equal => single_base(allele),
            },
        }))
        .collect()
}

fn single_base(allele: &str) -> char {
    let mut chars = allele.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => match c.to_ascii_uppercase() {
            base @ ('A' | 'C' | 'G' | 'T') => base,
            _ => 'N',
        },
        _ => 'N',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assembly, Chromosome};

    const HEADER: &str = "##fileformat=VCFv4.2\n##reference=GRCh37\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tSAMPLE\n";

    fn parse(body: &str) -> VariantTable {
        VcfParser::new().parse_str(&format!("{}{}", HEADER, body), None)
    }

    #[test]
    fn test_phased_vcf() {
        let table = parse(
            "1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\n\
             1\t102\trs2\tC\tT\t.\tPASS\t.\tGT\t1|1\n\
             1\t103\trs3\tG\tA\t.\tPASS\t.\tGT\t0|0\n",
        );
        assert_eq!(table.source, "vcf");
        assert_eq!(table.build, Some(Assembly::GRCh37));
        assert!(table.phased);
        assert_eq!(table.len(), 3);
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "AG");
        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "TT");
        assert_eq!(table.records[2].genotype.as_ref().unwrap().as_str(), "GG");
    }

    #[test]
    fn test_mixed_phasing_is_unphased() {
        let table = parse(
            "1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\n\
             1\t102\trs2\tC\tT\t.\tPASS\t.\tGT\t0/1\n",
        );
        assert!(!table.phased);
    }

    #[test]
    fn test_haploid_calls_do_not_affect_phasing() {
        let table = parse(
            "1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\n\
             MT\t102\trs2\tC\tT\t.\tPASS\t.\tGT\t1\n",
        );
        assert!(table.phased);
        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "T");
    }

    #[test]
    fn test_multi_allelic_and_non_ref() {
        let table = parse(
            "1\t101\trs1\tA\tC,G\t.\tPASS\t.\tGT\t1/2\n\
             1\t102\trs2\tT\tC,<NON_REF>\t.\tPASS\t.\tGT:AD\t0/1:3,4\n",
        );
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "CG");
        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "TC");
    }

    #[test]
    fn test_missing_alleles_are_no_call() {
        let table = parse(
            "1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t./.\n\
             1\t102\trs2\tA\tG\t.\tPASS\t.\tGT\t0/.\n",
        );
        assert_eq!(table.len(), 2);
        assert!(table.records[0].genotype.is_none());
        assert!(table.records[1].genotype.is_none());
    }

    #[test]
    fn test_indel_sentinels() {
        let table = parse(
            "1\t101\trs1\tA\tAT\t.\tPASS\t.\tGT\t0/1\n\
             1\t102\trs2\tAT\tA\t.\tPASS\t.\tGT\t1/1\n\
             1\t103\trs3\tA\t<DEL>\t.\tPASS\t.\tGT\t0/1\n\
             1\t104\trs4\tA\t<INS:ME>\t.\tPASS\t.\tGT\t1/1\n\
             1\t105\trs5\tAC\tGT\t.\tPASS\t.\tGT\t0/1\n\
             1\t106\trs6\tA\tG,*\t.\tPASS\t.\tGT\t1/2\n",
        );
        let calls: Vec<&str> = table
            .iter()
            .map(|r| r.genotype.as_ref().map(|g| g.as_str()).unwrap_or("--"))
            .collect();
        assert_eq!(calls, vec!["DI", "DD", "ID", "II", "NN", "GD"]);
    }

    #[test]
    fn test_snv_and_indel_at_one_site() {
        let table = parse(
            "1\t101\trs1\tA\tG,AT\t.\tPASS\t.\tGT\t0/1\n\
             1\t102\trs2\tA\tG,AT\t.\tPASS\t.\tGT\t1/2\n\
             1\t103\trs3\tAT\tGT,A\t.\tPASS\t.\tGT\t0/2\n",
        );
        let calls: Vec<&str> = table
            .iter()
            .map(|r| r.genotype.as_ref().map(|g| g.as_str()).unwrap_or("--"))
            .collect();
        assert_eq!(calls, vec!["AG", "GI", "ND"]);
    }

    #[test]
    fn test_byte_order_mark() {
        let table = VcfParser::new().parse_str(
            &format!("\u{feff}{}1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0|1\n", HEADER),
            None,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table.build, Some(Assembly::GRCh37));
        assert!(table.phased);
    }

    #[test]
    fn test_columns_after_sample_are_bounds_checked() {
        let mut parser = VcfParser::new();
        let text = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tFORMAT\tSAMPLE\tID\tREF\tALT
1\t101\tGT\t0/1
1\t102\tGT\t0/1\trs2\tA\tG
";
        let table = parser.parse_str(text, None);
        assert_eq!(parser.error_count, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].rsid, "rs2");
    }

    #[test]
    fn test_rsid_filter() {
        let text = format!(
            "{}{}",
            HEADER,
            "1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0/1\n\
             1\t102\trs2\tC\tT\t.\tPASS\t.\tGT\t1/1\n\
             1\t103\trs3\tG\tA\t.\tPASS\t.\tGT\t0|0\n"
        );
        let filter: HashSet<String> = ["rs1", "rs2"].iter().map(|s| s.to_string()).collect();
        let table = VcfParser::new().parse_str(&text, Some(&filter));

        let ids: Vec<&str> = table.iter().map(|r| r.rsid.as_str()).collect();
        assert_eq!(ids, vec!["rs1", "rs2"]);
        // The phased record was filtered out
        assert!(!table.phased);
    }

    #[test]
    fn test_unannotated_vcf() {
        let mut parser = VcfParser::new();
        let text = format!(
            "{}{}",
            HEADER,
            "1\t101\t.\tA\tG\t.\tPASS\t.\tGT\t0/1\n\
             1\t102\t.\tC\tT\t.\tPASS\t.\tGT\t1/1\n"
        );
        let table = parser.parse_str(&text, None);
        assert!(table.is_empty());
        assert!(table.unannotated_vcf);
        assert_eq!(parser.skipped_count, 2);
    }

    #[test]
    fn test_optional_columns_and_extra_samples() {
        let text = "\
##fileformat=VCFv4.1
#CHROM\tPOS\tID\tREF\tALT\tFORMAT\tS1\tS2
chr1\t101\trs1\tA\tG\tGT:GQ\t1|0:99\t0|0:99
chrX\t102\trs2\tC\tT\tGT\t1\t0
";
        let table = VcfParser::new().parse_str(text, None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "GA");
        assert_eq!(table.records[1].chromosome, Chromosome::X);
        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "T");
        assert!(table.phased);
    }

    #[test]
    fn test_missing_sample_yields_labelled_empty_table() {
        let text = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n1\t101\trs1\tA\tG\t.\t.\t.\n";
        let table = VcfParser::new().parse_str(text, None);
        assert!(table.is_empty());
        assert_eq!(table.source, "vcf");
    }

    #[test]
    fn test_bad_allele_index_skips_record() {
        let mut parser = VcfParser::new();
        let table = parser.parse_str(
            &format!("{}1\t101\trs1\tA\tG\t.\tPASS\t.\tGT\t0/3\n1\t102\trs2\tA\tG\t.\tPASS\t.\tGT\t0/1\n", HEADER),
            None,
        );
        assert_eq!(table.len(), 1);
        assert_eq!(parser.error_count, 1);
    }
}
