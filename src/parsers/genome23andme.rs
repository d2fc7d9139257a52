// ==============================================================================
// genome23andme.rs - 23andMe-style Raw Data Parser
// ==============================================================================
// Description: Parser for tab-delimited four-column raw genome exports
// Author: Matt Barham
// Created: 2025-11-04
// Modified: 2026-10-16
// Version: 2.0.0
// ==============================================================================
// Format: Tab-delimited text with header comments
// Example:
//   # rsid    chromosome    position    genotype
//   rs548049170    1    69869    TT
//   rs13328684    1    74792    --
//   rs9283150    1    565508    AA
//
// The same layout is used by LivingDNA, Genes for Good, DNA.Land and
// tellmeGen; only the source label differs.
// ==============================================================================

use std::collections::HashSet;

use crate::models::{Genotype, VariantRecord, VariantTable};
use crate::parsers::{is_numeric, parse_chromosome, parse_position, RecordError, TableBuilder};

/// Parse a four-column export, labelling the table with `source`
///
/// Lines starting with '#' are comments. A first data line whose position
/// column is not numeric is treated as a column header. Lines that fail to
/// parse are skipped individually.
pub fn parse(text: &str, source: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    let mut builder = TableBuilder::new(source, rsids);
    let mut seen_data = false;

    for (idx, line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = line.trim();

        // Skip comment lines (start with '#')
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }

        let fields = split_fields(line);

        if !seen_data {
            seen_data = true;
            if fields.len() >= 3 && !is_numeric(fields[2]) {
                continue;
            }
        }

        match parse_line(&fields) {
            Ok(record) => builder.push(record),
            Err(e) => builder.malformed(line_number, &e),
        }
    }

    builder.finish(None, false)
}

/// Tab-delimited, falling back to whitespace for hand-edited files
fn split_fields(line: &str) -> Vec<&str> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 4 {
        fields
    } else {
        line.split_whitespace().collect()
    }
}

/// Parse a single data line
fn parse_line(fields: &[&str]) -> Result<VariantRecord, RecordError> {
    if fields.len() < 4 {
        return Err(RecordError::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    }

    let rsid = fields[0].trim();
    if rsid.is_empty() {
        return Err(RecordError::MissingField("rsid"));
    }

    Ok(VariantRecord {
        rsid: rsid.to_string(),
        chromosome: parse_chromosome(fields[1])?,
        position: parse_position(fields[2])?,
        genotype: Genotype::parse(fields[3]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chromosome;

    #[test]
    fn test_parse_valid_file() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
rs548049170\t1\t69869\tTT
rs13328684\t1\t74792\t--
rs9283150\t1\t565508\tAA
rs12345678\t2\t100000\tAG
";
        let table = parse(contents, "23andMe", None);

        assert_eq!(table.len(), 4);
        assert_eq!(table.source, "23andMe");

        // Check first record
        assert_eq!(table.records[0].rsid, "rs548049170");
        assert_eq!(table.records[0].chromosome, Chromosome::Autosome(1));
        assert_eq!(table.records[0].position, 69869);
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "TT");

        // Check no-call record
        assert!(table.records[1].genotype.is_none());

        // Check chromosome 2 record
        assert_eq!(table.records[3].chromosome, Chromosome::Autosome(2));
        assert_eq!(table.records[3].genotype.as_ref().unwrap().as_str(), "AG");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
rs1\t1\t101\tAA
rs2\t1\t102
rs3\t1\tNOT_A_NUMBER\tTT
rs4\tGL000192.1\t104\tCC
rs5\t1\t105\tGG
";
        let table = parse(contents, "23andMe", None);

        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].rsid, "rs1");
        assert_eq!(table.records[1].rsid, "rs5");
    }

    #[test]
    fn test_only_comments_yields_labelled_empty_table() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
# Just comments, no data
";
        let table = parse(contents, "23andMe", None);
        assert!(table.is_empty());
        assert_eq!(table.source, "23andMe");
    }

    #[test]
    fn test_whitespace_handling() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
  rs548049170  \t  1  \t  69869  \t  TT
";
        let table = parse(contents, "23andMe", None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].rsid, "rs548049170");
        assert_eq!(table.records[0].chromosome, Chromosome::Autosome(1));
        assert_eq!(table.records[0].position, 69869);
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "TT");
    }

    #[test]
    fn test_mixed_chromosomes() {
        let contents = "\
# rsid\tchromosome\tposition\tgenotype
rs1\t1\t100\tAA
rs2\tX\t200\tA
rs3\t10\t300\tGG
rs4\tY\t400\tT
rs5\t22\t500\tCC
rs6\tMT\t600\tA
";
        let table = parse(contents, "23andMe", None);
        assert_eq!(table.len(), 6);

        // Verify chromosome values are normalized correctly
        assert_eq!(table.records[0].chromosome, Chromosome::Autosome(1));
        assert_eq!(table.records[1].chromosome, Chromosome::X);
        assert_eq!(table.records[2].chromosome, Chromosome::Autosome(10));
        assert_eq!(table.records[3].chromosome, Chromosome::Y);
        assert_eq!(table.records[4].chromosome, Chromosome::Autosome(22));
        assert_eq!(table.records[5].chromosome, Chromosome::MT);

        // Haploid calls keep a single allele
        assert!(table.records[1].genotype.as_ref().unwrap().is_haploid());
    }

    #[test]
    fn test_uncommented_header_line() {
        let contents = "\
rsid\tChromosome\tposition\tgenotype
rs1\t23\t100\tAA
rs2\t26\t200\tC
";
        let table = parse(contents, "tellmeGen", None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].chromosome, Chromosome::X);
        assert_eq!(table.records[1].chromosome, Chromosome::MT);
    }

    #[test]
    fn test_rsid_filter() {
        let contents = "rs1\t1\t100\tAA\nrs2\t1\t200\tCC\nrs3\t1\t300\tGG\n";
        let filter: HashSet<String> = ["rs2".to_string()].into_iter().collect();
        let table = parse(contents, "DNA.Land", Some(&filter));
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].rsid, "rs2");
    }
}
