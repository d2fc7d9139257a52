// ==============================================================================
// ancestry.rs - AncestryDNA Raw Data Parser
// ==============================================================================
// Description: Parser for AncestryDNA five-column raw data downloads
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text with '#' header comments and a column header
// Example:
//   #AncestryDNA raw data download
//   rsid    chromosome    position    allele1    allele2
//   rs4477212    1    82154    T    T
//   rs3131972    1    752721    0    0
//
// Chromosome codes 23/24/25/26 are X/Y/PAR/MT.
// ==============================================================================

use std::collections::HashSet;

use crate::models::{Genotype, VariantRecord, VariantTable};
use crate::parsers::{is_numeric, parse_chromosome, parse_position, RecordError, TableBuilder};

pub const SOURCE: &str = "AncestryDNA";

pub fn parse(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    let mut builder = TableBuilder::new(SOURCE, rsids);

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        // Column header (possibly repeated in concatenated downloads)
        if fields.len() >= 3 && !is_numeric(fields[2]) {
            continue;
        }

        match parse_line(&fields) {
            Ok(record) => builder.push(record),
            Err(e) => builder.malformed(idx + 1, &e),
        }
    }

    builder.finish(None, false)
}

fn parse_line(fields: &[&str]) -> Result<VariantRecord, RecordError> {
    if fields.len() < 5 {
        return Err(RecordError::FieldCount {
            expected: 5,
            found: fields.len(),
        });
    }

    Ok(VariantRecord::new(
        fields[0],
        parse_chromosome(fields[1])?,
        parse_position(fields[2])?,
        Genotype::from_alleles(fields[3], fields[4]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chromosome;

    const SAMPLE: &str = "\
#AncestryDNA raw data download
#This file was generated by AncestryDNA at: 12/14/2017
#Data was collected using AncestryDNA array version: V2.0
#Genetic data is provided below as five TAB delimited columns.
rsid\tchromosome\tposition\tallele1\tallele2
rs1\t1\t101\tA\tA
rs2\t1\t102\tC\tT
rs3\t1\t103\t0\t0
rs4\t23\t104\tA\tA
rs5\t24\t105\tG\tG
rs6\t25\t106\tC\tT
rs7\t26\t107\tT\tT
";

    #[test]
    fn test_parse_ancestry() {
        let table = parse(SAMPLE, None);
        assert_eq!(table.source, "AncestryDNA");
        assert_eq!(table.len(), 7);

        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "CT");
        assert!(table.records[2].genotype.is_none());

        assert_eq!(table.records[3].chromosome, Chromosome::X);
        assert_eq!(table.records[4].chromosome, Chromosome::Y);
        assert_eq!(table.records[5].chromosome, Chromosome::PAR);
        assert_eq!(table.records[6].chromosome, Chromosome::MT);
    }

    #[test]
    fn test_half_call_is_no_call() {
        let text = "rsid\tchromosome\tposition\tallele1\tallele2\nrs1\t1\t101\tA\t0\n";
        let table = parse(text, None);
        assert_eq!(table.len(), 1);
        assert!(table.records[0].genotype.is_none());
    }

    #[test]
    fn test_short_lines_skipped() {
        let text = "rs1\t1\t101\tA\nrs2\t1\t102\tG\tG\n";
        let table = parse(text, None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].rsid, "rs2");
    }
}
