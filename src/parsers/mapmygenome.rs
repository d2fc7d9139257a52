// ==============================================================================
// mapmygenome.rs - Mapmygenome Report Parser
// ==============================================================================
// Description: Parser for Mapmygenome tab-delimited genotyping reports
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Two header spellings are in circulation:
//   SNP Name  rsID  Sample.ID  Allele1 - Top  Allele2 - Top  ...  Chr  Position
//   SNP.Name  Sample.ID  Allele1...Top  Allele2...Top  ...  Chr  Position
// Columns are located by name; the rsID column is preferred over SNP Name.
// ==============================================================================

use std::collections::HashSet;
use tracing::warn;

use crate::models::{Genotype, VariantRecord, VariantTable};
use crate::parsers::{parse_chromosome, parse_position, RecordError, TableBuilder};

pub const SOURCE: &str = "Mapmygenome";

/// Column indexes resolved from the header line
#[derive(Debug, Clone, Copy)]
struct Columns {
    rsid: usize,
    chrom: usize,
    pos: usize,
    allele1: usize,
    allele2: usize,
}

impl Columns {
    fn from_header(header: &[&str]) -> Option<Self> {
        let rsid = find_column(header, |h| h == "rsID")
            .or_else(|| find_column(header, |h| h == "SNP Name" || h == "SNP.Name"))?;

        Some(Self {
            rsid,
            chrom: find_column(header, |h| h == "Chr")?,
            pos: find_column(header, |h| h == "Position")?,
            allele1: find_column(header, |h| h.starts_with("Allele1") && h.ends_with("Top"))?,
            allele2: find_column(header, |h| h.starts_with("Allele2") && h.ends_with("Top"))?,
        })
    }

    fn width(&self) -> usize {
        [self.rsid, self.chrom, self.pos, self.allele1, self.allele2]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

fn find_column(header: &[&str], pred: impl Fn(&str) -> bool) -> Option<usize> {
    header.iter().position(|h| pred(h.trim()))
}

pub fn parse(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    let mut builder = TableBuilder::new(SOURCE, rsids);
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty() && !l.starts_with('#'));

    let Some((_, header_line)) = lines.next() else {
        return builder.finish(None, false);
    };
    let header: Vec<&str> = header_line.trim_start_matches('\u{feff}').split('\t').collect();

    let Some(columns) = Columns::from_header(&header) else {
        warn!("{}: report header lacks rsid/Chr/Position/allele columns", SOURCE);
        return builder.finish(None, false);
    };

    for (idx, line) in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        match parse_line(&fields, &columns) {
            Ok(record) => builder.push(record),
            Err(e) => builder.malformed(idx + 1, &e),
        }
    }

    builder.finish(None, false)
}

fn parse_line(fields: &[&str], columns: &Columns) -> Result<VariantRecord, RecordError> {
    if fields.len() < columns.width() {
        return Err(RecordError::FieldCount {
            expected: columns.width(),
            found: fields.len(),
        });
    }

    let rsid = fields[columns.rsid].trim();
    if rsid.is_empty() {
        return Err(RecordError::MissingField("rsID"));
    }

    Ok(VariantRecord::new(
        rsid,
        parse_chromosome(fields[columns.chrom])?,
        parse_position(fields[columns.pos])?,
        Genotype::from_alleles(fields[columns.allele1], fields[columns.allele2]),
    ))
}
