// ==============================================================================
// ftdna.rs - FamilyTreeDNA Raw Data Parsers
// ==============================================================================
// Description: Parsers for FTDNA quoted CSV exports and famfinder text exports
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Formats:
//   Family Finder CSV:
//     RSID,CHROMOSOME,POSITION,RESULT
//     "rs4477212","1","82154","AA"
//   famfinder text:
//     # famfinder ...
//     rs4477212    1    82154    A    A
//
// Concatenated CSV exports repeat the header line; repeats are skipped.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;

use crate::models::{Genotype, VariantRecord, VariantTable};
use crate::parsers::{is_numeric, parse_chromosome, parse_position, RecordError, TableBuilder};

pub const SOURCE: &str = "FTDNA";

/// Parse a Family Finder CSV export
pub fn parse(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    parse_result_csv(text, SOURCE, rsids)
}

/// Shared reader for `RSID,CHROMOSOME,POSITION,RESULT` exports (FTDNA, MyHeritage)
pub(crate) fn parse_result_csv(
    text: &str,
    source: &str,
    rsids: Option<&HashSet<String>>,
) -> VariantTable {
    let mut builder = TableBuilder::new(source, rsids);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    for (idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                builder.malformed(idx + 1, &RecordError::InvalidRow(e.to_string()));
                continue;
            }
        };

        let line_number = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);

        if is_header(&record) {
            continue;
        }

        match parse_result_record(&record) {
            Ok(variant) => builder.push(variant),
            Err(e) => builder.malformed(line_number, &e),
        }
    }

    builder.finish(None, false)
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|field| field.eq_ignore_ascii_case("rsid"))
        .unwrap_or(false)
}

fn parse_result_record(record: &StringRecord) -> Result<VariantRecord, RecordError> {
    if record.len() < 4 {
        return Err(RecordError::FieldCount {
            expected: 4,
            found: record.len(),
        });
    }

    let rsid = &record[0];
    if rsid.is_empty() {
        return Err(RecordError::MissingField("rsid"));
    }

    Ok(VariantRecord::new(
        rsid,
        parse_chromosome(&record[1])?,
        parse_position(&record[2])?,
        Genotype::parse(&record[3]),
    ))
}

/// Parse a famfinder text export (separate allele columns)
pub fn parse_famfinder(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    let mut builder = TableBuilder::new(SOURCE, rsids);

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() >= 3 && !is_numeric(fields[2]) {
            continue;
        }

        if fields.len() < 5 {
            builder.malformed(
                idx + 1,
                &RecordError::FieldCount {
                    expected: 5,
                    found: fields.len(),
                },
            );
            continue;
        }

        let parsed = parse_chromosome(fields[1]).and_then(|chrom| {
            parse_position(fields[2]).map(|pos| {
                VariantRecord::new(fields[0], chrom, pos, Genotype::from_alleles(fields[3], fields[4]))
            })
        });

        match parsed {
            Ok(record) => builder.push(record),
            Err(e) => builder.malformed(idx + 1, &e),
        }
    }

    builder.finish(None, false)
}
