// ==============================================================================
// generic.rs - Generic Delimited and Native CSV Parsers
// ==============================================================================
// Description: Delimiter sniffing fallback and the library's own CSV output format
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Generic layout: rsid, chromosome, position, genotype by column position,
// separated by commas, tabs or runs of whitespace. Extra columns are ignored.
// An rsid cell may hold several identifiers ("rs1;rs2" or "rs1,rs2").
//
// Native layout:
//   # Generated by ...
//   # Source(s): 23andMe
//   # Build: 37
//   # Phased: False
//   rsid,chromosome,position,genotype
// ==============================================================================

use csv::{ReaderBuilder, Trim};
use std::collections::HashSet;

use crate::models::{Assembly, Genotype, VariantRecord, VariantTable};
use crate::parsers::{is_numeric, parse_chromosome, parse_position, Peek, RecordError, TableBuilder};

pub const SOURCE: &str = "generic";

/// Field separator found by sniffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Tab,
    Whitespace,
}

impl Delimiter {
    const ALL: [Delimiter; 3] = [Delimiter::Tab, Delimiter::Comma, Delimiter::Whitespace];

    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Comma => line.split(',').collect(),
            Delimiter::Tab => line.split('\t').collect(),
            Delimiter::Whitespace => line.split_whitespace().collect(),
        }
    }

    fn byte(&self) -> Option<u8> {
        match self {
            Delimiter::Comma => Some(b','),
            Delimiter::Tab => Some(b'\t'),
            Delimiter::Whitespace => None,
        }
    }
}

/// Find a delimiter that yields at least four fields with a numeric third field.
/// The second data line is tried when the first is a column header.
pub fn sniff(peek: &Peek<'_>) -> Option<Delimiter> {
    peek.data_lines.iter().take(2).find_map(|line| {
        Delimiter::ALL.into_iter().find(|delimiter| {
            let fields = delimiter.split(line);
            fields.len() >= 4 && is_numeric(fields[2])
        })
    })
}

/// Parse a generic delimited file
pub fn parse(text: &str, rsids: Option<&HashSet<String>>) -> VariantTable {
    let mut builder = TableBuilder::new(SOURCE, rsids);
    if let Some(delimiter) = sniff(&Peek::new(text)) {
        read_rows(text, delimiter, &mut builder);
    }
    builder.finish(None, false)
}

/// Parse a file written by this library's CSV export
pub fn parse_native(text: &str, peek: &Peek<'_>, rsids: Option<&HashSet<String>>) -> VariantTable {
    let header = NativeHeader::from_comments(&peek.comments);
    let mut builder = TableBuilder::new(header.source, rsids);
    read_rows(text, Delimiter::Comma, &mut builder);
    builder.finish(header.build, header.phased)
}

/// Metadata carried by native CSV comment lines
#[derive(Debug, Default)]
struct NativeHeader {
    source: String,
    build: Option<Assembly>,
    phased: bool,
}

impl NativeHeader {
    fn from_comments(comments: &str) -> Self {
        let mut header = NativeHeader::default();

        for line in comments.lines() {
            let Some((key, value)) = line.trim_start_matches('#').split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "Source(s)" => header.source = value.to_string(),
                "Build" => {
                    header.build = value.parse::<u8>().ok().and_then(Assembly::from_build_number)
                }
                "Phased" => header.phased = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        header
    }
}

fn read_rows(text: &str, delimiter: Delimiter, builder: &mut TableBuilder<'_>) {
    match delimiter.byte() {
        Some(byte) => {
            let mut reader = ReaderBuilder::new()
                .delimiter(byte)
                .has_headers(false)
                .flexible(true)
                .comment(Some(b'#'))
                .trim(Trim::All)
                .from_reader(text.as_bytes());

            let mut first = true;
            for (idx, result) in reader.records().enumerate() {
                match result {
                    Ok(record) => {
                        let line_number = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);
                        let fields: Vec<&str> = record.iter().collect();
                        handle_row(&fields, line_number, &mut first, builder);
                    }
                    Err(e) => builder.malformed(idx + 1, &RecordError::InvalidRow(e.to_string())),
                }
            }
        }
        None => {
            let mut first = true;
            for (idx, line) in text.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                let fields = delimiter.split(trimmed);
                handle_row(&fields, idx + 1, &mut first, builder);
            }
        }
    }
}

fn handle_row(fields: &[&str], line_number: usize, first: &mut bool, builder: &mut TableBuilder<'_>) {
    // Column header on the first row, mapped by position regardless of names
    if std::mem::take(first) && fields.len() >= 3 && !is_numeric(fields[2]) {
        return;
    }

    match parse_row(fields) {
        Ok(row) => builder.push_row(row),
        Err(e) => builder.malformed(line_number, &e),
    }
}

fn parse_row(fields: &[&str]) -> Result<Vec<VariantRecord>, RecordError> {
    if fields.len() < 4 {
        return Err(RecordError::FieldCount {
            expected: 4,
            found: fields.len(),
        });
    }

    let chromosome = parse_chromosome(fields[1])?;
    let position = parse_position(fields[2])?;
    let genotype = Genotype::parse(fields[3]);

    let ids: Vec<&str> = fields[0]
        .split(|c: char| c == ',' || c == ';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(RecordError::MissingField("rsid"));
    }

    Ok(ids
        .into_iter()
        .map(|id| VariantRecord::new(id, chromosome, position, genotype.clone()))
        .collect())
}
