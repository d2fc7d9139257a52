// ==============================================================================
// gsa.rs - Illumina GSA Final Report Parser
// ==============================================================================
// Description: Parser for Codigo46, Sano and other Global Screening Array reports
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format:
//   [Header]
//   Content    GSA-24v3-0_A1.bpm
//   [Data]
//   SNP Name    Sample ID    Allele1 - Plus    Allele2 - Plus    ...
//   GSA-rs1    1234    A    G
//
// Marker names carry no coordinates; rsid, chromosome and GRCh37 position are
// looked up in the GSA resource maps.
// ==============================================================================

use std::collections::HashSet;
use tracing::warn;

use crate::models::{Assembly, Genotype, VariantRecord, VariantTable};
use crate::parsers::{RecordError, TableBuilder};
use crate::resources::{GsaResources, Resources};

/// Allele column strands in order of preference
const STRANDS: [&str; 3] = ["Plus", "Forward", "Top"];

#[derive(Debug, Clone, Copy)]
struct Columns {
    name: usize,
    allele1: usize,
    allele2: usize,
}

impl Columns {
    fn from_header(header: &[&str]) -> Option<Self> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        let name = find("SNP Name")?;

        STRANDS.iter().find_map(|strand| {
            Some(Self {
                name,
                allele1: find(&format!("Allele1 - {}", strand))?,
                allele2: find(&format!("Allele2 - {}", strand))?,
            })
        })
    }
}

/// Parse a GSA final report, labelling the table with `source`
///
/// Without GSA resources the result is an empty table that keeps the label.
pub fn parse(
    text: &str,
    source: &str,
    resources: Option<&mut Resources>,
    rsids: Option<&HashSet<String>>,
) -> VariantTable {
    let gsa = match resources {
        Some(resources) => resources.get_gsa_resources(),
        None => {
            warn!("{}: GSA report needs the resource cache for marker coordinates", source);
            return VariantTable::empty(source);
        }
    };

    if gsa.is_empty() {
        warn!("{}: GSA marker maps unavailable", source);
        return VariantTable::empty(source);
    }

    parse_with_maps(text, source, &gsa, rsids)
}

/// Parse a report against already loaded marker maps
pub fn parse_with_maps(
    text: &str,
    source: &str,
    gsa: &GsaResources,
    rsids: Option<&HashSet<String>>,
) -> VariantTable {
    let mut builder = TableBuilder::new(source, rsids);

    let mut lines = text
        .lines()
        .enumerate()
        .skip_while(|(_, line)| !line.trim_start_matches('\u{feff}').starts_with("[Data]"))
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header_line)) = lines.next() else {
        warn!("{}: report has no [Data] section", source);
        return builder.finish(Some(Assembly::GRCh37), false);
    };
    let header: Vec<&str> = header_line.split('\t').collect();
    let Some(columns) = Columns::from_header(&header) else {
        warn!("{}: report lacks SNP Name or allele columns", source);
        return builder.finish(Some(Assembly::GRCh37), false);
    };

    for (idx, line) in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        match parse_line(&fields, &columns, gsa) {
            Ok(Some(record)) => builder.push(record),
            Ok(None) => {}
            Err(e) => builder.malformed(idx + 1, &e),
        }
    }

    builder.finish(Some(Assembly::GRCh37), false)
}

/// `Ok(None)` for markers absent from the coordinate map
fn parse_line(fields: &[&str], columns: &Columns, gsa: &GsaResources) -> Result<Option<VariantRecord>, RecordError> {
    let width = columns.name.max(columns.allele1).max(columns.allele2) + 1;
    if fields.len() < width {
        return Err(RecordError::FieldCount {
            expected: width,
            found: fields.len(),
        });
    }

    let name = fields[columns.name].trim();
    let Some(chrpos) = gsa.chrpos_map.get(name) else {
        return Ok(None);
    };

    let rsid = match gsa.rsid_map.get(name) {
        Some(rsid) => rsid.clone(),
        None if name.starts_with("rs") => name.to_string(),
        None => return Ok(None),
    };

    Ok(Some(VariantRecord::new(
        rsid,
        chrpos.chromosome,
        chrpos.position,
        Genotype::from_alleles(fields[columns.allele1], fields[columns.allele2]),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourcesConfig;
    use crate::models::Chromosome;
    use crate::resources::tables::fixtures::write_gsa_maps;
    use tempfile::tempdir;

    const REPORT: &str = "\
[Header]
GSGT Version\t2.0.4
Content\t\tGSA-24v3-0_A1.bpm
Source\tCODIGO46
[Data]
SNP Name\tSample ID\tAllele1 - Forward\tAllele2 - Forward\tAllele1 - Plus\tAllele2 - Plus
GSA-rs1\t1\tT\tT\tA\tA
GSA-rs2\t1\tC\tT\tG\tA
1:1000-A-G\t1\t-\t-\t-\t-
rs4\t1\tC\tC\tG\tG
unknown-marker\t1\tA\tA\tA\tA
";

    #[test]
    fn test_parse_with_resources() {
        let dir = tempdir().unwrap();
        write_gsa_maps(dir.path());
        let mut resources = Resources::new(ResourcesConfig::offline(dir.path()));

        let table = parse(REPORT, "Codigo46", Some(&mut resources), None);
        assert_eq!(table.source, "Codigo46");
        assert_eq!(table.build, Some(Assembly::GRCh37));
        assert_eq!(table.len(), 4);

        // Plus strand is preferred over Forward
        assert_eq!(table.records[0].rsid, "rs1");
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "AA");
        assert_eq!(table.records[1].chromosome, Chromosome::X);
        assert_eq!(table.records[1].genotype.as_ref().unwrap().as_str(), "GA");

        assert_eq!(table.records[2].rsid, "rs3");
        assert_eq!(table.records[2].position, 1000);
        assert!(table.records[2].genotype.is_none());

        // Falls back to the marker name when it is already an rsid
        assert_eq!(table.records[3].rsid, "rs4");
        assert_eq!(table.records[3].chromosome, Chromosome::Autosome(2));
    }

    #[test]
    fn test_missing_resources_keeps_label() {
        let table = parse(REPORT, "Sano", None, None);
        assert!(table.is_empty());
        assert_eq!(table.source, "Sano");

        let dir = tempdir().unwrap();
        let mut resources = Resources::new(ResourcesConfig::offline(dir.path()));
        let table = parse(REPORT, "Sano", Some(&mut resources), None);
        assert!(table.is_empty());
        assert_eq!(table.source, "Sano");
    }

    #[test]
    fn test_top_strand_fallback() {
        let mut gsa = GsaResources::default();
        gsa.rsid_map.insert("GSA-rs1".to_string(), "rs1".to_string());
        gsa.chrpos_map.insert(
            "GSA-rs1".to_string(),
            crate::resources::ChromPos {
                chromosome: Chromosome::Autosome(1),
                position: 101,
            },
        );

        let text = "[Header]\n[Data]\nSNP Name\tAllele1 - Top\tAllele2 - Top\nGSA-rs1\tA\tG\n";
        let table = parse_with_maps(text, "GSA", &gsa, None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].genotype.as_ref().unwrap().as_str(), "AG");
    }
}
