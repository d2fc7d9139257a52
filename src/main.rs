// ==============================================================================
// main.rs - Genetics Ingest Entry Point
// ==============================================================================
// Description: Command-line front end for reading, lifting and caching resources
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genetics_ingest::{Chromosome, Reader, Resources, ResourcesConfig, UnmappedPolicy, VariantRecord, VariantTable};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource cache directory
    #[arg(long, env = "GENETICS_RESOURCES_DIR")]
    resources_dir: Option<PathBuf>,

    /// Never download; use only what is already cached
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a genotype file and print a summary
    Read {
        file: PathBuf,

        /// Restrict output to these identifiers (repeatable)
        #[arg(long = "rsid")]
        rsids: Vec<String>,

        /// Write the canonical table as TSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse a genotype file and remap positions to another assembly
    Lift {
        file: PathBuf,

        /// Source assembly (NCBI36, GRCh37, GRCh38)
        #[arg(long)]
        from: String,

        /// Target assembly (NCBI36, GRCh37, GRCh38)
        #[arg(long)]
        to: String,

        /// Drop records outside every mapping block
        #[arg(long)]
        drop_unmapped: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download and cache reference resources
    Fetch {
        /// Also fetch reference sequences for this assembly
        #[arg(long)]
        assembly: Option<String>,

        /// Chromosomes for reference sequences (default: all)
        #[arg(long = "chrom")]
        chroms: Vec<Chromosome>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genetics_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Missing .env is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = ResourcesConfig::from_env().context("Invalid resource configuration")?;
    if let Some(dir) = args.resources_dir {
        config.resources_dir = dir;
    }
    if args.offline {
        config.downloads_enabled = false;
    }
    info!("Resource cache: {:?}", config.resources_dir);

    let mut resources = Resources::new(config);

    match args.command {
        Command::Read { file, rsids, output } => {
            let mut reader = Reader::new().with_resources(&mut resources);
            if !rsids.is_empty() {
                reader = reader.with_rsids(rsids);
            }
            let table = reader.read_file(&file);
            print_summary(&file, &table);

            if let Some(output) = output {
                write_tsv(&output, &table.records)?;
            }
        }

        Command::Lift {
            file,
            from,
            to,
            drop_unmapped,
            output,
        } => {
            let table = Reader::new().with_resources(&mut resources).read_file(&file);
            print_summary(&file, &table);

            let mapping = resources.get_assembly_mapping_data(&from, &to);
            if mapping.is_empty() {
                anyhow::bail!("No assembly mapping available from {} to {}", from, to);
            }

            let policy = if drop_unmapped {
                UnmappedPolicy::Drop
            } else {
                UnmappedPolicy::Keep
            };
            let (remapped, unmapped) = mapping.remap_records(&table.records, policy);
            if unmapped > 0 {
                warn!("{} records fell outside the {} -> {} mapping", unmapped, from, to);
            }
            println!("Lifted: {} records ({} unmapped)", remapped.len(), unmapped);

            if let Some(output) = output {
                write_tsv(&output, &remapped)?;
            }
        }

        Command::Fetch { assembly, chroms } => {
            let all = resources.get_all_resources();
            println!("Genetic map chromosomes: {}", all.genetic_map_hapmap2_grch37.len());
            println!("cytoBand rows: {}", all.cytoband_hg19.len());
            println!("knownGene rows: {}", all.known_gene_hg19.len());
            println!("kgXref rows: {}", all.kg_xref_hg19.len());
            println!("GSA markers: {}", all.gsa.chrpos_map.len());
            for ((source, target), mapping) in &all.assembly_mappings {
                println!("Mapping {} -> {}: {} chromosomes", source, target, mapping.len());
            }

            if let Some(assembly) = assembly {
                let sequences = resources.get_reference_sequences(&assembly, &chroms);
                if sequences.is_empty() {
                    anyhow::bail!("No reference sequences available for {}", assembly);
                }
                for (_, sequence) in sequences {
                    let length = sequence.length();
                    let md5 = sequence.md5().to_string();
                    println!("{}: length {} md5 {}", sequence, length, md5);
                }
            }
        }
    }

    Ok(())
}

fn print_summary(file: &Path, table: &VariantTable) {
    println!("File: {}", file.display());
    println!("Source: {}", if table.source.is_empty() { "unrecognized" } else { &table.source });
    println!(
        "Build: {}",
        table.build.map(|b| b.as_str()).unwrap_or("unknown")
    );
    println!("Phased: {}", table.phased);
    println!("Records: {} ({} called)", table.len(), table.called_count());
    if table.unannotated_vcf {
        println!("Note: VCF records carry no rsids");
    }
}

fn write_tsv(path: &Path, records: &[VariantRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(["rsid", "chromosome", "position", "genotype"])?;
    for record in records {
        writer.write_record([
            record.rsid.clone(),
            record.chromosome.to_string(),
            record.position.to_string(),
            record.genotype.as_ref().map(|g| g.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
