// ==============================================================================
// lib.rs - Genetics Ingest Library
// ==============================================================================
// Description: Genotype file reader and genomic reference resource cache
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod decompress;
pub mod models;
pub mod parsers;
pub mod reader;
pub mod resources;

pub use config::ResourcesConfig;
pub use models::{Assembly, Chromosome, Genotype, VariantRecord, VariantTable};
pub use reader::{Reader, ReaderError};
pub use resources::{AssemblyMapping, ReferenceSequence, ResourceError, Resources, UnmappedPolicy};
