// ==============================================================================
// reader.rs - Multi-Format Genotype Reader
// ==============================================================================
// Description: Decompress, detect and parse raw genotype exports into one table
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Pipeline: bytes -> decompress -> peek -> detect -> vendor parser -> table
//
// The public entry points never fail. Unreadable, undecodable or unrecognized
// input yields an empty table with source "".
// ==============================================================================

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decompress::{self, DecompressError};
use crate::models::VariantTable;
use crate::parsers::{self, ParseContext, Peek};
use crate::resources::Resources;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to decompress input: {0}")]
    Decompress(#[from] DecompressError),
}

/// Reads genotype files from any supported vendor
///
/// The resource cache is only consulted for GSA-array reports, whose marker
/// names need an external coordinate lookup.
#[derive(Default)]
pub struct Reader<'r> {
    ctx: ParseContext<'r>,
}

impl<'r> Reader<'r> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only emit records whose identifier is in `rsids`
    pub fn with_rsids<I, S>(mut self, rsids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ctx.rsids = Some(rsids.into_iter().map(Into::into).collect::<HashSet<_>>());
        self
    }

    pub fn with_resources(mut self, resources: &'r mut Resources) -> Self {
        self.ctx.resources = Some(resources);
        self
    }

    /// Read a plain, gzip or zip genotype file
    pub fn read_file(&mut self, path: impl AsRef<Path>) -> VariantTable {
        let path = path.as_ref();
        match self.try_read_file(path) {
            Ok(table) => table,
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                VariantTable::unrecognized()
            }
        }
    }

    /// Like [`Reader::read_file`] but surfaces IO and decompression failures
    pub fn try_read_file(&mut self, path: impl AsRef<Path>) -> Result<VariantTable, ReaderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReaderError::NotFound(path.to_path_buf()));
        }

        info!("Reading genotype file: {}", path.display());
        let bytes = decompress::read_decompressed(path)?;
        Ok(self.parse_text(&String::from_utf8_lossy(&bytes)))
    }

    /// Read an in-memory buffer; `name_hint` is the original file name, if known
    pub fn read_bytes(&mut self, bytes: Vec<u8>, name_hint: Option<&str>) -> VariantTable {
        let hint = name_hint.map(str::to_lowercase);
        match decompress::decompress_bytes(bytes, hint.as_deref()) {
            Ok(bytes) => self.parse_text(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                warn!("Could not decompress input: {}", e);
                VariantTable::unrecognized()
            }
        }
    }

    /// Detect and parse already-decompressed text
    pub fn parse_text(&mut self, text: &str) -> VariantTable {
        let peek = Peek::new(text);
        let Some(format) = parsers::detect(&peek) else {
            warn!("Unrecognized genotype file format");
            debug!("First line: {:?}", peek.first_line);
            return VariantTable::unrecognized();
        };

        debug!("Detected format: {:?}", format);
        let table = format.parse(text, &peek, &mut self.ctx);

        info!(
            "Parsed {} records (source: {}, build: {}, phased: {})",
            table.len(),
            if table.source.is_empty() { "unknown" } else { table.source.as_str() },
            table.build.map(|b| b.as_str()).unwrap_or("unknown"),
            table.phased
        );
        table
    }
}
