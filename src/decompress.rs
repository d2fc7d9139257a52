// ==============================================================================
// decompress.rs - Transparent Input Decompression
// ==============================================================================
// Description: Unwraps gzip streams and single-member zip archives before parsing
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Detection: magic numbers first, file name extension as a fallback hint.
// Anything else is returned unchanged (already plain text).
// ==============================================================================

use flate2::read::MultiGzDecoder;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Container wrapping the raw content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zip,
}

#[derive(Error, Debug)]
pub enum DecompressError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read zip archive: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Zip archive contains no files")]
    EmptyArchive,
}

/// Identify the container from magic bytes, falling back to the name hint
pub fn detect_compression(bytes: &[u8], name_hint: Option<&str>) -> Compression {
    if bytes.starts_with(&GZIP_MAGIC) {
        return Compression::Gzip;
    }
    if bytes.starts_with(&ZIP_MAGIC) {
        return Compression::Zip;
    }

    // Extension hint: any PK signature (empty or spanned archives) under a .zip name
    match name_hint {
        Some(name) if name.ends_with(".zip") && bytes.starts_with(b"PK") => Compression::Zip,
        _ => Compression::None,
    }
}

/// Decompress an in-memory buffer
pub fn decompress_bytes(bytes: Vec<u8>, name_hint: Option<&str>) -> Result<Vec<u8>, DecompressError> {
    match detect_compression(&bytes, name_hint) {
        Compression::None => Ok(bytes),
        Compression::Gzip => {
            debug!("Decompressing gzip stream ({} bytes)", bytes.len());
            // MultiGzDecoder also handles BGZF (concatenated gzip members)
            let mut decoder = MultiGzDecoder::new(Cursor::new(bytes));
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Zip => {
            debug!("Extracting first member of zip archive ({} bytes)", bytes.len());
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
            if archive.is_empty() {
                return Err(DecompressError::EmptyArchive);
            }
            let mut member = archive.by_index(0)?;
            let mut out = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Read and decompress a file from disk
pub fn read_decompressed(path: impl AsRef<Path>) -> Result<Vec<u8>, DecompressError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let name = path.file_name().map(|n| n.to_string_lossy().to_lowercase());
    decompress_bytes(bytes, name.as_deref())
}
