// ==============================================================================
// reference.rs - Reference Sequence Engine
// ==============================================================================
// Description: Lazily decoded Ensembl FASTA reference sequences per assembly
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Files are cached at reference_sequences/{assembly}/{file}.fa.gz. Decoding
// happens on first access to the sequence or its metadata; clear() releases
// the decoded bytes and keeps the entity.
// ==============================================================================

use flate2::read::MultiGzDecoder;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::models::{Assembly, Chromosome};
use crate::resources::download::{is_present, write_atomic, Downloader, ResourceStore};
use crate::resources::ResourceError;

const NCBI36_TEMPLATE: &str =
    "ftp://ftp.ensembl.org/pub/release-54/fasta/homo_sapiens/dna/Homo_sapiens.NCBI36.54.dna.chromosome.{chrom}.fa.gz";
const GRCH37_TEMPLATE: &str =
    "ftp://ftp.ensembl.org/pub/grch37/current/fasta/homo_sapiens/dna/Homo_sapiens.GRCh37.dna.chromosome.{chrom}.fa.gz";
const GRCH38_TEMPLATE: &str =
    "ftp://ftp.ensembl.org/pub/release-96/fasta/homo_sapiens/dna/Homo_sapiens.GRCh38.dna.chromosome.{chrom}.fa.gz";

pub const REFERENCE_DIR: &str = "reference_sequences";

fn url_template(assembly: Assembly) -> &'static str {
    match assembly {
        Assembly::Ncbi36 => NCBI36_TEMPLATE,
        Assembly::GRCh37 => GRCH37_TEMPLATE,
        Assembly::GRCh38 => GRCH38_TEMPLATE,
    }
}

/// Resolved download locations for a set of chromosomes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencePaths {
    /// `None` when the requested assembly label was invalid
    pub assembly: Option<Assembly>,
    pub chroms: Vec<Chromosome>,
    pub urls: Vec<String>,
    /// An empty path marks a chromosome with no usable cache location
    pub paths: Vec<PathBuf>,
}

impl ReferencePaths {
    pub fn is_empty(&self) -> bool {
        self.assembly.is_none() && self.chroms.is_empty() && self.urls.is_empty() && self.paths.is_empty()
    }
}

/// Resolve URLs and cache paths; an invalid assembly yields an empty result
pub fn get_paths_reference_sequences(
    store: &ResourceStore,
    assembly: &str,
    chroms: &[Chromosome],
) -> ReferencePaths {
    let assembly = match assembly.parse::<Assembly>() {
        Ok(assembly) => assembly,
        Err(e) => {
            warn!("{}", e);
            return ReferencePaths::default();
        }
    };

    let chroms = if chroms.is_empty() {
        Chromosome::mapped()
    } else {
        chroms.to_vec()
    };

    let urls: Vec<String> = chroms
        .iter()
        .map(|chrom| url_template(assembly).replace("{chrom}", &chrom.to_string()))
        .collect();

    let paths = urls
        .iter()
        .map(|url| {
            let file = url.rsplit('/').next().unwrap_or_default();
            store.path(Path::new(REFERENCE_DIR).join(assembly.as_str()).join(file))
        })
        .collect();

    ReferencePaths {
        assembly: Some(assembly),
        chroms,
        urls,
        paths,
    }
}

/// Build sequence entities without decoding them
///
/// Missing files are downloaded first. Entries with an empty path, or whose
/// download fails, are left out.
pub fn create_reference_sequences(
    downloader: &Downloader,
    paths: &ReferencePaths,
) -> BTreeMap<Chromosome, ReferenceSequence> {
    let mut sequences = BTreeMap::new();
    let Some(assembly) = paths.assembly else {
        return sequences;
    };

    for ((chrom, url), path) in paths.chroms.iter().zip(&paths.urls).zip(&paths.paths) {
        if path.as_os_str().is_empty() {
            debug!("No cache path for {} chr{}, skipped", assembly, chrom);
            continue;
        }

        if !is_present(path) {
            if let Err(e) = downloader.fetch(url).and_then(|body| write_atomic(path, &body)) {
                warn!("Reference sequence {} chr{} unavailable: {}", assembly, chrom, e);
                continue;
            }
        }

        sequences.insert(
            *chrom,
            ReferenceSequence::new(assembly, *chrom, url.clone(), path.clone(), downloader.clone()),
        );
    }

    sequences
}

/// Decoded sequence and its derived metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub sequence: Vec<u8>,
    pub md5: String,
    pub start: u64,
    pub end: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceState {
    Unmaterialized,
    Materialized(Materialized),
}

/// One chromosome of a reference assembly
#[derive(Clone)]
pub struct ReferenceSequence {
    assembly: Assembly,
    id: Chromosome,
    url: String,
    path: PathBuf,
    state: SequenceState,
    downloader: Downloader,
}

impl ReferenceSequence {
    pub fn new(assembly: Assembly, id: Chromosome, url: String, path: PathBuf, downloader: Downloader) -> Self {
        Self {
            assembly,
            id,
            url,
            path,
            state: SequenceState::Unmaterialized,
            downloader,
        }
    }

    pub fn id(&self) -> Chromosome {
        self.id
    }

    pub fn chrom(&self) -> Chromosome {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn assembly(&self) -> Assembly {
        self.assembly
    }

    pub fn build(&self) -> &'static str {
        self.assembly.build_label()
    }

    pub fn species(&self) -> &'static str {
        "Homo sapiens"
    }

    pub fn taxonomy(&self) -> &'static str {
        "x"
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.state, SequenceState::Materialized(_))
    }

    /// Sequence bytes (case preserved); empty if the file cannot be read
    pub fn sequence(&mut self) -> &[u8] {
        self.materialized().map(|m| m.sequence.as_slice()).unwrap_or(&[])
    }

    /// Hex MD5 of the sequence bytes
    pub fn md5(&mut self) -> &str {
        self.materialized().map(|m| m.md5.as_str()).unwrap_or("")
    }

    pub fn start(&mut self) -> u64 {
        self.materialized().map(|m| m.start).unwrap_or(0)
    }

    pub fn end(&mut self) -> u64 {
        self.materialized().map(|m| m.end).unwrap_or(0)
    }

    pub fn length(&mut self) -> u64 {
        self.materialized().map(|m| m.length).unwrap_or(0)
    }

    /// Release the decoded sequence
    pub fn clear(&mut self) {
        self.state = SequenceState::Unmaterialized;
    }

    fn materialized(&mut self) -> Option<&Materialized> {
        if !self.is_materialized() {
            match self.load() {
                Ok(materialized) => self.state = SequenceState::Materialized(materialized),
                Err(e) => {
                    warn!("{}: cannot load sequence: {}", self, e);
                    return None;
                }
            }
        }

        match &self.state {
            SequenceState::Materialized(m) => Some(m),
            SequenceState::Unmaterialized => None,
        }
    }

    fn load(&self) -> Result<Materialized, ResourceError> {
        if !is_present(&self.path) {
            let body = self.downloader.fetch(&self.url)?;
            write_atomic(&self.path, &body)?;
        }

        let sequence = read_fasta(&self.path)?;
        let length = sequence.len() as u64;

        Ok(Materialized {
            md5: format!("{:x}", Md5::digest(&sequence)),
            start: 1,
            end: length,
            length,
            sequence,
        })
    }
}

/// Gunzip a single-record FASTA and join its sequence lines
fn read_fasta(path: &Path) -> Result<Vec<u8>, ResourceError> {
    let mut text = Vec::new();
    MultiGzDecoder::new(BufReader::new(File::open(path)?)).read_to_end(&mut text)?;

    let mut lines = text.split(|b| *b == b'\n');
    lines.next();

    let mut sequence = Vec::with_capacity(text.len());
    for line in lines {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        sequence.extend_from_slice(line);
    }
    Ok(sequence)
}

impl fmt::Display for ReferenceSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceSequence(assembly='{}', ID='{}')", self.assembly, self.id)
    }
}

impl fmt::Debug for ReferenceSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::config::ResourcesConfig;
    use tempfile::tempdir;

    fn offline_store(dir: &Path) -> ResourceStore {
        ResourceStore::new(&ResourcesConfig::offline(dir))
    }

    #[test]
    fn test_paths_for_grch37() {
        let dir = tempdir().unwrap();
        let store = offline_store(dir.path());
        let paths = get_paths_reference_sequences(&store, "GRCh37", &[Chromosome::MT]);

        assert_eq!(paths.assembly, Some(Assembly::GRCh37));
        assert_eq!(paths.chroms, vec![Chromosome::MT]);
        assert_eq!(
            paths.urls,
            vec!["ftp://ftp.ensembl.org/pub/grch37/current/fasta/homo_sapiens/dna/Homo_sapiens.GRCh37.dna.chromosome.MT.fa.gz"]
        );
        assert_eq!(
            paths.paths,
            vec![dir
                .path()
                .join("reference_sequences/GRCh37/Homo_sapiens.GRCh37.dna.chromosome.MT.fa.gz")]
        );
    }

    #[test]
    fn test_paths_default_chroms_and_ncbi36() {
        let dir = tempdir().unwrap();
        let paths = get_paths_reference_sequences(&offline_store(dir.path()), "NCBI36", &[]);
        assert_eq!(paths.chroms.len(), 25);
        assert!(paths.urls[0].ends_with("Homo_sapiens.NCBI36.54.dna.chromosome.1.fa.gz"));
    }

    #[test]
    fn test_invalid_assembly_is_empty() {
        let dir = tempdir().unwrap();
        let paths = get_paths_reference_sequences(&offline_store(dir.path()), "36", &[Chromosome::MT]);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_generic_fasta_materializes() {
        let dir = tempdir().unwrap();
        let store = offline_store(dir.path());
        write_reference(&store, Assembly::GRCh37, Chromosome::Autosome(1));

        let paths = get_paths_reference_sequences(&store, "GRCh37", &[Chromosome::Autosome(1)]);
        let mut sequences = create_reference_sequences(store.downloader(), &paths);
        let seq = sequences.get_mut(&Chromosome::Autosome(1)).unwrap();

        assert!(!seq.is_materialized());
        assert_eq!(seq.to_string(), "ReferenceSequence(assembly='GRCh37', ID='1')");
        assert_eq!(seq.build(), "B37");
        assert_eq!(seq.species(), "Homo sapiens");
        assert_eq!(seq.taxonomy(), "x");

        assert_eq!(&seq.sequence()[100..109], b"AGGCCGGAC");
        assert!(seq.is_materialized());
        assert_eq!(seq.md5(), "dc86fbda2f6febd77622407beae66b9a");
        assert_eq!(seq.start(), 1);
        assert_eq!(seq.end(), 110);
        assert_eq!(seq.length(), 110);

        seq.clear();
        assert!(!seq.is_materialized());
        assert_eq!(seq.length(), 110);
        assert_eq!(seq.md5(), "dc86fbda2f6febd77622407beae66b9a");
    }

    #[test]
    fn test_empty_path_is_omitted() {
        let dir = tempdir().unwrap();
        let store = offline_store(dir.path());
        write_reference(&store, Assembly::GRCh37, Chromosome::Autosome(1));
        write_reference(&store, Assembly::GRCh37, Chromosome::MT);

        let mut paths =
            get_paths_reference_sequences(&store, "GRCh37", &[Chromosome::Autosome(1), Chromosome::MT]);
        assert_eq!(create_reference_sequences(store.downloader(), &paths).len(), 2);

        paths.paths[0] = PathBuf::new();
        let sequences = create_reference_sequences(store.downloader(), &paths);
        assert_eq!(sequences.len(), 1);
        assert!(sequences.contains_key(&Chromosome::MT));
    }

    #[test]
    fn test_missing_file_offline_is_omitted() {
        let dir = tempdir().unwrap();
        let store = offline_store(dir.path());
        let paths = get_paths_reference_sequences(&store, "GRCh38", &[Chromosome::Y]);
        assert!(create_reference_sequences(store.downloader(), &paths).is_empty());
    }
}
