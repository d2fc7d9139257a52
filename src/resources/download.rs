// ==============================================================================
// download.rs - Resource Download and On-Disk Store
// ==============================================================================
// Description: HTTP fetch, atomic cache writes and cache path resolution
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Files are written to a temporary file in the destination directory and then
// renamed into place, so a reader never sees a partial download. Empty files
// (interrupted writes, placeholders) count as missing.
// ==============================================================================

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::ResourcesConfig;
use crate::resources::ResourceError;

/// Blocking HTTP client honoring the download switch
#[derive(Clone)]
pub struct Downloader {
    agent: ureq::Agent,
    enabled: bool,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader").field("enabled", &self.enabled).finish()
    }
}

impl Downloader {
    /// `timeout` bounds connecting and each read, not the whole transfer
    pub fn new(timeout: Duration, enabled: bool) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// GET `url` and return the response body
    ///
    /// `ftp://` URLs are fetched over `https://` from the same host.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        if url.is_empty() {
            return Err(ResourceError::EmptyUrl);
        }
        if !self.enabled {
            return Err(ResourceError::DownloadsDisabled(url.to_string()));
        }

        let url = https_url(url);
        info!("Downloading {}", url);

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| ResourceError::Http(format!("{}: {}", url, e)))?;

        let mut data = Vec::new();
        response.into_reader().read_to_end(&mut data)?;
        debug!("Downloaded {} bytes from {}", data.len(), url);
        Ok(data)
    }

    /// GET a JSON document from a REST endpoint
    pub fn fetch_json(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        if !self.enabled {
            return Err(ResourceError::DownloadsDisabled(url.to_string()));
        }

        let response = self
            .agent
            .get(url)
            .set("Content-Type", "application/json")
            .call()
            .map_err(|e| ResourceError::Http(format!("{}: {}", url, e)))?;

        let mut data = Vec::new();
        response.into_reader().read_to_end(&mut data)?;
        Ok(data)
    }
}

/// Rewrite `ftp://host/path` to `https://host/path`
pub fn https_url(url: &str) -> String {
    match url.strip_prefix("ftp://") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// On-disk cache rooted at the resources directory
#[derive(Debug, Clone)]
pub struct ResourceStore {
    root: PathBuf,
    ensembl_rest_url: String,
    downloader: Downloader,
}

impl ResourceStore {
    pub fn new(config: &ResourcesConfig) -> Self {
        Self {
            root: config.resources_dir.clone(),
            ensembl_rest_url: config.ensembl_rest_url.trim_end_matches('/').to_string(),
            downloader: Downloader::new(config.timeout, config.downloads_enabled),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    pub fn ensembl_rest_url(&self) -> &str {
        &self.ensembl_rest_url
    }

    /// Return the cached file for `relative`, downloading `url` into it when absent
    ///
    /// With `compress`, the downloaded body is gzipped before it is stored and
    /// ".gz" is appended to the file name if missing.
    pub fn download_file(&self, url: &str, relative: &str, compress: bool) -> Result<PathBuf, ResourceError> {
        if url.is_empty() {
            return Err(ResourceError::EmptyUrl);
        }

        let relative = if compress && !relative.ends_with(".gz") {
            format!("{}.gz", relative)
        } else {
            relative.to_string()
        };
        let destination = self.path(&relative);

        if is_present(&destination) {
            return Ok(destination);
        }

        let body = self.downloader.fetch(url)?;
        let body = if compress { gzip(&body)? } else { body };
        write_atomic(&destination, &body)?;
        Ok(destination)
    }
}

/// File exists and is non-empty
pub fn is_present(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// Write via a temporary file in the same directory, then rename into place
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ResourceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ResourceError::Io(e.error))?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>, ResourceError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_https_rewrite() {
        assert_eq!(
            https_url("ftp://ftp.ensembl.org/pub/x.fa.gz"),
            "https://ftp.ensembl.org/pub/x.fa.gz"
        );
        assert_eq!(https_url("https://example.org/a"), "https://example.org/a");
    }

    #[test]
    fn test_empty_url_is_error() {
        let dir = tempdir().unwrap();
        let store = ResourceStore::new(&ResourcesConfig::with_dir(dir.path()));
        assert!(matches!(
            store.download_file("", "", true),
            Err(ResourceError::EmptyUrl)
        ));
    }

    #[test]
    fn test_existing_file_is_reused_offline() {
        let dir = tempdir().unwrap();
        let store = ResourceStore::new(&ResourcesConfig::offline(dir.path()));
        fs::write(dir.path().join("cached.txt.gz"), b"data").unwrap();

        let path = store.download_file("https://example.org/cached.txt", "cached.txt", true).unwrap();
        assert_eq!(path, dir.path().join("cached.txt.gz"));
    }

    #[test]
    fn test_empty_placeholder_counts_as_missing() {
        let dir = tempdir().unwrap();
        let store = ResourceStore::new(&ResourcesConfig::offline(dir.path()));
        fs::write(dir.path().join("placeholder.txt"), b"").unwrap();

        assert!(!is_present(&dir.path().join("placeholder.txt")));
        assert!(matches!(
            store.download_file("https://example.org/p.txt", "placeholder.txt", false),
            Err(ResourceError::DownloadsDisabled(_))
        ));
    }

    #[test]
    fn test_slow_body_outlasting_timeout_completes() {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;
        use std::thread;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/chr1.fa", listener.local_addr().unwrap());

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }

            let mut stream = stream;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n")
                .unwrap();
            // Each chunk arrives within the timeout; the whole body does not
            for base in b"ACGTN" {
                thread::sleep(Duration::from_millis(400));
                stream.write_all(&[*base]).unwrap();
                stream.flush().unwrap();
            }
        });

        let downloader = Downloader::new(Duration::from_secs(1), true);
        assert_eq!(downloader.fetch(&url).unwrap(), b"ACGTN");
        server.join().unwrap();
    }

    #[test]
    fn test_write_atomic_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("file.bin");
        write_atomic(&path, b"payload").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
    }
}
