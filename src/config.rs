// ==============================================================================
// config.rs - Resource Cache Configuration
// ==============================================================================
// Description: Resources directory, download switch and remote endpoints
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Environment variables:
//   GENETICS_RESOURCES_DIR          cache directory (default "resources")
//   GENETICS_DOWNLOADS_ENABLED      "false" to work from disk only (default true)
//   GENETICS_ENSEMBL_REST_URL       assembly mapping endpoint
//   GENETICS_DOWNLOAD_TIMEOUT_SECS  connect and read timeout (default 30)
// ==============================================================================

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RESOURCES_DIR: &str = "resources";
pub const DEFAULT_ENSEMBL_REST_URL: &str = "https://rest.ensembl.org";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resource cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcesConfig {
    /// Root of the on-disk cache
    pub resources_dir: PathBuf,
    /// When false, getters only read what is already on disk
    pub downloads_enabled: bool,
    /// Base URL of the Ensembl REST service
    pub ensembl_rest_url: String,
    /// Connect and per-read timeout; large bodies may take longer overall
    pub timeout: Duration,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from(DEFAULT_RESOURCES_DIR),
            downloads_enabled: true,
            ensembl_rest_url: DEFAULT_ENSEMBL_REST_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ResourcesConfig {
    /// Cache rooted at `dir` with default network settings
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            resources_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Offline cache rooted at `dir` (tests, air-gapped hosts)
    pub fn offline(dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_enabled: false,
            ..Self::with_dir(dir)
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            resources_dir: std::env::var("GENETICS_RESOURCES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_RESOURCES_DIR)),
            downloads_enabled: std::env::var("GENETICS_DOWNLOADS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("GENETICS_DOWNLOADS_ENABLED must be true or false")?,
            ensembl_rest_url: std::env::var("GENETICS_ENSEMBL_REST_URL")
                .unwrap_or_else(|_| DEFAULT_ENSEMBL_REST_URL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("GENETICS_DOWNLOAD_TIMEOUT_SECS")
                    .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
                    .parse()
                    .context("GENETICS_DOWNLOAD_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResourcesConfig::default();
        assert_eq!(config.resources_dir, PathBuf::from("resources"));
        assert!(config.downloads_enabled);
        assert_eq!(config.ensembl_rest_url, "https://rest.ensembl.org");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_offline() {
        let config = ResourcesConfig::offline("/tmp/cache");
        assert!(!config.downloads_enabled);
        assert_eq!(config.resources_dir, PathBuf::from("/tmp/cache"));
    }
}
