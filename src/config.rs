use crate::archive::ShardLayout;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ARCHIVE_ROOT: &str = "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/";
pub const DEFAULT_OUTPUT_ROOT: &str = "./ae_embeddings";
pub const DEFAULT_TILE_SIZE: u32 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot parse {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Transport options for one kind of remote access.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessConfig {
    /// Send requests without credentials.
    pub unsigned: bool,
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Only paths ending in one of these may be opened. Empty allows everything.
    pub allowed_extensions: Vec<String>,
    /// Never list sibling objects when opening a file.
    pub disable_directory_listing: bool,
}

impl AccessConfig {
    /// Side-file bounds checks: fail fast, no retries.
    pub fn bounds_probe() -> Self {
        Self {
            unsigned: true,
            timeout_secs: 60,
            max_retries: 0,
            allowed_extensions: vec![".tiff".into(), ".vrt".into()],
            disable_directory_listing: true,
        }
    }

    /// Window reads: long timeout, three retries.
    pub fn bulk_read() -> Self {
        Self {
            timeout_secs: 300,
            max_retries: 3,
            ..Self::bounds_probe()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn allows(&self, path: &str) -> bool {
        self.allowed_extensions.is_empty()
            || self
                .allowed_extensions
                .iter()
                .any(|extension| path.ends_with(extension.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub output_root: PathBuf,
    pub tile_size: u32,
    pub dequantize: bool,
    pub archive_root: String,
    #[serde(skip)]
    pub layout: ShardLayout,
    pub bounds_probe: AccessConfig,
    pub bulk_read: AccessConfig,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            tile_size: DEFAULT_TILE_SIZE,
            dequantize: false,
            archive_root: DEFAULT_ARCHIVE_ROOT.to_string(),
            layout: ShardLayout::AEF_2X2,
            bounds_probe: AccessConfig::bounds_probe(),
            bulk_read: AccessConfig::bulk_read(),
        }
    }
}

impl DownloaderConfig {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_output_root<P: AsRef<Path>>(mut self, output_root: P) -> Self {
        self.output_root = output_root.as_ref().to_path_buf();
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_dequantize(mut self, dequantize: bool) -> Self {
        self.dequantize = dequantize;
        self
    }

    pub fn with_archive_root<S: Into<String>>(mut self, archive_root: S) -> Self {
        self.archive_root = archive_root.into();
        self
    }

    pub fn with_layout(mut self, layout: ShardLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_bounds_probe(mut self, access: AccessConfig) -> Self {
        self.bounds_probe = access;
        self
    }

    pub fn with_bulk_read(mut self, access: AccessConfig) -> Self {
        self.bulk_read = access;
        self
    }
}
