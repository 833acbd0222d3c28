use crate::archive::{ArchiveError, LocateError};
use crate::catalog::CatalogError;
use crate::cog::CogError;
use crate::extract::ExtractError;
use crate::geo::{CoordinateError, ProjectionError};
use crate::index::IndexError;
use crate::writer::WriteError;
use std::io;
use thiserror::Error;

pub type DownloadResult<T> = Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
    #[error("no asset covers ({lat}, {lon}) in {year}")]
    AssetNotFound { lat: f64, lon: f64, year: i32 },
    #[error("none of the {candidates} shards contains easting {easting}, northing {northing}")]
    NoMatchingTile {
        candidates: usize,
        easting: f64,
        northing: f64,
    },
    #[error("cannot read {path}: {source}")]
    RemoteAccess { path: String, source: io::Error },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("bad side-file {path}: {source}")]
    Index { path: String, source: IndexError },
    #[error("bad raster: {0}")]
    Cog(String),
    #[error(transparent)]
    Write(WriteError),
}

impl DownloadError {
    /// Stable short label, used to group failures.
    pub fn kind(&self) -> &'static str {
        match self {
            DownloadError::Projection(_) => "projection",
            DownloadError::AssetNotFound { .. } => "asset_not_found",
            DownloadError::NoMatchingTile { .. } => "no_matching_tile",
            DownloadError::RemoteAccess { .. } => "remote_access",
            DownloadError::InvalidArgument(_) => "invalid_argument",
            DownloadError::Catalog(_) => "catalog",
            DownloadError::Index { .. } => "index",
            DownloadError::Cog(_) => "cog",
            DownloadError::Write(_) => "write",
        }
    }
}

impl From<CoordinateError> for DownloadError {
    fn from(e: CoordinateError) -> Self {
        DownloadError::InvalidArgument(e.to_string())
    }
}

impl From<ArchiveError> for DownloadError {
    fn from(e: ArchiveError) -> Self {
        DownloadError::InvalidArgument(e.to_string())
    }
}

impl From<LocateError> for DownloadError {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::RemoteAccess { path, source } => {
                DownloadError::RemoteAccess { path, source }
            }
            LocateError::Index { path, source } => DownloadError::Index { path, source },
        }
    }
}

impl From<ExtractError> for DownloadError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::InvalidTileSize { .. } => DownloadError::InvalidArgument(e.to_string()),
            ExtractError::RemoteAccess { path, source } => {
                DownloadError::RemoteAccess { path, source }
            }
            ExtractError::Index { path, source } => DownloadError::Index { path, source },
            other => DownloadError::Cog(other.to_string()),
        }
    }
}

impl From<CogError> for DownloadError {
    fn from(e: CogError) -> Self {
        DownloadError::Cog(e.to_string())
    }
}

impl From<WriteError> for DownloadError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::InvalidLocationId(_) => DownloadError::InvalidArgument(e.to_string()),
            other => DownloadError::Write(other),
        }
    }
}
