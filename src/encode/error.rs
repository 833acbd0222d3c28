use crate::cog::DecompressError;
use crate::raster::RasterError;
use crate::tiff::TiffError;
use std::io;
use thiserror::Error;

pub type EncodeResult<T> = Result<T, EncodeError>;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("write failed: {0}")]
    WriteError(#[from] io::Error),
    #[error(transparent)]
    RasterizationError(#[from] RasterError),
    #[error("compression failed: {0}")]
    CompressionError(#[from] DecompressError),
    #[error("cannot build TIFF directory: {0}")]
    TiffError(#[from] TiffError),
}
