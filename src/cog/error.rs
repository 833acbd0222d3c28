use super::compression::DecompressError;
use crate::geotags::GeoTiffError;
use crate::raster::{PixelWindow, RasterError};
use crate::tiff::TiffError;
use std::io;
use thiserror::Error;

pub type CogResult<T> = Result<T, CogError>;

#[derive(Debug, Error)]
pub enum CogError {
    #[error("malformed TIFF: {0}")]
    BadTiff(TiffError),
    #[error("malformed GeoTIFF: {0}")]
    BadGeoTiff(#[from] GeoTiffError),
    #[error("tile {0} is out of range, max is {1}")]
    TileIndexOutOfRange(usize, usize),
    #[error("tile {index} decoded to {actual} bytes, expected at least {expected}")]
    TileTooShort {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("window {window:?} exceeds the {width}x{height} image")]
    WindowOutOfBounds {
        window: PixelWindow,
        width: u32,
        height: u32,
    },
    #[error("read failed: {0}")]
    ReadError(#[from] io::Error),
    #[error("decompression failed: {0}")]
    DecompresionError(#[from] DecompressError),
    #[error(transparent)]
    RasterizationError(#[from] RasterError),
    #[error("no full resolution image found")]
    NoLevels,
    #[error("image carries no geotransform")]
    NotGeoreferenced,
    #[error("header does not fit in {0} bytes")]
    HeaderTooLarge(usize),
    #[error("{0}")]
    NotSupported(String),
}

impl From<TiffError> for CogError {
    fn from(e: TiffError) -> Self {
        match e {
            TiffError::Io(io_error) => CogError::ReadError(io_error),
            tiff_error => CogError::BadTiff(tiff_error),
        }
    }
}
