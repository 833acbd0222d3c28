use crate::tiff::TagId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("missing GeoTIFF tag {0:?}")]
    MissingTag(TagId),
    #[error("malformed GeoTIFF tag {0:?}")]
    BadTag(TagId),
}
