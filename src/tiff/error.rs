use super::TagId;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TiffError {
    #[error("not a TIFF stream")]
    BadMagicBytes,
    #[error("missing tag {0:?}")]
    MissingTag(TagId),
    #[error("bad value for tag {0:?}")]
    BadTag(TagId),
    #[error("{0} IFD entries do not fit the offset width")]
    TooLarge(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}
