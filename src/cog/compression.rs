// https://en.wikipedia.org/wiki/TIFF#TIFF_Compression_Tag
// https://exiftool.org/TagNames/EXIF.html#Compression

use crate::tiff::Endian;
use eio::{FromBytes, ToBytes};
use flate2::{read::ZlibDecoder, write::ZlibEncoder};
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::WrappingAdd;
use salzweg::{decoder::TiffStyleDecoder, encoder::TiffStyleEncoder};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("LZW stream is corrupt: {0}")]
    Lzw(String),
    #[error("{0:?} compression is not supported")]
    CompressionNotSupported(Compression),
    #[error("{0:?} predictor is not supported for {1} bit samples")]
    PredictorNotSupported(Predictor, u16),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Compression {
    Uncompressed = 1,
    CCITT1D = 2,
    T4Group3Fax = 3,
    T6Group4Fax = 4,
    Lzw = 5,
    JpegOld = 6,
    Jpeg = 7,
    DeflateAdobe = 8,
    PackBits = 32773,
    Deflate = 32946,
    Lerc = 34887,
    Lzma = 34925,
    Zstd = 34926,
    WebP = 34927,
    JpegXl = 52546,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Compression {
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::Lzw => TiffStyleDecoder::decode_to_vec(bytes)
                .map_err(|e| DecompressError::Lzw(format!("{e:?}"))),
            Self::DeflateAdobe | Self::Deflate => {
                let mut buf = vec![];
                ZlibDecoder::new(bytes).read_to_end(&mut buf)?;
                Ok(buf)
            }
            other => Err(DecompressError::CompressionNotSupported(*other)),
        }
    }

    pub fn encode(&self, bytes: &[u8]) -> Result<Vec<u8>, DecompressError> {
        match self {
            Self::Uncompressed => Ok(bytes.to_vec()),
            Self::Lzw => TiffStyleEncoder::encode_to_vec(bytes)
                .map_err(|e| DecompressError::Lzw(format!("{e:?}"))),
            Self::DeflateAdobe | Self::Deflate => {
                let mut encoder = ZlibEncoder::new(vec![], flate2::Compression::default());
                encoder.write_all(bytes)?;
                Ok(encoder.finish()?)
            }
            other => Err(DecompressError::CompressionNotSupported(*other)),
        }
    }

    /// Whether this crate can both read and write the scheme.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::Uncompressed | Self::Lzw | Self::DeflateAdobe | Self::Deflate
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum Predictor {
    No = 1,
    Horizontal = 2,
    FloatingPoint = 3,

    #[num_enum(default)]
    Unknown = 0x0000,
}

impl Predictor {
    /// Reverses the predictor in place, one image row at a time.
    pub fn predict(
        &self,
        buffer: &mut [u8],
        width: usize,
        bit_depth: u16,
        samples_per_pixel: usize,
        endian: Endian,
    ) -> Result<(), DecompressError> {
        let sample_bytes = (bit_depth / 8) as usize;
        let row_bytes = width * samples_per_pixel * sample_bytes;
        if row_bytes == 0 {
            return Ok(());
        }
        let rows = buffer.chunks_exact_mut(row_bytes);
        match (self, bit_depth) {
            (Self::No, _) => {}
            (Self::Horizontal, 8) => {
                for row in rows {
                    for i in samples_per_pixel..row.len() {
                        row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
                    }
                }
            }
            (Self::Horizontal, 16) => {
                for row in rows {
                    accumulate::<2, u16>(row, samples_per_pixel, endian)?;
                }
            }
            (Self::Horizontal, 32) => {
                for row in rows {
                    accumulate::<4, u32>(row, samples_per_pixel, endian)?;
                }
            }
            (Self::Horizontal, 64) => {
                for row in rows {
                    accumulate::<8, u64>(row, samples_per_pixel, endian)?;
                }
            }
            (Self::FloatingPoint, 16 | 32 | 64) => {
                for row in rows {
                    unshuffle_float_row(row, samples_per_pixel, sample_bytes, endian);
                }
            }
            (other, bits) => return Err(DecompressError::PredictorNotSupported(*other, bits)),
        }
        Ok(())
    }
}

fn accumulate<const N: usize, T>(
    row: &mut [u8],
    stride: usize,
    endian: Endian,
) -> Result<(), DecompressError>
where
    T: FromBytes<N> + ToBytes<N> + WrappingAdd + Copy,
{
    let mut values: Vec<T> = endian.decode_all::<N, T>(row).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "Row is not sample aligned")
    })?;
    for i in stride..values.len() {
        values[i] = values[i].wrapping_add(&values[i - stride]);
    }
    row.copy_from_slice(&endian.encode_all(&values));
    Ok(())
}

// Floating point rows are byte-differenced, then stored as planes of most to
// least significant bytes.
fn unshuffle_float_row(row: &mut [u8], stride: usize, sample_bytes: usize, endian: Endian) {
    for i in stride..row.len() {
        row[i] = row[i].wrapping_add(row[i - stride]);
    }
    let count = row.len() / sample_bytes;
    let planes = row.to_vec();
    for i in 0..count {
        for k in 0..sample_bytes {
            let byte = planes[k * count + i];
            let position = match endian {
                Endian::Big => k,
                Endian::Little => sample_bytes - 1 - k,
            };
            row[i * sample_bytes + position] = byte;
        }
    }
}
