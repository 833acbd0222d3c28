use crate::cog::Compression;
use crate::tiff::Endian;
use std::fmt::Display;
use thiserror::Error;

mod dequantize;
mod photometrics;
mod transform;

pub use dequantize::{dequantize, dequantize_value, NODATA_SENTINEL};
pub use photometrics::{PhotometricInterpretation, PlanarConfiguration, SampleFormat};
pub use transform::{Bounds, GeoTransform};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("buffer holds {actual} samples but {expected} are required")]
    BufferSize { expected: usize, actual: usize },
    #[error("profile declares {declared} but samples are {actual}")]
    DataTypeMismatch { declared: DataType, actual: DataType },
    #[error("{bits} bit {format:?} samples are not supported")]
    UnsupportedSampleType { bits: u16, format: SampleFormat },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub fn from_tiff(bits_per_sample: u16, format: SampleFormat) -> Result<Self, RasterError> {
        Ok(match (bits_per_sample, format) {
            (8, SampleFormat::Signed) => DataType::Int8,
            (8, _) => DataType::UInt8,
            (16, SampleFormat::Signed) => DataType::Int16,
            (16, SampleFormat::Unsigned | SampleFormat::Unknown) => DataType::UInt16,
            (32, SampleFormat::Signed) => DataType::Int32,
            (32, SampleFormat::Unsigned | SampleFormat::Unknown) => DataType::UInt32,
            (32, SampleFormat::Float) => DataType::Float32,
            (64, SampleFormat::Float) => DataType::Float64,
            (bits, format) => return Err(RasterError::UnsupportedSampleType { bits, format }),
        })
    }

    pub fn bits(&self) -> u16 {
        self.bytes() as u16 * 8
    }

    pub fn bytes(&self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    pub fn sample_format(&self) -> SampleFormat {
        match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 => SampleFormat::Signed,
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 => SampleFormat::Unsigned,
            DataType::Float32 | DataType::Float64 => SampleFormat::Float,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
            DataType::Int16 => "int16",
            DataType::UInt16 => "uint16",
            DataType::Int32 => "int32",
            DataType::UInt32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Band sequential sample buffer, laid out as bands x rows x columns.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl Samples {
    pub fn from_bytes(dtype: DataType, bytes: &[u8], endian: Endian) -> Option<Self> {
        Some(match dtype {
            DataType::Int8 => Samples::Int8(bytes.iter().map(|b| *b as i8).collect()),
            DataType::UInt8 => Samples::UInt8(bytes.to_vec()),
            DataType::Int16 => Samples::Int16(endian.decode_all::<2, i16>(bytes)?),
            DataType::UInt16 => Samples::UInt16(endian.decode_all::<2, u16>(bytes)?),
            DataType::Int32 => Samples::Int32(endian.decode_all::<4, i32>(bytes)?),
            DataType::UInt32 => Samples::UInt32(endian.decode_all::<4, u32>(bytes)?),
            DataType::Float32 => Samples::Float32(endian.decode_all::<4, f32>(bytes)?),
            DataType::Float64 => Samples::Float64(endian.decode_all::<8, f64>(bytes)?),
        })
    }

    /// `len` copies of `value`, cast to `dtype`.
    pub fn filled(dtype: DataType, value: f64, len: usize) -> Self {
        match dtype {
            DataType::Int8 => Samples::Int8(vec![value as i8; len]),
            DataType::UInt8 => Samples::UInt8(vec![value as u8; len]),
            DataType::Int16 => Samples::Int16(vec![value as i16; len]),
            DataType::UInt16 => Samples::UInt16(vec![value as u16; len]),
            DataType::Int32 => Samples::Int32(vec![value as i32; len]),
            DataType::UInt32 => Samples::UInt32(vec![value as u32; len]),
            DataType::Float32 => Samples::Float32(vec![value as f32; len]),
            DataType::Float64 => Samples::Float64(vec![value; len]),
        }
    }

    pub fn to_bytes(&self, endian: Endian) -> Vec<u8> {
        match self {
            Samples::Int8(v) => v.iter().map(|s| *s as u8).collect(),
            Samples::UInt8(v) => v.clone(),
            Samples::Int16(v) => endian.encode_all(v),
            Samples::UInt16(v) => endian.encode_all(v),
            Samples::Int32(v) => endian.encode_all(v),
            Samples::UInt32(v) => endian.encode_all(v),
            Samples::Float32(v) => endian.encode_all(v),
            Samples::Float64(v) => endian.encode_all(v),
        }
    }

    /// Reverse the row order of every band, for band sequential planes of
    /// `width` x `height`.
    pub fn flip_rows(&mut self, width: usize, height: usize) {
        match self {
            Samples::Int8(v) => flip_planes(v, width, height),
            Samples::UInt8(v) => flip_planes(v, width, height),
            Samples::Int16(v) => flip_planes(v, width, height),
            Samples::UInt16(v) => flip_planes(v, width, height),
            Samples::Int32(v) => flip_planes(v, width, height),
            Samples::UInt32(v) => flip_planes(v, width, height),
            Samples::Float32(v) => flip_planes(v, width, height),
            Samples::Float64(v) => flip_planes(v, width, height),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Samples::Int8(_) => DataType::Int8,
            Samples::UInt8(_) => DataType::UInt8,
            Samples::Int16(_) => DataType::Int16,
            Samples::UInt16(_) => DataType::UInt16,
            Samples::Int32(_) => DataType::Int32,
            Samples::UInt32(_) => DataType::UInt32,
            Samples::Float32(_) => DataType::Float32,
            Samples::Float64(_) => DataType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::Int8(v) => v.len(),
            Samples::UInt8(v) => v.len(),
            Samples::Int16(v) => v.len(),
            Samples::UInt16(v) => v.len(),
            Samples::Int32(v) => v.len(),
            Samples::UInt32(v) => v.len(),
            Samples::Float32(v) => v.len(),
            Samples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Samples::Int8(v) => v.get(index).map(|s| *s as f64),
            Samples::UInt8(v) => v.get(index).map(|s| *s as f64),
            Samples::Int16(v) => v.get(index).map(|s| *s as f64),
            Samples::UInt16(v) => v.get(index).map(|s| *s as f64),
            Samples::Int32(v) => v.get(index).map(|s| *s as f64),
            Samples::UInt32(v) => v.get(index).map(|s| *s as f64),
            Samples::Float32(v) => v.get(index).map(|s| *s as f64),
            Samples::Float64(v) => v.get(index).copied(),
        }
    }
}

fn flip_planes<T>(values: &mut [T], width: usize, height: usize) {
    if width == 0 || height < 2 {
        return;
    }
    for plane in values.chunks_exact_mut(width * height) {
        for row in 0..height / 2 {
            let (upper, lower) = plane.split_at_mut((height - 1 - row) * width);
            upper[row * width..(row + 1) * width].swap_with_slice(&mut lower[..width]);
        }
    }
}

/// Raster metadata carried alongside pixel data and written verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub driver: String,
    pub dtype: DataType,
    pub width: u32,
    pub height: u32,
    pub count: usize,
    pub transform: GeoTransform,
    pub crs: Option<u16>,
    pub compression: Compression,
    pub nodata: Option<f64>,
}

impl Profile {
    pub const GTIFF: &'static str = "GTiff";

    pub fn sample_count(&self) -> usize {
        self.count * self.width as usize * self.height as usize
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Profile({}, {}x{}x{} {}, EPSG:{}, {:?}, nodata={:?})",
            self.driver,
            self.count,
            self.height,
            self.width,
            self.dtype,
            self.crs.map(|c| c.to_string()).unwrap_or("?".into()),
            self.compression,
            self.nodata
        )
    }
}

/// Pixel window inside a source raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
    /// Whether the window sits exactly centered on the requested pixel
    pub centered: bool,
}

/// Multi-band pixel block plus the profile describing it.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    pub samples: Samples,
    pub profile: Profile,
}

impl Tile {
    pub fn new(samples: Samples, profile: Profile) -> Result<Self, RasterError> {
        let expected = profile.sample_count();
        if samples.len() != expected {
            return Err(RasterError::BufferSize {
                expected,
                actual: samples.len(),
            });
        }
        if samples.data_type() != profile.dtype {
            return Err(RasterError::DataTypeMismatch {
                declared: profile.dtype,
                actual: samples.data_type(),
            });
        }
        Ok(Self { samples, profile })
    }

    pub fn bands(&self) -> usize {
        self.profile.count
    }

    pub fn width(&self) -> u32 {
        self.profile.width
    }

    pub fn height(&self) -> u32 {
        self.profile.height
    }

    pub fn get(&self, band: usize, row: u32, col: u32) -> Option<f64> {
        if band >= self.bands() || row >= self.height() || col >= self.width() {
            return None;
        }
        let plane = self.width() as usize * self.height() as usize;
        self.samples
            .get(band * plane + row as usize * self.width() as usize + col as usize)
    }
}

impl Display for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tile({} samples, {})", self.samples.len(), self.profile)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn profile(dtype: DataType, count: usize, width: u32, height: u32) -> Profile {
        Profile {
            driver: Profile::GTIFF.to_string(),
            dtype,
            width,
            height,
            count,
            transform: GeoTransform::new(500_000.0, 10.0, 0.0, 4_200_000.0, 0.0, -10.0),
            crs: Some(32610),
            compression: Compression::Uncompressed,
            nodata: Some(-128.0),
        }
    }

    #[test]
    fn tile_rejects_wrong_sample_count() {
        let result = Tile::new(Samples::Int8(vec![0; 7]), profile(DataType::Int8, 2, 2, 2));
        assert!(matches!(
            result,
            Err(RasterError::BufferSize {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn tile_rejects_mismatched_dtype() {
        let result = Tile::new(Samples::UInt8(vec![0; 4]), profile(DataType::Int8, 1, 2, 2));
        assert!(matches!(result, Err(RasterError::DataTypeMismatch { .. })));
    }

    #[test]
    fn tile_indexes_band_sequential() {
        let samples = Samples::Int8((0..12).collect());
        let tile = Tile::new(samples, profile(DataType::Int8, 3, 2, 2)).unwrap();
        assert_eq!(tile.get(0, 0, 0), Some(0.0));
        assert_eq!(tile.get(1, 0, 1), Some(5.0));
        assert_eq!(tile.get(2, 1, 1), Some(11.0));
        assert_eq!(tile.get(3, 0, 0), None);
    }

    #[test]
    fn samples_decode_with_endian() {
        let bytes = [0xFF, 0xFE, 0x00, 0x02];
        let samples = Samples::from_bytes(DataType::Int16, &bytes, Endian::Big).unwrap();
        assert_eq!(samples, Samples::Int16(vec![-2, 2]));
        assert_eq!(samples.to_bytes(Endian::Big), bytes.to_vec());
        assert!(Samples::from_bytes(DataType::Int16, &bytes[..3], Endian::Big).is_none());
    }

    #[test]
    fn flips_rows_per_band() {
        // 2 bands of 2x3
        let mut samples = Samples::UInt8(vec![1, 2, 3, 4, 5, 6, 11, 12, 13, 14, 15, 16]);
        samples.flip_rows(2, 3);
        assert_eq!(
            samples,
            Samples::UInt8(vec![5, 6, 3, 4, 1, 2, 15, 16, 13, 14, 11, 12])
        );
    }

    #[test]
    fn data_type_from_tiff_tags() {
        assert_eq!(
            DataType::from_tiff(8, SampleFormat::Signed).unwrap(),
            DataType::Int8
        );
        assert_eq!(
            DataType::from_tiff(32, SampleFormat::Float).unwrap(),
            DataType::Float32
        );
        assert!(DataType::from_tiff(12, SampleFormat::Unsigned).is_err());
    }
}
