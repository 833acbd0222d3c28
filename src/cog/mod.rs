use crate::geotags::GeoTags;
use crate::io::ReadRange;
use crate::raster::{DataType, GeoTransform, PixelWindow, Profile, Samples};
use crate::tiff::{Endian, TagId, Tiff};
use std::fmt::Display;
use std::io::{BufReader, Cursor, ErrorKind, Read, Seek};
use tracing::debug;

mod compression;
mod error;
mod level;

pub use compression::{Compression, DecompressError, Predictor};
pub use error::{CogError, CogResult};
pub use level::Level;

/// First guess at how many leading bytes hold every IFD of a COG.
pub const HEADER_FETCH_SIZE: usize = 16 * 1024;
const MAX_HEADER_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct CloudTiff {
    levels: Vec<Level>,
    geo_tags: GeoTags,
    nodata: Option<f64>,
    endian: Endian,
}

impl CloudTiff {
    pub fn open<R: Read + Seek>(source: &mut R) -> CogResult<Self> {
        source.rewind()?;
        let stream = &mut BufReader::new(source);

        // TIFF indexing
        let tiff = Tiff::open(stream)?;

        // Parse GeoTIFF tags
        let ifd0 = tiff.ifd0()?;
        let geo_tags = GeoTags::parse(ifd0)?;
        let nodata = ifd0
            .get_tag(TagId::GDALNoData)
            .ok()
            .and_then(|tag| tag.as_string())
            .and_then(|s| s.trim().parse::<f64>().ok());

        // Map IFDs into COG Levels
        //   Note this skips over any ifds which aren't valid COG levels (masks)
        let mut levels: Vec<Level> = tiff
            .ifds
            .iter()
            .filter_map(|ifd| Level::from_ifd(ifd, tiff.endian).ok())
            .collect();

        // COGs should already have levels sorted big to small
        levels.sort_by(|a, b| (b.megapixels()).total_cmp(&a.megapixels()));
        if levels.is_empty() {
            return Err(CogError::NoLevels);
        }

        Ok(Self {
            levels,
            geo_tags,
            nodata,
            endian: tiff.endian,
        })
    }

    /// Parse the header through range reads, growing the prefix until every
    /// IFD fits.
    pub fn open_range(source: &dyn ReadRange) -> CogResult<Self> {
        let mut fetch_size = HEADER_FETCH_SIZE;
        loop {
            let mut buffer = vec![0; fetch_size];
            let n = source.read_range(0, &mut buffer)?;
            buffer.truncate(n);

            let result = Self::open(&mut Cursor::new(&buffer));
            match result {
                Err(CogError::ReadError(e))
                    if e.kind() == ErrorKind::UnexpectedEof && n == fetch_size =>
                {
                    if fetch_size >= MAX_HEADER_SIZE {
                        return Err(CogError::HeaderTooLarge(fetch_size));
                    }
                    fetch_size *= 4;
                    debug!(fetch_size, "header exceeds prefix, refetching");
                }
                result => return result,
            }
        }
    }

    pub fn full_level(&self) -> &Level {
        &self.levels[0] // Checked at initialization
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn full_dimensions(&self) -> (u32, u32) {
        self.full_level().dimensions
    }

    pub fn band_count(&self) -> usize {
        self.full_level().samples_per_pixel()
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn geo_tags(&self) -> &GeoTags {
        &self.geo_tags
    }

    pub fn geotransform(&self) -> CogResult<GeoTransform> {
        self.geo_tags
            .geotransform()
            .filter(|t| t.is_valid())
            .ok_or(CogError::NotGeoreferenced)
    }

    pub fn epsg(&self) -> Option<u16> {
        self.geo_tags.epsg()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn data_type(&self) -> CogResult<DataType> {
        self.full_level().data_type()
    }

    /// Metadata of the full resolution image.
    pub fn profile(&self) -> CogResult<Profile> {
        let (width, height) = self.full_dimensions();
        Ok(Profile {
            driver: Profile::GTIFF.to_string(),
            dtype: self.data_type()?,
            width,
            height,
            count: self.band_count(),
            transform: self.geotransform()?,
            crs: self.epsg(),
            compression: self.full_level().compression,
            nodata: self.nodata,
        })
    }

    /// Read a full resolution window over all bands, band sequential.
    pub fn read_window(&self, source: &dyn ReadRange, window: &PixelWindow) -> CogResult<Samples> {
        let dtype = self.data_type()?;
        let fill = Samples::filled(dtype, self.nodata.unwrap_or(0.0), 1).to_bytes(self.endian);
        let bytes = self.full_level().read_window(source, window, &fill)?;
        Samples::from_bytes(dtype, &bytes, self.endian).ok_or_else(|| {
            CogError::NotSupported(format!("{} bytes do not hold {dtype} samples", bytes.len()))
        })
    }
}

impl Display for CloudTiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CloudTiff({} Levels)", self.levels.len())?;
        for level in self.levels.iter() {
            write!(f, "\n  {level}")?;
        }
        Ok(())
    }
}
