use super::compression::{Compression, Predictor};
use super::{CogError, CogResult};
use crate::io::ReadRange;
use crate::raster::{DataType, PixelWindow, PlanarConfiguration, SampleFormat};
use crate::tiff::{Endian, Ifd, TagId, TiffError};
use std::fmt::Display;
use tracing::trace;

const SUBFILE_MASK: u32 = 4;

/// One resolution of a (cloud optimized) GeoTIFF.
///
/// Stripped images are handled as tiles spanning the full image width.
#[derive(Clone, Debug)]
pub struct Level {
    pub dimensions: (u32, u32),
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: Compression,
    pub predictor: Predictor,
    pub bits_per_sample: Vec<u16>,
    pub sample_format: SampleFormat,
    pub planar: PlanarConfiguration,
    pub endian: Endian,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
}

impl Level {
    pub fn from_ifd(ifd: &Ifd, endian: Endian) -> CogResult<Self> {
        let subfile_type = ifd.get_tag_value::<u32>(TagId::NewSubfileType).unwrap_or(0);
        if subfile_type & SUBFILE_MASK != 0 {
            return Err(CogError::NotSupported("Transparency mask".into()));
        }

        // Required tags
        let width = ifd.get_tag_value(TagId::ImageWidth)?;
        let height = ifd.get_tag_value(TagId::ImageHeight)?;
        let compression = ifd
            .get_tag_value::<u16>(TagId::Compression)
            .unwrap_or(Compression::Uncompressed.into())
            .into();
        let predictor = ifd
            .get_tag_value::<u16>(TagId::Predictor)
            .unwrap_or(1)
            .into();
        let bits_per_sample: Vec<u16> = match ifd.get_tag_values(TagId::BitsPerSample) {
            Ok(bits) => bits,
            Err(_) => vec![1],
        };
        let samples_per_pixel = ifd
            .get_tag_value::<u16>(TagId::SamplesPerPixel)
            .unwrap_or(1) as usize;
        if samples_per_pixel == 0 {
            return Err(CogError::BadTiff(TiffError::BadTag(TagId::SamplesPerPixel)));
        }
        let bits_per_sample = expand_to(bits_per_sample, samples_per_pixel);
        if bits_per_sample.is_empty() {
            return Err(CogError::BadTiff(TiffError::BadTag(TagId::BitsPerSample)));
        }
        let sample_format = ifd
            .get_tag_value::<u16>(TagId::SampleFormat)
            .unwrap_or(SampleFormat::Unsigned.into())
            .into();
        let planar = ifd
            .get_tag_value::<u16>(TagId::PlanarConfiguration)
            .unwrap_or(PlanarConfiguration::Chunky.into())
            .into();

        // Tiled or stripped layout
        let (tile_width, tile_height, offsets, byte_counts) =
            match ifd.get_tag_value::<u32>(TagId::TileWidth) {
                Ok(tile_width) => (
                    tile_width,
                    ifd.get_tag_value(TagId::TileLength)?,
                    ifd.get_tag_values(TagId::TileOffsets)?,
                    ifd.get_tag_values(TagId::TileByteCounts)?,
                ),
                Err(_) => (
                    width,
                    ifd.get_tag_value::<u32>(TagId::RowsPerStrip)
                        .unwrap_or(height)
                        .min(height),
                    ifd.get_tag_values(TagId::StripOffsets)?,
                    ifd.get_tag_values(TagId::StripByteCounts)?,
                ),
            };

        if offsets.len() != byte_counts.len() {
            return Err(CogError::BadTiff(TiffError::BadTag(TagId::TileOffsets)));
        }
        if tile_width == 0 || tile_height == 0 {
            return Err(CogError::BadTiff(TiffError::BadTag(TagId::TileWidth)));
        }

        let level = Self {
            dimensions: (width, height),
            tile_width,
            tile_height,
            compression,
            predictor,
            bits_per_sample,
            sample_format,
            planar,
            endian,
            offsets,
            byte_counts,
        };

        let expected = level.tiles_per_plane() * level.planes();
        if level.offsets.len() < expected {
            return Err(CogError::BadTiff(TiffError::BadTag(TagId::TileOffsets)));
        }
        Ok(level)
    }

    pub fn megapixels(&self) -> f64 {
        (self.dimensions.0 as f64 * self.dimensions.1 as f64) / 1e6
    }

    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.bits_per_sample.len()
    }

    pub fn data_type(&self) -> CogResult<DataType> {
        let bits = self.bits_per_sample[0];
        if self.bits_per_sample.iter().any(|b| *b != bits) {
            return Err(CogError::NotSupported(format!(
                "Mixed bit depths {:?}",
                self.bits_per_sample
            )));
        }
        Ok(DataType::from_tiff(bits, self.sample_format)?)
    }

    pub fn col_count(&self) -> usize {
        self.width().div_ceil(self.tile_width) as usize
    }

    pub fn row_count(&self) -> usize {
        self.height().div_ceil(self.tile_height) as usize
    }

    fn tiles_per_plane(&self) -> usize {
        self.col_count() * self.row_count()
    }

    fn planes(&self) -> usize {
        match self.planar {
            PlanarConfiguration::Planar => self.samples_per_pixel(),
            _ => 1,
        }
    }

    pub fn tile_byte_range(&self, index: usize) -> CogResult<(u64, u64)> {
        let max_valid_index = self.offsets.len().min(self.byte_counts.len());
        if index >= max_valid_index {
            return Err(CogError::TileIndexOutOfRange(
                index,
                max_valid_index.saturating_sub(1),
            ));
        }
        let offset = self.offsets[index];
        Ok((offset, offset + self.byte_counts[index]))
    }

    /// Decompress a tile and undo its predictor, leaving samples in file byte order.
    pub fn extract_tile_from_bytes(&self, bytes: &[u8]) -> CogResult<Vec<u8>> {
        let mut buffer = self.compression.decode(bytes)?;
        let samples = match self.planar {
            PlanarConfiguration::Planar => 1,
            _ => self.samples_per_pixel(),
        };
        self.predictor.predict(
            buffer.as_mut_slice(),
            self.tile_width as usize,
            self.bits_per_sample[0],
            samples,
            self.endian,
        )?;
        Ok(buffer)
    }

    fn read_tile(&self, source: &dyn ReadRange, index: usize) -> CogResult<Option<Vec<u8>>> {
        let (start, end) = self.tile_byte_range(index)?;
        if start == end {
            // Sparse tile
            return Ok(None);
        }
        trace!(index, start, end, "reading tile");
        let bytes = source.read_range_to_vec(start, end)?;
        Ok(Some(self.extract_tile_from_bytes(&bytes)?))
    }

    /// Read a pixel window over all bands, as band sequential bytes in file byte order.
    ///
    /// Only tiles overlapping the window are fetched. Sparse tiles read as `fill`.
    pub fn read_window(
        &self,
        source: &dyn ReadRange,
        window: &PixelWindow,
        fill: &[u8],
    ) -> CogResult<Vec<u8>> {
        let col_end = window.col_off as u64 + window.width as u64;
        let row_end = window.row_off as u64 + window.height as u64;
        if window.width == 0
            || window.height == 0
            || col_end > self.width() as u64
            || row_end > self.height() as u64
        {
            return Err(CogError::WindowOutOfBounds {
                window: *window,
                width: self.width(),
                height: self.height(),
            });
        }

        let bytes_per_sample = (self.bits_per_sample[0] / 8) as usize;
        let bands = self.samples_per_pixel();
        let (w, h) = (window.width as usize, window.height as usize);
        let mut out = Vec::with_capacity(bands * w * h * bytes_per_sample);
        for _ in 0..bands * w * h {
            out.extend_from_slice(fill);
        }

        let tile_cols = window.col_off / self.tile_width..=(col_end as u32 - 1) / self.tile_width;
        let tile_rows = window.row_off / self.tile_height..=(row_end as u32 - 1) / self.tile_height;
        let tile_w = self.tile_width as usize;

        for tile_row in tile_rows {
            for tile_col in tile_cols.clone() {
                let x0 = tile_col * self.tile_width;
                let y0 = tile_row * self.tile_height;
                let xs = window.col_off.max(x0)..(col_end as u32).min(x0 + self.tile_width);
                let ys = window.row_off.max(y0)..(row_end as u32).min(y0 + self.tile_height);

                for plane in 0..self.planes() {
                    let index = plane * self.tiles_per_plane()
                        + tile_row as usize * self.col_count()
                        + tile_col as usize;
                    let Some(tile) = self.read_tile(source, index)? else {
                        continue;
                    };
                    let (band_range, stride) = match self.planar {
                        PlanarConfiguration::Planar => (plane..plane + 1, 1),
                        _ => (0..bands, bands),
                    };

                    for y in ys.clone() {
                        for x in xs.clone() {
                            let pixel = (y - y0) as usize * tile_w + (x - x0) as usize;
                            for band in band_range.clone() {
                                let within = if stride == 1 { 0 } else { band };
                                let src = (pixel * stride + within) * bytes_per_sample;
                                let src_end = src + bytes_per_sample;
                                let sample = tile.get(src..src_end).ok_or_else(|| {
                                    CogError::TileTooShort {
                                        index,
                                        expected: src_end,
                                        actual: tile.len(),
                                    }
                                })?;
                                let dst = ((band * h + (y - window.row_off) as usize) * w
                                    + (x - window.col_off) as usize)
                                    * bytes_per_sample;
                                out[dst..dst + bytes_per_sample].copy_from_slice(sample);
                            }
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

fn expand_to(mut bits: Vec<u16>, samples: usize) -> Vec<u16> {
    if bits.len() < samples {
        let last = bits.last().copied().unwrap_or(1);
        bits.resize(samples, last);
    }
    bits
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Level({}x{}, {} tiles of {}x{}, {} bands, {:?} Compression, {:?} Predictor)",
            self.dimensions.0,
            self.dimensions.1,
            self.offsets.len(),
            self.tile_width,
            self.tile_height,
            self.samples_per_pixel(),
            self.compression,
            self.predictor
        )
    }
}
