use crate::cog::Compression;
use crate::geotags::GeoTags;
use crate::raster::{PhotometricInterpretation, PlanarConfiguration, Tile};
use crate::tiff::{Endian, Ifd, TagData, TagId, Tiff, TiffVariant};
use std::io::Write;

pub mod error;

pub use error::{EncodeError, EncodeResult};

/// Target uncompressed strip size.
const STRIP_BYTES: usize = 64 * 1024;

/// GeoTIFF writer for a band sequential tile.
///
/// Output is a single IFD of planar strips, georeferenced from the tile
/// profile: header, strip data, then the directory.
#[derive(Debug)]
pub struct Encoder<'a> {
    tile: &'a Tile,
    endian: Endian,
    variant: Option<TiffVariant>,
    compression: Compression,
    rows_per_strip: Option<u32>,
}

impl<'a> Encoder<'a> {
    pub fn from_tile(tile: &'a Tile) -> Self {
        Self {
            tile,
            endian: Endian::Little,
            variant: None,
            compression: tile.profile.compression,
            rows_per_strip: None,
        }
    }

    pub fn with_big_endian(mut self, big: bool) -> Self {
        self.endian = if big { Endian::Big } else { Endian::Little };
        self
    }

    pub fn with_big_tiff(mut self, big: bool) -> Self {
        self.variant = Some(if big {
            TiffVariant::Big
        } else {
            TiffVariant::Normal
        });
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = Some(rows.max(1));
        self
    }

    fn rows_per_strip(&self) -> u32 {
        let profile = &self.tile.profile;
        self.rows_per_strip.unwrap_or_else(|| {
            let row_bytes = (profile.width as usize * profile.dtype.bytes()).max(1);
            ((STRIP_BYTES / row_bytes).max(1) as u32).min(profile.height.max(1))
        })
    }

    /// Unsupported schemes fall back to deflate.
    fn compression(&self) -> Compression {
        if self.compression.is_supported() {
            self.compression
        } else {
            Compression::Deflate
        }
    }

    fn strips(&self) -> EncodeResult<Vec<Vec<u8>>> {
        let profile = &self.tile.profile;
        let compression = self.compression();
        let bytes = self.tile.samples.to_bytes(self.endian);
        let row_bytes = profile.width as usize * profile.dtype.bytes();
        let strip_bytes = row_bytes * self.rows_per_strip() as usize;
        let plane_bytes = row_bytes * profile.height as usize;
        if plane_bytes == 0 {
            return Ok(vec![]);
        }

        let mut strips = vec![];
        for plane in bytes.chunks(plane_bytes) {
            for strip in plane.chunks(strip_bytes) {
                strips.push(compression.encode(strip)?);
            }
        }
        Ok(strips)
    }

    fn directory(&self, offsets: Vec<u64>, byte_counts: Vec<u64>, variant: TiffVariant) -> Ifd {
        let endian = self.endian;
        let profile = &self.tile.profile;
        let count = profile.count as u16;
        let mut ifd = Ifd::default();

        let (offsets, byte_counts) = match variant {
            TiffVariant::Normal => (
                TagData::Long(offsets.into_iter().map(|v| v as u32).collect()),
                TagData::Long(byte_counts.into_iter().map(|v| v as u32).collect()),
            ),
            TiffVariant::Big => (TagData::Long8(offsets), TagData::Long8(byte_counts)),
        };

        ifd.set_tag(TagId::ImageWidth, TagData::from_long(profile.width), endian);
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(profile.height), endian);
        ifd.set_tag(
            TagId::BitsPerSample,
            TagData::Short(vec![profile.dtype.bits(); count as usize]),
            endian,
        );
        ifd.set_tag(
            TagId::Compression,
            TagData::from_short(self.compression().into()),
            endian,
        );
        ifd.set_tag(
            TagId::PhotometricInterpretation,
            TagData::from_short(PhotometricInterpretation::BlackIsZero.into()),
            endian,
        );
        ifd.set_tag(TagId::StripOffsets, offsets, endian);
        ifd.set_tag(TagId::SamplesPerPixel, TagData::from_short(count), endian);
        ifd.set_tag(
            TagId::RowsPerStrip,
            TagData::from_long(self.rows_per_strip()),
            endian,
        );
        ifd.set_tag(TagId::StripByteCounts, byte_counts, endian);
        ifd.set_tag(
            TagId::PlanarConfiguration,
            TagData::from_short(PlanarConfiguration::Planar.into()),
            endian,
        );
        if count > 1 {
            // Unspecified extra samples
            ifd.set_tag(
                TagId::ExtraSamples,
                TagData::Short(vec![0; count as usize - 1]),
                endian,
            );
        }
        ifd.set_tag(
            TagId::SampleFormat,
            TagData::Short(vec![profile.dtype.sample_format().into(); count as usize]),
            endian,
        );

        GeoTags::from_geotransform(&profile.transform, profile.crs).add_to_ifd(&mut ifd, endian);
        if let Some(nodata) = profile.nodata {
            ifd.set_tag(TagId::GDALNoData, TagData::from_string(&nodata_string(nodata)), endian);
        }
        ifd
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> EncodeResult<()> {
        let strips = self.strips()?;
        let data_size: u64 = strips.iter().map(|s| word_aligned(s.len() as u64)).sum();
        let variant = self.variant.unwrap_or(if data_size > u32::MAX as u64 / 2 {
            TiffVariant::Big
        } else {
            TiffVariant::Normal
        });

        // Strip data follows the header directly
        let header_size = variant.header_bytesize() as u64;
        let mut offsets = Vec::with_capacity(strips.len());
        let mut offset = header_size;
        for strip in strips.iter() {
            offsets.push(offset);
            offset += word_aligned(strip.len() as u64);
        }
        let byte_counts = strips.iter().map(|s| s.len() as u64).collect();
        let ifd_offset = offset;

        let mut tiff = Tiff::new(self.endian, variant);
        *tiff.ifd0_mut() = self.directory(offsets, byte_counts, variant);

        tiff.write_header(writer, ifd_offset)?;
        for strip in strips.iter() {
            writer.write_all(strip)?;
            if strip.len() % 2 == 1 {
                writer.write_all(&[0])?;
            }
        }
        tiff.ifds[0].write(writer, ifd_offset, 0, self.endian, variant)?;
        writer.flush()?;
        Ok(())
    }

    pub fn encode_to_vec(&self) -> EncodeResult<Vec<u8>> {
        let mut bytes = vec![];
        self.encode(&mut bytes)?;
        Ok(bytes)
    }
}

fn word_aligned(n: u64) -> u64 {
    n + (n % 2)
}

fn nodata_string(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::CloudTiff;
    use crate::raster::{DataType, GeoTransform, PixelWindow, Profile, Samples};
    use std::io::Cursor;

    fn tile(dtype: DataType, samples: Samples, compression: Compression) -> Tile {
        Tile::new(
            samples,
            Profile {
                driver: Profile::GTIFF.to_string(),
                dtype,
                width: 3,
                height: 2,
                count: 2,
                transform: GeoTransform::new(500_000.0, 10.0, 0.0, 4_200_000.0, 0.0, -10.0),
                crs: Some(32610),
                compression,
                nodata: Some(-128.0),
            },
        )
        .unwrap()
    }

    fn int8_tile(compression: Compression) -> Tile {
        tile(
            DataType::Int8,
            Samples::Int8(vec![-128, -1, 0, 1, 2, 127, 10, 20, 30, 40, 50, 60]),
            compression,
        )
    }

    fn read_back(bytes: Vec<u8>) -> (CloudTiff, Samples) {
        let cog = CloudTiff::open(&mut Cursor::new(bytes.clone())).unwrap();
        let window = PixelWindow {
            col_off: 0,
            row_off: 0,
            width: 3,
            height: 2,
            centered: true,
        };
        let samples = cog.read_window(&bytes, &window).unwrap();
        (cog, samples)
    }

    #[test]
    fn round_trips_through_reader() {
        for compression in [Compression::Uncompressed, Compression::Deflate, Compression::Lzw] {
            let tile = int8_tile(compression);
            let bytes = Encoder::from_tile(&tile).encode_to_vec().unwrap();
            let (cog, samples) = read_back(bytes);
            assert_eq!(samples, tile.samples, "{compression:?}");
            assert_eq!(cog.profile().unwrap(), tile.profile);
        }
    }

    #[test]
    fn writes_big_endian_bigtiff_floats() {
        let tile = tile(
            DataType::Float32,
            Samples::Float32(vec![0.5, -0.25, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]),
            Compression::Uncompressed,
        );
        let bytes = Encoder::from_tile(&tile)
            .with_big_endian(true)
            .with_big_tiff(true)
            .with_rows_per_strip(1)
            .encode_to_vec()
            .unwrap();
        assert_eq!(&bytes[..4], b"MM\0+");
        let (cog, samples) = read_back(bytes);
        assert_eq!(samples, tile.samples);
        assert_eq!(cog.full_level().offsets.len(), 4);
    }

    #[test]
    fn nan_nodata_is_written_as_gdal_string() {
        let mut tile = tile(
            DataType::Float32,
            Samples::Float32(vec![f32::NAN; 12]),
            Compression::Deflate,
        );
        tile.profile.nodata = Some(f64::NAN);
        let bytes = Encoder::from_tile(&tile).encode_to_vec().unwrap();
        let (cog, samples) = read_back(bytes);
        assert!(cog.nodata().unwrap().is_nan());
        let Samples::Float32(values) = samples else {
            panic!("expected float32 samples");
        };
        assert!(values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn unsupported_compression_falls_back_to_deflate() {
        let tile = int8_tile(Compression::Zstd);
        let bytes = Encoder::from_tile(&tile).encode_to_vec().unwrap();
        let (cog, samples) = read_back(bytes);
        assert_eq!(cog.full_level().compression, Compression::Deflate);
        assert_eq!(samples, tile.samples);
    }
}
