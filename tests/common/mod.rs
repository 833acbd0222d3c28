#![allow(dead_code)]

use aeftile::catalog::CatalogError;
use aeftile::cog::Compression;
use aeftile::geo::ProjectionError;
use aeftile::io::SharedReader;
use aeftile::raster::{DataType, GeoTransform, Profile, Samples};
use aeftile::{
    candidate_files, AccessConfig, AssetCatalog, AssetId, CandidateFile, Encoder, GeoPoint,
    Projector, RasterStore, Tile, YearRange,
};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

pub const ARCHIVE_ROOT: &str = "s3://bucket/aef/v1/annual";
pub const ASSET: &str = "x02qcrn30k70b9ql6";
pub const YEAR: i32 = 2021;
pub const ZONE: &str = "10N";
pub const EPSG: u16 = 32610;

/// Shards are SHARD_SIZE x SHARD_SIZE pixels of PIXEL meters.
pub const SHARD_SIZE: u32 = 64;
pub const PIXEL: f64 = 10.0;
pub const LEFT: f64 = 500_000.0;
pub const TOP: f64 = 4_200_000.0;
pub const BANDS: usize = 2;

/// Projector answering every request with the same coordinates.
pub struct FixedProjector {
    pub easting: f64,
    pub northing: f64,
}

impl Projector for FixedProjector {
    fn project(&self, _: &GeoPoint, epsg: u16) -> Result<(f64, f64), ProjectionError> {
        assert_eq!(epsg, EPSG);
        Ok((self.easting, self.northing))
    }
}

/// Catalog recording the year ranges it was asked about.
#[derive(Default)]
pub struct RecordingCatalog {
    pub assets: Vec<AssetId>,
    pub ranges: Mutex<Vec<String>>,
}

impl AssetCatalog for RecordingCatalog {
    fn query(&self, _: &GeoPoint, range: &YearRange) -> Result<Vec<AssetId>, CatalogError> {
        self.ranges.lock().unwrap().push(range.to_string());
        Ok(self.assets.clone())
    }
}

/// In-memory archive. Every read is logged as `fetch <path>` or `open <path>`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub files: Arc<HashMap<String, Vec<u8>>>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl MemoryStore {
    pub fn reads(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

impl RasterStore for MemoryStore {
    fn fetch(&self, path: &str, _: &AccessConfig) -> io::Result<Vec<u8>> {
        self.log.lock().unwrap().push(format!("fetch {path}"));
        self.get(path)
    }

    fn open(&self, path: &str, _: &AccessConfig) -> io::Result<SharedReader> {
        self.log.lock().unwrap().push(format!("open {path}"));
        Ok(Arc::new(self.get(path)?))
    }
}

pub fn candidates() -> [CandidateFile; 4] {
    candidate_files(ARCHIVE_ROOT, YEAR, ZONE, &AssetId::new(ASSET).unwrap()).unwrap()
}

/// Top-left corner of shard `index`, laid out as a 2x2 grid in candidate order.
pub fn shard_origin(index: usize) -> (f64, f64) {
    let span = SHARD_SIZE as f64 * PIXEL;
    let (row, col) = (index / 2, index % 2);
    (LEFT + col as f64 * span, TOP - row as f64 * span)
}

/// Stored value of shard `index` at (band, row, col).
pub fn stored_value(index: usize, band: usize, row: u32, col: u32) -> i8 {
    if index == 2 && band == 0 && row == 26 && col == 16 {
        return -128;
    }
    ((row * 3 + col + band as u32 * 7 + index as u32 * 11) % 120) as i8
}

pub fn side_file(index: usize) -> String {
    let (left, top) = shard_origin(index);
    format!(
        r#"<VRTDataset rasterXSize="{SHARD_SIZE}" rasterYSize="{SHARD_SIZE}">
  <SRS dataAxisToSRSAxisMapping="1,2">PROJCS["WGS 84 / UTM zone 10N",AUTHORITY["EPSG","{EPSG}"]]</SRS>
  <GeoTransform>{left}, {PIXEL}, 0, {top}, 0, -{PIXEL}</GeoTransform>
  <VRTRasterBand dataType="Int8" band="1">
    <NoDataValue>-128</NoDataValue>
  </VRTRasterBand>
  <VRTRasterBand dataType="Int8" band="2">
    <NoDataValue>-128</NoDataValue>
  </VRTRasterBand>
</VRTDataset>"#
    )
}

/// GeoTIFF of shard `index`. Bottom-up shards store their southern row first
/// and carry a positive y pixel size.
pub fn shard_tiff(index: usize, bottom_up: bool) -> Vec<u8> {
    let (left, top) = shard_origin(index);
    let mut values = Vec::new();
    for band in 0..BANDS {
        for stored_row in 0..SHARD_SIZE {
            let row = if bottom_up {
                SHARD_SIZE - 1 - stored_row
            } else {
                stored_row
            };
            for col in 0..SHARD_SIZE {
                values.push(stored_value(index, band, row, col));
            }
        }
    }
    let transform = if bottom_up {
        let bottom = top - SHARD_SIZE as f64 * PIXEL;
        GeoTransform::new(left, PIXEL, 0.0, bottom, 0.0, PIXEL)
    } else {
        GeoTransform::new(left, PIXEL, 0.0, top, 0.0, -PIXEL)
    };
    let tile = Tile::new(
        Samples::Int8(values),
        Profile {
            driver: Profile::GTIFF.to_string(),
            dtype: DataType::Int8,
            width: SHARD_SIZE,
            height: SHARD_SIZE,
            count: BANDS,
            transform,
            crs: Some(EPSG),
            compression: Compression::Deflate,
            nodata: Some(-128.0),
        },
    )
    .unwrap();
    Encoder::from_tile(&tile)
        .with_rows_per_strip(16)
        .encode_to_vec()
        .unwrap()
}

/// Archive with all four shards of the test asset, side-files always north-up.
pub fn archive() -> MemoryStore {
    archive_with(false)
}

pub fn archive_with(bottom_up: bool) -> MemoryStore {
    let mut files = HashMap::new();
    for (index, candidate) in candidates().iter().enumerate() {
        files.insert(candidate.side_file().to_string(), side_file(index).into_bytes());
        files.insert(candidate.path().to_string(), shard_tiff(index, bottom_up));
    }
    MemoryStore {
        files: Arc::new(files),
        log: Arc::default(),
    }
}

/// Projected coordinates of the center of pixel (row, col) of shard `index`.
pub fn pixel_center(index: usize, row: u32, col: u32) -> (f64, f64) {
    let (left, top) = shard_origin(index);
    (
        left + (col as f64 + 0.5) * PIXEL,
        top - (row as f64 + 0.5) * PIXEL,
    )
}
