mod common;

use aeftile::raster::{dequantize_value, DataType, GeoTransform};
use aeftile::{AssetId, CloudTiff, Downloader, DownloaderConfig, PixelWindow};
use approx::assert_relative_eq;
use common::*;
use std::io::Cursor;
use std::path::Path;

const LAT: f64 = 37.8;
const LON: f64 = -122.4;
const TILE: u32 = 8;

fn downloader(output: &Path, store: &MemoryStore, at: (f64, f64), dequantize: bool) -> Downloader {
    let config = DownloaderConfig::new(output)
        .with_archive_root(ARCHIVE_ROOT)
        .with_tile_size(TILE)
        .with_dequantize(dequantize);
    let catalog = RecordingCatalog {
        assets: vec![AssetId::new(ASSET).unwrap()],
        ..Default::default()
    };
    Downloader::new(config, catalog, store.clone()).with_projector(FixedProjector {
        easting: at.0,
        northing: at.1,
    })
}

fn read_back(path: &Path) -> (CloudTiff, aeftile::raster::Samples) {
    let bytes = std::fs::read(path).unwrap();
    let cog = CloudTiff::open(&mut Cursor::new(bytes.clone())).unwrap();
    let (width, height) = cog.full_dimensions();
    let window = PixelWindow {
        col_off: 0,
        row_off: 0,
        width,
        height,
        centered: true,
    };
    let samples = cog.read_window(&bytes, &window).unwrap();
    (cog, samples)
}

fn plane_index(band: usize, row: u32, col: u32) -> usize {
    band * (TILE * TILE) as usize + (row * TILE + col) as usize
}

#[test]
fn finds_the_third_shard_and_writes_a_centered_tile() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let d = downloader(dir.path(), &store, pixel_center(2, 30, 20), false);

    let path = d.download(LAT, LON, YEAR, "site-a").unwrap();
    assert_eq!(path, dir.path().join("2021").join("site-a_centered_true.tiff"));

    let c = candidates();
    assert_eq!(
        store.reads(),
        vec![
            format!("fetch {}", c[0].side_file()),
            format!("fetch {}", c[1].side_file()),
            format!("fetch {}", c[2].side_file()),
            format!("fetch {}", c[2].side_file()),
            format!("open {}", c[2].path()),
        ]
    );

    let (cog, samples) = read_back(&path);
    let profile = cog.profile().unwrap();
    assert_eq!(profile.dtype, DataType::Int8);
    assert_eq!((profile.width, profile.height, profile.count), (TILE, TILE, BANDS));
    assert_eq!(profile.crs, Some(EPSG));
    assert_eq!(profile.nodata, Some(-128.0));
    let (left, top) = shard_origin(2);
    assert_eq!(
        profile.transform,
        GeoTransform::new(left + 160.0, PIXEL, 0.0, top - 260.0, 0.0, -PIXEL)
    );

    for band in 0..BANDS {
        for row in 0..TILE {
            for col in 0..TILE {
                assert_eq!(
                    samples.get(plane_index(band, row, col)),
                    Some(stored_value(2, band, 26 + row, 16 + col) as f64),
                    "band {band} row {row} col {col}"
                );
            }
        }
    }
}

#[test]
fn bottom_up_shards_are_written_north_up() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive_with(true);
    let d = downloader(dir.path(), &store, pixel_center(2, 30, 20), false);

    let path = d.download(LAT, LON, YEAR, "site-a").unwrap();
    assert!(path.ends_with("2021/site-a_centered_true.tiff"));

    let (cog, samples) = read_back(&path);
    let (left, top) = shard_origin(2);
    assert_eq!(
        cog.profile().unwrap().transform,
        GeoTransform::new(left + 160.0, PIXEL, 0.0, top - 260.0, 0.0, -PIXEL)
    );
    for band in 0..BANDS {
        for row in 0..TILE {
            for col in 0..TILE {
                assert_eq!(
                    samples.get(plane_index(band, row, col)),
                    Some(stored_value(2, band, 26 + row, 16 + col) as f64),
                    "band {band} row {row} col {col}"
                );
            }
        }
    }
}

#[test]
fn dequantized_tiles_are_float_with_nan_nodata() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let d = downloader(dir.path(), &store, pixel_center(2, 30, 20), true);

    let path = d.download(LAT, LON, YEAR, "site-a").unwrap();
    let (cog, samples) = read_back(&path);
    let profile = cog.profile().unwrap();
    assert_eq!(profile.dtype, DataType::Float32);
    assert!(profile.nodata.is_some_and(f64::is_nan));

    // The window origin holds the quantization sentinel in the first band
    assert!(samples.get(plane_index(0, 0, 0)).is_some_and(f64::is_nan));
    let stored = stored_value(2, 1, 26 + 3, 16 + 5) as f32;
    assert_relative_eq!(
        samples.get(plane_index(1, 3, 5)).unwrap(),
        dequantize_value(stored) as f64,
        epsilon = 1e-6
    );
}

#[test]
fn windows_near_a_shard_edge_are_shifted_inside() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let d = downloader(dir.path(), &store, pixel_center(1, 1, 62), false);

    let path = d.download(LAT, LON, YEAR, "site-b").unwrap();
    assert!(path.ends_with("2021/site-b_centered_false.tiff"));

    let (cog, samples) = read_back(&path);
    let (left, top) = shard_origin(1);
    assert_eq!(
        cog.profile().unwrap().transform,
        GeoTransform::new(left + 560.0, PIXEL, 0.0, top, 0.0, -PIXEL)
    );
    assert_eq!(
        samples.get(plane_index(1, 7, 7)),
        Some(stored_value(1, 1, 7, 63) as f64)
    );
    assert!(!store.reads().iter().any(|read| read.contains("8192-0000008192")));
}

#[test]
fn tile_larger_than_a_shard_is_rejected_before_reading_rasters() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let config = DownloaderConfig::new(dir.path())
        .with_archive_root(ARCHIVE_ROOT)
        .with_tile_size(SHARD_SIZE + 1);
    let at = pixel_center(0, 10, 10);
    let d = Downloader::new(
        config,
        aeftile::FixedCatalog(vec![AssetId::new(ASSET).unwrap()]),
        store.clone(),
    )
    .with_projector(FixedProjector {
        easting: at.0,
        northing: at.1,
    });

    let e = d.download(LAT, LON, YEAR, "big").unwrap_err();
    assert_eq!(e.kind(), "invalid_argument");
    assert!(store.reads().iter().all(|read| read.starts_with("fetch")));
    assert!(!dir.path().join("2021").exists());
}

#[test]
fn missing_asset_reads_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let config = DownloaderConfig::new(dir.path()).with_archive_root(ARCHIVE_ROOT);
    let d = Downloader::new(config, RecordingCatalog::default(), store.clone()).with_projector(
        FixedProjector {
            easting: LEFT,
            northing: TOP,
        },
    );

    let e = d.download(LAT, LON, YEAR, "nowhere").unwrap_err();
    assert_eq!(e.kind(), "asset_not_found");
    assert!(store.reads().is_empty());
}

#[test]
fn point_between_shards_is_no_matching_tile() {
    let dir = tempfile::tempdir().unwrap();
    let store = archive();
    let d = downloader(dir.path(), &store, (LEFT - 100.0, TOP + 100.0), false);

    let e = d.download(LAT, LON, YEAR, "outside").unwrap_err();
    assert_eq!(e.kind(), "no_matching_tile");
    assert_eq!(store.reads().len(), 4);
}
