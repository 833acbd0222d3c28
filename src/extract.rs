use crate::archive::CandidateFile;
use crate::cog::{CloudTiff, CogError};
use crate::config::AccessConfig;
use crate::geo::ProjectedPoint;
use crate::index::{IndexError, SideFile};
use crate::io::{RasterStore, ReadRange};
use crate::raster::{GeoTransform, PixelWindow, Profile, RasterError, Tile};
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

// Relative tolerance when comparing pixel sizes of the side-file and raster grids
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;
// Largest sub-pixel misalignment between grids accepted without a warning
const ALIGNMENT_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("tile size {size} does not fit a {width}x{height} raster")]
    InvalidTileSize { size: u32, width: u32, height: u32 },
    #[error("cannot read {path}: {source}")]
    RemoteAccess { path: String, source: io::Error },
    #[error("bad side-file {path}: {source}")]
    Index { path: String, source: IndexError },
    #[error("side-file pixel size {grid:?} differs from raster pixel size {raster:?}")]
    PixelSizeMismatch { grid: (f64, f64), raster: (f64, f64) },
    #[error("rotated or mirrored grids are not supported")]
    UnsupportedGrid,
    #[error("window maps to {0:?}, outside the raster")]
    OutsideRaster((i64, i64)),
    #[error(transparent)]
    Cog(#[from] CogError),
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// An N x N window around `point`, shifted to lie fully inside `grid`.
///
/// `centered` is false whenever the window had to be shifted.
pub fn compute_window(
    point: &ProjectedPoint,
    grid: &SideFile,
    tile_size: u32,
) -> Result<PixelWindow, ExtractError> {
    if tile_size == 0 || tile_size > grid.width || tile_size > grid.height {
        return Err(ExtractError::InvalidTileSize {
            size: tile_size,
            width: grid.width,
            height: grid.height,
        });
    }

    let (row, col) = grid.transform.index(point.easting, point.northing);
    let half = (tile_size / 2) as i64;
    let col_off = col - half;
    let row_off = row - half;
    let max_col_off = (grid.width - tile_size) as i64;
    let max_row_off = (grid.height - tile_size) as i64;

    let mut centered = true;
    if col_off < 0 || col_off > max_col_off {
        info!(col_off, max_col_off, "adjusting column offset");
        centered = false;
    }
    if row_off < 0 || row_off > max_row_off {
        info!(row_off, max_row_off, "adjusting row offset");
        centered = false;
    }

    Ok(PixelWindow {
        col_off: col_off.clamp(0, max_col_off) as u32,
        row_off: row_off.clamp(0, max_row_off) as u32,
        width: tile_size,
        height: tile_size,
        centered,
    })
}

fn axis_aligned(transform: &GeoTransform) -> bool {
    transform.b == 0.0 && transform.d == 0.0 && transform.a > 0.0 && transform.e != 0.0
}

fn same_size(a: f64, b: f64) -> bool {
    (a.abs() - b.abs()).abs() <= PIXEL_SIZE_TOLERANCE * a.abs().max(b.abs())
}

/// Read `window` of the side-file grid from the raster, north-up.
///
/// The window is located in the raster through projected coordinates, so the
/// raster may store its rows in the opposite order to the side-file.
pub fn extract_window(
    cog: &CloudTiff,
    source: &dyn ReadRange,
    grid: &SideFile,
    window: &PixelWindow,
) -> Result<Tile, ExtractError> {
    let raster_transform = cog.geotransform()?;
    if !axis_aligned(&grid.transform) || !axis_aligned(&raster_transform) {
        return Err(ExtractError::UnsupportedGrid);
    }
    if !same_size(grid.transform.a, raster_transform.a)
        || !same_size(grid.transform.e, raster_transform.e)
    {
        return Err(ExtractError::PixelSizeMismatch {
            grid: (grid.transform.a, grid.transform.e),
            raster: (raster_transform.a, raster_transform.e),
        });
    }

    // Window extent in projected coordinates
    let bounds = grid
        .transform
        .window_transform(window.col_off, window.row_off)
        .bounds(window.width, window.height);

    // The same extent in raster pixels
    let (col, top_row) = raster_transform.world_to_pixel(bounds.left, bounds.top);
    let (_, bottom_row) = raster_transform.world_to_pixel(bounds.left, bounds.bottom);
    let row = top_row.min(bottom_row);
    let (col_off, row_off) = (col.round(), row.round());
    if (col - col_off).abs() > ALIGNMENT_TOLERANCE || (row - row_off).abs() > ALIGNMENT_TOLERANCE {
        warn!(col, row, "side-file and raster grids are not pixel aligned");
    }
    let (raster_width, raster_height) = cog.full_dimensions();
    let (col_off, row_off) = (col_off as i64, row_off as i64);
    if col_off < 0
        || row_off < 0
        || col_off + window.width as i64 > raster_width as i64
        || row_off + window.height as i64 > raster_height as i64
    {
        return Err(ExtractError::OutsideRaster((col_off, row_off)));
    }
    let raster_window = PixelWindow {
        col_off: col_off as u32,
        row_off: row_off as u32,
        ..*window
    };
    debug!(?window, ?raster_window, "mapped window onto raster");

    let mut samples = cog.read_window(source, &raster_window)?;
    if raster_transform.is_bottom_up() {
        samples.flip_rows(window.width as usize, window.height as usize);
    }

    let mut profile = cog.profile()?;
    if grid.band_count() != 0 && grid.band_count() != profile.count {
        warn!(
            side_file = grid.band_count(),
            raster = profile.count,
            "band counts differ"
        );
    }
    profile.driver = Profile::GTIFF.to_string();
    profile.width = window.width;
    profile.height = window.height;
    profile.transform = GeoTransform::new(
        bounds.left,
        raster_transform.a,
        0.0,
        bounds.top,
        0.0,
        -raster_transform.e.abs(),
    );
    profile.crs = profile.crs.or(grid.epsg);
    profile.nodata = profile
        .nodata
        .or_else(|| grid.bands.first().and_then(|band| band.nodata));

    Ok(Tile::new(samples, profile)?)
}

/// Locate and read the N x N tile around `point` from a matched shard.
pub fn extract_tile(
    point: &ProjectedPoint,
    candidate: &CandidateFile,
    tile_size: u32,
    store: &dyn RasterStore,
    access: &AccessConfig,
) -> Result<(Tile, bool), ExtractError> {
    let side_path = candidate.side_file();
    let bytes = store
        .fetch(side_path, access)
        .map_err(|source| ExtractError::RemoteAccess {
            path: side_path.to_string(),
            source,
        })?;
    let grid = SideFile::parse_bytes(&bytes).map_err(|source| ExtractError::Index {
        path: side_path.to_string(),
        source,
    })?;

    let window = compute_window(point, &grid, tile_size)?;
    info!(path = candidate.path(), ?window, "reading window");

    let path = candidate.path();
    let source = store
        .open(path, access)
        .map_err(|source| ExtractError::RemoteAccess {
            path: path.to_string(),
            source,
        })?;
    let cog = CloudTiff::open_range(&*source).map_err(|e| match e {
        CogError::ReadError(source) => ExtractError::RemoteAccess {
            path: path.to_string(),
            source,
        },
        other => ExtractError::Cog(other),
    })?;
    debug!(%cog, "opened raster");

    let tile = extract_window(&cog, &*source, &grid, &window).map_err(|e| match e {
        ExtractError::Cog(CogError::ReadError(source)) => ExtractError::RemoteAccess {
            path: path.to_string(),
            source,
        },
        other => other,
    })?;
    Ok((tile, window.centered))
}
