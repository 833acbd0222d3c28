use crate::archive::find_tile;
use crate::catalog::{locate_asset, AssetCatalog};
use crate::config::DownloaderConfig;
use crate::error::{DownloadError, DownloadResult};
use crate::extract::extract_tile;
use crate::geo::{resolve, GeoPoint, Proj4Projector, Projector};
use crate::io::RasterStore;
use crate::raster::{dequantize, Tile};
use crate::writer::TileWriter;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Years the annual archive can hold.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 2017..=2100;

/// Fetches embedding tiles around points and saves them as GeoTIFFs.
///
/// Every call runs the whole lookup again; nothing is cached between calls.
pub struct Downloader {
    projector: Box<dyn Projector>,
    catalog: Box<dyn AssetCatalog>,
    store: Box<dyn RasterStore>,
    writer: TileWriter,
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new<C, S>(config: DownloaderConfig, catalog: C, store: S) -> Self
    where
        C: AssetCatalog + 'static,
        S: RasterStore + 'static,
    {
        Self {
            projector: Box::new(Proj4Projector),
            catalog: Box::new(catalog),
            store: Box::new(store),
            writer: TileWriter::new(&config.output_root),
            config,
        }
    }

    pub fn with_projector<P: Projector + 'static>(mut self, projector: P) -> Self {
        self.projector = Box::new(projector);
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Extract the tile around (`lat`, `lon`) for `year` and write it under
    /// the output root. Returns the written path.
    pub fn download(
        &self,
        lat: f64,
        lon: f64,
        year: i32,
        location_id: &str,
    ) -> DownloadResult<PathBuf> {
        // Reject bad ids before any remote access
        self.writer.output_path(year, location_id, true)?;

        let t0 = Instant::now();
        let (tile, centered) = self.fetch_tile(lat, lon, year)?;
        let tile = if self.config.dequantize {
            dequantize(&tile)
        } else {
            tile
        };
        let path = self.writer.write(&tile, year, location_id, centered)?;
        info!(
            location_id,
            centered,
            path = %path.display(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "downloaded tile"
        );
        Ok(path)
    }

    /// The raw tile around (`lat`, `lon`) and whether it is centered on the point.
    pub fn fetch_tile(&self, lat: f64, lon: f64, year: i32) -> DownloadResult<(Tile, bool)> {
        if !SUPPORTED_YEARS.contains(&year) {
            return Err(DownloadError::InvalidArgument(format!(
                "year {year} is outside {}..={}",
                SUPPORTED_YEARS.start(),
                SUPPORTED_YEARS.end()
            )));
        }
        if self.config.tile_size == 0 {
            return Err(DownloadError::InvalidArgument(
                "tile size must be positive".to_string(),
            ));
        }
        let point = GeoPoint::new(lat, lon)?;

        let projected = resolve(&point, self.projector.as_ref())?;
        info!(
            %point,
            zone = %projected.zone,
            easting = projected.easting,
            northing = projected.northing,
            "resolved point"
        );

        let asset = locate_asset(self.catalog.as_ref(), &point, year)?.ok_or(
            DownloadError::AssetNotFound { lat, lon, year },
        )?;
        info!(%asset, year, "found asset");

        let candidates = self.config.layout.candidate_files(
            &self.config.archive_root,
            year,
            &projected.zone_tag(),
            &asset,
        )?;
        debug!(first = %candidates[0], "built candidate files");

        let located = find_tile(
            &projected,
            &candidates,
            self.store.as_ref(),
            &self.config.bounds_probe,
        )?
        .ok_or(DownloadError::NoMatchingTile {
            candidates: candidates.len(),
            easting: projected.easting,
            northing: projected.northing,
        })?;

        let (tile, centered) = extract_tile(
            &projected,
            &located.candidate,
            self.config.tile_size,
            self.store.as_ref(),
            &self.config.bulk_read,
        )?;
        debug!(%tile, centered, "extracted tile");
        Ok((tile, centered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetId, FixedCatalog};
    use crate::config::AccessConfig;
    use crate::geo::ProjectionError;
    use crate::io::SharedReader;
    use std::io;
    use std::sync::Mutex;

    struct FixedProjector(f64, f64);

    impl Projector for FixedProjector {
        fn project(&self, _: &GeoPoint, _: u16) -> Result<(f64, f64), ProjectionError> {
            Ok((self.0, self.1))
        }
    }

    /// Serves the same side-file for every path and records what was asked for.
    #[derive(Default)]
    struct OneGridStore {
        fetched: Mutex<Vec<String>>,
    }

    impl RasterStore for OneGridStore {
        fn fetch(&self, path: &str, _: &AccessConfig) -> io::Result<Vec<u8>> {
            self.fetched.lock().unwrap().push(path.to_string());
            Ok(br#"<VRTDataset rasterXSize="100" rasterYSize="100">
                <GeoTransform>0, 10, 0, 1000, 0, -10</GeoTransform>
            </VRTDataset>"#
                .to_vec())
        }

        fn open(&self, path: &str, _: &AccessConfig) -> io::Result<SharedReader> {
            Err(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }

    fn downloader(assets: Vec<AssetId>, projected: (f64, f64)) -> Downloader {
        let config = DownloaderConfig::new("/nonexistent").with_tile_size(10);
        Downloader::new(config, FixedCatalog(assets), OneGridStore::default())
            .with_projector(FixedProjector(projected.0, projected.1))
    }

    fn asset() -> Vec<AssetId> {
        vec![AssetId::new("x02qcrn30k70b9ql6").unwrap()]
    }

    #[test]
    fn rejects_years_outside_the_archive() {
        let d = downloader(asset(), (5.0, 995.0));
        for year in [2016, 2101] {
            let e = d.download(47.5, 9.7, year, "loc").unwrap_err();
            assert_eq!(e.kind(), "invalid_argument");
        }
    }

    #[test]
    fn rejects_bad_coordinates_and_ids() {
        let d = downloader(asset(), (5.0, 995.0));
        assert_eq!(d.download(95.0, 9.7, 2020, "loc").unwrap_err().kind(), "invalid_argument");
        assert_eq!(d.download(47.5, 180.0, 2020, "loc").unwrap_err().kind(), "invalid_argument");
        assert_eq!(d.download(47.5, 9.7, 2020, "../x").unwrap_err().kind(), "invalid_argument");
    }

    #[test]
    fn missing_asset() {
        let d = downloader(vec![], (5.0, 995.0));
        let e = d.download(47.5, 9.7, 2020, "loc").unwrap_err();
        assert!(matches!(e, DownloadError::AssetNotFound { year: 2020, .. }));
    }

    #[test]
    fn point_outside_every_shard() {
        let d = downloader(asset(), (5000.0, 5000.0));
        let e = d.download(47.5, 9.7, 2020, "loc").unwrap_err();
        assert!(matches!(e, DownloadError::NoMatchingTile { candidates: 4, .. }));
    }

    #[test]
    fn raster_open_failure_is_remote_access() {
        let d = downloader(asset(), (5.0, 995.0));
        let e = d.download(47.5, 9.7, 2020, "loc").unwrap_err();
        assert_eq!(e.kind(), "remote_access");
        assert!(e.to_string().contains("/2020/32N/x02qcrn30k70b9ql6-0000000000-0000000000.tiff"));
    }

    #[test]
    fn zero_tile_size() {
        let config = DownloaderConfig::new("/nonexistent").with_tile_size(0);
        let d = Downloader::new(config, FixedCatalog(asset()), OneGridStore::default());
        assert_eq!(d.download(47.5, 9.7, 2020, "loc").unwrap_err().kind(), "invalid_argument");
    }

    #[test]
    fn downloader_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Downloader>();
    }
}
