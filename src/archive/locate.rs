use super::CandidateFile;
use crate::config::AccessConfig;
use crate::geo::ProjectedPoint;
use crate::index::{IndexError, SideFile};
use crate::io::RasterStore;
use std::io;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("cannot read {path}: {source}")]
    RemoteAccess { path: String, source: io::Error },
    #[error("bad side-file {path}: {source}")]
    Index { path: String, source: IndexError },
}

/// The shard holding a point, with its parsed side-file.
#[derive(Debug, Clone)]
pub struct Located {
    pub candidate: CandidateFile,
    pub side_file: SideFile,
}

/// First candidate whose side-file bounds contain `point`.
///
/// Candidates are probed one at a time, in order. Later candidates are not
/// checked once a match is found, so overlapping shards resolve to the
/// earliest.
pub fn find_tile(
    point: &ProjectedPoint,
    candidates: &[CandidateFile],
    store: &dyn RasterStore,
    access: &AccessConfig,
) -> Result<Option<Located>, LocateError> {
    for candidate in candidates {
        let path = candidate.side_file();
        let bytes = store
            .fetch(path, access)
            .map_err(|source| LocateError::RemoteAccess {
                path: path.to_string(),
                source,
            })?;
        let side_file = SideFile::parse_bytes(&bytes).map_err(|source| LocateError::Index {
            path: path.to_string(),
            source,
        })?;

        if let Some(epsg) = side_file.epsg.filter(|epsg| *epsg != point.epsg()) {
            warn!(path, epsg, expected = point.epsg(), "side-file CRS differs from UTM zone");
        }

        if side_file.refers_to(candidate.path()) == Some(false) {
            warn!(path, raster = candidate.path(), "side-file sources name a different raster");
        }

        let hit = side_file.contains(point.easting, point.northing);
        debug!(path, %side_file, hit, "probed shard bounds");
        if hit {
            info!(path = candidate.path(), "found target file");
            return Ok(Some(Located {
                candidate: candidate.clone(),
                side_file,
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::candidate_files;
    use crate::catalog::AssetId;
    use crate::geo::{Hemisphere, UtmZone};
    use crate::io::SharedReader;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SideFileStore {
        files: HashMap<String, String>,
        fetched: Mutex<Vec<String>>,
    }

    impl RasterStore for SideFileStore {
        fn fetch(&self, path: &str, _: &AccessConfig) -> io::Result<Vec<u8>> {
            self.fetched.lock().unwrap().push(path.to_string());
            self.files
                .get(path)
                .map(|xml| xml.as_bytes().to_vec())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }

        fn open(&self, path: &str, _: &AccessConfig) -> io::Result<SharedReader> {
            Err(io::Error::new(io::ErrorKind::Unsupported, path.to_string()))
        }
    }

    fn vrt(left: f64, top: f64) -> String {
        format!(
            r#"<VRTDataset rasterXSize="100" rasterYSize="100">
                <SRS>EPSG:32610</SRS>
                <GeoTransform>{left}, 10, 0, {top}, 0, -10</GeoTransform>
            </VRTDataset>"#
        )
    }

    fn candidates() -> [CandidateFile; 4] {
        candidate_files("s3://b/aef", 2018, "10N", &AssetId::new("a").unwrap()).unwrap()
    }

    fn point(easting: f64, northing: f64) -> ProjectedPoint {
        ProjectedPoint {
            zone: UtmZone {
                number: 10,
                hemisphere: Hemisphere::North,
            },
            easting,
            northing,
        }
    }

    fn store(origins: [(f64, f64); 4]) -> SideFileStore {
        let mut store = SideFileStore::default();
        for (candidate, (left, top)) in candidates().iter().zip(origins) {
            store
                .files
                .insert(candidate.side_file().to_string(), vrt(left, top));
        }
        store
    }

    const GRID: [(f64, f64); 4] = [
        (0.0, 2000.0),
        (1000.0, 2000.0),
        (0.0, 1000.0),
        (1000.0, 1000.0),
    ];

    #[test]
    fn stops_at_first_match() {
        let store = store(GRID);
        let found = find_tile(
            &point(500.0, 500.0),
            &candidates(),
            &store,
            &AccessConfig::bounds_probe(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(found.candidate, candidates()[2]);
        assert_eq!(store.fetched.lock().unwrap().len(), 3);
    }

    #[test]
    fn boundary_points_match() {
        let store = store(GRID);
        let found = find_tile(
            &point(1000.0, 1000.0),
            &candidates(),
            &store,
            &AccessConfig::bounds_probe(),
        )
        .unwrap()
        .unwrap();
        // Shared corner of all four shards resolves to the first one
        assert_eq!(found.candidate, candidates()[0]);
    }

    #[test]
    fn no_match_after_all_candidates() {
        let store = store(GRID);
        let found = find_tile(
            &point(5000.0, 5000.0),
            &candidates(),
            &store,
            &AccessConfig::bounds_probe(),
        )
        .unwrap();
        assert!(found.is_none());
        assert_eq!(store.fetched.lock().unwrap().len(), 4);
    }

    #[test]
    fn missing_side_file_is_remote_access_error() {
        let store = SideFileStore::default();
        let result = find_tile(
            &point(0.0, 0.0),
            &candidates(),
            &store,
            &AccessConfig::bounds_probe(),
        );
        assert!(matches!(result, Err(LocateError::RemoteAccess { .. })));
    }

    #[test]
    fn malformed_side_file_is_index_error() {
        let mut store = store(GRID);
        store
            .files
            .insert(candidates()[0].side_file().to_string(), "<nope".to_string());
        let result = find_tile(
            &point(500.0, 500.0),
            &candidates(),
            &store,
            &AccessConfig::bounds_probe(),
        );
        assert!(matches!(result, Err(LocateError::Index { .. })));
    }
}
