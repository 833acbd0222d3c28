use crate::encode::{EncodeError, Encoder};
use crate::raster::Tile;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("location id {0:?} cannot be used as a file name")]
    InvalidLocationId(String),
    #[error("cannot write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot encode {path}: {source}")]
    Encode { path: PathBuf, source: EncodeError },
}

/// Writes tiles as `<root>/<year>/<location_id>_centered_<true|false>.tiff`.
#[derive(Debug, Clone)]
pub struct TileWriter {
    output_root: PathBuf,
}

impl TileWriter {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn output_path(
        &self,
        year: i32,
        location_id: &str,
        centered: bool,
    ) -> Result<PathBuf, WriteError> {
        if location_id.is_empty()
            || location_id == "."
            || location_id == ".."
            || location_id.contains(['/', '\\', '\0'])
        {
            return Err(WriteError::InvalidLocationId(location_id.to_string()));
        }
        Ok(self
            .output_root
            .join(year.to_string())
            .join(format!("{location_id}_centered_{centered}.tiff")))
    }

    /// Write `tile`, replacing any previous file for the same location.
    ///
    /// Data goes to a temporary file in the target directory first, so readers
    /// never observe a partially written tile.
    pub fn write(
        &self,
        tile: &Tile,
        year: i32,
        location_id: &str,
        centered: bool,
    ) -> Result<PathBuf, WriteError> {
        let path = self.output_path(year, location_id, centered)?;
        let io_error = |source| WriteError::Io {
            path: path.clone(),
            source,
        };
        let dir = path.parent().unwrap_or(self.output_root.as_path());
        fs::create_dir_all(dir).map_err(io_error)?;

        let mut temp = NamedTempFile::new_in(dir).map_err(io_error)?;
        debug!(temp = %temp.path().display(), "encoding tile");
        {
            let mut writer = BufWriter::new(&mut temp);
            Encoder::from_tile(tile)
                .encode(&mut writer)
                .map_err(|source| WriteError::Encode {
                    path: path.clone(),
                    source,
                })?;
            writer.flush().map_err(io_error)?;
        }
        temp.persist(&path).map_err(|e| io_error(e.error))?;

        info!(path = %path.display(), %tile, "saved tile");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::{CloudTiff, Compression};
    use crate::raster::{DataType, GeoTransform, Profile, Samples};
    use std::fs::File;

    fn tile() -> Tile {
        Tile::new(
            Samples::Int8(vec![1, 2, 3, 4]),
            Profile {
                driver: Profile::GTIFF.to_string(),
                dtype: DataType::Int8,
                width: 2,
                height: 2,
                count: 1,
                transform: GeoTransform::new(0.0, 10.0, 0.0, 20.0, 0.0, -10.0),
                crs: Some(32601),
                compression: Compression::Deflate,
                nodata: Some(-128.0),
            },
        )
        .unwrap()
    }

    #[test]
    fn names_files_by_year_location_and_centering() {
        let writer = TileWriter::new("/data/out");
        assert_eq!(
            writer.output_path(2018, "bregenz", true).unwrap(),
            PathBuf::from("/data/out/2018/bregenz_centered_true.tiff")
        );
        assert_eq!(
            writer.output_path(2022, "st_1", false).unwrap(),
            PathBuf::from("/data/out/2022/st_1_centered_false.tiff")
        );
    }

    #[test]
    fn rejects_path_like_location_ids() {
        let writer = TileWriter::new("/data/out");
        for id in ["", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(
                writer.output_path(2020, id, true),
                Err(WriteError::InvalidLocationId(_))
            ));
        }
    }

    #[test]
    fn writes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TileWriter::new(dir.path().join("nested"));
        let path = writer.write(&tile(), 2019, "loc", true).unwrap();
        assert!(path.ends_with("2019/loc_centered_true.tiff"));

        let mut second = tile();
        second.samples = Samples::Int8(vec![9, 9, 9, 9]);
        let again = writer.write(&second, 2019, "loc", true).unwrap();
        assert_eq!(path, again);

        let cog = CloudTiff::open(&mut File::open(&path).unwrap()).unwrap();
        assert_eq!(cog.profile().unwrap(), second.profile);
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
