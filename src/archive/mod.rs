use crate::catalog::AssetId;
use crate::geo::{CoordinateError, UtmZone};
use std::fmt::Display;
use thiserror::Error;

mod locate;

pub use locate::{find_tile, LocateError, Located};

#[derive(Debug, Error, PartialEq)]
pub enum ArchiveError {
    #[error("archive root is empty")]
    EmptyRoot,
    #[error("asset id is empty")]
    EmptyAsset,
    #[error(transparent)]
    BadZone(#[from] CoordinateError),
}

/// How one catalog asset is split into shard files in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLayout {
    pub suffixes: [&'static str; 4],
    pub extension: &'static str,
    pub side_extension: &'static str,
}

impl ShardLayout {
    /// 2x2 grid of 8192 pixel shards, row offset then column offset.
    pub const AEF_2X2: Self = Self {
        suffixes: [
            "-0000000000-0000000000",
            "-0000000000-0000008192",
            "-0000008192-0000000000",
            "-0000008192-0000008192",
        ],
        extension: ".tiff",
        side_extension: ".vrt",
    };

    /// The shard files of `asset`, in fixed layout order.
    pub fn candidate_files(
        &self,
        root: &str,
        year: i32,
        zone_tag: &str,
        asset: &AssetId,
    ) -> Result<[CandidateFile; 4], ArchiveError> {
        if root.trim().is_empty() {
            return Err(ArchiveError::EmptyRoot);
        }
        if asset.as_str().is_empty() {
            return Err(ArchiveError::EmptyAsset);
        }
        let zone = UtmZone::parse(zone_tag)?;

        let root = root.trim_end_matches('/');
        Ok(self.suffixes.map(|suffix| {
            let stem = format!("{root}/{year}/{zone}/{asset}{suffix}");
            CandidateFile {
                path: format!("{stem}{}", self.extension),
                side_path: format!("{stem}{}", self.side_extension),
            }
        }))
    }
}

impl Default for ShardLayout {
    fn default() -> Self {
        Self::AEF_2X2
    }
}

/// One shard of an asset and its side-file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    path: String,
    side_path: String,
}

impl CandidateFile {
    /// Raster data, read with byte ranges.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Side-file holding the shard's grid and bounds.
    pub fn side_file(&self) -> &str {
        &self.side_path
    }
}

impl Display for CandidateFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)
    }
}

pub fn candidate_files(
    root: &str,
    year: i32,
    zone_tag: &str,
    asset: &AssetId,
) -> Result<[CandidateFile; 4], ArchiveError> {
    ShardLayout::AEF_2X2.candidate_files(root, year, zone_tag, asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ARCHIVE_ROOT;

    fn asset() -> AssetId {
        AssetId::new("x02qcrn30k70b9ql6").unwrap()
    }

    #[test]
    fn builds_four_candidates_in_order() {
        let files = candidate_files(DEFAULT_ARCHIVE_ROOT, 2018, "10N", &asset()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path()).collect();
        assert_eq!(
            paths,
            vec![
                "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/2018/10N/x02qcrn30k70b9ql6-0000000000-0000000000.tiff",
                "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/2018/10N/x02qcrn30k70b9ql6-0000000000-0000008192.tiff",
                "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/2018/10N/x02qcrn30k70b9ql6-0000008192-0000000000.tiff",
                "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/2018/10N/x02qcrn30k70b9ql6-0000008192-0000008192.tiff",
            ]
        );
        assert_eq!(
            files[2].side_file(),
            "s3://us-west-2.opendata.source.coop/tge-labs/aef/v1/annual/2018/10N/x02qcrn30k70b9ql6-0000008192-0000000000.vrt"
        );
    }

    #[test]
    fn root_separator_is_normalized() {
        let with = candidate_files("s3://bucket/aef/", 2020, "1S", &asset()).unwrap();
        let without = candidate_files("s3://bucket/aef", 2020, "1S", &asset()).unwrap();
        assert_eq!(with, without);
        assert!(with[0].path().starts_with("s3://bucket/aef/2020/1S/x02"));
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            candidate_files("", 2020, "10N", &asset()),
            Err(ArchiveError::EmptyRoot)
        );
        for zone in ["", "10", "0N", "61S", "10Q"] {
            assert!(matches!(
                candidate_files("s3://b", 2020, zone, &asset()),
                Err(ArchiveError::BadZone(_))
            ));
        }
    }
}
