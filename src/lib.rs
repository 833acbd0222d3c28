//! Extract fixed-size tiles of annual satellite embeddings around points.
//!
//! A request resolves a latitude/longitude into its UTM zone, asks an
//! [`AssetCatalog`] which archive asset covers it, probes the asset's shard
//! side-files for the one containing the point and range-reads an N x N window
//! from that shard's Cloud Optimized GeoTIFF. The window is written to
//! `<output_root>/<year>/<location_id>_centered_<true|false>.tiff`.

pub mod archive;
pub mod catalog;
pub mod cog;
pub mod config;
pub mod downloader;
pub mod encode;
pub mod error;
pub mod extract;
pub mod geo;
pub mod geotags;
pub mod index;
pub mod io;
pub mod raster;
pub mod tiff;
pub mod writer;

pub use archive::{candidate_files, find_tile, CandidateFile, ShardLayout};
pub use catalog::{locate_asset, AssetCatalog, AssetId, FixedCatalog, YearRange};
#[cfg(feature = "http")]
pub use catalog::EarthEngineCatalog;
pub use cog::CloudTiff;
pub use config::{AccessConfig, DownloaderConfig};
pub use downloader::Downloader;
pub use encode::Encoder;
pub use error::{DownloadError, DownloadResult};
pub use extract::{compute_window, extract_window};
pub use geo::{GeoPoint, Proj4Projector, ProjectedPoint, Projector};
pub use io::{RasterStore, ReadRange, RemoteStore};
pub use raster::{dequantize, PixelWindow, Profile, Tile};
pub use writer::TileWriter;
