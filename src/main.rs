//! Batch downloader for annual embedding tiles.
//!
//! Reads `location_id,lat,lon` rows from a CSV file and saves one tile per row,
//! or a single tile with the `single` subcommand.

use aeftile::{
    AssetCatalog, AssetId, Downloader, DownloaderConfig, EarthEngineCatalog, FixedCatalog,
    RemoteStore,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, Level};

// Summary label of CSV rows that could not be parsed
const INVALID_ROW_KIND: &str = "invalid_argument";

#[derive(Parser, Debug)]
#[command(name = "aeftile")]
#[command(about = "Download annual satellite embedding tiles around points")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Year of the annual embeddings
    #[arg(short, long, global = true, default_value_t = 2024)]
    year: i32,

    /// Output directory (default from config, then ./ae_embeddings)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Tile width and height in pixels
    #[arg(long, global = true)]
    tile_size: Option<u32>,

    /// Convert quantized values to float32
    #[arg(long, global = true)]
    dequantize: bool,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use this asset instead of querying the catalog
    #[arg(long, global = true)]
    asset: Option<String>,

    /// Earth Engine OAuth access token
    #[arg(long, global = true, env = "EE_ACCESS_TOKEN", hide_env_values = true)]
    ee_token: Option<String>,

    /// Earth Engine quota project
    #[arg(long, global = true, env = "EE_PROJECT")]
    ee_project: Option<String>,

    /// Log level
    #[arg(long, global = true, default_value = "error")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a tile for every row of a CSV file
    Batch {
        /// CSV with a `location_id,lat,lon` header
        csv: PathBuf,

        /// Locations downloaded in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },
    /// Download one tile
    Single {
        location_id: String,
        #[arg(allow_hyphen_values = true)]
        lat: f64,
        #[arg(allow_hyphen_values = true)]
        lon: f64,
    },
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    location_id: String,
    lat: f64,
    lon: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        _ => Level::ERROR,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_ids(true)
        .init();

    let downloader = build_downloader(&args)?;
    let year = args.year;

    match &args.command {
        Command::Single {
            location_id,
            lat,
            lon,
        } => {
            let path = downloader.download(*lat, *lon, year, location_id)?;
            println!("{}", path.display());
        }
        Command::Batch { csv, jobs } => {
            let (rows, rejected) = read_locations(csv)?;
            let total = rows.len() + rejected;
            println!("Downloading {} locations for {year}", rows.len());
            let t0 = Instant::now();

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads((*jobs).max(1))
                .build()
                .context("cannot start worker pool")?;
            let failures: Vec<&'static str> = pool.install(|| {
                rows.par_iter()
                    .filter_map(|row| {
                        match downloader.download(row.lat, row.lon, year, &row.location_id) {
                            Ok(path) => {
                                info!(location_id = %row.location_id, path = %path.display(), "saved");
                                None
                            }
                            Err(e) => {
                                error!(location_id = %row.location_id, kind = e.kind(), "{e}");
                                Some(e.kind())
                            }
                        }
                    })
                    .collect()
            });

            let mut by_kind = BTreeMap::new();
            if rejected > 0 {
                by_kind.insert(INVALID_ROW_KIND, rejected);
            }
            for kind in &failures {
                *by_kind.entry(*kind).or_insert(0usize) += 1;
            }
            println!(
                "Saved {} of {} tiles in {:.1}s",
                rows.len() - failures.len(),
                total,
                t0.elapsed().as_secs_f64()
            );
            for (kind, count) in by_kind {
                println!("  {kind}: {count}");
            }
        }
    }
    Ok(())
}

fn build_downloader(args: &Args) -> Result<Downloader> {
    let mut config = match &args.config {
        Some(path) => DownloaderConfig::from_file(path)?,
        None => DownloaderConfig::default(),
    };
    if let Some(output) = &args.output {
        config = config.with_output_root(output);
    }
    if let Some(tile_size) = args.tile_size {
        config = config.with_tile_size(tile_size);
    }
    if args.dequantize {
        config = config.with_dequantize(true);
    }

    let store = RemoteStore::new().context("cannot set up remote access")?;
    let catalog: Box<dyn AssetCatalog> = match (&args.asset, &args.ee_token) {
        (Some(asset), _) => {
            let Some(asset) = AssetId::from_catalog_id(asset) else {
                bail!("bad asset id {asset:?}");
            };
            Box::new(FixedCatalog(vec![asset]))
        }
        (None, Some(token)) => {
            let mut catalog = EarthEngineCatalog::new(token);
            if let Some(project) = &args.ee_project {
                catalog = catalog.with_quota_project(project);
            }
            Box::new(catalog)
        }
        (None, None) => bail!("set EE_ACCESS_TOKEN (or --ee-token) or pass --asset"),
    };
    Ok(Downloader::new(config, catalog, store))
}

fn read_locations(path: &Path) -> Result<(Vec<LocationRow>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(parse_locations(&mut reader))
}

/// Rows that parse, and how many were skipped because they did not.
fn parse_locations<R: Read>(reader: &mut csv::Reader<R>) -> (Vec<LocationRow>, usize) {
    let mut rows = vec![];
    let mut rejected = 0;
    for record in reader.deserialize::<LocationRow>() {
        match record {
            Ok(row) => rows.push(row),
            Err(e) => {
                let line = e.position().map(|p| p.line());
                error!(?line, kind = INVALID_ROW_KIND, "skipping location row: {e}");
                rejected += 1;
            }
        }
    }
    (rows, rejected)
}
