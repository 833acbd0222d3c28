use crate::geo::GeoPoint;
use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "http")]
mod earth_engine;

#[cfg(feature = "http")]
pub use earth_engine::{EarthEngineCatalog, ANNUAL_EMBEDDING_COLLECTION};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("catalog rejected credentials: {0}")]
    Unauthorized(String),
    #[error("cannot decode catalog response: {0}")]
    Decode(String),
}

/// Identifier of one catalog image, e.g. `x02qcrn30k70b9ql6`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetId(String);

impl AssetId {
    pub fn new<S: Into<String>>(id: S) -> Option<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            None
        } else {
            Some(Self(id))
        }
    }

    /// Last path segment of a full catalog id.
    pub fn from_catalog_id(id: &str) -> Option<Self> {
        id.trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| Self::new(segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One calendar year as a half-open time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub year: i32,
}

impl YearRange {
    pub fn new(year: i32) -> Self {
        Self { year }
    }

    /// Inclusive start, RFC 3339.
    pub fn start(&self) -> String {
        format!("{:04}-01-01T00:00:00Z", self.year)
    }

    /// Exclusive end, RFC 3339.
    pub fn end(&self) -> String {
        format!("{:04}-01-01T00:00:00Z", self.year + 1)
    }
}

impl Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start(), self.end())
    }
}

/// Image catalog answering which assets cover a point during a time range.
pub trait AssetCatalog: Send + Sync {
    /// Matching assets, in the catalog's own order.
    fn query(&self, point: &GeoPoint, range: &YearRange) -> Result<Vec<AssetId>, CatalogError>;
}

impl<C: AssetCatalog + ?Sized> AssetCatalog for Box<C> {
    fn query(&self, point: &GeoPoint, range: &YearRange) -> Result<Vec<AssetId>, CatalogError> {
        (**self).query(point, range)
    }
}

/// Catalog that always answers with the same assets.
#[derive(Debug, Clone, Default)]
pub struct FixedCatalog(pub Vec<AssetId>);

impl AssetCatalog for FixedCatalog {
    fn query(&self, _: &GeoPoint, _: &YearRange) -> Result<Vec<AssetId>, CatalogError> {
        Ok(self.0.clone())
    }
}

/// First asset covering `point` during `year`, if any.
pub fn locate_asset(
    catalog: &dyn AssetCatalog,
    point: &GeoPoint,
    year: i32,
) -> Result<Option<AssetId>, CatalogError> {
    let range = YearRange::new(year);
    let assets = catalog.query(point, &range)?;
    debug!(%point, %range, matches = assets.len(), "catalog query");
    Ok(assets.into_iter().next())
}
