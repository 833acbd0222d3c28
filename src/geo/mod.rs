use std::fmt::Display;
use thiserror::Error;
use tracing::debug;

mod projector;

pub use projector::{Proj4Projector, ProjectionError, Projector, WGS84_EPSG};

#[derive(Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180)")]
    Longitude(f64),
    #[error("UTM zone tag {0:?} is not of the form 1N..60S")]
    ZoneTag(String),
}

/// WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lon.is_finite() || !(-180.0..180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    pub fn letter(&self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        }
    }
}

/// Universal Transverse Mercator zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u8,
    pub hemisphere: Hemisphere,
}

impl UtmZone {
    pub fn from_point(point: &GeoPoint) -> Self {
        // lon + 180 rounds up to 360 for longitudes just below 180
        let number = (((point.lon + 180.0) / 6.0).floor() as u8 + 1).min(60);
        let hemisphere = if point.lat >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        };
        Self { number, hemisphere }
    }

    /// WGS84 / UTM code: 326xx north, 327xx south.
    pub fn epsg(&self) -> u16 {
        match self.hemisphere {
            Hemisphere::North => 32600 + self.number as u16,
            Hemisphere::South => 32700 + self.number as u16,
        }
    }

    /// Archive directory name, e.g. `10N`.
    pub fn tag(&self) -> String {
        format!("{}{}", self.number, self.hemisphere.letter())
    }

    pub fn parse(tag: &str) -> Result<Self, CoordinateError> {
        let error = || CoordinateError::ZoneTag(tag.to_string());
        if !tag.is_ascii() {
            return Err(error());
        }
        let (digits, letter) = tag.split_at(tag.len().saturating_sub(1));
        let hemisphere = match letter {
            "N" => Hemisphere::North,
            "S" => Hemisphere::South,
            _ => return Err(error()),
        };
        if digits.is_empty()
            || digits.len() > 2
            || digits.starts_with('0')
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(error());
        }
        let number: u8 = digits.parse().map_err(|_| error())?;
        if !(1..=60).contains(&number) {
            return Err(error());
        }
        Ok(Self { number, hemisphere })
    }
}

impl Display for UtmZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A point in its local UTM zone, in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub zone: UtmZone,
    pub easting: f64,
    pub northing: f64,
}

impl ProjectedPoint {
    pub fn epsg(&self) -> u16 {
        self.zone.epsg()
    }

    pub fn zone_tag(&self) -> String {
        self.zone.tag()
    }
}

/// Find the UTM zone of `point` and its coordinates within that zone.
pub fn resolve(
    point: &GeoPoint,
    projector: &dyn Projector,
) -> Result<ProjectedPoint, ProjectionError> {
    let zone = UtmZone::from_point(point);
    let (easting, northing) = projector.project(point, zone.epsg())?;
    if !easting.is_finite() || !northing.is_finite() {
        return Err(ProjectionError::NonFinite {
            point: *point,
            epsg: zone.epsg(),
        });
    }
    debug!(%point, %zone, easting, northing, "resolved UTM position");
    Ok(ProjectedPoint {
        zone,
        easting,
        northing,
    })
}
