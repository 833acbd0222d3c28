use super::GeoPoint;
use proj4rs::errors::Error as Proj4Error;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;

pub const WGS84_EPSG: u16 = 4326;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("proj4: {0}")]
    Proj4(String),
    #[error("projecting {point} to EPSG:{epsg} gave non-finite coordinates")]
    NonFinite { point: GeoPoint, epsg: u16 },
    #[error("{0}")]
    Service(String),
}

impl From<Proj4Error> for ProjectionError {
    fn from(e: Proj4Error) -> Self {
        ProjectionError::Proj4(format!("{e:?}"))
    }
}

/// Geographic to projected coordinate transform.
pub trait Projector: Send + Sync {
    /// (easting, northing) of `point` in the CRS with the given EPSG code.
    fn project(&self, point: &GeoPoint, epsg: u16) -> Result<(f64, f64), ProjectionError>;
}

/// Local transform using the proj4rs EPSG definitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct Proj4Projector;

impl Projector for Proj4Projector {
    fn project(&self, point: &GeoPoint, epsg: u16) -> Result<(f64, f64), ProjectionError> {
        let from = Proj::from_epsg_code(WGS84_EPSG)?;
        let to = Proj::from_epsg_code(epsg)?;

        // Geographic coordinates are in radians for proj4rs
        let mut xyz = (point.lon().to_radians(), point.lat().to_radians(), 0.0);
        transform(&from, &to, &mut xyz)?;

        let (x, y, _) = xyz;
        if x.is_finite() && y.is_finite() {
            Ok((x, y))
        } else {
            Err(ProjectionError::NonFinite {
                point: *point,
                epsg,
            })
        }
    }
}
