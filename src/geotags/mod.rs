// https://docs.ogc.org/is/19-008r4/19-008r4.html#_geotiff_tags_for_coordinate_transformations

use crate::raster::GeoTransform;
use crate::tiff::{Endian, Ifd, TagData, TagId};
use num_traits::NumCast;
use std::fmt::Display;

mod error;
mod id;
mod keys;
mod value;

pub use error::GeoTiffError;
pub use id::GeoKeyId;
pub use keys::{GeoKey, GeoKeyDirectory};
pub use value::GeoKeyValue;

#[derive(Clone, Debug)]
pub struct GeoTags {
    pub directory: GeoKeyDirectory,
    pub model: GeoModel,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GeoModel {
    Transformed(GeoModelTransformed),
    Scaled(GeoModelScaled),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeoModelTransformed {
    pub transformation: [f64; 16],
    pub tiepoint: Option<[f64; 6]>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeoModelScaled {
    pub pixel_scale: [f64; 3],
    pub tiepoint: [f64; 6],
}

impl Display for GeoTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GeoTIFF Tags:")?;
        match &self.model {
            GeoModel::Transformed(model) => {
                writeln!(f, "  Tiepoint: {:?}", model.tiepoint)?;
                writeln!(f, "  Transformation: {:?}", model.transformation)?;
            }
            GeoModel::Scaled(model) => {
                writeln!(f, "  Tiepoint: {:?}", model.tiepoint)?;
                writeln!(f, "  Pixel Scale: {:?}", model.pixel_scale)?;
            }
        }
        write!(
            f,
            "  Directory: {{version: {}, revision: {}.{}}}",
            self.directory.version, self.directory.revision.0, self.directory.revision.1,
        )?;
        if !self.directory.keys.is_empty() {
            write!(f, "\n  Keys:")?;
            for key in self.directory.keys.iter() {
                write!(f, "\n    {key}")?;
            }
        }
        Ok(())
    }
}

impl GeoTags {
    /// Georeference a north-up grid with an EPSG coded CRS.
    pub fn from_geotransform(transform: &GeoTransform, epsg: Option<u16>) -> Self {
        let model = if transform.b == 0.0 && transform.d == 0.0 && transform.e < 0.0 {
            GeoModel::Scaled(GeoModelScaled {
                tiepoint: [0.0, 0.0, 0.0, transform.c, transform.f, 0.0],
                pixel_scale: [transform.a, -transform.e, 0.0],
            })
        } else {
            let t = transform;
            GeoModel::Transformed(GeoModelTransformed {
                transformation: [
                    t.a, t.b, 0.0, t.c, //
                    t.d, t.e, 0.0, t.f, //
                    0.0, 0.0, 0.0, 0.0, //
                    0.0, 0.0, 0.0, 1.0,
                ],
                tiepoint: None,
            })
        };

        let mut tags = Self {
            model,
            directory: GeoKeyDirectory::default(),
        };
        tags.set_key(
            GeoKeyId::GTRasterTypeGeoKey,
            GeoKeyValue::Short(vec![id::RASTER_PIXEL_IS_AREA]),
        );
        match epsg {
            Some(code) if is_geographic(code) => {
                tags.set_key(
                    GeoKeyId::GTModelTypeGeoKey,
                    GeoKeyValue::Short(vec![id::MODEL_TYPE_GEOGRAPHIC]),
                );
                tags.set_key(GeoKeyId::GeographicTypeGeoKey, GeoKeyValue::Short(vec![code]));
            }
            Some(code) => {
                tags.set_key(
                    GeoKeyId::GTModelTypeGeoKey,
                    GeoKeyValue::Short(vec![id::MODEL_TYPE_PROJECTED]),
                );
                tags.set_key(GeoKeyId::ProjectedCSTypeGeoKey, GeoKeyValue::Short(vec![code]));
            }
            None => {}
        }
        tags
    }

    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        let tiepoint = get_tag_as_array(ifd, TagId::ModelTiepoint).ok();
        let pixel_scale = get_tag_as_array(ifd, TagId::ModelPixelScale).ok();
        let transformation = get_tag_as_array(ifd, TagId::ModelTransformation).ok();
        let model = match (tiepoint, pixel_scale, transformation) {
            (Some(tiepoint), Some(pixel_scale), _) => GeoModel::Scaled(GeoModelScaled {
                tiepoint,
                pixel_scale,
            }),
            (tiepoint, _, Some(transformation)) => GeoModel::Transformed(GeoModelTransformed {
                tiepoint,
                transformation,
            }),
            _ => return Err(GeoTiffError::MissingTag(TagId::ModelPixelScale)),
        };

        let directory = GeoKeyDirectory::parse(ifd)?;

        Ok(Self { model, directory })
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        match &self.model {
            GeoModel::Transformed(model) => {
                ifd.set_tag(
                    TagId::ModelTransformation,
                    TagData::Double(model.transformation.to_vec()),
                    endian,
                );
                if let Some(tiepoint) = model.tiepoint {
                    ifd.set_tag(
                        TagId::ModelTiepoint,
                        TagData::Double(tiepoint.to_vec()),
                        endian,
                    );
                }
            }
            GeoModel::Scaled(model) => {
                ifd.set_tag(
                    TagId::ModelTiepoint,
                    TagData::Double(model.tiepoint.to_vec()),
                    endian,
                );
                ifd.set_tag(
                    TagId::ModelPixelScale,
                    TagData::Double(model.pixel_scale.to_vec()),
                    endian,
                );
            }
        }
        self.directory.add_to_ifd(ifd, endian);
    }

    pub fn set_key<I: Into<u16>>(&mut self, id: I, value: GeoKeyValue) {
        let code: u16 = id.into();
        let key = GeoKey { code, value };
        let keys = &mut self.directory.keys;
        if let Some(index) = keys.iter().position(|key| key.code == code) {
            keys[index] = key;
        } else {
            keys.push(key);
        }
    }

    pub fn key(&self, id: GeoKeyId) -> Option<&GeoKeyValue> {
        self.directory
            .keys
            .iter()
            .find(|key| key.id() == Some(id))
            .map(|key| &key.value)
    }

    /// EPSG code of the model CRS, if it is a registered one.
    pub fn epsg(&self) -> Option<u16> {
        self.key(GeoKeyId::ProjectedCSTypeGeoKey)
            .or_else(|| self.key(GeoKeyId::GeographicTypeGeoKey))
            .and_then(|value| value.as_number::<u16>())
            .filter(|code| *code != id::USER_DEFINED)
    }

    /// Affine pixel to model transform of the raster's upper left pixel corner.
    pub fn geotransform(&self) -> Option<GeoTransform> {
        match &self.model {
            GeoModel::Scaled(GeoModelScaled {
                pixel_scale,
                tiepoint,
            }) => {
                let [i, j, _, x, y, _] = *tiepoint;
                let (sx, sy) = (pixel_scale[0], pixel_scale[1]);
                let transform = GeoTransform::new(x - i * sx, sx, 0.0, y + j * sy, 0.0, -sy);
                transform.is_valid().then_some(transform)
            }
            GeoModel::Transformed(GeoModelTransformed { transformation, .. }) => {
                let m = transformation;
                let transform = GeoTransform::new(m[3], m[0], m[1], m[7], m[4], m[5]);
                transform.is_valid().then_some(transform)
            }
        }
    }
}

fn is_geographic(epsg: u16) -> bool {
    (4000..5000).contains(&epsg)
}

fn get_tag_as_array<const N: usize, T: NumCast>(
    ifd: &Ifd,
    id: TagId,
) -> Result<[T; N], GeoTiffError> {
    ifd.get_tag(id)
        .map_err(|_| GeoTiffError::MissingTag(id))?
        .values::<T>()
        .and_then(|values| values.try_into().ok())
        .ok_or(GeoTiffError::BadTag(id))
}
