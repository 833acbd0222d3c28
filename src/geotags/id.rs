// https://docs.ogc.org/is/19-008r4/19-008r4.html#_summary_of_geokey_ids_and_names

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, TryFromPrimitive, Eq, Hash)]
#[repr(u16)]
pub enum GeoKeyId {
    GTModelTypeGeoKey = 1024,
    GTRasterTypeGeoKey = 1025,
    GTCitationGeoKey = 1026,
    GeographicTypeGeoKey = 2048,
    GeogCitationGeoKey = 2049,
    GeogAngularUnitsGeoKey = 2054,
    ProjectedCSTypeGeoKey = 3072,
    PCSCitationGeoKey = 3073,
    ProjLinearUnitsGeoKey = 3076,
}

pub const MODEL_TYPE_PROJECTED: u16 = 1;
pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
pub const RASTER_PIXEL_IS_AREA: u16 = 1;
pub const USER_DEFINED: u16 = 32767;
