// https://docs.ogc.org/is/19-008r4/19-008r4.html#_requirements_class_geokeydirectorytag

use std::fmt::Display;

use super::{GeoKeyId, GeoKeyValue, GeoTiffError};
use crate::tiff::{Endian, Ifd, TagData, TagId, TagType};

#[derive(Clone, Debug)]
pub struct GeoKeyDirectory {
    pub version: u16,
    pub revision: (u16, u16),
    pub keys: Vec<GeoKey>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeoKey {
    pub code: u16,
    pub value: GeoKeyValue,
}

impl GeoKey {
    pub fn id(&self) -> Option<GeoKeyId> {
        GeoKeyId::try_from(self.code).ok()
    }
}

impl Default for GeoKeyDirectory {
    fn default() -> Self {
        Self {
            version: 1,
            revision: (1, 0),
            keys: vec![],
        }
    }
}

impl GeoKeyDirectory {
    pub fn parse(ifd: &Ifd) -> Result<Self, GeoTiffError> {
        let directory_values: Vec<u16> = ifd
            .get_tag(TagId::GeoKeyDirectory)
            .map_err(|_| GeoTiffError::MissingTag(TagId::GeoKeyDirectory))?
            .values()
            .ok_or(GeoTiffError::BadTag(TagId::GeoKeyDirectory))?;

        if directory_values.len() < 4 {
            return Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory));
        }

        // Directory header
        let version = directory_values[0];
        let revision = directory_values[1];
        let minor_revision = directory_values[2];
        let key_count = directory_values[3] as usize;

        if directory_values.len() < 4 + key_count * 4 {
            return Err(GeoTiffError::BadTag(TagId::GeoKeyDirectory));
        }

        let keys = (0..key_count)
            .map(|i| {
                let entry_offset = (i + 1) * 4;
                let code = directory_values[entry_offset];
                let location = directory_values[entry_offset + 1];
                let count = directory_values[entry_offset + 2] as usize;
                let offset = directory_values[entry_offset + 3] as usize;

                let value = if location == 0 {
                    GeoKeyValue::Short(vec![offset as u16])
                } else {
                    ifd.get_tag_by_code(location)
                        .and_then(|tag| match tag.datatype {
                            TagType::Ascii => tag.as_string().and_then(|s| {
                                s.get(offset..offset + count).map(|s| {
                                    GeoKeyValue::Ascii(
                                        s.trim_end_matches(|c| c == '|' || c == '\0')
                                            .to_string(),
                                    )
                                })
                            }),
                            TagType::Short => tag
                                .values::<u16>()
                                .and_then(|v| v.get(offset..offset + count).map(<[u16]>::to_vec))
                                .map(GeoKeyValue::Short),
                            TagType::Double => tag
                                .values::<f64>()
                                .and_then(|v| v.get(offset..offset + count).map(<[f64]>::to_vec))
                                .map(GeoKeyValue::Double),
                            _ => None,
                        })
                        .unwrap_or(GeoKeyValue::Undefined)
                };

                GeoKey { code, value }
            })
            .collect();

        Ok(Self {
            version,
            revision: (revision, minor_revision),
            keys,
        })
    }

    pub fn add_to_ifd(&self, ifd: &mut Ifd, endian: Endian) {
        let (key_directory, ascii_params, double_params) = self.unparse();
        ifd.set_tag(
            TagId::GeoKeyDirectory,
            TagData::Short(key_directory),
            endian,
        );
        if !ascii_params.is_empty() {
            ifd.set_tag(TagId::GeoAsciiParams, TagData::Ascii(ascii_params), endian);
        }
        if !double_params.is_empty() {
            ifd.set_tag(
                TagId::GeoDoubleParams,
                TagData::Double(double_params),
                endian,
            );
        }
    }

    pub fn unparse(&self) -> (Vec<u16>, Vec<u8>, Vec<f64>) {
        let mut directory = vec![];
        let mut shorts = vec![];
        let mut asciis = vec![];
        let mut doubles = vec![];
        let dir_size = 4 * (self.keys.len() + 1) as u16;

        // Directory header
        directory.push(self.version);
        directory.push(self.revision.0);
        directory.push(self.revision.1);
        directory.push(self.keys.len() as u16);

        // Keys must be sorted by code
        let mut keys: Vec<&GeoKey> = self.keys.iter().collect();
        keys.sort_by_key(|key| key.code);

        for key in keys {
            directory.push(key.code);

            match &key.value {
                GeoKeyValue::Short(vec) => match vec.len() {
                    0 => directory.extend([0, 0, 0]),
                    1 => directory.extend([0, 1, vec[0]]),
                    n => {
                        directory.push(TagId::GeoKeyDirectory.into());
                        directory.push(n as u16);
                        directory.push(dir_size + shorts.len() as u16);
                        shorts.extend(vec);
                    }
                },
                GeoKeyValue::Ascii(s) => {
                    // GeoTIFF ascii params are '|' terminated
                    let s = format!("{s}|");
                    directory.push(TagId::GeoAsciiParams.into());
                    directory.push(s.len() as u16);
                    directory.push(asciis.len() as u16);
                    asciis.extend(s.bytes());
                }
                GeoKeyValue::Double(vec) => {
                    directory.push(TagId::GeoDoubleParams.into());
                    directory.push(vec.len() as u16);
                    directory.push(doubles.len() as u16);
                    doubles.extend(vec);
                }
                GeoKeyValue::Undefined => directory.extend([0, 0, 0]),
            }
        }

        if !asciis.is_empty() {
            asciis.push(0);
        }

        ([directory, shorts].concat(), asciis, doubles)
    }
}

impl Display for GeoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("0x{:04X}", self.code),
        };
        write!(f, "{}: {}", id_string, self.value)
    }
}
