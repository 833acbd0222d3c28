// GDAL VRT side-files
//   https://gdal.org/drivers/raster/vrt.html
//   Only the dataset grid, its georeferencing and the per band sources are read.

use crate::raster::{Bounds, DataType, GeoTransform};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("side-file is not valid XML: {0}")]
    Xml(String),
    #[error("side-file has no {0}")]
    Missing(&'static str),
    #[error("side-file {element} has bad value {value:?}")]
    BadValue {
        element: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VrtBand {
    pub band: usize,
    pub data_type: String,
    pub nodata: Option<f64>,
    pub sources: Vec<String>,
}

impl VrtBand {
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self.data_type.as_str() {
            "Int8" => DataType::Int8,
            "Byte" => DataType::UInt8,
            "Int16" => DataType::Int16,
            "UInt16" => DataType::UInt16,
            "Int32" => DataType::Int32,
            "UInt32" => DataType::UInt32,
            "Float32" => DataType::Float32,
            "Float64" => DataType::Float64,
            _ => return None,
        })
    }
}

/// Grid and georeferencing of a raster, as described by its side-file.
#[derive(Debug, Clone, PartialEq)]
pub struct SideFile {
    pub width: u32,
    pub height: u32,
    pub transform: GeoTransform,
    pub epsg: Option<u16>,
    pub bands: Vec<VrtBand>,
}

impl SideFile {
    pub fn parse(xml: &str) -> Result<Self, IndexError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut width = None;
        let mut height = None;
        let mut transform = None;
        let mut epsg = None;
        let mut bands: Vec<VrtBand> = vec![];
        let mut path: Vec<Vec<u8>> = vec![];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    match e.name().as_ref() {
                        b"VRTDataset" if path.is_empty() => {
                            width = Some(parse_number(&e, b"rasterXSize", "rasterXSize")?);
                            height = Some(parse_number(&e, b"rasterYSize", "rasterYSize")?);
                        }
                        b"VRTRasterBand" => bands.push(VrtBand {
                            band: attribute(&e, b"band")?
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(bands.len() + 1),
                            data_type: attribute(&e, b"dataType")?.unwrap_or("Byte".into()),
                            nodata: None,
                            sources: vec![],
                        }),
                        _ => {}
                    }
                    path.push(e.name().as_ref().to_vec());
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().map_err(|e| IndexError::Xml(e.to_string()))?;
                    match path.last().map(|name| name.as_slice()) {
                        Some(b"GeoTransform") if path.len() == 2 => {
                            transform = Some(parse_geotransform(&text)?)
                        }
                        Some(b"SRS") if path.len() == 2 => epsg = parse_epsg(&text),
                        Some(b"NoDataValue") => {
                            if let Some(band) = bands.last_mut() {
                                band.nodata = Some(text.trim().parse().map_err(|_| {
                                    IndexError::BadValue {
                                        element: "NoDataValue",
                                        value: text.to_string(),
                                    }
                                })?);
                            }
                        }
                        Some(b"SourceFilename") => {
                            if let Some(band) = bands.last_mut() {
                                band.sources.push(text.trim().to_string());
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(_)) => {
                    path.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(IndexError::Xml(format!(
                        "{e} at position {}",
                        reader.buffer_position()
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        let side_file = Self {
            width: width.ok_or(IndexError::Missing("VRTDataset"))?,
            height: height.ok_or(IndexError::Missing("VRTDataset"))?,
            transform: transform.ok_or(IndexError::Missing("GeoTransform"))?,
            epsg,
            bands,
        };
        if side_file.width == 0 || side_file.height == 0 {
            return Err(IndexError::BadValue {
                element: "VRTDataset",
                value: format!("{}x{}", side_file.width, side_file.height),
            });
        }
        Ok(side_file)
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let xml = std::str::from_utf8(bytes).map_err(|e| IndexError::Xml(e.to_string()))?;
        Self::parse(xml)
    }

    pub fn bounds(&self) -> Bounds {
        self.transform.bounds(self.width, self.height)
    }

    /// Closed interval containment in the side-file's CRS.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.bounds().contains(x, y)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Whether the band sources name the file at `path`, by file name.
    ///
    /// `None` when the side-file lists no sources.
    pub fn refers_to(&self, path: &str) -> Option<bool> {
        let target = file_name(path);
        let mut sources = self
            .bands
            .iter()
            .flat_map(|band| band.sources.iter())
            .peekable();
        sources.peek()?;
        Some(sources.any(|source| file_name(source) == target))
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl Display for SideFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b = self.bounds();
        write!(
            f,
            "SideFile({}x{}, {} bands, EPSG:{}, [{}, {}, {}, {}])",
            self.width,
            self.height,
            self.bands.len(),
            self.epsg.map(|c| c.to_string()).unwrap_or("?".into()),
            b.left,
            b.bottom,
            b.right,
            b.top
        )
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, IndexError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| IndexError::Xml(e.to_string()))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| IndexError::Xml(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_number(e: &BytesStart, key: &[u8], element: &'static str) -> Result<u32, IndexError> {
    let value = attribute(e, key)?.ok_or(IndexError::Missing(element))?;
    value.trim().parse().map_err(|_| IndexError::BadValue { element, value })
}

fn parse_geotransform(text: &str) -> Result<GeoTransform, IndexError> {
    let bad = || IndexError::BadValue {
        element: "GeoTransform",
        value: text.to_string(),
    };
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| bad())?;
    let values: [f64; 6] = values.try_into().map_err(|_| bad())?;
    let transform = GeoTransform::from_gdal(values);
    if transform.is_valid() {
        Ok(transform)
    } else {
        Err(bad())
    }
}

/// EPSG code of the outermost CRS in a WKT1, WKT2 or `EPSG:n` definition.
fn parse_epsg(srs: &str) -> Option<u16> {
    let srs = srs.trim();
    if let Some(code) = srs.strip_prefix("EPSG:") {
        return code.trim().parse().ok();
    }
    let start = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .iter()
        .filter_map(|marker| srs.rfind(marker).map(|i| i + marker.len()))
        .max()?;
    let digits: String = srs[start..]
        .trim_start_matches([' ', '"'])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
