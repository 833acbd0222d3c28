// refs
// https://www.itu.int/itudoc/itu-t/com16/tiff-fx/docs/tiff6.pdf
// https://www.awaresystems.be/imaging/tiff/bigtiff.html

use super::Endian;
use num_enum::{FromPrimitive, IntoPrimitive};
use num_traits::NumCast;
use std::fmt::Display;

mod data;
mod id;

pub use data::TagData;
pub use id::TagId;

#[derive(Clone, Debug)]
pub struct Tag {
    pub code: u16,
    pub datatype: TagType,
    pub count: usize,
    pub data: Vec<u8>,
    pub endian: Endian,
}

impl Tag {
    pub fn new(id: TagId, data: TagData, endian: Endian) -> Self {
        Self {
            code: id.into(),
            datatype: data.tag_type(),
            count: data.len(),
            data: data.bytes(endian),
            endian,
        }
    }

    pub fn id(&self) -> Option<TagId> {
        TagId::try_from(self.code).ok()
    }

    /// Decode and numerically cast every element.
    ///
    /// Rationals are returned as their quotient. Returns None for ASCII or
    /// undecodable data, or if any element does not fit into T.
    pub fn values<T: NumCast>(&self) -> Option<Vec<T>> {
        let endian = self.endian;
        let data = self.data.as_slice();
        match self.datatype {
            TagType::Byte | TagType::Undefined => data.iter().map(|v| T::from(*v)).collect(),
            TagType::SByte => data.iter().map(|v| T::from(*v as i8)).collect(),
            TagType::Short => endian.decode_all_to_primative::<2, u16, T>(data),
            TagType::SShort => endian.decode_all_to_primative::<2, i16, T>(data),
            TagType::Long | TagType::Ifd => endian.decode_all_to_primative::<4, u32, T>(data),
            TagType::SLong => endian.decode_all_to_primative::<4, i32, T>(data),
            TagType::Long8 | TagType::Ifd8 => endian.decode_all_to_primative::<8, u64, T>(data),
            TagType::SLong8 => endian.decode_all_to_primative::<8, i64, T>(data),
            TagType::Float => endian.decode_all_to_primative::<4, f32, T>(data),
            TagType::Double => endian.decode_all_to_primative::<8, f64, T>(data),
            TagType::Rational => endian
                .decode_all::<4, u32>(data)?
                .chunks_exact(2)
                .map(|pair| T::from(pair[0] as f64 / pair[1] as f64))
                .collect(),
            TagType::SRational => endian
                .decode_all::<4, i32>(data)?
                .chunks_exact(2)
                .map(|pair| T::from(pair[0] as f64 / pair[1] as f64))
                .collect(),
            TagType::Ascii | TagType::Unknown => None,
        }
    }

    pub fn value<T: NumCast + Copy>(&self) -> Option<T> {
        self.values::<T>()?.first().copied()
    }

    pub fn as_string(&self) -> Option<String> {
        match self.datatype {
            TagType::Ascii => String::from_utf8(self.data.clone())
                .ok()
                .map(|s| s.trim_end_matches('\0').to_string()),
            _ => None,
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut value_string = match (self.as_string(), self.values::<f64>()) {
            (Some(s), _) => s.replace('\n', "\\n"),
            (None, Some(values)) if values.len() == 1 => format!("{}", values[0]),
            (None, Some(values)) => format!("{values:?}"),
            (None, None) => "Undefined".to_string(),
        };
        if value_string.len() > 100 {
            value_string = format!("{}...", &value_string[..98]);
        }
        let id_string = match self.id() {
            Some(id) => format!("{id:?}"),
            None => format!("Unknown({})", self.code),
        };
        write!(
            f,
            "{} {:?}[{}]: {}",
            id_string, self.datatype, self.count, value_string
        )
    }
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum TagType {
    Byte = 1,
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    SByte = 6,
    Undefined = 7,
    SShort = 8,
    SLong = 9,
    SRational = 10,
    Float = 11,
    Double = 12,
    Ifd = 13,
    Long8 = 16,
    SLong8 = 17,
    Ifd8 = 18,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

impl TagType {
    pub fn size_in_bytes(&self) -> usize {
        match self {
            TagType::Byte | TagType::Ascii | TagType::SByte | TagType::Undefined => 1,
            TagType::Short | TagType::SShort => 2,
            TagType::Long | TagType::SLong | TagType::Float | TagType::Ifd => 4,
            TagType::Rational
            | TagType::SRational
            | TagType::Double
            | TagType::Long8
            | TagType::SLong8
            | TagType::Ifd8 => 8,
            TagType::Unknown => 1,
        }
    }
}
