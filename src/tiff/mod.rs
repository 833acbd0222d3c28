use std::fmt::Display;
use std::io::{self, Read, Seek, Write};

mod endian;
mod error;
mod ifd;
mod tag;

pub use endian::Endian;
pub use error::TiffError;
pub use ifd::Ifd;
pub use tag::{Tag, TagData, TagId, TagType};

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum TiffVariant {
    Normal,
    Big,
}

impl TiffVariant {
    fn read_offset<R: Read>(&self, endian: Endian, stream: &mut R) -> io::Result<u64> {
        match self {
            TiffVariant::Normal => endian.read::<4, u32>(stream).map(|v| v as u64),
            TiffVariant::Big => endian.read(stream),
        }
    }

    fn write_offset<W: Write>(&self, writer: &mut W, endian: Endian, value: u64) -> io::Result<()> {
        match self {
            TiffVariant::Normal => {
                let value = u32::try_from(value).map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Offset {value} needs BigTIFF"),
                    )
                })?;
                writer.write_all(&endian.encode(value))
            }
            TiffVariant::Big => writer.write_all(&endian.encode(value)),
        }
    }

    pub const fn offset_bytesize(&self) -> usize {
        match self {
            TiffVariant::Normal => 4,
            TiffVariant::Big => 8,
        }
    }

    pub const fn header_bytesize(&self) -> usize {
        match self {
            TiffVariant::Normal => 8,
            TiffVariant::Big => 16,
        }
    }

    const fn count_bytesize(&self) -> usize {
        match self {
            TiffVariant::Normal => 2,
            TiffVariant::Big => 8,
        }
    }

    const fn entry_bytesize(&self) -> usize {
        match self {
            TiffVariant::Normal => 12,
            TiffVariant::Big => 20,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tiff {
    pub endian: Endian,
    pub variant: TiffVariant,
    pub ifds: Vec<Ifd>,
}

impl Tiff {
    pub fn new(endian: Endian, variant: TiffVariant) -> Self {
        Self {
            endian,
            variant,
            ifds: vec![Ifd::default()],
        }
    }

    pub fn open<R: Read + Seek>(stream: &mut R) -> Result<Self, TiffError> {
        // TIFF Header
        let mut buf = [0; 4];
        stream.read_exact(&mut buf)?;

        let endian = match &buf[..2] {
            b"II" => Endian::Little,
            b"MM" => Endian::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        let variant = match &buf[2..4] {
            b"\0*" | b"*\0" => TiffVariant::Normal,
            b"\0+" | b"+\0" => TiffVariant::Big,
            _ => return Err(TiffError::BadMagicBytes),
        };

        if TiffVariant::Big == variant {
            // BigTIFFs have 4 extra bytes in the header
            let _offset_bytesize: u16 = endian.read(stream)?; // 0x0008
            let _: u16 = endian.read(stream)?; // 0x0000
        }

        // IFDs
        let mut ifds = vec![];
        let mut ifd_offset = variant.read_offset(endian, stream)?;
        while ifd_offset != 0 {
            let (ifd, next_offset) = Ifd::parse(stream, ifd_offset, endian, variant)?;
            ifd_offset = next_offset;
            ifds.push(ifd);
        }

        Ok(Self {
            endian,
            variant,
            ifds,
        })
    }

    pub fn ifd0(&self) -> Result<&Ifd, TiffError> {
        self.ifds
            .first()
            .ok_or(TiffError::MissingTag(TagId::ImageWidth))
    }

    pub fn ifd0_mut(&mut self) -> &mut Ifd {
        if self.ifds.is_empty() {
            self.ifds.push(Ifd::default());
        }
        &mut self.ifds[0]
    }

    pub fn write_header<W: Write>(&self, writer: &mut W, first_ifd_offset: u64) -> io::Result<()> {
        let endian = self.endian;
        writer.write_all(match endian {
            Endian::Little => b"II",
            Endian::Big => b"MM",
        })?;
        match self.variant {
            TiffVariant::Normal => writer.write_all(&endian.encode(42_u16))?,
            TiffVariant::Big => {
                writer.write_all(&endian.encode(43_u16))?;
                writer.write_all(&endian.encode(8_u16))?;
                writer.write_all(&endian.encode(0_u16))?;
            }
        }
        self.variant.write_offset(writer, endian, first_ifd_offset)
    }
}

impl Display for Tiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, ifd) in self.ifds.iter().enumerate() {
            writeln!(f, "IFD {i}:")?;
            for tag in ifd.0.iter() {
                writeln!(f, "\t{}", tag)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn written(variant: TiffVariant, endian: Endian) -> Vec<u8> {
        let mut tiff = Tiff::new(endian, variant);
        let ifd = tiff.ifd0_mut();
        ifd.set_tag(TagId::ImageHeight, TagData::from_long(3), endian);
        ifd.set_tag(TagId::ImageWidth, TagData::from_long(5), endian);
        ifd.set_tag(TagId::BitsPerSample, TagData::Short(vec![8; 6]), endian);
        ifd.set_tag(
            TagId::ModelPixelScale,
            TagData::Double(vec![10.0, 10.0, 0.0]),
            endian,
        );

        let offset = variant.header_bytesize() as u64;
        let mut bytes = vec![];
        tiff.write_header(&mut bytes, offset).unwrap();
        tiff.ifds[0]
            .write(&mut bytes, offset, 0, endian, variant)
            .unwrap();
        assert_eq!(
            bytes.len() as u64,
            offset + tiff.ifds[0].encoded_size(variant)
        );
        bytes
    }

    #[test]
    fn written_directory_parses_back() {
        for variant in [TiffVariant::Normal, TiffVariant::Big] {
            for endian in [Endian::Little, Endian::Big] {
                let bytes = written(variant, endian);
                let tiff = Tiff::open(&mut Cursor::new(bytes)).unwrap();
                assert_eq!(tiff.variant, variant);
                assert_eq!(tiff.endian, endian);
                let ifd = tiff.ifd0().unwrap();
                // set_tag keeps codes sorted
                assert_eq!(ifd.0[0].id(), Some(TagId::ImageWidth));
                assert_eq!(ifd.get_tag_value::<u32>(TagId::ImageWidth).unwrap(), 5);
                assert_eq!(ifd.get_tag_value::<u32>(TagId::ImageHeight).unwrap(), 3);
                assert_eq!(
                    ifd.get_tag_values::<u16>(TagId::BitsPerSample).unwrap(),
                    vec![8; 6]
                );
                assert_eq!(
                    ifd.get_tag_values::<f64>(TagId::ModelPixelScale).unwrap(),
                    vec![10.0, 10.0, 0.0]
                );
            }
        }
    }

    #[test]
    fn rejects_non_tiff_bytes() {
        let result = Tiff::open(&mut Cursor::new(b"GIF89a..".to_vec()));
        assert!(matches!(result, Err(TiffError::BadMagicBytes)));
    }
}
