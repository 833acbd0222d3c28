use super::{Endian, Tag, TagData, TagId, TagType, TiffError, TiffVariant};
use num_traits::NumCast;
use std::io::{self, Read, Seek, SeekFrom, Write};

#[derive(Clone, Debug, Default)]
pub struct Ifd(pub Vec<Tag>);

impl Ifd {
    pub fn parse<R: Read + Seek>(
        stream: &mut R,
        offset: u64,
        endian: Endian,
        variant: TiffVariant,
    ) -> io::Result<(Ifd, u64)> {
        // IFD starts at offset
        stream.seek(SeekFrom::Start(offset))?;

        // IFD header is just the number of tags
        let tag_count = match variant {
            TiffVariant::Normal => endian.read::<2, u16>(stream)? as u64,
            TiffVariant::Big => endian.read(stream)?,
        };

        // Parse each tag in the IFD
        let mut tags = Vec::with_capacity(tag_count as usize);
        for _ in 0..tag_count {
            let code = endian.read(stream)?;
            let datatype: TagType = endian.read::<2, u16>(stream)?.into();
            let count = variant.read_offset(endian, stream)? as usize;

            let data_size = count * datatype.size_in_bytes();
            let offset_size = variant.offset_bytesize();

            let data = if data_size > offset_size {
                let data_offset = variant.read_offset(endian, stream)?;
                let pos = stream.stream_position()?;
                let mut data = vec![0; data_size];
                stream.seek(SeekFrom::Start(data_offset))?;
                stream.read_exact(&mut data)?;
                stream.seek(SeekFrom::Start(pos))?;
                data
            } else {
                let mut data = vec![0; offset_size];
                stream.read_exact(&mut data)?;
                data.truncate(data_size);
                data
            };

            tags.push(Tag {
                code,
                datatype,
                endian,
                count,
                data,
            });
        }

        let ifd = Ifd(tags);
        let next_ifd_offset = variant.read_offset(endian, stream)?;

        Ok((ifd, next_ifd_offset))
    }

    pub fn get_tag_by_code(&self, code: u16) -> Option<&Tag> {
        let Self(tags) = &self;
        tags.iter().find(|tag| tag.code == code)
    }

    pub fn get_tag(&self, id: TagId) -> Result<&Tag, TiffError> {
        self.get_tag_by_code(id.into())
            .ok_or(TiffError::MissingTag(id))
    }

    pub fn get_tag_values<T: NumCast>(&self, id: TagId) -> Result<Vec<T>, TiffError> {
        self.get_tag(id)?.values().ok_or(TiffError::BadTag(id))
    }

    pub fn get_tag_value<T: NumCast + Copy>(&self, id: TagId) -> Result<T, TiffError> {
        self.get_tag(id)?.value().ok_or(TiffError::BadTag(id))
    }

    /// Insert or replace a tag, keeping entries sorted by code as TIFF requires.
    pub fn set_tag(&mut self, id: TagId, data: TagData, endian: Endian) {
        let tag = Tag::new(id, data, endian);
        let Self(tags) = self;
        match tags.binary_search_by_key(&tag.code, |t| t.code) {
            Ok(i) => tags[i] = tag,
            Err(i) => tags.insert(i, tag),
        }
    }

    fn directory_bytesize(&self, variant: TiffVariant) -> usize {
        variant.count_bytesize()
            + self.0.len() * variant.entry_bytesize()
            + variant.offset_bytesize()
    }

    /// Size of the directory plus its out-of-line tag data once written.
    pub fn encoded_size(&self, variant: TiffVariant) -> u64 {
        let overflow: usize = self
            .0
            .iter()
            .filter(|tag| tag.data.len() > variant.offset_bytesize())
            .map(|tag| word_aligned(tag.data.len()))
            .sum();
        (self.directory_bytesize(variant) + overflow) as u64
    }

    /// Write the directory, assumed to start at `offset`, followed by its
    /// out-of-line tag data.
    pub fn write<W: Write>(
        &self,
        writer: &mut W,
        offset: u64,
        next_ifd_offset: u64,
        endian: Endian,
        variant: TiffVariant,
    ) -> Result<(), TiffError> {
        let Self(tags) = self;
        let offset_size = variant.offset_bytesize();
        let mut overflow_offset = offset + self.directory_bytesize(variant) as u64;
        let mut overflow = vec![];

        match variant {
            TiffVariant::Normal => {
                let count =
                    u16::try_from(tags.len()).map_err(|_| TiffError::TooLarge(tags.len()))?;
                writer.write_all(&endian.encode(count))?;
            }
            TiffVariant::Big => writer.write_all(&endian.encode(tags.len() as u64))?,
        }

        for tag in tags {
            writer.write_all(&endian.encode(tag.code))?;
            writer.write_all(&endian.encode(<u16 as From<_>>::from(tag.datatype)))?;
            variant.write_offset(writer, endian, tag.count as u64)?;
            if tag.data.len() > offset_size {
                variant.write_offset(writer, endian, overflow_offset)?;
                let mut data = tag.data.clone();
                data.resize(word_aligned(data.len()), 0);
                overflow_offset += data.len() as u64;
                overflow.extend(data);
            } else {
                let mut inline = tag.data.clone();
                inline.resize(offset_size, 0);
                writer.write_all(&inline)?;
            }
        }
        variant.write_offset(writer, endian, next_ifd_offset)?;
        writer.write_all(&overflow)?;
        Ok(())
    }
}

fn word_aligned(n: usize) -> usize {
    n + (n % 2)
}
