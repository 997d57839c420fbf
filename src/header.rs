use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{PsfError, Result};
use crate::version::Version;

pub const MAGIC: &[u8; 3] = b"PSF";
/// Bytes following the magic: version + three u32 fields.
pub const HEADER_SIZE: usize = 13;
/// Offset of the reserved area from the start of the file.
pub const RESERVED_OFFSET: u64 = (MAGIC.len() + HEADER_SIZE) as u64;

/// Fixed-width header found at offset 3.  Sizes are authoritative byte
/// counts; none of them predicts the inflated payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsfHeader {
    pub version:         Version,
    pub reserved_size:   u32,
    pub compressed_size: u32,
    pub compressed_crc:  u32,
}

impl PsfHeader {
    /// Read the magic and the fixed header.
    ///
    /// A short magic read is an I/O error; three bytes that are not `PSF`
    /// are a format error.  No field is range-checked here.
    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PsfError::InvalidMagic(magic));
        }

        let mut fixed = [0u8; HEADER_SIZE];
        reader.read_exact(&mut fixed)?;
        Ok(Self::decode(&fixed)?)
    }

    /// Decode the 13 fixed bytes that follow the magic.
    pub fn decode(fixed: &[u8; HEADER_SIZE]) -> io::Result<Self> {
        let mut cur = &fixed[..];
        Ok(Self {
            version:         Version::from(cur.read_u8()?),
            reserved_size:   cur.read_u32::<LittleEndian>()?,
            compressed_size: cur.read_u32::<LittleEndian>()?,
            compressed_crc:  cur.read_u32::<LittleEndian>()?,
        })
    }

    /// Encode the 13 fixed bytes (without the magic).
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.version.as_u8())?;
        writer.write_u32::<LittleEndian>(self.reserved_size)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.compressed_crc)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.version.as_u8();
        out[1..5].copy_from_slice(&self.reserved_size.to_le_bytes());
        out[5..9].copy_from_slice(&self.compressed_size.to_le_bytes());
        out[9..13].copy_from_slice(&self.compressed_crc.to_le_bytes());
        out
    }

    /// Offset of the first byte after the compressed block, i.e. where the
    /// tag block would start.
    pub fn tag_offset(&self) -> u64 {
        RESERVED_OFFSET + self.reserved_size as u64 + self.compressed_size as u64
    }
}
