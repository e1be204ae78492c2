//! Package-level encryption header.
//!
//! Layout, all little-endian:
//!
//! | field                | width |
//! |----------------------|-------|
//! | magic `0x05024D4D`   | 4     |
//! | version (1)          | 2     |
//! | iteration count      | 4     |
//! | plaintext size       | 4     |
//! | cipher id            | 4     |
//! | checksum id          | 4     |
//! | derived key size     | 4     |
//! | start key id         | 4     |
//! | salt length          | 2     |
//! | IV length            | 2     |
//! | digest length        | 2     |
//! | media type length    | 2     |
//!
//! followed by salt, IV, digest and the media type in UTF-16LE.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Result, ZipError};
use crate::io::MemoryByteGrabber;

use super::data::{CipherId, DigestId, EncryptionData};

pub const HEADER_MAGIC: u32 = 0x0502_4D4D;
pub const HEADER_VERSION: u16 = 1;
/// Fixed part of the header, magic included.
pub const HEADER_SIZE: usize = 38;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    pub iteration_count: u32,
    pub size: u32,
    pub enc_alg: CipherId,
    pub check_alg: DigestId,
    pub derived_key_size: i32,
    pub start_key_gen: DigestId,
    pub salt: Vec<u8>,
    pub init_vector: Vec<u8>,
    pub digest: Vec<u8>,
    pub media_type: String,
}

impl EncryptionHeader {
    pub fn from_data(data: &EncryptionData, size: u32, media_type: &str) -> Self {
        Self {
            iteration_count: data.iteration_count,
            size,
            enc_alg: data.enc_alg,
            check_alg: data.check_alg,
            derived_key_size: data.derived_key_size,
            start_key_gen: data.start_key_gen,
            salt: data.salt.clone(),
            init_vector: data.init_vector.clone(),
            digest: data.digest.clone(),
            media_type: media_type.to_string(),
        }
    }

    /// Encryption data for these parameters and a start key.
    pub fn to_data(&self, key: Vec<u8>) -> EncryptionData {
        EncryptionData {
            key,
            salt: self.salt.clone(),
            init_vector: self.init_vector.clone(),
            digest: self.digest.clone(),
            iteration_count: self.iteration_count,
            derived_key_size: self.derived_key_size,
            enc_alg: self.enc_alg,
            check_alg: self.check_alg,
            start_key_gen: self.start_key_gen,
            try_legacy_sha1: false,
        }
    }

    /// Parse a header at the start of `bytes`. Returns the header and the
    /// number of bytes it occupies.
    pub fn read(bytes: &[u8]) -> Result<(Self, usize)> {
        let short = |_| ZipError::zip_io("Truncated encryption header!");
        let mut mem = MemoryByteGrabber::new(bytes);

        if mem.read_u32().map_err(short)? != HEADER_MAGIC {
            return Err(ZipError::zip_io("Bad encryption header signature!"));
        }
        if mem.read_u16().map_err(short)? != HEADER_VERSION {
            return Err(ZipError::zip_io("Unsupported encryption header version!"));
        }

        let iteration_count = mem.read_u32().map_err(short)?;
        let size = mem.read_u32().map_err(short)?;
        let enc_alg = CipherId::from_i32(mem.read_i32().map_err(short)?);
        let check_alg = DigestId::from_i32(mem.read_i32().map_err(short)?);
        let derived_key_size = mem.read_i32().map_err(short)?;
        let start_key_gen = DigestId::from_i32(mem.read_i32().map_err(short)?);
        let salt_len = mem.read_u16().map_err(short)? as usize;
        let iv_len = mem.read_u16().map_err(short)? as usize;
        let digest_len = mem.read_u16().map_err(short)? as usize;
        let media_len = mem.read_u16().map_err(short)? as usize;

        let salt = mem.read_bytes(salt_len).map_err(short)?.to_vec();
        let init_vector = mem.read_bytes(iv_len).map_err(short)?.to_vec();
        let digest = mem.read_bytes(digest_len).map_err(short)?.to_vec();
        let media = mem.read_bytes(media_len).map_err(short)?;
        let units: Vec<u16> = media
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let media_type = String::from_utf16_lossy(&units);

        Ok((
            Self {
                iteration_count,
                size,
                enc_alg,
                check_alg,
                derived_key_size,
                start_key_gen,
                salt,
                init_vector,
                digest,
                media_type,
            },
            mem.current_pos(),
        ))
    }

    pub fn write(&self) -> Vec<u8> {
        let media: Vec<u16> = self.media_type.encode_utf16().collect();
        let mut out = Vec::with_capacity(self.encoded_len());

        // Writes into a Vec cannot fail.
        let _ = self.write_fixed(&mut out, media.len() * 2);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.init_vector);
        out.extend_from_slice(&self.digest);
        for unit in media {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    fn write_fixed(&self, out: &mut Vec<u8>, media_len: usize) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(HEADER_MAGIC)?;
        out.write_u16::<LittleEndian>(HEADER_VERSION)?;
        out.write_u32::<LittleEndian>(self.iteration_count)?;
        out.write_u32::<LittleEndian>(self.size)?;
        out.write_i32::<LittleEndian>(self.enc_alg.as_i32())?;
        out.write_i32::<LittleEndian>(self.check_alg.as_i32())?;
        out.write_i32::<LittleEndian>(self.derived_key_size)?;
        out.write_i32::<LittleEndian>(self.start_key_gen.as_i32())?;
        out.write_u16::<LittleEndian>(self.salt.len() as u16)?;
        out.write_u16::<LittleEndian>(self.init_vector.len() as u16)?;
        out.write_u16::<LittleEndian>(self.digest.len() as u16)?;
        out.write_u16::<LittleEndian>(media_len as u16)?;
        Ok(())
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + self.salt.len()
            + self.init_vector.len()
            + self.digest.len()
            + self.media_type.encode_utf16().count() * 2
    }
}
