//! Container writer.
//!
//! Produces plain, non-ZIP64 containers: stored or deflated entries,
//! optional data descriptors, pre-encoded raw entries and an archive
//! comment. Names are written as given; validation is the reader's job.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use crate::error::{Result, ZipError};

use super::inflate::crc32;
use super::structures::*;

/// Per-entry settings.
#[derive(Debug, Clone, Copy)]
pub struct EntryOptions {
    pub method: CompressionMethod,
    /// Write sizes and CRC in a trailing data descriptor (flag bit 3).
    pub data_descriptor: bool,
    /// DOS time in the low half, DOS date in the high half.
    pub time: u32,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflate,
            data_descriptor: false,
            // 1980-01-01 00:00:00
            time: 0x0021_0000,
        }
    }
}

impl EntryOptions {
    pub fn stored() -> Self {
        Self {
            method: CompressionMethod::Stored,
            ..Self::default()
        }
    }

    pub fn deflated() -> Self {
        Self::default()
    }

    pub fn with_data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }
}

struct CentralRecord {
    name: Vec<u8>,
    flags: u16,
    method: u16,
    time: u32,
    crc: u32,
    compressed_size: u32,
    size: u32,
    offset: u32,
}

/// In-memory container builder.
#[derive(Default)]
pub struct ZipWriter {
    out: Vec<u8>,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
}

impl ZipWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes to place in front of the first local header, as a
    /// self-extracting stub would.
    pub fn with_preamble(preamble: &[u8]) -> Self {
        Self {
            out: preamble.to_vec(),
            ..Self::default()
        }
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = comment.as_bytes().to_vec();
    }

    /// Add an entry, compressing `data` as `options` asks.
    pub fn add_entry(&mut self, name: &str, data: &[u8], options: EntryOptions) -> Result<()> {
        let stored = match options.method {
            CompressionMethod::Stored => data.to_vec(),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionMethod::Unknown(m) => {
                return Err(ZipError::zip(format!("cannot write compression method {m}")));
            }
        };
        self.add_raw_entry(name, &stored, data.len() as u64, crc32(data), options)
    }

    /// Add bytes that are already encoded, such as an encrypted package stream.
    pub fn add_raw_entry(
        &mut self,
        name: &str,
        stored: &[u8],
        size: u64,
        crc: u32,
        options: EntryOptions,
    ) -> Result<()> {
        let offset = self.out.len() as u32;
        let flags = if options.data_descriptor {
            FLAG_DATA_DESCRIPTOR
        } else {
            0
        };
        let record = CentralRecord {
            name: name.as_bytes().to_vec(),
            flags,
            method: options.method.as_u16(),
            time: options.time,
            crc,
            compressed_size: stored.len() as u32,
            size: size as u32,
            offset,
        };

        let out = &mut self.out;
        out.write_all(&LOCSIG)?;
        out.write_u16::<LittleEndian>(20)?;
        out.write_u16::<LittleEndian>(record.flags)?;
        out.write_u16::<LittleEndian>(record.method)?;
        out.write_u32::<LittleEndian>(record.time)?;
        if options.data_descriptor {
            out.write_u32::<LittleEndian>(0)?;
            out.write_u32::<LittleEndian>(0)?;
            out.write_u32::<LittleEndian>(0)?;
        } else {
            out.write_u32::<LittleEndian>(record.crc)?;
            out.write_u32::<LittleEndian>(record.compressed_size)?;
            out.write_u32::<LittleEndian>(record.size)?;
        }
        out.write_u16::<LittleEndian>(record.name.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_all(&record.name)?;
        out.write_all(stored)?;

        if options.data_descriptor {
            out.write_all(&EXTSIG)?;
            out.write_u32::<LittleEndian>(record.crc)?;
            out.write_u32::<LittleEndian>(record.compressed_size)?;
            out.write_u32::<LittleEndian>(record.size)?;
        }

        self.records.push(record);
        Ok(())
    }

    /// Write the central directory and END record and return the container.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let cen_offset = self.out.len() as u32;
        let out = &mut self.out;
        for record in &self.records {
            out.write_all(&CENSIG)?;
            out.write_u16::<LittleEndian>(20)?;
            out.write_u16::<LittleEndian>(20)?;
            out.write_u16::<LittleEndian>(record.flags)?;
            out.write_u16::<LittleEndian>(record.method)?;
            out.write_u32::<LittleEndian>(record.time)?;
            out.write_u32::<LittleEndian>(record.crc)?;
            out.write_u32::<LittleEndian>(record.compressed_size)?;
            out.write_u32::<LittleEndian>(record.size)?;
            out.write_u16::<LittleEndian>(record.name.len() as u16)?;
            out.write_u16::<LittleEndian>(0)?;
            out.write_u16::<LittleEndian>(0)?;
            out.write_u16::<LittleEndian>(0)?;
            out.write_u16::<LittleEndian>(0)?;
            out.write_u32::<LittleEndian>(0)?;
            out.write_u32::<LittleEndian>(record.offset)?;
            out.write_all(&record.name)?;
        }
        let cen_size = out.len() as u32 - cen_offset;

        out.write_all(&ENDSIG)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(self.records.len() as u16)?;
        out.write_u16::<LittleEndian>(self.records.len() as u16)?;
        out.write_u32::<LittleEndian>(cen_size)?;
        out.write_u32::<LittleEndian>(cen_offset)?;
        out.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        out.write_all(&self.comment)?;

        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_of_single_stored_entry() {
        let mut writer = ZipWriter::new();
        writer.add_entry("a.txt", b"hello", EntryOptions::stored()).unwrap();
        let bytes = writer.finish().unwrap();

        assert_eq!(&bytes[..4], &LOCSIG);
        assert_eq!(&bytes[30..35], b"a.txt");
        assert_eq!(&bytes[35..40], b"hello");
        assert_eq!(&bytes[40..44], &CENSIG);
        let end = bytes.len() - ENDHDR;
        assert_eq!(&bytes[end..end + 4], &ENDSIG);
        assert_eq!(bytes.len(), 40 + CENHDR + 5 + ENDHDR);
    }

    #[test]
    fn descriptor_follows_data() {
        let mut writer = ZipWriter::new();
        writer
            .add_entry("d", b"xyz", EntryOptions::stored().with_data_descriptor())
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[14..26], &[0u8; 12]);
        assert_eq!(&bytes[34..38], &EXTSIG);
        assert_eq!(&bytes[38..42], &crc32(b"xyz").to_le_bytes());
    }
}
