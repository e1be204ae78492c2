use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, ZipError};

/// Local file header signature `PK\3\4`.
pub const LOCSIG: [u8; 4] = *b"PK\x03\x04";
/// Data descriptor signature `PK\7\8`.
pub const EXTSIG: [u8; 4] = *b"PK\x07\x08";
/// Central directory file header signature `PK\1\2`.
pub const CENSIG: [u8; 4] = *b"PK\x01\x02";
/// End of central directory signature `PK\5\6`.
pub const ENDSIG: [u8; 4] = *b"PK\x05\x06";

pub const LOCHDR: usize = 30;
pub const EXTHDR: usize = 16;
pub const CENHDR: usize = 46;
pub const ENDHDR: usize = 22;

/// Offset of the total entry count inside the END record.
pub const ENDTOT: u64 = 10;

pub const ZIP_MAXNAMELEN: usize = 0xFFFF;
pub const ZIP_MAXENTRIES: usize = 0xFFFF;

/// Sizes and offsets of this value mark a ZIP64 entry, which is not supported.
pub const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// General purpose flag: native ZIP encryption.
pub const FLAG_ENCRYPTED: u16 = 1;
/// General purpose flag: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 8;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, CompressionMethod::Unknown(_))
    }
}

/// End of Central Directory (END) record, 22 bytes plus comment
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    /// Stored unsigned; the reader checks it as a signed 32-bit length.
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < ENDHDR || data[0..4] != ENDSIG {
            return Err(ZipError::zip("Zip END signature not found!"));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }
}

/// Where an entry's bytes start.
///
/// Central directory entries only know their local header position; the
/// first stream request reads the local header and turns it into the data
/// position. Recovered entries are found at their data already.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryOffset {
    Header(u64),
    Data(u64),
}

impl EntryOffset {
    pub fn is_resolved(&self) -> bool {
        matches!(self, EntryOffset::Data(_))
    }

    /// Data position, if the local header has been read.
    pub fn data(&self) -> Option<u64> {
        match self {
            EntryOffset::Data(pos) => Some(*pos),
            EntryOffset::Header(_) => None,
        }
    }
}

/// One file inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub path: String,
    /// Name length as recorded by the directory; `None` for entries created
    /// in memory, which take the local header's name on resolution.
    pub path_len: Option<u16>,
    pub extra_len: u16,
    pub version: u16,
    pub flags: u16,
    pub method: CompressionMethod,
    /// DOS time in the low half, DOS date in the high half.
    pub time: u32,
    pub crc: u32,
    pub compressed_size: u64,
    pub size: u64,
    pub offset: EntryOffset,
}

impl ZipEntry {
    pub fn is_directory(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Bytes occupied by the entry data inside the container.
    pub fn stored_size(&self) -> u64 {
        match self.method {
            CompressionMethod::Deflate => self.compressed_size,
            _ => self.size,
        }
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let date = (self.time >> 16) as u16;
        let day = (date & 0x1F) as u8;
        let month = ((date >> 5) & 0x0F) as u8;
        let year = ((date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let time = self.time as u16;
        let second = ((time & 0x1F) * 2) as u8;
        let minute = ((time >> 5) & 0x3F) as u8;
        let hour = ((time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Check an entry name before it is accepted into an entry table.
///
/// Rejects empty names, absolute paths, `.` and `..` segments, characters
/// that are unsafe on common file systems and, unless `slash_allowed`, any
/// `/` at all. A trailing `/` marks a directory and is accepted.
pub fn is_valid_entry_name(name: &str, slash_allowed: bool) -> bool {
    if name.is_empty() || name.starts_with('/') {
        return false;
    }

    let bad_char = name.chars().any(|c| {
        matches!(c, '\\' | ':' | '<' | '>' | '"' | '|' | '?' | '*')
            || c.is_control()
            || (c == '/' && !slash_allowed)
    });
    if bad_char {
        return false;
    }

    let trimmed = name.strip_suffix('/').unwrap_or(name);
    !trimmed
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names() {
        assert!(is_valid_entry_name("content.xml", true));
        assert!(is_valid_entry_name("Pictures/a.png", true));
        assert!(is_valid_entry_name("Configurations2/", true));
        assert!(is_valid_entry_name("..hidden", true));

        assert!(!is_valid_entry_name("", true));
        assert!(!is_valid_entry_name("/etc/passwd", true));
        assert!(!is_valid_entry_name("a/../b", true));
        assert!(!is_valid_entry_name("./a", true));
        assert!(!is_valid_entry_name("a//b", true));
        assert!(!is_valid_entry_name("c:\\x", true));
        assert!(!is_valid_entry_name("a/b", false));
        assert!(!is_valid_entry_name("bell\u{7}", true));
    }

    #[test]
    fn dos_timestamp() {
        let entry = ZipEntry {
            path: "a".into(),
            path_len: Some(1),
            extra_len: 0,
            version: 20,
            flags: 0,
            method: CompressionMethod::Stored,
            // 2024-03-15 13:45:30
            time: ((44u32 << 9 | 3 << 5 | 15) << 16) | (13 << 11 | 45 << 5 | 15),
            crc: 0,
            compressed_size: 0,
            size: 0,
            offset: EntryOffset::Header(0),
        };
        assert_eq!(entry.mod_date(), (2024, 3, 15));
        assert_eq!(entry.mod_time(), (13, 45, 30));
    }

    #[test]
    fn end_record_rejects_bad_signature() {
        let mut rec = [0u8; ENDHDR];
        assert!(EndOfCentralDirectory::from_bytes(&rec).is_err());
        rec[..4].copy_from_slice(&ENDSIG);
        rec[10] = 3;
        let end = EndOfCentralDirectory::from_bytes(&rec).unwrap();
        assert_eq!(end.total_entries, 3);
    }
}
