//! Low-level container parser.
//!
//! This module handles the binary parsing of ZIP structures, reading from any
//! source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! Containers are read from the end:
//! 1. Find the End of Central Directory (END) record near the end of the source
//! 2. Validate its counts and lengths against the source length
//! 3. Read the whole Central Directory into memory and parse every entry
//! 4. When an entry is opened, read its Local File Header to locate the data
//!
//! Every check here rejects the archive outright; falling back to a
//! [recovery scan](super::recovery) is the caller's decision.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Result, ZipError};
use crate::io::{ByteGrabber, MemoryByteGrabber, ReadAt, read_full_at};

use super::structures::*;

/// Low-level container parser.
///
/// Generic over the reader type so the same code serves files, memory
/// buffers and any other [`ReadAt`] source. Callers that share the source
/// with entry streams serialize access through the archive io lock.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Locate the End of Central Directory record.
    ///
    /// Scans backwards from `size - ENDHDR` through a window large enough for
    /// the longest possible comment. The first signature found from the end
    /// wins; the comment length is not checked, so trailing junk is tolerated.
    ///
    /// Returns `None` when the source is too short to hold an END record.
    pub async fn find_end(&self) -> Result<Option<u64>> {
        if self.size < ENDHDR as u64 {
            return Ok(None);
        }

        let window = (ENDHDR + ZIP_MAXNAMELEN) as u64;
        let start = self.size.saturating_sub(window);
        let len = (self.size - start) as usize;

        let mut buf = vec![0u8; len];
        let read = read_full_at(self.reader.as_ref(), start, &mut buf).await?;
        if read != len {
            return Err(ZipError::zip("Zip END signature not found!"));
        }

        let found = (0..=len - ENDHDR).rev().find(|&i| buf[i..i + 4] == ENDSIG);
        match found {
            Some(i) => {
                let pos = start + i as u64;
                debug!(pos, "found END record");
                Ok(Some(pos))
            }
            None => Err(ZipError::zip("Zip END signature not found!")),
        }
    }

    /// Read and validate the Central Directory.
    ///
    /// Entry offsets come back unresolved ([`EntryOffset::Header`]), shifted
    /// by any preamble in front of the archive. Later duplicates of a path
    /// replace earlier ones.
    pub async fn read_cen(&self) -> Result<HashMap<String, ZipEntry>> {
        let end_pos = self
            .find_end()
            .await?
            .ok_or_else(|| ZipError::zip("stream data looks to be broken"))?;

        let mut grabber = ByteGrabber::new(self.reader.clone());
        grabber.seek(end_pos);
        let mut record = grabber.read_bytes(ENDHDR).await?;
        // A short record right at the end of the source still has its counts.
        record.resize(ENDHDR, 0);
        let end = EndOfCentralDirectory::from_bytes(&record)?;

        let total = end.total_entries as usize;
        let cen_len = end.cd_size as i32 as i64;
        let cen_off = end.cd_offset as i32 as i64;
        let end_pos = end_pos as i64;

        if (total * CENHDR) as i64 > cen_len {
            return Err(ZipError::zip("invalid END header (bad entry count)"));
        }
        if total > ZIP_MAXENTRIES {
            return Err(ZipError::zip("too many entries in ZIP File"));
        }
        if cen_len < 0 || cen_len > end_pos {
            return Err(ZipError::zip(
                "Invalid END header (bad central directory size)",
            ));
        }
        let cen_pos = end_pos - cen_len;
        if cen_off < 0 || cen_off > cen_pos {
            return Err(ZipError::zip(
                "Invalid END header (bad central directory size)",
            ));
        }
        let loc_pos = (cen_pos - cen_off) as u64;

        grabber.seek(cen_pos as u64);
        let cen = grabber.read_bytes(cen_len as usize).await?;
        if cen.len() != cen_len as usize {
            return Err(ZipError::zip("Error reading CEN into memory buffer!"));
        }

        let mut mem = MemoryByteGrabber::new(&cen);
        let mut entries = HashMap::with_capacity(total);
        for _ in 0..total {
            let entry = parse_cen_entry(&mut mem, loc_pos)
                .map_err(|e| match e {
                    ZipError::Io(_) => ZipError::zip("Invalid CEN header (truncated)"),
                    other => other,
                })?;
            entries.insert(entry.path.clone(), entry);
        }

        debug!(total, entries = entries.len(), "read central directory");
        Ok(entries)
    }

    /// Read an entry's Local File Header and resolve its data offset.
    ///
    /// Only the name is compared with the directory copy; everything else in
    /// the local header is ignored because producers are known to get it
    /// wrong. A mismatch is fatal unless `recovery` is set.
    pub async fn read_loc(&self, entry: &mut ZipEntry, recovery: bool) -> Result<()> {
        let pos = match entry.offset {
            EntryOffset::Header(pos) => pos,
            EntryOffset::Data(_) => return Ok(()),
        };

        let mut grabber = ByteGrabber::new(self.reader.clone());
        grabber.seek(pos);
        let sig = grabber.read_bytes(4).await?;
        if sig != LOCSIG {
            return Err(ZipError::zip_io("Invalid LOC header (bad signature)"));
        }

        // version, flags, method, time, crc, sizes: all trusted from the directory
        grabber.seek(pos + 26);
        let mut path_len = grabber.read_i16().await?;
        let extra_len = grabber.read_i16().await?;
        if path_len < 0 {
            warn!(path_len, "bogus path length in local header");
            path_len = 0;
        }

        let data_pos = (grabber.position() as i64 + path_len as i64 + extra_len as i64).max(0);
        entry.offset = EntryOffset::Data(data_pos as u64);

        let broken = match grabber.read_bytes(path_len as usize).await {
            Ok(name) => {
                let loc_path = String::from_utf8_lossy(&name).into_owned();
                match entry.path_len {
                    None => {
                        entry.path_len = Some(path_len as u16);
                        entry.path = loc_path;
                        false
                    }
                    Some(len) => len as i16 != path_len || entry.path != loc_path,
                }
            }
            Err(_) => true,
        };

        if broken {
            if !recovery {
                return Err(ZipError::zip_io("The stream seems to be broken!"));
            }
            warn!(path = %entry.path, "local header disagrees with central directory");
        }
        Ok(())
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Parse one Central Directory File Header.
fn parse_cen_entry(mem: &mut MemoryByteGrabber<'_>, loc_pos: u64) -> Result<ZipEntry> {
    if mem.read_signature()? != CENSIG {
        return Err(ZipError::zip("Invalid CEN header (bad signature)"));
    }

    let _version_made_by = mem.read_u16()?;
    let version = mem.read_u16()?;
    let flags = mem.read_u16()?;
    if flags & FLAG_ENCRYPTED != 0 {
        return Err(ZipError::zip("Invalid CEN header (encrypted entry)"));
    }

    let method = CompressionMethod::from_u16(mem.read_u16()?);
    if !method.is_supported() {
        return Err(ZipError::zip("Invalid CEN header (bad compression method)"));
    }

    let time = mem.read_u32()?;
    let crc = mem.read_u32()?;
    let compressed_size = mem.read_u32()?;
    let size = mem.read_u32()?;
    let path_len = mem.read_i16()?;
    let extra_len = mem.read_i16()?;
    let comment_len = mem.read_i16()?;
    // disk number start, internal and external attributes
    mem.skip_bytes(8);
    let offset = mem.read_u32()?;

    if size == ZIP64_SENTINEL || offset == ZIP64_SENTINEL || compressed_size == ZIP64_SENTINEL {
        return Err(ZipError::zip("PK64 zip file entry"));
    }
    if path_len < 0 {
        return Err(ZipError::zip("unexpected name length"));
    }
    if comment_len < 0 {
        return Err(ZipError::zip("unexpected comment length"));
    }
    if extra_len < 0 {
        return Err(ZipError::zip("unexpected extra header info length"));
    }
    if path_len as usize > mem.remaining_size() {
        return Err(ZipError::zip("name too long"));
    }

    // Always UTF-8: some producers never set the language encoding flag.
    let name = mem.read_bytes(path_len as usize)?;
    let path = String::from_utf8_lossy(name).into_owned();
    if !is_valid_entry_name(&path, true) {
        return Err(ZipError::zip("Zip entry has an invalid name."));
    }
    mem.skip_bytes(extra_len as usize + comment_len as usize);

    Ok(ZipEntry {
        path,
        path_len: Some(path_len as u16),
        extra_len: extra_len as u16,
        version,
        flags,
        method,
        time,
        crc,
        compressed_size: compressed_size as u64,
        size: size as u64,
        offset: EntryOffset::Header(offset as u64 + loc_pos),
    })
}
