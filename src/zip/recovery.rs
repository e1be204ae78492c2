//! Best-effort reconstruction of a damaged container.
//!
//! When the central directory is missing or unusable, the source is scanned
//! byte by byte for local file headers and data descriptors. Every entry
//! whose block fits inside the source is kept; entries whose content does not
//! match the recorded size and CRC keep their name and position but get
//! zeroed sizes, so one damaged stream never hides the others.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::io::{ByteGrabber, MemoryByteGrabber, ReadAt};

use super::inflate::SizeAndCrc;
use super::structures::*;

/// Bytes read per scan step.
pub const RECOVERY_CHUNK: usize = 32_000;

/// Rebuild the entry table by scanning the whole source.
///
/// The result depends only on the bytes of the source, so scanning the same
/// data twice yields the same table.
pub async fn recover<R: ReadAt>(reader: &Arc<R>) -> Result<HashMap<String, ZipEntry>> {
    let mut entries: HashMap<String, ZipEntry> = HashMap::new();
    let length = reader.size();
    if length < ENDHDR as u64 {
        return Ok(entries);
    }

    let mut grabber = ByteGrabber::new(reader.clone());
    let mut gen_pos: u64 = 0;
    loop {
        grabber.seek(gen_pos);
        let buf = grabber.read_bytes(RECOVERY_CHUNK).await?;
        if buf.len() <= 16 {
            break;
        }
        let buf_len = buf.len();
        let last_chunk = buf_len < RECOVERY_CHUNK;

        let mut pos = 0usize;
        while pos + 30 < buf_len || (last_chunk && pos + 16 < buf_len) {
            if pos + 30 < buf_len && buf[pos..pos + 4] == LOCSIG {
                if let Some(entry) = local_entry(reader, &buf, gen_pos, pos, length).await? {
                    match entries.entry(entry.path.clone()) {
                        Entry::Occupied(_) => {
                            trace!(path = %entry.path, "duplicate local header ignored");
                        }
                        Entry::Vacant(slot) => {
                            debug!(path = %entry.path, size = entry.size, "recovered entry");
                            slot.insert(entry);
                        }
                    }
                }
                pos += 4;
            } else if buf[pos..pos + 4] == EXTSIG {
                let mut mem = MemoryByteGrabber::new(&buf[pos + 4..pos + 16]);
                let crc = mem.read_u32()?;
                let compressed_size = mem.read_u32()? as u64;
                let size = mem.read_u32()? as u64;
                apply_descriptor(
                    reader,
                    &mut entries,
                    gen_pos + pos as u64,
                    crc,
                    compressed_size,
                    size,
                )
                .await?;
                pos += 4;
            } else {
                pos += 1;
            }
        }

        gen_pos += pos as u64;
    }

    Ok(entries)
}

/// Try to turn the local header at `buf[pos]` into an entry.
async fn local_entry<R: ReadAt>(
    reader: &Arc<R>,
    buf: &[u8],
    gen_pos: u64,
    pos: usize,
    length: u64,
) -> Result<Option<ZipEntry>> {
    let mut mem = MemoryByteGrabber::new(&buf[pos + 4..pos + 30]);
    let version = mem.read_u16()?;
    let flags = mem.read_u16()?;
    if flags & FLAG_ENCRYPTED != 0 {
        return Ok(None);
    }
    let method = CompressionMethod::from_u16(mem.read_u16()?);
    if !method.is_supported() {
        return Ok(None);
    }

    let time = mem.read_u32()?;
    let crc = mem.read_u32()?;
    let compressed_size = mem.read_u32()?;
    let size = mem.read_u32()?;
    let path_len = mem.read_i16()?;
    let extra_len = mem.read_i16()?;

    if size == ZIP64_SENTINEL || compressed_size == ZIP64_SENTINEL {
        warn!(pos = gen_pos + pos as u64, "skipping ZIP64 local header");
        return Ok(None);
    }
    if path_len < 0 || extra_len < 0 {
        return Ok(None);
    }

    let descriptor_len = if method == CompressionMethod::Deflate && flags & FLAG_DATA_DESCRIPTOR != 0 {
        EXTHDR as u64
    } else {
        0
    };
    let data_len = match method {
        CompressionMethod::Deflate => compressed_size as u64,
        _ => size as u64,
    };
    let block_len = data_len + path_len as u64 + extra_len as u64 + LOCHDR as u64 + descriptor_len;
    let header_pos = gen_pos + pos as u64;
    if header_pos + block_len > length {
        return Ok(None);
    }

    let mut path_len = path_len as usize;
    let name_start = pos + LOCHDR;
    let path = if name_start + path_len <= buf.len() {
        String::from_utf8_lossy(&buf[name_start..name_start + path_len]).into_owned()
    } else {
        // Name runs past this chunk.
        let mut grabber = ByteGrabber::new(reader.clone());
        grabber.seek(header_pos + LOCHDR as u64);
        let name = grabber.read_bytes(path_len).await?;
        if name.len() < path_len {
            warn!(
                declared = path_len,
                read = name.len(),
                "local header name truncated by end of stream"
            );
            path_len = name.len();
        }
        String::from_utf8_lossy(&name).into_owned()
    };

    if !is_valid_entry_name(&path, true) {
        warn!(path = %path, "skipping local header with invalid name");
        return Ok(None);
    }

    let data_pos = header_pos + LOCHDR as u64 + path_len as u64 + extra_len as u64;
    let mut entry = ZipEntry {
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
        offset: EntryOffset::Data(data_pos),
    };

    if (entry.size != 0 || entry.compressed_size != 0) && !check_size_and_crc(reader, &entry).await? {
        warn!(path = %entry.path, "recorded size or CRC does not match content");
        entry.crc = 0;
        entry.compressed_size = 0;
        entry.size = 0;
    }

    Ok(Some(entry))
}

/// Patch entries that a data descriptor at `descriptor_pos` belongs to.
async fn apply_descriptor<R: ReadAt>(
    reader: &Arc<R>,
    entries: &mut HashMap<String, ZipEntry>,
    descriptor_pos: u64,
    crc: u32,
    compressed_size: u64,
    size: u64,
) -> Result<()> {
    let Some(stream_pos) = descriptor_pos.checked_sub(compressed_size) else {
        return Ok(());
    };

    let candidates: Vec<String> = entries
        .values()
        .filter(|e| {
            e.has_data_descriptor()
                && e.offset == EntryOffset::Data(stream_pos)
                && compressed_size > e.compressed_size
        })
        .map(|e| e.path.clone())
        .collect();

    for path in candidates {
        let Some(entry) = entries.get_mut(&path) else {
            continue;
        };

        // Accepted for any method: broken producers set the flag on stored data too.
        let mut accept = entry.method == CompressionMethod::Stored && compressed_size == size;
        if !accept {
            let (real_size, real_crc) = size_and_crc(reader, stream_pos, compressed_size).await?;
            accept = real_size == size && real_crc == crc;
        }

        if accept {
            debug!(path = %entry.path, size, "sizes taken from data descriptor");
            entry.crc = crc;
            entry.compressed_size = compressed_size;
            entry.size = size;
        }
    }
    Ok(())
}

async fn check_size_and_crc<R: ReadAt>(reader: &Arc<R>, entry: &ZipEntry) -> Result<bool> {
    let Some(offset) = entry.offset.data() else {
        return Ok(false);
    };

    if entry.method == CompressionMethod::Stored {
        return Ok(stored_crc(reader, offset, entry.size).await? == entry.crc);
    }

    let (size, crc) = size_and_crc(reader, offset, entry.compressed_size).await?;
    Ok(size == entry.size && crc == entry.crc)
}

/// CRC-32 over `size` stored bytes.
async fn stored_crc<R: ReadAt>(reader: &Arc<R>, offset: u64, size: u64) -> Result<u32> {
    let mut crc = flate2::Crc::new();
    let mut grabber = ByteGrabber::new(reader.clone());
    grabber.seek(offset);

    let mut remaining = size;
    while remaining > 0 {
        let block = grabber
            .read_bytes(remaining.min(RECOVERY_CHUNK as u64) as usize)
            .await?;
        if block.is_empty() {
            break;
        }
        crc.update(&block);
        remaining -= block.len() as u64;
    }
    Ok(crc.sum())
}

/// Inflated size and CRC-32 of `compressed_size` deflated bytes.
async fn size_and_crc<R: ReadAt>(
    reader: &Arc<R>,
    offset: u64,
    compressed_size: u64,
) -> Result<(u64, u32)> {
    let block_size = compressed_size.min(RECOVERY_CHUNK as u64) as usize;
    let mut counter = SizeAndCrc::new(block_size);
    let mut grabber = ByteGrabber::new(reader.clone());
    grabber.seek(offset);

    let mut remaining = compressed_size;
    while remaining > 0 && !counter.finished() {
        let block = grabber
            .read_bytes(remaining.min(block_size as u64) as usize)
            .await?;
        if block.is_empty() {
            break;
        }
        counter.update(&block);
        remaining -= block.len() as u64;
    }
    Ok((counter.size(), counter.crc()))
}
