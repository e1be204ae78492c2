//! High-level container access.
//!
//! [`ZipFile`] owns the entry table and the io lock; every stream it hands
//! out shares that lock, so positioned reads from different tasks never
//! interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::crypto::{
    DIGEST_DECRYPT_LENGTH, EncryptionData, EncryptionHeader, HEADER_SIZE, get_cipher,
    has_valid_password,
};
use crate::error::{Result, ZipError};
use crate::io::{ReadAt, read_full_at};

use super::parser::ZipParser;
use super::recovery::recover;
use super::stream::{EntryReader, EntryStream, IoLock, StreamMode};
use super::structures::{CompressionMethod, EntryOffset, ZipEntry};

/// Entries above this size are buffered on a background task.
pub const DEFAULT_THREADING_THRESHOLD: usize = 10_000;

/// How a container is opened and how its streams are created.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Skip the central directory and rebuild the table by scanning.
    pub force_recovery: bool,
    /// Read whole entries into memory when a stream is created.
    pub use_buffered_stream: bool,
    pub threading_threshold: usize,
    /// Allow buffering on a background task; off for constrained runtimes.
    pub threaded_buffering: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            force_recovery: false,
            use_buffered_stream: true,
            threading_threshold: DEFAULT_THREADING_THRESHOLD,
            threaded_buffering: true,
        }
    }
}

/// An opened container.
pub struct ZipFile<R: ReadAt + 'static> {
    parser: ZipParser<R>,
    entries: Mutex<HashMap<String, ZipEntry>>,
    lock: IoLock,
    options: ReaderOptions,
}

impl<R: ReadAt + 'static> ZipFile<R> {
    /// Open a container, reading the central directory or, with
    /// `force_recovery`, scanning for local headers.
    pub async fn open(reader: Arc<R>, options: ReaderOptions) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = if options.force_recovery {
            let entries = recover(parser.reader()).await?;
            info!(entries = entries.len(), "recovery scan finished");
            entries
        } else {
            parser.read_cen().await?
        };

        Ok(Self {
            parser,
            entries: Mutex::new(entries),
            lock: IoLock::default(),
            options,
        })
    }

    /// Open normally and fall back to a recovery scan when the container
    /// structure is damaged.
    pub async fn open_or_recover(reader: Arc<R>, options: ReaderOptions) -> Result<Self> {
        match Self::open(reader.clone(), options.clone()).await {
            Err(e) if e.is_corruption() && !options.force_recovery => {
                warn!(error = %e, "central directory unusable, scanning for entries");
                let options = ReaderOptions {
                    force_recovery: true,
                    ..options
                };
                Self::open(reader, options).await
            }
            other => other,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, ZipEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_recovery_mode(&self) -> bool {
        self.options.force_recovery
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> Vec<ZipEntry> {
        let mut entries: Vec<ZipEntry> = self.table().values().cloned().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    pub fn entry(&self, name: &str) -> Option<ZipEntry> {
        self.table().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Replace the underlying source, keeping the entry table.
    pub fn set_reader(&mut self, reader: Arc<R>) {
        self.parser = ZipParser::new(reader);
    }

    /// Look up an entry and make sure its data offset is known.
    async fn resolve(&self, name: &str) -> Result<ZipEntry> {
        let mut entry = self
            .entry(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;

        if !entry.offset.is_resolved() {
            {
                let _guard = self.lock.lock().await;
                self.parser
                    .read_loc(&mut entry, self.options.force_recovery)
                    .await?;
            }
            self.table().insert(entry.path.clone(), entry.clone());
        }
        Ok(entry)
    }

    /// Stream for general consumption.
    ///
    /// Stored entries come back raw. Encrypted entries with a digest are
    /// decrypted when the password checks out and returned raw otherwise.
    pub async fn get_input_stream(
        &self,
        name: &str,
        data: Option<&EncryptionData>,
        is_encrypted: bool,
    ) -> Result<EntryStream> {
        let entry = self.resolve(name).await?;

        let mut need_raw = entry.method == CompressionMethod::Stored;
        if let Some(data) = data.filter(|d| is_encrypted && d.has_digest()) {
            need_raw = !self.check_password(&entry, data).await?;
        }

        let mode = if need_raw {
            StreamMode::Raw
        } else {
            StreamMode::Data
        };
        self.create_stream(&entry, data, mode, is_encrypted, self.options.use_buffered_stream, "")
            .await
    }

    /// Decoded content, failing instead of falling back to raw bytes.
    pub async fn get_data_stream(
        &self,
        name: &str,
        data: Option<&EncryptionData>,
        is_encrypted: bool,
    ) -> Result<EntryStream> {
        let entry = self.resolve(name).await?;

        let need_raw = if is_encrypted {
            let data =
                data.ok_or_else(|| ZipError::zip("Encrypted stream without encryption data!"))?;
            if data.has_digest() && !self.check_password(&entry, data).await? {
                return Err(ZipError::WrongPassword);
            }
            false
        } else {
            entry.method == CompressionMethod::Stored
        };

        let mode = if need_raw {
            StreamMode::Raw
        } else {
            StreamMode::Data
        };
        self.create_stream(&entry, data, mode, is_encrypted, self.options.use_buffered_stream, "")
            .await
    }

    /// The stored bytes, whatever the entry holds.
    pub async fn get_raw_data(
        &self,
        name: &str,
        data: Option<&EncryptionData>,
        is_encrypted: bool,
        use_buffered_stream: bool,
    ) -> Result<EntryStream> {
        let entry = self.resolve(name).await?;
        self.create_stream(&entry, data, StreamMode::Raw, is_encrypted, use_buffered_stream, "")
            .await
    }

    /// Encryption header followed by the stored bytes, suitable for copying
    /// an encrypted stream into another package untouched.
    pub async fn get_wrapped_raw_stream(
        &self,
        name: &str,
        data: Option<&EncryptionData>,
        media_type: &str,
    ) -> Result<EntryStream> {
        let data = data.ok_or(ZipError::NoEncryption)?;
        let entry = self.resolve(name).await?;
        self.create_stream(&entry, Some(data), StreamMode::WrappedRaw, true, true, media_type)
            .await
    }

    /// Whether `data` decrypts the entry. False without a key.
    pub async fn has_valid_password(&self, name: &str, data: &EncryptionData) -> Result<bool> {
        let entry = self.resolve(name).await?;
        self.check_password(&entry, data).await
    }

    async fn check_password(&self, entry: &ZipEntry, data: &EncryptionData) -> Result<bool> {
        if data.key.is_empty() {
            return Ok(false);
        }

        let offset = data_offset(entry)?;
        let len = entry.stored_size().min(DIGEST_DECRYPT_LENGTH as u64) as usize;
        let mut prefix = vec![0u8; len];
        let n = {
            let _guard = self.lock.lock().await;
            read_full_at(self.parser.reader().as_ref(), offset, &mut prefix).await?
        };
        prefix.truncate(n);

        let valid = has_valid_password(&prefix, data)?;
        debug!(path = %entry.path, valid, "password check");
        Ok(valid)
    }

    async fn create_stream(
        &self,
        entry: &ZipEntry,
        data: Option<&EncryptionData>,
        mode: StreamMode,
        is_encrypted: bool,
        buffered: bool,
        media_type: &str,
    ) -> Result<EntryStream> {
        let source: Arc<dyn ReadAt> = self.parser.reader().clone();
        let start = data_offset(entry)?;
        let len = entry.stored_size();
        let recovery = self.options.force_recovery;

        let reader = match mode {
            StreamMode::Raw => EntryReader::raw(source, self.lock.clone(), start, len, Vec::new()),
            StreamMode::WrappedRaw => {
                let data = data.ok_or(ZipError::NoEncryption)?;
                let header = EncryptionHeader::from_data(data, entry.size as u32, media_type).write();
                EntryReader::raw(source, self.lock.clone(), start, len, header)
            }
            StreamMode::Data => match data.filter(|_| is_encrypted) {
                Some(data) => {
                    let cipher = get_cipher(data, false)?;
                    EntryReader::data(
                        source,
                        self.lock.clone(),
                        start,
                        len,
                        Some(cipher),
                        true,
                        None,
                        entry.size,
                        recovery,
                    )
                }
                None if is_encrypted => {
                    return Err(ZipError::zip("Encrypted stream without encryption data!"));
                }
                None => EntryReader::data(
                    source,
                    self.lock.clone(),
                    start,
                    len,
                    None,
                    entry.method == CompressionMethod::Deflate,
                    Some((entry.crc, entry.size)),
                    entry.size,
                    recovery,
                ),
            },
        };

        if !buffered {
            return Ok(EntryStream::direct(reader));
        }
        EntryStream::buffered(
            reader,
            self.options.threading_threshold,
            self.options.threaded_buffering,
        )
        .await
    }
}

fn data_offset(entry: &ZipEntry) -> Result<u64> {
    match entry.offset {
        EntryOffset::Data(pos) => Ok(pos),
        EntryOffset::Header(_) => Err(ZipError::zip_io("Entry data offset is not resolved")),
    }
}

/// Open a stand-alone wrapped raw stream (encryption header followed by
/// encrypted data) for reading its decoded content.
///
/// Fails with [`ZipError::WrongPassword`] when the key is empty or does not
/// match the stored digest.
pub async fn get_data_from_raw_stream<S: ReadAt + 'static>(
    source: Arc<S>,
    data: &EncryptionData,
) -> Result<EntryStream> {
    if data.key.is_empty() {
        return Err(ZipError::WrongPassword);
    }

    let mut fixed = vec![0u8; HEADER_SIZE];
    if read_full_at(source.as_ref(), 0, &mut fixed).await? < HEADER_SIZE {
        return Err(ZipError::zip_io("Truncated encryption header!"));
    }
    let var_len: usize = (0..4)
        .map(|i| u16::from_le_bytes([fixed[30 + 2 * i], fixed[31 + 2 * i]]) as usize)
        .sum();
    let mut header_bytes = vec![0u8; HEADER_SIZE + var_len];
    let n = read_full_at(source.as_ref(), 0, &mut header_bytes).await?;
    header_bytes.truncate(n);
    let (header, header_len) = EncryptionHeader::read(&header_bytes)?;

    let body_len = source.size().saturating_sub(header_len as u64);
    if data.has_digest() {
        let mut prefix = vec![0u8; body_len.min(DIGEST_DECRYPT_LENGTH as u64) as usize];
        let n = read_full_at(source.as_ref(), header_len as u64, &mut prefix).await?;
        prefix.truncate(n);
        if !has_valid_password(&prefix, data)? {
            return Err(ZipError::WrongPassword);
        }
    }

    let cipher = get_cipher(data, false)?;
    let reader = EntryReader::data(
        source,
        IoLock::default(),
        header_len as u64,
        body_len,
        Some(cipher),
        true,
        None,
        header.size as u64,
        false,
    );
    Ok(EntryStream::direct(reader))
}
