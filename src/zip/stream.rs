//! Entry streams.
//!
//! An [`EntryReader`] pulls one entry's bytes out of the shared source,
//! decrypting and inflating as its mode requires. [`EntryStream`] wraps it
//! either directly or behind a buffer that is filled once, on a background
//! task for large entries.

use std::sync::Arc;

use bytes::Bytes;
use flate2::Crc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::crypto::CipherContext;
use crate::error::{Result, ZipError};
use crate::io::{ReadAt, read_full_at};

use super::inflate::Inflater;

/// Lock shared by an archive and every stream it hands out. Held for each
/// positioned read against the underlying source.
pub type IoLock = Arc<Mutex<()>>;

const READ_CHUNK: usize = 32 * 1024;

/// What an entry stream delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// The bytes as stored in the container.
    Raw,
    /// Decrypted and inflated content.
    Data,
    /// An encryption header followed by the stored bytes.
    WrappedRaw,
}

/// Streaming reader over one region of the source.
pub struct EntryReader {
    source: Arc<dyn ReadAt>,
    lock: IoLock,
    mode: StreamMode,
    start: u64,
    len: u64,
    pos: u64,
    header: Vec<u8>,
    header_pos: usize,
    cipher: Option<CipherContext>,
    inflater: Option<Inflater>,
    staged: Vec<u8>,
    staged_pos: usize,
    input_done: bool,
    out: Vec<u8>,
    out_pos: usize,
    done: bool,
    crc: Crc,
    /// Expected CRC and size, checked once the data is exhausted.
    check: Option<(u32, u64)>,
    expected_size: u64,
    delivered: u64,
    recovery: bool,
}

impl EntryReader {
    /// Stored bytes, optionally behind a header (wrapped raw).
    pub fn raw(source: Arc<dyn ReadAt>, lock: IoLock, start: u64, len: u64, header: Vec<u8>) -> Self {
        let mode = if header.is_empty() {
            StreamMode::Raw
        } else {
            StreamMode::WrappedRaw
        };
        let mut reader = Self::base(source, lock, mode, start, len);
        reader.expected_size = header.len() as u64 + len;
        reader.header = header;
        reader
    }

    /// Decoded content: decrypted when a cipher is given, inflated when
    /// `inflate` is set, CRC-checked when `check` is given.
    #[allow(clippy::too_many_arguments)]
    pub fn data(
        source: Arc<dyn ReadAt>,
        lock: IoLock,
        start: u64,
        len: u64,
        cipher: Option<CipherContext>,
        inflate: bool,
        check: Option<(u32, u64)>,
        expected_size: u64,
        recovery: bool,
    ) -> Self {
        let mut reader = Self::base(source, lock, StreamMode::Data, start, len);
        reader.cipher = cipher;
        reader.inflater = inflate.then(Inflater::new);
        reader.check = check;
        reader.expected_size = expected_size;
        reader.recovery = recovery;
        reader
    }

    fn base(source: Arc<dyn ReadAt>, lock: IoLock, mode: StreamMode, start: u64, len: u64) -> Self {
        Self {
            source,
            lock,
            mode,
            start,
            len,
            pos: 0,
            header: Vec::new(),
            header_pos: 0,
            cipher: None,
            inflater: None,
            staged: Vec::new(),
            staged_pos: 0,
            input_done: len == 0,
            out: Vec::new(),
            out_pos: 0,
            done: false,
            crc: Crc::new(),
            check: None,
            expected_size: len,
            delivered: 0,
            recovery: false,
        }
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Bytes still expected from this stream.
    pub fn available(&self) -> u64 {
        self.expected_size.saturating_sub(self.delivered)
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.header_pos < self.header.len() {
            let n = buf.len().min(self.header.len() - self.header_pos);
            buf[..n].copy_from_slice(&self.header[self.header_pos..self.header_pos + n]);
            self.header_pos += n;
            self.delivered += n as u64;
            return Ok(n);
        }

        self.fill().await?;
        if self.out_pos >= self.out.len() {
            self.verify()?;
            return Ok(0);
        }

        let n = buf.len().min(self.out.len() - self.out_pos);
        buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
        self.out_pos += n;
        self.delivered += n as u64;
        Ok(n)
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(self.available().min(64 * 1024 * 1024) as usize);
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
        }
        Ok(data)
    }

    /// Next slice of the region, read under the io lock.
    async fn read_region(&mut self) -> Result<Vec<u8>> {
        let want = (self.len - self.pos).min(READ_CHUNK as u64) as usize;
        let mut chunk = vec![0u8; want];
        let n = {
            let _guard = self.lock.lock().await;
            read_full_at(self.source.as_ref(), self.start + self.pos, &mut chunk).await?
        };
        chunk.truncate(n);
        self.pos += n as u64;
        if n < want {
            warn!(missing = want - n, "entry data ends early");
            self.pos = self.len;
        }
        if self.pos >= self.len {
            self.input_done = true;
        }
        Ok(chunk)
    }

    /// Refill `out` unless the stream is exhausted.
    async fn fill(&mut self) -> Result<()> {
        while self.out_pos >= self.out.len() && !self.done {
            self.out.clear();
            self.out_pos = 0;

            if self.staged_pos >= self.staged.len() && !self.input_done {
                let chunk = self.read_region().await?;
                self.staged = match self.cipher.as_mut() {
                    Some(cipher) => {
                        let mut plain = cipher.update(&chunk)?;
                        if self.input_done {
                            plain.extend(cipher.finalize()?);
                        }
                        plain
                    }
                    None => chunk,
                };
                self.staged_pos = 0;
            }

            match self.inflater.as_mut() {
                None => {
                    self.out = self.staged.split_off(self.staged_pos);
                    self.staged.clear();
                    self.staged_pos = 0;
                    if self.out.is_empty() && self.input_done {
                        self.done = true;
                    }
                }
                Some(inflater) => {
                    self.out.resize(READ_CHUNK, 0);
                    let progress = inflater.inflate(&self.staged[self.staged_pos..], &mut self.out)?;
                    self.staged_pos += progress.consumed;
                    self.out.truncate(progress.produced);

                    if inflater.finished() {
                        self.done = true;
                    } else if progress.produced == 0
                        && self.staged_pos >= self.staged.len()
                        && self.input_done
                    {
                        if !self.recovery {
                            return Err(ZipError::zip_io("The stream seems to be broken!"));
                        }
                        warn!("deflate stream truncated");
                        self.done = true;
                    }
                }
            }

            self.crc.update(&self.out);
        }
        Ok(())
    }

    fn verify(&mut self) -> Result<()> {
        if let Some((crc, size)) = self.check.take() {
            if self.crc.sum() != crc || self.crc.amount() as u64 != size {
                if !self.recovery {
                    return Err(ZipError::zip_io("The stream seems to be broken!"));
                }
                warn!("CRC mismatch tolerated in recovery mode");
            }
        }
        Ok(())
    }
}

enum Inner {
    Direct(Box<EntryReader>),
    Buffered {
        data: Bytes,
        pos: usize,
    },
    Threaded {
        task: Option<JoinHandle<Result<Bytes>>>,
        data: Bytes,
        pos: usize,
        size_hint: u64,
    },
}

/// Stream over one entry as handed out by the archive.
pub struct EntryStream {
    mode: StreamMode,
    inner: Inner,
}

impl EntryStream {
    pub fn direct(reader: EntryReader) -> Self {
        Self {
            mode: reader.mode(),
            inner: Inner::Direct(Box::new(reader)),
        }
    }

    /// Read the whole entry into memory, on a spawned task when it is larger
    /// than `threading_threshold` and `threaded` is set.
    pub async fn buffered(mut reader: EntryReader, threading_threshold: usize, threaded: bool) -> Result<Self> {
        let mode = reader.mode();
        let size_hint = reader.available();
        if threaded && size_hint > threading_threshold as u64 {
            debug!(size = size_hint, "buffering entry on a background task");
            let task = tokio::spawn(async move { reader.read_to_end().await.map(Bytes::from) });
            return Ok(Self {
                mode,
                inner: Inner::Threaded {
                    task: Some(task),
                    data: Bytes::new(),
                    pos: 0,
                    size_hint,
                },
            });
        }

        let data = Bytes::from(reader.read_to_end().await?);
        Ok(Self {
            mode,
            inner: Inner::Buffered { data, pos: 0 },
        })
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn is_buffered(&self) -> bool {
        !matches!(self.inner, Inner::Direct(_))
    }

    pub fn is_threaded(&self) -> bool {
        matches!(self.inner, Inner::Threaded { .. })
    }

    pub fn available(&self) -> u64 {
        match &self.inner {
            Inner::Direct(reader) => reader.available(),
            Inner::Buffered { data, pos } => (data.len() - pos) as u64,
            Inner::Threaded {
                task: Some(_),
                size_hint,
                ..
            } => *size_hint,
            Inner::Threaded { data, pos, .. } => (data.len() - pos) as u64,
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.inner {
            Inner::Direct(reader) => reader.read(buf).await,
            Inner::Buffered { data, pos } => Ok(copy_out(data, pos, buf)),
            Inner::Threaded { task, data, pos, .. } => {
                if let Some(handle) = task.take() {
                    *data = handle
                        .await
                        .map_err(|e| ZipError::zip_io(format!("buffering task failed: {e}")))??;
                }
                Ok(copy_out(data, pos, buf))
            }
        }
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }
}

fn copy_out(data: &Bytes, pos: &mut usize, buf: &mut [u8]) -> usize {
    let n = buf.len().min(data.len() - *pos);
    buf[..n].copy_from_slice(&data[*pos..*pos + n]);
    *pos += n;
    n
}
