//! Random-access byte sources.
//!
//! Everything the container reader touches goes through [`ReadAt`], so an
//! archive can live in a file, in memory, or anywhere else that can serve a
//! byte range at an offset.

mod grabber;
mod local;
mod memory;

pub use grabber::{ByteGrabber, MemoryByteGrabber};
pub use local::LocalFileReader;
pub use memory::MemoryReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read; fewer than `buf.len()` only at the
    /// end of the source.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;
}

/// Fill `buf` from `offset`, looping over short reads. Returns the number of
/// bytes actually available.
pub async fn read_full_at<R: ReadAt + ?Sized>(
    reader: &R,
    offset: u64,
    buf: &mut [u8],
) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read_at(offset + filled as u64, &mut buf[filled..])
            .await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
