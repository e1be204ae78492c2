//! Sequential little-endian cursors.
//!
//! [`ByteGrabber`] walks a [`ReadAt`] source; [`MemoryByteGrabber`] walks a
//! buffer that is already in memory, such as a whole central directory.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use super::{ReadAt, read_full_at};

/// Cursor over a random-access source with typed integer decoding.
pub struct ByteGrabber<R: ReadAt> {
    reader: Arc<R>,
    pos: u64,
}

impl<R: ReadAt> ByteGrabber<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader, pos: 0 }
    }

    pub fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn length(&self) -> u64 {
        self.reader.size()
    }

    /// Read up to `len` bytes; the result is shorter only at the end of the source.
    pub async fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        let n = read_full_at(self.reader.as_ref(), self.pos, &mut buf).await?;
        buf.truncate(n);
        self.pos += n as u64;
        Ok(buf)
    }

    async fn read_exact<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        let n = read_full_at(self.reader.as_ref(), self.pos, &mut buf).await?;
        if n < N {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected end of stream",
            ));
        }
        self.pos += N as u64;
        Ok(buf)
    }

    pub async fn read_u16(&mut self) -> io::Result<u16> {
        Ok(u16::from_le_bytes(self.read_exact::<2>().await?))
    }

    pub async fn read_i16(&mut self) -> io::Result<i16> {
        Ok(i16::from_le_bytes(self.read_exact::<2>().await?))
    }

    pub async fn read_u32(&mut self) -> io::Result<u32> {
        Ok(u32::from_le_bytes(self.read_exact::<4>().await?))
    }

    pub async fn read_i32(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.read_exact::<4>().await?))
    }
}

/// Cursor over an in-memory buffer.
pub struct MemoryByteGrabber<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> MemoryByteGrabber<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn current_pos(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining_size(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.current_pos())
    }

    pub fn skip_bytes(&mut self, n: usize) {
        let pos = (self.current_pos() + n).min(self.cursor.get_ref().len());
        self.cursor.set_position(pos as u64);
    }

    pub fn read_bytes(&mut self, n: usize) -> io::Result<&'a [u8]> {
        if n > self.remaining_size() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected end of buffer",
            ));
        }
        let start = self.current_pos();
        let data: &'a [u8] = self.cursor.get_ref();
        self.cursor.set_position((start + n) as u64);
        Ok(&data[start..start + n])
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        self.cursor.read_u16::<LittleEndian>()
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        self.cursor.read_i16::<LittleEndian>()
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        self.cursor.read_u32::<LittleEndian>()
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        self.cursor.read_i32::<LittleEndian>()
    }

    pub fn read_signature(&mut self) -> io::Result<[u8; 4]> {
        let mut sig = [0u8; 4];
        self.cursor.read_exact(&mut sig)?;
        Ok(sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    #[tokio::test]
    async fn grabber_decodes_little_endian() {
        let data = vec![0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff, 0xff];
        let mut grabber = ByteGrabber::new(Arc::new(MemoryReader::new(data)));
        assert_eq!(grabber.read_u16().await.unwrap(), 0x1234);
        assert_eq!(grabber.read_u32().await.unwrap(), 0x1234_5678);
        assert_eq!(grabber.read_i16().await.unwrap(), -1);
        assert_eq!(grabber.position(), 8);
        assert!(grabber.read_u16().await.is_err());
    }

    #[test]
    fn memory_grabber_tracks_position() {
        let data = [1u8, 0, 2, 0, 0, 0, b'a', b'b'];
        let mut grabber = MemoryByteGrabber::new(&data);
        assert_eq!(grabber.read_u16().unwrap(), 1);
        assert_eq!(grabber.read_i32().unwrap(), 2);
        assert_eq!(grabber.remaining_size(), 2);
        assert_eq!(grabber.read_bytes(2).unwrap(), b"ab");
        assert!(grabber.read_bytes(1).is_err());
        grabber.skip_bytes(10);
        assert_eq!(grabber.current_pos(), data.len());
    }
}
