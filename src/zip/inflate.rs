//! Incremental raw DEFLATE decoding.
//!
//! Wraps `flate2::Decompress` so the end of a stream is an explicit state
//! rather than something discovered through an error.

use flate2::{Crc, Decompress, FlushDecompress, Status};

use crate::error::{Result, ZipError};

/// Progress of one [`Inflater::inflate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InflateProgress {
    pub consumed: usize,
    pub produced: usize,
}

pub struct Inflater {
    inner: Decompress,
    finished: bool,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Inflater {
    /// Raw deflate, no zlib wrapper, as stored in ZIP entries.
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            finished: false,
        }
    }

    /// The final deflate block has been decoded.
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn total_out(&self) -> u64 {
        self.inner.total_out()
    }

    pub fn reset(&mut self) {
        self.inner.reset(false);
        self.finished = false;
    }

    pub fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<InflateProgress> {
        if self.finished {
            return Ok(InflateProgress {
                consumed: 0,
                produced: 0,
            });
        }

        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| ZipError::zip_io(format!("invalid deflate data: {e}")))?;
        if status == Status::StreamEnd {
            self.finished = true;
        }

        Ok(InflateProgress {
            consumed: (self.inner.total_in() - before_in) as usize,
            produced: (self.inner.total_out() - before_out) as usize,
        })
    }
}

/// Running size and CRC-32 of decoded data, fed block by block.
pub struct SizeAndCrc {
    inflater: Inflater,
    crc: Crc,
    out: Vec<u8>,
}

impl SizeAndCrc {
    pub fn new(block_size: usize) -> Self {
        Self {
            inflater: Inflater::new(),
            crc: Crc::new(),
            out: vec![0u8; block_size.max(1)],
        }
    }

    pub fn finished(&self) -> bool {
        self.inflater.finished()
    }

    /// Decode one block of compressed input. Corrupt input stops the count
    /// where the damage starts.
    pub fn update(&mut self, mut input: &[u8]) {
        loop {
            match self.inflater.inflate(input, &mut self.out) {
                Ok(progress) => {
                    self.crc.update(&self.out[..progress.produced]);
                    input = &input[progress.consumed..];
                    if self.inflater.finished()
                        || (progress.produced == 0 && progress.consumed == 0)
                    {
                        break;
                    }
                }
                Err(_) => {
                    self.inflater.finished = true;
                    break;
                }
            }
        }
    }

    pub fn size(&self) -> u64 {
        self.crc.amount() as u64
    }

    pub fn crc(&self) -> u32 {
        self.crc.sum()
    }
}

/// CRC-32 of a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}
