//! Container reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: record layouts, constants and the entry type
//! - [`parser`]: END record search, central directory and local header parsing
//! - [`recovery`]: signature scan that rebuilds the entry table of a damaged container
//! - [`inflate`]: incremental DEFLATE decoding with an explicit end state
//! - [`stream`]: raw, decoded and wrapped-raw entry streams
//! - [`archive`]: the [`ZipFile`] entry point tying these together
//! - [`writer`]: a small container writer
//!
//! ## Limitations
//!
//! - No ZIP64 and no multi-disk archives
//! - STORED and DEFLATE only
//! - Native ZIP encryption is rejected; package streams are encrypted with
//!   [`crate::crypto`] instead

pub mod archive;
pub mod inflate;
pub mod parser;
pub mod recovery;
pub mod stream;
pub mod structures;
pub mod writer;

pub use archive::{DEFAULT_THREADING_THRESHOLD, ReaderOptions, ZipFile, get_data_from_raw_stream};
pub use inflate::{Inflater, crc32};
pub use parser::ZipParser;
pub use recovery::recover;
pub use stream::{EntryReader, EntryStream, IoLock, StreamMode};
pub use structures::*;
pub use writer::{EntryOptions, ZipWriter};
