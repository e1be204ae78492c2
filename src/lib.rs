//! # docpack
//!
//! Reading office document packages and editing their rich text.
//!
//! The package side opens ZIP containers from any random-access source,
//! rebuilds the entry table of damaged containers by scanning for local
//! headers, and decrypts package streams protected with a password-derived
//! key. The editing side models paragraphs of attributed text with a
//! selection, undo groups, fields and spell checking hooks.
//!
//! ## Features
//!
//! - Central directory parsing with a fallback recovery scan
//! - STORED and DEFLATE entries, raw or decoded, optionally buffered
//! - AES-CBC and Blowfish-CFB8 package encryption with password checks
//! - An edit engine with undo, attribute runs, fields and online spelling
//! - A LanguageTool/Duden proofreading client
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use docpack::{LocalFileReader, ReaderOptions, ZipFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let reader = Arc::new(LocalFileReader::new(Path::new("document.odt"))?);
//!     let zip = ZipFile::open_or_recover(reader, ReaderOptions::default()).await?;
//!     for entry in zip.entries() {
//!         println!("{}", entry.path);
//!     }
//!     let mut stream = zip.get_input_stream("content.xml", None, false).await?;
//!     let content = stream.read_to_end().await?;
//!     println!("{} bytes of content", content.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod crypto;
pub mod edit;
pub mod error;
pub mod io;
pub mod lingu;
pub mod logging;
pub mod zip;

pub use cli::Cli;
pub use crypto::{CipherId, DigestId, EncryptionData};
pub use edit::{EditEngine, EditView};
pub use error::{EditError, EditResult, LinguError, Result, ZipError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use zip::{ReaderOptions, ZipEntry, ZipFile, ZipWriter};
