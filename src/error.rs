//! Error types for docpack.
//!
//! The container side mirrors the conditions a package consumer has to tell
//! apart: structural corruption, a damaged local stream, a wrong password and
//! a request that needs encryption data where there is none.

use std::io;
use thiserror::Error;

/// Result type alias for package operations.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Errors raised while reading or writing a package container.
#[derive(Error, Debug)]
pub enum ZipError {
    /// The archive structure is corrupted (END record, central directory).
    #[error("zip error: {0}")]
    Zip(String),

    /// A local header or entry stream is damaged, or crypto setup failed.
    #[error("zip I/O error: {0}")]
    ZipIo(String),

    /// The supplied key does not decrypt the stream.
    #[error("wrong password")]
    WrongPassword,

    /// A wrapped raw stream was requested for an entry without encryption data.
    #[error("entry is not encrypted")]
    NoEncryption,

    /// No entry with this path exists in the archive.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Failure of the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZipError {
    pub(crate) fn zip(msg: impl Into<String>) -> Self {
        ZipError::Zip(msg.into())
    }

    pub(crate) fn zip_io(msg: impl Into<String>) -> Self {
        ZipError::ZipIo(msg.into())
    }

    /// Returns true for failures that a recovery scan may work around.
    pub fn is_corruption(&self) -> bool {
        matches!(self, ZipError::Zip(_) | ZipError::ZipIo(_))
    }
}

/// Errors raised by the edit engine.
#[derive(Error, Debug)]
pub enum EditError {
    /// A position refers to a paragraph that no longer exists, or lies past its end.
    #[error("position refers to a deleted paragraph or lies outside it")]
    InvalidPaM,

    /// One of the selection ends is invalid.
    #[error("selection refers to deleted content")]
    InvalidSelection,

    /// Paragraph index outside the document.
    #[error("paragraph {0} is out of range")]
    ParagraphOutOfRange(usize),

    /// The view is read-only.
    #[error("view is read-only")]
    ReadOnly,

    /// A serialized text object could not be read or written.
    #[error("text object error: {0}")]
    TextObject(#[from] serde_json::Error),

    /// Failure reading imported text.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for edit operations.
pub type EditResult<T> = std::result::Result<T, EditError>;

/// Errors of the proofreading client. They never leave the client: every
/// failure degrades to an empty proofreading result.
#[derive(Error, Debug)]
pub enum LinguError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),
}
