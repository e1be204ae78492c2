//! Shared builders for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use docpack::edit::{EditEngine, EditView};
use docpack::zip::{EntryOptions, ZipWriter};
use docpack::{MemoryReader, ReaderOptions, ZipFile};

/// CRC-32 of `b"hello"`.
pub const HELLO_CRC: u32 = 0x3610_A686;

/// One repetition of the `content.xml` body in [`sample_package`].
pub const CONTENT: &[u8] = b"<office:document-content>text</office:document-content>";
/// Repetitions of [`CONTENT`] in `content.xml`.
pub const CONTENT_REPEAT: usize = 50;

/// A package with a `mimetype` first, stored, like office documents have it.
pub fn sample_package() -> Vec<u8> {
    let mut writer = ZipWriter::new();
    writer
        .add_entry(
            "mimetype",
            b"application/vnd.oasis.opendocument.text",
            EntryOptions::stored(),
        )
        .unwrap();
    writer
        .add_entry(
            "content.xml",
            &CONTENT.repeat(CONTENT_REPEAT),
            EntryOptions::deflated(),
        )
        .unwrap();
    writer
        .add_entry(
            "Pictures/logo.png",
            &[0x89, b'P', b'N', b'G', 0, 1, 2, 3],
            EntryOptions::stored().with_data_descriptor(),
        )
        .unwrap();
    writer.finish().unwrap()
}

pub fn single_entry(name: &str, data: &[u8], options: EntryOptions) -> Vec<u8> {
    let mut writer = ZipWriter::new();
    writer.add_entry(name, data, options).unwrap();
    writer.finish().unwrap()
}

/// Offset of the central directory, read from the END record.
pub fn cen_offset(bytes: &[u8]) -> usize {
    let end = bytes.len() - 22;
    assert_eq!(&bytes[end..end + 4], b"PK\x05\x06");
    u32::from_le_bytes([bytes[end + 16], bytes[end + 17], bytes[end + 18], bytes[end + 19]])
        as usize
}

pub async fn open(bytes: Vec<u8>, options: ReaderOptions) -> docpack::Result<ZipFile<MemoryReader>> {
    ZipFile::open(Arc::new(MemoryReader::new(bytes)), options).await
}

pub async fn read_entry(zip: &ZipFile<MemoryReader>, name: &str) -> Vec<u8> {
    let mut stream = zip.get_input_stream(name, None, false).await.unwrap();
    stream.read_to_end().await.unwrap()
}

pub fn view(text: &str) -> EditView {
    let mut engine = EditEngine::default();
    engine.set_text(text);
    EditView::new(engine)
}
