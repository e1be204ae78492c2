mod common;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use common::*;
use docpack::zip::{EntryOptions, StreamMode, ZipWriter, crc32};
use docpack::{LocalFileReader, ReaderOptions, ZipError, ZipFile};

#[tokio::test]
async fn stored_entry_reads_back() {
    let bytes = single_entry("a.txt", b"hello", EntryOptions::stored());
    let zip = open(bytes, ReaderOptions::default()).await.unwrap();

    assert_eq!(zip.len(), 1);
    let entry = zip.entry("a.txt").unwrap();
    assert_eq!(entry.size, 5);
    assert_eq!(entry.crc, HELLO_CRC);

    let data = read_entry(&zip, "a.txt").await;
    assert_eq!(data, b"hello");
    assert_eq!(crc32(&data), HELLO_CRC);
}

#[tokio::test]
async fn entries_are_sorted_and_decoded() {
    let zip = open(sample_package(), ReaderOptions::default()).await.unwrap();
    let names: Vec<String> = zip.entries().into_iter().map(|e| e.path).collect();
    assert_eq!(names, ["Pictures/logo.png", "content.xml", "mimetype"]);

    let content = read_entry(&zip, "content.xml").await;
    assert_eq!(content.len(), CONTENT.len() * CONTENT_REPEAT);
    assert!(content.starts_with(b"<office:document-content>"));
    assert_eq!(
        read_entry(&zip, "mimetype").await,
        b"application/vnd.oasis.opendocument.text"
    );
    assert_eq!(read_entry(&zip, "Pictures/logo.png").await, [0x89, b'P', b'N', b'G', 0, 1, 2, 3]);
}

#[tokio::test]
async fn raw_and_data_streams_differ_for_deflated_entries() {
    let zip = open(sample_package(), ReaderOptions::default()).await.unwrap();
    let entry = zip.entry("content.xml").unwrap();

    let mut raw = zip.get_raw_data("content.xml", None, false, false).await.unwrap();
    assert_eq!(raw.mode(), StreamMode::Raw);
    assert!(!raw.is_buffered());
    assert_eq!(raw.read_to_end().await.unwrap().len() as u64, entry.compressed_size);

    let mut data = zip.get_data_stream("content.xml", None, false).await.unwrap();
    assert_eq!(data.mode(), StreamMode::Data);
    assert_eq!(data.read_to_end().await.unwrap().len() as u64, entry.size);
}

#[tokio::test]
async fn large_entries_buffer_on_a_task() {
    let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let bytes = single_entry("big.bin", &body, EntryOptions::deflated());

    let zip = open(bytes.clone(), ReaderOptions::default()).await.unwrap();
    let mut stream = zip.get_input_stream("big.bin", None, false).await.unwrap();
    assert!(stream.is_threaded());
    assert_eq!(stream.read_to_end().await.unwrap(), body);

    let options = ReaderOptions {
        threaded_buffering: false,
        ..ReaderOptions::default()
    };
    let zip = open(bytes, options).await.unwrap();
    let mut stream = zip.get_input_stream("big.bin", None, false).await.unwrap();
    assert!(stream.is_buffered());
    assert!(!stream.is_threaded());
    assert_eq!(stream.read_to_end().await.unwrap(), body);
}

#[tokio::test]
async fn preamble_is_tolerated() {
    let mut writer = ZipWriter::with_preamble(b"#!/bin/sh\nexit 0\n");
    writer.add_entry("a.txt", b"hello", EntryOptions::deflated()).unwrap();
    let zip = open(writer.finish().unwrap(), ReaderOptions::default()).await.unwrap();
    assert_eq!(read_entry(&zip, "a.txt").await, b"hello");
}

#[tokio::test]
async fn trailing_comment_is_tolerated() {
    let mut writer = ZipWriter::new();
    writer.set_comment("written by a test");
    writer.add_entry("a.txt", b"hello", EntryOptions::stored()).unwrap();
    let zip = open(writer.finish().unwrap(), ReaderOptions::default()).await.unwrap();
    assert!(zip.contains("a.txt"));
}

#[tokio::test]
async fn missing_entry_and_broken_archives() {
    let zip = open(sample_package(), ReaderOptions::default()).await.unwrap();
    assert!(matches!(
        zip.get_input_stream("styles.xml", None, false).await,
        Err(ZipError::EntryNotFound(name)) if name == "styles.xml"
    ));

    assert!(matches!(
        open(vec![0u8; 10], ReaderOptions::default()).await,
        Err(ZipError::Zip(_))
    ));
    assert!(matches!(
        open(b"not a zip file at all, just some text".to_vec(), ReaderOptions::default()).await,
        Err(ZipError::Zip(_))
    ));
}

#[tokio::test]
async fn corrupted_deflate_data_fails() {
    let mut bytes = sample_package();
    // mimetype record is 30 + 8 + 39 bytes, then the content.xml header
    let content_data = 30 + 8 + 39 + 30 + 11;
    bytes[content_data + 5] ^= 0xFF;
    let zip = open(bytes, ReaderOptions::default()).await.unwrap();

    let result = match zip.get_input_stream("content.xml", None, false).await {
        Ok(mut stream) => stream.read_to_end().await,
        Err(e) => Err(e),
    };
    assert!(result.is_err());
}

#[tokio::test]
async fn local_file_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&sample_package()).unwrap();
    file.flush().unwrap();

    let reader = Arc::new(LocalFileReader::new(Path::new(file.path())).unwrap());
    let zip = ZipFile::open(reader, ReaderOptions::default()).await.unwrap();
    assert_eq!(zip.len(), 3);
    let mut stream = zip.get_input_stream("mimetype", None, false).await.unwrap();
    assert_eq!(
        stream.read_to_end().await.unwrap(),
        b"application/vnd.oasis.opendocument.text"
    );
}

#[tokio::test]
async fn random_entry_sets_round_trip() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..10 {
        let mut writer = ZipWriter::new();
        let mut expected = Vec::new();
        for i in 0..rng.gen_range(0..8) {
            let len = rng.gen_range(0..3000);
            let data: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'e')).collect();
            let mut options = if rng.gen_bool(0.5) {
                EntryOptions::deflated()
            } else {
                EntryOptions::stored()
            };
            if rng.gen_bool(0.3) {
                options = options.with_data_descriptor();
            }
            let path = format!("r{round}/f{i}.txt");
            writer.add_entry(&path, &data, options).unwrap();
            expected.push((path, data.len() as u64, crc32(&data)));
        }
        expected.sort();

        let zip = open(writer.finish().unwrap(), ReaderOptions::default()).await.unwrap();
        let got: Vec<_> = zip.entries().into_iter().map(|e| (e.path, e.size, e.crc)).collect();
        assert_eq!(got, expected, "round {round}");
        for (path, size, crc) in &expected {
            let data = read_entry(&zip, path).await;
            assert_eq!(data.len() as u64, *size);
            assert_eq!(crc32(&data), *crc);
        }
    }
}
