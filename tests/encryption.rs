mod common;

use std::sync::Arc;

use common::*;
use docpack::crypto::{CipherId, EncryptionData, EncryptionHeader, HEADER_MAGIC, seal};
use docpack::zip::{EntryOptions, StreamMode, ZipWriter, crc32, get_data_from_raw_stream};
use docpack::{MemoryReader, ReaderOptions, ZipError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PASSWORD: &str = "open sesame";

fn key_data(cipher: CipherId) -> EncryptionData {
    EncryptionData::for_password(PASSWORD, cipher).with_iteration_count(32)
}

/// A package with one plain and one encrypted entry. The encrypted entry is
/// stored, so its recorded size and CRC are those of the sealed bytes.
fn encrypted_package(plain: &[u8], data: &mut EncryptionData) -> Vec<u8> {
    let sealed = seal(plain, data).unwrap();
    let mut writer = ZipWriter::new();
    writer
        .add_entry("mimetype", b"application/vnd.oasis.opendocument.text", EntryOptions::stored())
        .unwrap();
    writer
        .add_raw_entry(
            "content.xml",
            &sealed,
            sealed.len() as u64,
            crc32(&sealed),
            EntryOptions::stored(),
        )
        .unwrap();
    writer.finish().unwrap()
}

#[tokio::test]
async fn right_password_decrypts() {
    for cipher in [CipherId::AesCbcW3cPadding, CipherId::BlowfishCfb8] {
        let plain = b"<office:text>secret</office:text>".repeat(40);
        let mut data = key_data(cipher);
        let zip = open(encrypted_package(&plain, &mut data), ReaderOptions::default())
            .await
            .unwrap();

        assert!(zip.has_valid_password("content.xml", &data).await.unwrap());
        let mut stream = zip.get_data_stream("content.xml", Some(&data), true).await.unwrap();
        assert_eq!(stream.mode(), StreamMode::Data);
        assert_eq!(stream.read_to_end().await.unwrap(), plain);

        let mut stream = zip.get_input_stream("content.xml", Some(&data), true).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), plain);
    }
}

#[tokio::test]
async fn wrong_password_is_reported() {
    let plain = b"confidential".repeat(100);
    let mut data = key_data(CipherId::AesCbcW3cPadding);
    let bytes = encrypted_package(&plain, &mut data);
    let zip = open(bytes, ReaderOptions::default()).await.unwrap();
    let wrong = data.clone().with_password("guess");

    assert!(!zip.has_valid_password("content.xml", &wrong).await.unwrap());
    assert!(matches!(
        zip.get_data_stream("content.xml", Some(&wrong), true).await,
        Err(ZipError::WrongPassword)
    ));

    // the general purpose stream falls back to the stored bytes
    let stored_len = zip.entry("content.xml").unwrap().compressed_size;
    let mut raw = zip.get_input_stream("content.xml", Some(&wrong), true).await.unwrap();
    assert_eq!(raw.mode(), StreamMode::Raw);
    assert_eq!(raw.read_to_end().await.unwrap().len() as u64, stored_len);

    let mut no_key = data;
    no_key.key.clear();
    assert!(!zip.has_valid_password("content.xml", &no_key).await.unwrap());
}

#[tokio::test]
async fn encrypted_entry_needs_key_data() {
    let mut data = key_data(CipherId::BlowfishCfb8);
    let zip = open(encrypted_package(b"abc", &mut data), ReaderOptions::default())
        .await
        .unwrap();

    assert!(matches!(
        zip.get_data_stream("content.xml", None, true).await,
        Err(ZipError::Zip(_))
    ));
    assert!(matches!(
        zip.get_wrapped_raw_stream("mimetype", None, "").await,
        Err(ZipError::NoEncryption)
    ));
}

#[tokio::test]
async fn wrapped_raw_stream_round_trips() {
    let plain = b"<office:document-styles/>".repeat(64);
    let mut data = key_data(CipherId::AesCbcW3cPadding);
    let zip = open(encrypted_package(&plain, &mut data), ReaderOptions::default())
        .await
        .unwrap();

    let mut wrapped = zip
        .get_wrapped_raw_stream("content.xml", Some(&data), "text/xml")
        .await
        .unwrap();
    assert_eq!(wrapped.mode(), StreamMode::WrappedRaw);
    let bytes = wrapped.read_to_end().await.unwrap();
    assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), HEADER_MAGIC);

    let (header, header_len) = EncryptionHeader::read(&bytes).unwrap();
    // the header carries the size recorded for the entry
    assert_eq!(header.size as u64, zip.entry("content.xml").unwrap().size);
    assert_eq!(header.media_type, "text/xml");
    assert_eq!(header.salt, data.salt);
    assert_eq!(header.init_vector, data.init_vector);
    assert_eq!(header.digest, data.digest);
    assert!(header_len < bytes.len());

    let source = Arc::new(MemoryReader::new(bytes.clone()));
    let mut stream = get_data_from_raw_stream(source, &data).await.unwrap();
    assert_eq!(stream.read_to_end().await.unwrap(), plain);

    let source = Arc::new(MemoryReader::new(bytes));
    let wrong = data.with_password("nope");
    assert!(matches!(
        get_data_from_raw_stream(source, &wrong).await,
        Err(ZipError::WrongPassword)
    ));
}

#[tokio::test]
async fn random_payloads_survive_sealing() {
    let mut rng = StdRng::seed_from_u64(42);
    for round in 0..6 {
        let cipher = if round % 2 == 0 {
            CipherId::AesCbcW3cPadding
        } else {
            CipherId::BlowfishCfb8
        };
        let len = rng.gen_range(0..5000);
        let plain: Vec<u8> = (0..len).map(|_| rng.r#gen::<u8>()).collect();
        let mut data = key_data(cipher);
        let zip = open(encrypted_package(&plain, &mut data), ReaderOptions::default())
            .await
            .unwrap();
        let mut stream = zip.get_data_stream("content.xml", Some(&data), true).await.unwrap();
        assert_eq!(stream.read_to_end().await.unwrap(), plain, "round {round}");
    }
}
