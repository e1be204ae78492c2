//! Package-level stream encryption.
//!
//! Package streams are not protected with native ZIP encryption. Instead
//! each stream is deflated, encrypted with a key derived from the password
//! and described by [`EncryptionData`]. A digest over the first kilobyte of
//! the decrypted stream lets a reader tell a wrong password from damage
//! before handing out any content.

mod cipher;
mod data;
mod digest;
mod header;

pub use cipher::{CipherContext, derive_key, get_cipher};
pub use data::{CipherId, DigestId, EncryptionData, start_key};
pub use digest::{DIGEST_LENGTH, DigestContext, StarOfficeSha1, digest_context_for_checksum};
pub use header::{EncryptionHeader, HEADER_MAGIC, HEADER_SIZE, HEADER_VERSION};

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use tracing::debug;

use crate::error::{Result, ZipError};

/// Encrypted bytes read to check a password: the digested kilobyte plus two
/// cipher blocks of slack for padding.
pub const DIGEST_DECRYPT_LENGTH: usize = DIGEST_LENGTH + 32;

/// Check `data` against the first bytes of an encrypted stream.
///
/// Without a stored digest the password cannot be checked and counts as
/// valid. An empty key is never valid.
pub fn has_valid_password(encrypted_prefix: &[u8], data: &EncryptionData) -> Result<bool> {
    if data.key.is_empty() {
        return Ok(false);
    }

    let mut cipher = get_cipher(data, false)?;
    // A prefix shorter than the stream fails to finalize; the slack covers it.
    let mut plain = cipher.update(encrypted_prefix).unwrap_or_default();
    if let Ok(tail) = cipher.finalize() {
        plain.extend(tail);
    }
    plain.truncate(DIGEST_LENGTH);

    if !data.has_digest() {
        return Ok(true);
    }

    let mut context = digest_context_for_checksum(data)
        .ok_or_else(|| ZipError::zip_io("Unknown digest algorithm is requested!"))?;
    context.update(&plain);
    let valid = context.finalize() == data.digest;
    if !valid {
        debug!("password check digest mismatch");
    }
    Ok(valid)
}

/// Compress and encrypt `plain`, storing the password-check digest in `data`.
pub fn seal(plain: &[u8], data: &mut EncryptionData) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain)?;
    let compressed = encoder.finish()?;

    let mut context = digest_context_for_checksum(data)
        .ok_or_else(|| ZipError::zip_io("Unknown digest algorithm is requested!"))?;
    context.update(&compressed[..compressed.len().min(DIGEST_LENGTH)]);
    data.digest = context.finalize();

    let mut cipher = get_cipher(data, true)?;
    let mut sealed = cipher.update(&compressed)?;
    sealed.extend(cipher.finalize()?);
    Ok(sealed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(cipher: CipherId) -> EncryptionData {
        EncryptionData::for_password("correct horse", cipher).with_iteration_count(16)
    }

    #[test]
    fn right_and_wrong_password() {
        for cipher in [CipherId::AesCbcW3cPadding, CipherId::BlowfishCfb8] {
            let mut data = fast(cipher);
            let plain = b"<office:document/>".repeat(200);
            let sealed = seal(&plain, &mut data).unwrap();
            let prefix = &sealed[..sealed.len().min(DIGEST_DECRYPT_LENGTH)];

            assert!(has_valid_password(prefix, &data).unwrap());
            let wrong = data.clone().with_password("battery staple");
            assert!(!has_valid_password(prefix, &wrong).unwrap());
        }
    }

    #[test]
    fn short_stream_finalizes_inside_prefix() {
        let mut data = fast(CipherId::AesCbcW3cPadding);
        let sealed = seal(b"hi", &mut data).unwrap();
        assert!(sealed.len() < DIGEST_DECRYPT_LENGTH);
        assert!(has_valid_password(&sealed, &data).unwrap());
    }

    #[test]
    fn missing_digest_or_key() {
        let mut data = fast(CipherId::BlowfishCfb8);
        let sealed = seal(b"content", &mut data).unwrap();

        let mut no_digest = data.clone().with_password("anything");
        no_digest.digest.clear();
        assert!(has_valid_password(&sealed, &no_digest).unwrap());

        let mut no_key = data;
        no_key.key.clear();
        assert!(!has_valid_password(&sealed, &no_key).unwrap());
    }

    #[test]
    fn legacy_sha1_digest_is_checked_with_legacy_context() {
        let mut data = fast(CipherId::BlowfishCfb8);
        data.try_legacy_sha1 = true;
        let sealed = seal(b"legacy content", &mut data).unwrap();
        assert!(has_valid_password(&sealed, &data).unwrap());

        data.try_legacy_sha1 = false;
        assert!(!has_valid_password(&sealed, &data).unwrap());
    }
}
