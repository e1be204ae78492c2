//! Password-check digests.

use sha1::{Digest, Sha1};
use sha2::Sha256;

use super::data::{DigestId, EncryptionData};

/// Number of plaintext bytes covered by a `*_1K` digest.
pub const DIGEST_LENGTH: usize = 1024;

pub enum DigestContext {
    Sha1(Sha1),
    Sha256(Sha256),
    StarOfficeSha1(StarOfficeSha1),
}

impl DigestContext {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestContext::Sha1(d) => d.update(data),
            DigestContext::Sha256(d) => d.update(data),
            DigestContext::StarOfficeSha1(d) => d.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            DigestContext::Sha1(d) => d.finalize().to_vec(),
            DigestContext::Sha256(d) => d.finalize().to_vec(),
            DigestContext::StarOfficeSha1(d) => d.finalize().to_vec(),
        }
    }
}

/// Digest context used to check a password against `data.digest`, or `None`
/// when the checksum algorithm is not one of the 1K variants.
pub fn digest_context_for_checksum(data: &EncryptionData) -> Option<DigestContext> {
    match data.check_alg {
        DigestId::Sha256_1K => Some(DigestContext::Sha256(Sha256::new())),
        DigestId::Sha1_1K if data.try_legacy_sha1 => {
            Some(DigestContext::StarOfficeSha1(StarOfficeSha1::new()))
        }
        DigestId::Sha1_1K => Some(DigestContext::Sha1(Sha1::new())),
        _ => None,
    }
}

/// SHA-1 as computed by old StarOffice releases.
///
/// The compression function is standard; the final padding block encodes the
/// message length in bytes rather than bits. Documents written by those
/// releases carry digests made this way.
#[derive(Clone)]
pub struct StarOfficeSha1 {
    state: [u32; 5],
    buffer: [u8; 64],
    buffered: usize,
    length: u64,
}

impl Default for StarOfficeSha1 {
    fn default() -> Self {
        Self::new()
    }
}

impl StarOfficeSha1 {
    pub fn new() -> Self {
        Self {
            state: [0x6745_2301, 0xEFCD_AB89, 0x98BA_DCFE, 0x1032_5476, 0xC3D2_E1F0],
            buffer: [0; 64],
            buffered: 0,
            length: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.length += data.len() as u64;
        while !data.is_empty() {
            let take = (64 - self.buffered).min(data.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&data[..take]);
            self.buffered += take;
            data = &data[take..];
            if self.buffered == 64 {
                sha1::compress(&mut self.state, &[self.buffer.into()]);
                self.buffered = 0;
            }
        }
    }

    pub fn finalize(mut self) -> [u8; 20] {
        let length = self.length;
        let mut tail = vec![0x80u8];
        let pad = (119 - self.buffered) % 64;
        tail.resize(1 + pad, 0);
        tail.extend_from_slice(&length.to_be_bytes());
        // Feed the tail without counting it.
        let saved = self.length;
        self.update(&tail);
        self.length = saved;

        let mut out = [0u8; 20];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_matches_sha1_on_empty_input() {
        let legacy = StarOfficeSha1::new().finalize();
        assert_eq!(legacy.to_vec(), Sha1::digest(b"").to_vec());
    }

    #[test]
    fn legacy_differs_once_there_is_data() {
        let mut legacy = StarOfficeSha1::new();
        legacy.update(b"abc");
        assert_ne!(legacy.finalize().to_vec(), Sha1::digest(b"abc").to_vec());
    }

    fn digest_of_single_block(block: [u8; 64]) -> Vec<u8> {
        let mut state = StarOfficeSha1::new().state;
        sha1::compress(&mut state, &[block.into()]);
        state.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn legacy_pads_with_byte_length() {
        let mut block = [0u8; 64];
        block[..3].copy_from_slice(b"abc");
        block[3] = 0x80;

        block[63] = 3;
        let mut legacy = StarOfficeSha1::new();
        legacy.update(b"abc");
        assert_eq!(legacy.finalize().to_vec(), digest_of_single_block(block));

        block[63] = 24;
        assert_eq!(digest_of_single_block(block), Sha1::digest(b"abc").to_vec());
    }

    #[test]
    fn legacy_is_chunking_independent() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 31) as u8).collect();
        let mut one = StarOfficeSha1::new();
        one.update(&data);
        let mut many = StarOfficeSha1::new();
        for chunk in data.chunks(17) {
            many.update(chunk);
        }
        assert_eq!(one.finalize(), many.finalize());
    }

    #[test]
    fn context_selection() {
        let mut data = EncryptionData::for_password("x", super::super::CipherId::BlowfishCfb8);
        assert!(matches!(digest_context_for_checksum(&data), Some(DigestContext::Sha1(_))));
        data.try_legacy_sha1 = true;
        assert!(matches!(
            digest_context_for_checksum(&data),
            Some(DigestContext::StarOfficeSha1(_))
        ));
        data.check_alg = DigestId::Sha1;
        assert!(digest_context_for_checksum(&data).is_none());
    }
}
