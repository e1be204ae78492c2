//! Streaming cipher contexts.
//!
//! Both directions work on arbitrary slices: [`CipherContext::update`] may be
//! called with any amount of data and [`CipherContext::finalize`] flushes what
//! is left. AES-CBC keeps the last complete block back until finalization so
//! the W3C padding can be removed.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};

use crate::error::{Result, ZipError};

use super::data::{CipherId, EncryptionData};

type Bf = blowfish::Blowfish;

const AES_BLOCK: usize = 16;

enum CbcDec {
    Aes128(cbc::Decryptor<Aes128>),
    Aes192(cbc::Decryptor<Aes192>),
    Aes256(cbc::Decryptor<Aes256>),
}

enum CbcEnc {
    Aes128(cbc::Encryptor<Aes128>),
    Aes192(cbc::Encryptor<Aes192>),
    Aes256(cbc::Encryptor<Aes256>),
}

impl CbcDec {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let bad = |_| ZipError::zip_io("Invalid key or IV length for AES!");
        Ok(match key.len() {
            16 => CbcDec::Aes128(cbc::Decryptor::new_from_slices(key, iv).map_err(bad)?),
            24 => CbcDec::Aes192(cbc::Decryptor::new_from_slices(key, iv).map_err(bad)?),
            32 => CbcDec::Aes256(cbc::Decryptor::new_from_slices(key, iv).map_err(bad)?),
            _ => return Err(ZipError::zip_io("Invalid key or IV length for AES!")),
        })
    }

    fn block(&mut self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            CbcDec::Aes128(c) => c.decrypt_block_mut(block),
            CbcDec::Aes192(c) => c.decrypt_block_mut(block),
            CbcDec::Aes256(c) => c.decrypt_block_mut(block),
        }
    }
}

impl CbcEnc {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let bad = |_| ZipError::zip_io("Invalid key or IV length for AES!");
        Ok(match key.len() {
            16 => CbcEnc::Aes128(cbc::Encryptor::new_from_slices(key, iv).map_err(bad)?),
            24 => CbcEnc::Aes192(cbc::Encryptor::new_from_slices(key, iv).map_err(bad)?),
            32 => CbcEnc::Aes256(cbc::Encryptor::new_from_slices(key, iv).map_err(bad)?),
            _ => return Err(ZipError::zip_io("Invalid key or IV length for AES!")),
        })
    }

    fn block(&mut self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            CbcEnc::Aes128(c) => c.encrypt_block_mut(block),
            CbcEnc::Aes192(c) => c.encrypt_block_mut(block),
            CbcEnc::Aes256(c) => c.encrypt_block_mut(block),
        }
    }
}

enum Mode {
    AesDecrypt(CbcDec),
    AesEncrypt(CbcEnc),
    BlowfishDecrypt(cfb8::Decryptor<Bf>),
    BlowfishEncrypt(cfb8::Encryptor<Bf>),
}

/// One direction of one cipher over one stream.
pub struct CipherContext {
    mode: Mode,
    pending: Vec<u8>,
    finalized: bool,
}

impl CipherContext {
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(ZipError::zip_io("Cipher context is already finalized!"));
        }

        match &mut self.mode {
            Mode::BlowfishDecrypt(c) => {
                let mut out = data.to_vec();
                for byte in out.iter_mut() {
                    c.decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
                }
                Ok(out)
            }
            Mode::BlowfishEncrypt(c) => {
                let mut out = data.to_vec();
                for byte in out.iter_mut() {
                    c.encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
                }
                Ok(out)
            }
            Mode::AesDecrypt(c) => {
                self.pending.extend_from_slice(data);
                // Keep one full block back for the padding.
                let ready = if self.pending.len() % AES_BLOCK == 0 {
                    self.pending.len().saturating_sub(AES_BLOCK)
                } else {
                    self.pending.len() - self.pending.len() % AES_BLOCK
                };
                let mut out: Vec<u8> = self.pending.drain(..ready).collect();
                for block in out.chunks_exact_mut(AES_BLOCK) {
                    c.block(block);
                }
                Ok(out)
            }
            Mode::AesEncrypt(c) => {
                self.pending.extend_from_slice(data);
                let ready = self.pending.len() - self.pending.len() % AES_BLOCK;
                let mut out: Vec<u8> = self.pending.drain(..ready).collect();
                for block in out.chunks_exact_mut(AES_BLOCK) {
                    c.block(block);
                }
                Ok(out)
            }
        }
    }

    /// Flush the context. For AES decryption this fails when the data seen so
    /// far does not end in a complete, correctly padded block.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;

        match &mut self.mode {
            Mode::BlowfishDecrypt(_) | Mode::BlowfishEncrypt(_) => Ok(Vec::new()),
            Mode::AesDecrypt(c) => {
                if self.pending.len() != AES_BLOCK {
                    return Err(ZipError::zip_io("Encrypted data is not block aligned!"));
                }
                let mut block = std::mem::take(&mut self.pending);
                c.block(&mut block);
                let pad = block[AES_BLOCK - 1] as usize;
                if pad == 0 || pad > AES_BLOCK {
                    return Err(ZipError::zip_io("Invalid padding!"));
                }
                block.truncate(AES_BLOCK - pad);
                Ok(block)
            }
            Mode::AesEncrypt(c) => {
                // W3C padding: only the last byte is significant.
                let mut block = std::mem::take(&mut self.pending);
                let pad = AES_BLOCK - block.len();
                block.resize(AES_BLOCK, pad as u8);
                c.block(&mut block);
                Ok(block)
            }
        }
    }
}

/// Derive the symmetric key for `data`.
///
/// A key that already has the derived size is used as is when no iterations
/// are requested; otherwise PBKDF2-HMAC-SHA1 runs over the start key.
pub fn derive_key(data: &EncryptionData) -> Result<Vec<u8>> {
    if data.derived_key_size < 0 {
        return Err(ZipError::zip_io("Invalid derived key length!"));
    }

    let size = data.derived_key_size as usize;
    if data.iteration_count == 0 && size == data.key.len() {
        return Ok(data.key.clone());
    }

    let mut derived = vec![0u8; size];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(&data.key, &data.salt, data.iteration_count, &mut derived);
    Ok(derived)
}

/// Build the cipher context described by `data`.
pub fn get_cipher(data: &EncryptionData, encrypt: bool) -> Result<CipherContext> {
    let key = derive_key(data)?;
    let iv = &data.init_vector;

    let mode = match data.enc_alg {
        CipherId::AesCbcW3cPadding => {
            if encrypt {
                Mode::AesEncrypt(CbcEnc::new(&key, iv)?)
            } else {
                Mode::AesDecrypt(CbcDec::new(&key, iv)?)
            }
        }
        CipherId::BlowfishCfb8 => {
            let cipher = <Bf as KeyInit>::new_from_slice(&key)
                .map_err(|_| ZipError::zip_io("Invalid key length for Blowfish!"))?;
            let bad_iv = |_| ZipError::zip_io("Invalid IV length for Blowfish!");
            if encrypt {
                Mode::BlowfishEncrypt(cfb8::Encryptor::inner_iv_slice_init(cipher, iv).map_err(bad_iv)?)
            } else {
                Mode::BlowfishDecrypt(cfb8::Decryptor::inner_iv_slice_init(cipher, iv).map_err(bad_iv)?)
            }
        }
        CipherId::Unknown(_) => {
            return Err(ZipError::zip_io("Unknown cipher algorithm is requested!"));
        }
    };

    Ok(CipherContext {
        mode,
        pending: Vec::new(),
        finalized: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(cipher: CipherId) -> EncryptionData {
        EncryptionData::for_password("secret", cipher).with_iteration_count(10)
    }

    fn run(ctx: &mut CipherContext, input: &[u8], step: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in input.chunks(step.max(1)) {
            out.extend(ctx.update(chunk).unwrap());
        }
        out.extend(ctx.finalize().unwrap());
        out
    }

    #[test]
    fn aes_streams_in_odd_chunks() {
        let data = data(CipherId::AesCbcW3cPadding);
        let plain: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        let sealed = run(&mut get_cipher(&data, true).unwrap(), &plain, 7);
        assert_eq!(sealed.len() % AES_BLOCK, 0);
        assert!(sealed.len() > plain.len());

        let opened = run(&mut get_cipher(&data, false).unwrap(), &sealed, 13);
        assert_eq!(opened, plain);
    }

    #[test]
    fn aes_block_aligned_input_gets_full_padding_block() {
        let data = data(CipherId::AesCbcW3cPadding);
        let plain = [0x41u8; 32];
        let sealed = run(&mut get_cipher(&data, true).unwrap(), &plain, 32);
        assert_eq!(sealed.len(), 48);
        let opened = run(&mut get_cipher(&data, false).unwrap(), &sealed, 5);
        assert_eq!(opened, plain);
    }

    #[test]
    fn blowfish_cfb8_keeps_length() {
        let data = data(CipherId::BlowfishCfb8);
        let plain = b"the quick brown fox".to_vec();
        let sealed = run(&mut get_cipher(&data, true).unwrap(), &plain, 3);
        assert_eq!(sealed.len(), plain.len());
        assert_ne!(sealed, plain);
        let opened = run(&mut get_cipher(&data, false).unwrap(), &sealed, 4);
        assert_eq!(opened, plain);
    }

    #[test]
    fn key_pass_through_and_errors() {
        let mut data = data(CipherId::AesCbcW3cPadding);
        data.iteration_count = 0;
        data.key = vec![9u8; 32];
        assert_eq!(derive_key(&data).unwrap(), vec![9u8; 32]);

        data.derived_key_size = -1;
        assert!(matches!(derive_key(&data), Err(ZipError::ZipIo(_))));

        data.derived_key_size = 32;
        data.enc_alg = CipherId::Unknown(9);
        let err = get_cipher(&data, false).err().unwrap();
        assert!(err.to_string().contains("Unknown cipher algorithm"));
    }
}
