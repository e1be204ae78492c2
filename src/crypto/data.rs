use rand::RngCore;
use sha1::{Digest, Sha1};
use sha2::Sha256;

/// Cipher algorithm identifiers as stored in encryption headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherId {
    AesCbcW3cPadding,
    BlowfishCfb8,
    Unknown(i32),
}

impl CipherId {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => CipherId::AesCbcW3cPadding,
            2 => CipherId::BlowfishCfb8,
            other => CipherId::Unknown(other),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            CipherId::AesCbcW3cPadding => 1,
            CipherId::BlowfishCfb8 => 2,
            CipherId::Unknown(v) => *v,
        }
    }
}

/// Digest identifiers, used both for the password check and the start key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestId {
    Sha1,
    Sha256,
    /// SHA-1 over the first 1024 bytes of the stream.
    Sha1_1K,
    /// SHA-256 over the first 1024 bytes of the stream.
    Sha256_1K,
    Unknown(i32),
}

impl DigestId {
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => DigestId::Sha1,
            2 => DigestId::Sha256,
            3 => DigestId::Sha1_1K,
            4 => DigestId::Sha256_1K,
            other => DigestId::Unknown(other),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            DigestId::Sha1 => 1,
            DigestId::Sha256 => 2,
            DigestId::Sha1_1K => 3,
            DigestId::Sha256_1K => 4,
            DigestId::Unknown(v) => *v,
        }
    }
}

/// Key material for one encrypted stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionData {
    /// Start key (hashed password) or a ready session key.
    pub key: Vec<u8>,
    pub salt: Vec<u8>,
    pub init_vector: Vec<u8>,
    /// Password check value; empty when the producer did not store one.
    pub digest: Vec<u8>,
    pub iteration_count: u32,
    pub derived_key_size: i32,
    pub enc_alg: CipherId,
    pub check_alg: DigestId,
    pub start_key_gen: DigestId,
    /// Check SHA1_1K digests with the legacy StarOffice SHA-1 variant.
    pub try_legacy_sha1: bool,
}

impl EncryptionData {
    /// Fresh key material for `password` with random salt and IV.
    ///
    /// AES uses a 256-bit key, a SHA-256 start key and 100 000 rounds;
    /// Blowfish uses the historical 128-bit key, SHA-1 start key and 1024 rounds.
    pub fn for_password(password: &str, cipher: CipherId) -> Self {
        let mut rng = rand::thread_rng();
        let mut salt = vec![0u8; 16];
        rng.fill_bytes(&mut salt);

        match cipher {
            CipherId::BlowfishCfb8 => {
                let mut init_vector = vec![0u8; 8];
                rng.fill_bytes(&mut init_vector);
                Self {
                    key: start_key(password, DigestId::Sha1),
                    salt,
                    init_vector,
                    digest: Vec::new(),
                    iteration_count: 1024,
                    derived_key_size: 16,
                    enc_alg: cipher,
                    check_alg: DigestId::Sha1_1K,
                    start_key_gen: DigestId::Sha1,
                    try_legacy_sha1: false,
                }
            }
            _ => {
                let mut init_vector = vec![0u8; 16];
                rng.fill_bytes(&mut init_vector);
                Self {
                    key: start_key(password, DigestId::Sha256),
                    salt,
                    init_vector,
                    digest: Vec::new(),
                    iteration_count: 100_000,
                    derived_key_size: 32,
                    enc_alg: CipherId::AesCbcW3cPadding,
                    check_alg: DigestId::Sha256_1K,
                    start_key_gen: DigestId::Sha256,
                    try_legacy_sha1: false,
                }
            }
        }
    }

    pub fn with_iteration_count(mut self, count: u32) -> Self {
        self.iteration_count = count;
        self
    }

    /// Same parameters, different password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.key = start_key(password, self.start_key_gen);
        self
    }

    pub fn has_digest(&self) -> bool {
        !self.digest.is_empty()
    }
}

/// Hash a password into the start key for the key derivation.
pub fn start_key(password: &str, algorithm: DigestId) -> Vec<u8> {
    match algorithm {
        DigestId::Sha256 | DigestId::Sha256_1K => Sha256::digest(password.as_bytes()).to_vec(),
        _ => Sha1::digest(password.as_bytes()).to_vec(),
    }
}
