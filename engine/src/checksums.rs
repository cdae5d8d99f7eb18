//! Content fingerprinting.
//!
//! This module provides:
//! - A streaming 64-bit digest trait with four algorithms (CRC-64, MD5,
//!   SHA-256, BLAKE3; the latter three truncated to their first 8 bytes)
//! - File-level digest computation in fixed-size chunks
//! - The fault-tolerant `fingerprint_file` used by the hashing pool

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;
use crate::model::FileFingerprint;

/// Files are streamed through the digest in chunks of this size.
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// CRC-64/XZ (fast, non-cryptographic)
    #[default]
    Crc64,
    /// MD5, truncated to 64 bits
    Md5,
    /// SHA-256, truncated to 64 bits
    Sha256,
    /// BLAKE3, truncated to 64 bits
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc64 => write!(f, "crc64"),
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl DigestAlgorithm {
    /// Parse algorithm from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "crc64" => Some(Self::Crc64),
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// Streaming digest producing a 64-bit value.
pub trait Digest64: Send {
    /// Feed the next chunk of data
    fn update(&mut self, data: &[u8]);

    /// Consume the digest and return its value
    fn finalize(self: Box<Self>) -> u64;
}

const CRC64_XZ_POLY: u64 = 0xC96C_5795_D787_0F42;

const fn crc64_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CRC64_XZ_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC64_TABLE: [u64; 256] = crc64_table();

/// CRC-64/XZ hasher
struct Crc64Hasher {
    crc: u64,
}

impl Crc64Hasher {
    fn new() -> Self {
        Crc64Hasher { crc: !0 }
    }
}

impl Digest64 for Crc64Hasher {
    fn update(&mut self, data: &[u8]) {
        let mut crc = self.crc;
        for &byte in data {
            crc = CRC64_TABLE[((crc ^ byte as u64) & 0xff) as usize] ^ (crc >> 8);
        }
        self.crc = crc;
    }

    fn finalize(self: Box<Self>) -> u64 {
        !self.crc
    }
}

/// MD5 hasher (backed by md5 crate)
struct Md5Hasher {
    context: md5::Context,
}

impl Digest64 for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        truncate(&self.context.compute().0)
    }
}

/// SHA-256 hasher (backed by sha2 crate)
struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl Digest64 for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        use sha2::Digest;
        truncate(&self.hasher.finalize())
    }
}

/// BLAKE3 hasher (backed by blake3 crate)
struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl Digest64 for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> u64 {
        truncate(self.hasher.finalize().as_bytes())
    }
}

/// First 8 bytes of a wider digest, little-endian.
fn truncate(digest: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Create a new digest for the given algorithm
pub fn create_digest(algorithm: DigestAlgorithm) -> Box<dyn Digest64> {
    match algorithm {
        DigestAlgorithm::Crc64 => Box::new(Crc64Hasher::new()),
        DigestAlgorithm::Md5 => Box::new(Md5Hasher {
            context: md5::Context::new(),
        }),
        DigestAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        DigestAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Digest of an in-memory buffer.
pub fn digest_bytes(data: &[u8], algorithm: DigestAlgorithm) -> u64 {
    let mut digest = create_digest(algorithm);
    digest.update(data);
    digest.finalize()
}

/// Compute the digest of a file, streaming it in `CHUNK_SIZE` chunks.
pub fn compute_file_digest(path: &Path, algorithm: DigestAlgorithm) -> Result<u64, EngineError> {
    let mut file = File::open(path).map_err(|e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut digest = create_digest(algorithm);
    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => digest.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EngineError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Ok(digest.finalize())
}

/// Fingerprint a file; a missing or unreadable file gets digest zero.
pub fn fingerprint_file(path: &Path, algorithm: DigestAlgorithm) -> FileFingerprint {
    let digest = match compute_file_digest(path, algorithm) {
        Ok(digest) => digest,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable file fingerprinted as zero");
            0
        }
    };
    FileFingerprint::new(path.to_path_buf(), digest)
}
