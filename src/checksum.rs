//! Payload digests for archive integrity
//!
//! The archive checksum detects accidental corruption and hand edits of a
//! backup, it is not an authentication mechanism. The default algorithm is
//! Adler-32: two 32-bit accumulators reduced modulo the largest prime below
//! 2^16, rendered as eight lowercase hex digits. SHA-256 is available for
//! callers that want a stronger fingerprint; its digests carry a `sha256:`
//! prefix so the importer can tell the two forms apart without extra
//! metadata.
//!
//! ## Examples
//!
//! ```rust
//! use promptvault::checksum::{digest, ChecksumAlgorithm};
//!
//! assert_eq!(digest("Wikipedia"), "11e60398");
//! assert!(ChecksumAlgorithm::Sha256.digest("Wikipedia").starts_with("sha256:"));
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Largest prime smaller than 65536
const ADLER_MOD: u32 = 65_521;

/// Bytes that can be summed before `b` may overflow a `u32`
const ADLER_NMAX: usize = 5_552;

/// Prefix marking a SHA-256 digest string
const SHA256_PREFIX: &str = "sha256:";

/// Digest algorithm used for archive checksums
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// Adler-32, eight hex digits
    #[default]
    Adler32,
    /// SHA-256, `sha256:` followed by 64 hex digits
    Sha256,
}

impl ChecksumAlgorithm {
    /// Compute the digest of `payload` with this algorithm
    pub fn digest(self, payload: &str) -> String {
        match self {
            ChecksumAlgorithm::Adler32 => format!("{:08x}", adler32(payload.as_bytes())),
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(payload.as_bytes());
                format!("{}{}", SHA256_PREFIX, hex::encode(hasher.finalize()))
            }
        }
    }

    /// Infer the algorithm that produced a stored checksum string
    ///
    /// Anything without the `sha256:` prefix is treated as Adler-32; a
    /// garbage value then simply fails the comparison.
    pub fn detect(checksum: &str) -> Self {
        if checksum.starts_with(SHA256_PREFIX) {
            ChecksumAlgorithm::Sha256
        } else {
            ChecksumAlgorithm::Adler32
        }
    }
}

/// Compute the default (Adler-32) digest of a payload
pub fn digest(payload: &str) -> String {
    ChecksumAlgorithm::Adler32.digest(payload)
}

/// Raw Adler-32 over a byte slice
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    // Reduce once per block instead of once per byte
    for chunk in data.chunks(ADLER_NMAX) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }

    (b << 16) | a
}
