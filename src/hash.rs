use crate::error::{DedupeError, Result};
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of the digest behind a [`Fingerprint`].
pub const DIGEST_LEN: usize = 32;

/// A type alias for the function deriving bit positions from a digest.
///
/// **Parameters:**
///
/// - `digest: &[u8]`
///   - Raw digest bytes of the fingerprint (at least 16 bytes).
/// - `num_hashes: usize`
///   - The number of positions to compute.
/// - `bit_size: u64`
///   - Size of the bit array; every returned position is `< bit_size`.
///
/// **Returns:**
///
/// - `Vec<u64>`
///   - One bit position per hash function, in order.
pub type PositionFunction = fn(&[u8], usize, u64) -> Vec<u64>;

/// Deterministic digest of an ordered tuple of identifying fields.
///
/// Rendered as 64 lowercase hex characters (SHA-256).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: [u8; DIGEST_LEN],
    hex: String,
}

impl Fingerprint {
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|e| {
            DedupeError::InvalidInput(format!(
                "fingerprint '{hex_str}' is not valid hex: {e}"
            ))
        })?;
        let digest: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            DedupeError::InvalidInput(format!(
                "fingerprint '{hex_str}' must be {} hex characters",
                DIGEST_LEN * 2
            ))
        })?;
        Ok(Self::from_digest(digest))
    }

    fn from_digest(digest: [u8; DIGEST_LEN]) -> Self {
        Self {
            hex: hex::encode(digest),
            digest,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.hex)
    }
}

/// Hashes the concatenation of `fields` (in order, no separator) with
/// SHA-256.
///
/// Field boundaries are not encoded, so callers must keep field order
/// consistent per category. Empty tuples and empty fields are rejected.
pub fn compose(fields: &[&str]) -> Result<Fingerprint> {
    if fields.is_empty() {
        return Err(DedupeError::InvalidInput(
            "cannot fingerprint an empty field tuple".into(),
        ));
    }
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if field.is_empty() {
            return Err(DedupeError::InvalidInput(format!(
                "field {i} of the fingerprint tuple is empty"
            )));
        }
        hasher.update(field.as_bytes());
    }
    Ok(Fingerprint::from_digest(hasher.finalize().into()))
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

/// Double hashing: `h1` and `h2` are the first two big-endian 64-bit words of
/// the digest, position `i` is `(h1 + i * h2) mod bit_size`.
///
/// `h2` is forced odd so that power-of-two sizes still visit distinct
/// positions.
pub fn double_hash_positions(
    digest: &[u8],
    num_hashes: usize,
    bit_size: u64,
) -> Vec<u64> {
    let h1 = be_u64(&digest[0..8]);
    let h2 = be_u64(&digest[8..16]) | 1;
    (0..num_hashes as u64)
        .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % bit_size)
        .collect()
}

pub fn default_position_function(
    digest: &[u8],
    num_hashes: usize,
    bit_size: u64,
) -> Vec<u64> {
    double_hash_positions(digest, num_hashes, bit_size)
}

pub fn optimal_bit_vector_size(n: usize, fpr: f64) -> u64 {
    let ln2 = std::f64::consts::LN_2;
    ((-(n as f64) * fpr.ln()) / (ln2 * ln2)).ceil() as u64
}

pub fn optimal_num_hashes(n: usize, m: u64) -> usize {
    (((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize).max(1)
}

/// Theoretical false positive rate `(1 - e^(-kn/m))^k` after `n` inserts.
pub fn estimated_false_positive_rate(n: usize, m: u64, k: usize) -> f64 {
    let k = k as f64;
    (1.0 - (-k * n as f64 / m as f64).exp()).powf(k)
}
