use crate::error::AccProofError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A 32-byte opaque hash value. Hex rendering is always lowercase, no `0x`
/// prefix, per spec.md §6's hex conventions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, AccProofError> {
        let s = s.trim();
        let bytes = hex::decode(s).map_err(|e| AccProofError::HexDecode(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(AccProofError::BadHexLength {
                expected: 32,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// SHA-256 of the given bytes.
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// SHA-256(SHA-256(data)) — used by the custody chain (spec.md §4.2).
    pub fn sha256d(data: &[u8]) -> Self {
        Self::sha256(Self::sha256(data).as_bytes())
    }

    /// Fold two hashes as `SHA256(left ‖ right)` (receipt path recomputation).
    pub fn fold(left: &Hash32, right: &Hash32) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&left.0);
        buf.extend_from_slice(&right.0);
        Self::sha256(&buf)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({}…)", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = Hash32::sha256(b"hello");
        let s = h.to_hex();
        assert_eq!(Hash32::from_hex(&s).unwrap(), h);
    }

    #[test]
    fn bad_length_rejected() {
        let err = Hash32::from_hex("aabb").unwrap_err();
        assert!(matches!(err, AccProofError::BadHexLength { .. }));
    }

    #[test]
    fn fold_matches_manual_concat() {
        let l = Hash32::sha256(b"a");
        let r = Hash32::sha256(b"b");
        let folded = Hash32::fold(&l, &r);
        let mut buf = l.0.to_vec();
        buf.extend_from_slice(&r.0);
        assert_eq!(folded, Hash32::sha256(&buf));
    }
}
