//! accuproof-receipt
//!
//! The Merkle receipt value type, its internal integrity check, and the
//! stitching rule that joins two receipts into a chain (spec.md C5 / §4.4).

use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, Hash32, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a Merkle inclusion path: a sibling hash and which side of
/// the fold it sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub sibling_hash: Hash32,
    pub right: bool,
}

/// A Merkle inclusion proof `(start, anchor, path, local_block)`
/// (spec.md §3 "Merkle Receipt").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleReceipt {
    pub start: Hash32,
    pub anchor: Hash32,
    pub path: Vec<PathEntry>,
    pub local_block: u64,
}

impl MerkleReceipt {
    /// Recompute the root from `start` and `path`: for each entry fold
    /// `h = SHA256(sibling ‖ h)` if `right`, else `SHA256(h ‖ sibling)`.
    /// Succeeds iff the final `h` equals `anchor` byte-exactly. An empty
    /// path requires `start == anchor`.
    pub fn validate_integrity(&self) -> Result<()> {
        if self.path.is_empty() {
            return if self.start == self.anchor {
                Ok(())
            } else {
                Err(AccProofError::ReceiptRootMismatch)
            };
        }
        let mut h = self.start;
        for entry in &self.path {
            h = if entry.right {
                Hash32::fold(&entry.sibling_hash, &h)
            } else {
                Hash32::fold(&h, &entry.sibling_hash)
            };
        }
        if h == self.anchor {
            Ok(())
        } else {
            Err(AccProofError::ReceiptRootMismatch)
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate_integrity().is_ok()
    }
}

/// Require `r2.start == r1.anchor` byte-exactly — no hashing shortcuts,
/// no length-prefixed alternates (spec.md §4.4 `stitch`).
pub fn stitch(r1: &MerkleReceipt, r2: &MerkleReceipt) -> Result<()> {
    if r1.anchor == r2.start {
        Ok(())
    } else {
        Err(AccProofError::StitchMismatch)
    }
}

/// `{scope, chain_name, index, leaf_hash, receipt, expand?}` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedEntry {
    pub message: serde_json::Value,
    pub transaction: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub scope: String,
    pub chain_name: String,
    pub index: u64,
    pub leaf_hash: Hash32,
    pub receipt: Option<MerkleReceipt>,
    pub expand: Option<ExpandedEntry>,
}

impl ChainEntry {
    /// When `expand` is present, `receipt.start == leaf_hash` must hold
    /// (spec.md §3 invariant).
    pub fn validate_expand_invariant(&self) -> Result<()> {
        if self.expand.is_some() {
            if let Some(receipt) = &self.receipt {
                if receipt.start != self.leaf_hash {
                    return Err(AccProofError::Other(
                        "expanded chain entry's receipt.start != leaf_hash".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Parse a `receipt` JSON object as returned by the node into a
/// `MerkleReceipt`, tolerating mixed-case field names (spec.md §9).
pub fn parse_receipt(value: &Value) -> Result<MerkleReceipt> {
    let start = get_str_ci(value, "start")
        .ok_or(AccProofError::MissingField("receipt.start"))
        .and_then(|s| Hash32::from_hex(s))?;
    let anchor = get_str_ci(value, "anchor")
        .ok_or(AccProofError::MissingField("receipt.anchor"))
        .and_then(|s| Hash32::from_hex(s))?;
    let local_block = get_u64_ci(value, "localBlock")
        .ok_or(AccProofError::MissingField("receipt.localBlock"))?;
    let entries = get_ci(value, "entries")
        .or_else(|| get_ci(value, "path"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let mut path = Vec::with_capacity(entries.len());
    for entry in &entries {
        let sibling_hash = get_str_ci(entry, "hash")
            .or_else(|| get_str_ci(entry, "siblingHash"))
            .ok_or(AccProofError::MissingField("receipt.entries[].hash"))
            .and_then(|s| Hash32::from_hex(s))?;
        let right = get_ci(entry, "right")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        path.push(PathEntry {
            sibling_hash,
            right,
        });
    }
    Ok(MerkleReceipt {
        start,
        anchor,
        path,
        local_block,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(b: u8) -> Hash32 {
        Hash32::from_bytes([b; 32])
    }

    #[test]
    fn empty_path_requires_start_equals_anchor() {
        let r = MerkleReceipt {
            start: leaf(1),
            anchor: leaf(1),
            path: vec![],
            local_block: 5,
        };
        assert!(r.validate_integrity().is_ok());

        let bad = MerkleReceipt {
            start: leaf(1),
            anchor: leaf(2),
            path: vec![],
            local_block: 5,
        };
        assert!(bad.validate_integrity().is_err());
    }

    #[test]
    fn single_step_path_recomputes_root() {
        let start = leaf(1);
        let sibling = leaf(2);
        let anchor = Hash32::fold(&start, &sibling);
        let r = MerkleReceipt {
            start,
            anchor,
            path: vec![PathEntry {
                sibling_hash: sibling,
                right: false,
            }],
            local_block: 1,
        };
        assert!(r.validate_integrity().is_ok());
    }

    #[test]
    fn tampered_anchor_fails() {
        let start = leaf(1);
        let sibling = leaf(2);
        let anchor = Hash32::fold(&start, &sibling);
        let mut r = MerkleReceipt {
            start,
            anchor,
            path: vec![PathEntry {
                sibling_hash: sibling,
                right: false,
            }],
            local_block: 1,
        };
        let mut tampered = r.anchor.as_bytes().to_owned();
        tampered[0] ^= 0xFF;
        r.anchor = Hash32::from_bytes(tampered);
        assert!(matches!(
            r.validate_integrity(),
            Err(AccProofError::ReceiptRootMismatch)
        ));
    }

    #[test]
    fn stitch_requires_exact_match() {
        let a = MerkleReceipt {
            start: leaf(1),
            anchor: leaf(9),
            path: vec![],
            local_block: 1,
        };
        let b = MerkleReceipt {
            start: leaf(9),
            anchor: leaf(10),
            path: vec![],
            local_block: 2,
        };
        assert!(stitch(&a, &b).is_ok());

        let c = MerkleReceipt {
            start: leaf(8),
            anchor: leaf(10),
            path: vec![],
            local_block: 2,
        };
        assert!(matches!(stitch(&a, &c), Err(AccProofError::StitchMismatch)));
    }

    #[test]
    fn parse_receipt_handles_mixed_case_fields() {
        let start = leaf(1);
        let sibling = leaf(2);
        let anchor = Hash32::fold(&start, &sibling);
        let json = serde_json::json!({
            "Start": start.to_hex(),
            "anchor": anchor.to_hex(),
            "LocalBlock": 7,
            "entries": [{"hash": sibling.to_hex(), "right": false}],
        });
        let r = parse_receipt(&json).unwrap();
        assert_eq!(r.start, start);
        assert_eq!(r.anchor, anchor);
        assert_eq!(r.local_block, 7);
        assert!(r.validate_integrity().is_ok());
    }
}
