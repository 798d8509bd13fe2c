use crate::model::{ChainedProof, TrustLevel};
use accuproof_core::{AccProofError, Result};
use accuproof_receipt::stitch;

/// Verifies a built `ChainedProof` and assigns it a trust level (spec.md
/// C7 / §4.5): `DN Anchored` iff L1+L2 verify, independent of finality —
/// which this function only reaches after `validate_integrity`/`stitch`
/// have already succeeded via `?`, so every successful return is at
/// least `DN Anchored`. Both finality bindings verifying upgrades that
/// to `Proof-Grade`; finality never downgrades a result that made it
/// this far. `Partition Trust` (L1 only, no L2) and `Invalid` describe
/// proof shapes this builder never produces (it always builds L2
/// alongside L1) and a failed integrity/stitch check respectively — the
/// latter returns early as an `Err` above, not from this match.
pub struct ChainedProofVerifier;

impl ChainedProofVerifier {
    pub fn verify(proof: &ChainedProof) -> Result<TrustLevel> {
        proof.layer1.receipt.validate_integrity()?;
        proof.layer2.receipt.validate_integrity()?;
        stitch(&proof.layer1.receipt, &proof.layer2.receipt)?;

        let level = match (&proof.layer1_finality, &proof.layer2_finality) {
            (Some(l1f), Some(l2f)) if l1f.verified() && l2f.verified() => TrustLevel::ProofGrade,
            _ => TrustLevel::DnAnchored,
        };
        Ok(level)
    }

    /// Same as `verify`, but never returns an error: any integrity or
    /// stitch failure collapses to `TrustLevel::Invalid`.
    pub fn verify_lenient(proof: &ChainedProof) -> TrustLevel {
        Self::verify(proof).unwrap_or(TrustLevel::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConsensusFinality, Layer1, Layer2, ValidatorVote};
    use accuproof_core::Hash32;
    use accuproof_receipt::MerkleReceipt;
    use chrono::Utc;

    fn leaf(b: u8) -> Hash32 {
        Hash32::from_bytes([b; 32])
    }

    fn sample_proof() -> ChainedProof {
        let start1 = leaf(1);
        let anchor1 = leaf(2);
        let l1 = Layer1 {
            scope: "acc://x.acme".into(),
            chain_name: "main".into(),
            chain_index: 0,
            source_partition: "partition-1".into(),
            receipt: MerkleReceipt {
                start: start1,
                anchor: anchor1,
                path: vec![],
                local_block: 10,
            },
        };
        // stitched: l2.start == l1.anchor
        let anchor2 = leaf(3);
        let l2 = Layer2 {
            receipt: MerkleReceipt {
                start: anchor1,
                anchor: anchor2,
                path: vec![],
                local_block: 20,
            },
        };
        ChainedProof {
            version: 1,
            timestamp: Utc::now(),
            layer1: l1,
            layer1_finality: None,
            layer2: l2,
            layer2_finality: None,
        }
    }

    fn finality(ok: bool) -> ConsensusFinality {
        ConsensusFinality {
            partition: "partition-1".into(),
            network: "mainnet".into(),
            height: 11,
            root: leaf(9),
            commit_root: if ok { leaf(9) } else { leaf(8) },
            validators: vec![ValidatorVote {
                address: "v1".into(),
                power: 10,
                signed: ok,
            }],
            power_ok: ok,
            root_binding_ok: ok,
        }
    }

    #[test]
    fn no_finality_is_dn_anchored() {
        let proof = sample_proof();
        assert_eq!(ChainedProofVerifier::verify(&proof).unwrap(), TrustLevel::DnAnchored);
    }

    #[test]
    fn one_finality_is_dn_anchored() {
        let mut proof = sample_proof();
        proof.layer1_finality = Some(finality(true));
        assert_eq!(ChainedProofVerifier::verify(&proof).unwrap(), TrustLevel::DnAnchored);
    }

    #[test]
    fn both_finality_ok_is_proof_grade() {
        let mut proof = sample_proof();
        proof.layer1_finality = Some(finality(true));
        proof.layer2_finality = Some(finality(true));
        assert_eq!(ChainedProofVerifier::verify(&proof).unwrap(), TrustLevel::ProofGrade);
    }

    #[test]
    fn both_finality_failing_stays_dn_anchored() {
        let mut proof = sample_proof();
        proof.layer1_finality = Some(finality(false));
        proof.layer2_finality = Some(finality(false));
        assert_eq!(ChainedProofVerifier::verify(&proof).unwrap(), TrustLevel::DnAnchored);
    }

    #[test]
    fn broken_stitch_is_error() {
        let mut proof = sample_proof();
        proof.layer2.receipt.start = leaf(99);
        assert!(matches!(
            ChainedProofVerifier::verify(&proof),
            Err(AccProofError::StitchMismatch)
        ));
    }
}
