use crate::digest::{canonical_digest, DigestTool};
use crate::model::{AuthorizationResult, Signature, ValidatedSignature};
use accuproof_authority::KeyPageState;
use accuproof_core::{AccProofError, Hash32, Result};
use ed25519_dalek::{PublicKey, Signature as DalekSignature, Verifier};
use std::collections::HashSet;
use tracing::warn;

/// Validate one signature against a key page's state and the execution
/// transaction hash, per every rule in spec.md §4.7.
pub fn validate_signature(
    signature: &Signature,
    state: &KeyPageState,
    tx_hash: &Hash32,
    local_block: u64,
    exec_mbi: u64,
    digest_tool: &dyn DigestTool,
) -> Result<ValidatedSignature> {
    if signature.signer_version != state.version {
        return Err(AccProofError::SignerVersionMismatch {
            expected: state.version,
            got: signature.signer_version,
        });
    }

    let key_hash = Hash32::sha256(signature.public_key.as_bytes());
    if !state.contains_key(&key_hash) {
        return Err(AccProofError::KeyNotInAuthoritySet);
    }

    if signature.transaction_hash != *tx_hash {
        return Err(AccProofError::Ed25519VerifyFailed);
    }

    if local_block > exec_mbi {
        return Err(AccProofError::TimingViolation {
            local_block,
            exec_mbi,
        });
    }

    let digest = canonical_digest(digest_tool, signature)?;
    let public_key = PublicKey::from_bytes(signature.public_key.as_bytes())
        .map_err(|_| AccProofError::Ed25519VerifyFailed)?;
    let dalek_sig = DalekSignature::from_bytes(&signature.signature)
        .map_err(|_| AccProofError::Ed25519VerifyFailed)?;
    public_key
        .verify(digest.as_bytes(), &dalek_sig)
        .map_err(|_| AccProofError::Ed25519VerifyFailed)?;

    Ok(ValidatedSignature {
        signature: signature.clone(),
        key_hash,
        local_block,
    })
}

/// Apply M-of-N across a signature chain: a failed individual signature
/// is logged and skipped, never fatal on its own; only an unmet
/// threshold at the end fails the stage (spec.md §4.7 "Authorization",
/// §7 "Per-signature failures... are logged and skipped").
pub fn authorize(
    candidates: &[(Signature, u64)],
    state: &KeyPageState,
    tx_hash: &Hash32,
    exec_mbi: u64,
    digest_tool: &dyn DigestTool,
) -> Result<AuthorizationResult> {
    let mut validated_signatures = Vec::new();
    let mut unique_keys = HashSet::new();

    for (signature, local_block) in candidates {
        match validate_signature(signature, state, tx_hash, *local_block, exec_mbi, digest_tool) {
            Ok(validated) => {
                unique_keys.insert(validated.key_hash);
                validated_signatures.push(validated);
            }
            Err(e) => {
                warn!(error = %e, signer = %signature.signer, "signature rejected, skipping");
            }
        }
    }

    let unique_valid_keys = unique_keys.len() as u64;
    let threshold_satisfied = unique_valid_keys >= state.threshold;
    let timing_valid = validated_signatures.iter().all(|v| v.local_block <= exec_mbi);

    if !threshold_satisfied {
        return Err(AccProofError::ThresholdNotMet {
            need: state.threshold,
            have: unique_valid_keys,
        });
    }

    Ok(AuthorizationResult {
        validated_signatures,
        unique_valid_keys,
        required_threshold: state.threshold,
        threshold_satisfied,
        timing_valid,
        execution_success: threshold_satisfied && timing_valid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::BuiltinDigestTool;
    use accuproof_core::AccUrl;
    use ed25519_dalek::{Keypair, Signer};
    use rand::rngs::OsRng;

    fn state_with(keys: Vec<Hash32>, threshold: u64, version: u64) -> KeyPageState {
        KeyPageState {
            version,
            threshold,
            keys,
        }
    }

    fn signed_signature(keypair: &Keypair, tx_hash: Hash32, signer_version: u64) -> Signature {
        let tool = BuiltinDigestTool;
        let mut sig = Signature {
            public_key: Hash32::from_bytes(keypair.public.to_bytes()),
            signature: [0u8; 64],
            transaction_hash: tx_hash,
            signer_version,
            timestamp: 0,
            signer: AccUrl::normalize("acc://x.acme/book0/1").unwrap(),
        };
        let digest = canonical_digest(&tool, &sig).unwrap();
        let dalek_sig = keypair.sign(digest.as_bytes());
        sig.signature = dalek_sig.to_bytes();
        sig
    }

    #[test]
    fn valid_signature_passes_all_rules() {
        let keypair = Keypair::generate(&mut OsRng);
        let tx_hash = Hash32::from_bytes([7; 32]);
        let sig = signed_signature(&keypair, tx_hash, 1);
        let key_hash = Hash32::sha256(&keypair.public.to_bytes());
        let state = state_with(vec![key_hash], 1, 1);
        let tool = BuiltinDigestTool;

        let validated = validate_signature(&sig, &state, &tx_hash, 5, 10, &tool).unwrap();
        assert_eq!(validated.key_hash, key_hash);
    }

    #[test]
    fn version_mismatch_rejected() {
        let keypair = Keypair::generate(&mut OsRng);
        let tx_hash = Hash32::from_bytes([7; 32]);
        let sig = signed_signature(&keypair, tx_hash, 2);
        let key_hash = Hash32::sha256(&keypair.public.to_bytes());
        let state = state_with(vec![key_hash], 1, 1);
        let tool = BuiltinDigestTool;

        assert!(matches!(
            validate_signature(&sig, &state, &tx_hash, 5, 10, &tool),
            Err(AccProofError::SignerVersionMismatch { .. })
        ));
    }

    #[test]
    fn timing_violation_rejected() {
        let keypair = Keypair::generate(&mut OsRng);
        let tx_hash = Hash32::from_bytes([7; 32]);
        let sig = signed_signature(&keypair, tx_hash, 1);
        let key_hash = Hash32::sha256(&keypair.public.to_bytes());
        let state = state_with(vec![key_hash], 1, 1);
        let tool = BuiltinDigestTool;

        assert!(matches!(
            validate_signature(&sig, &state, &tx_hash, 11, 10, &tool),
            Err(AccProofError::TimingViolation { .. })
        ));
    }

    #[test]
    fn multisig_partial_failure_still_authorizes() {
        let kp1 = Keypair::generate(&mut OsRng);
        let kp2 = Keypair::generate(&mut OsRng);
        let kp3 = Keypair::generate(&mut OsRng);
        let tx_hash = Hash32::from_bytes([3; 32]);

        let mut sig1 = signed_signature(&kp1, tx_hash, 1);
        let sig2 = signed_signature(&kp2, tx_hash, 1);
        let sig3 = signed_signature(&kp3, tx_hash, 1);
        // corrupt sig1 so it fails verification
        sig1.signature[0] ^= 0xFF;

        let keys = vec![
            Hash32::sha256(&kp1.public.to_bytes()),
            Hash32::sha256(&kp2.public.to_bytes()),
            Hash32::sha256(&kp3.public.to_bytes()),
        ];
        let state = state_with(keys, 2, 1);
        let tool = BuiltinDigestTool;
        let candidates = vec![(sig1, 1), (sig2, 1), (sig3, 1)];

        let result = authorize(&candidates, &state, &tx_hash, 10, &tool).unwrap();
        assert_eq!(result.unique_valid_keys, 2);
        assert!(result.threshold_satisfied);
        assert!(result.timing_valid);
        assert!(result.execution_success);
    }

    #[test]
    fn threshold_not_met_is_fatal() {
        let kp1 = Keypair::generate(&mut OsRng);
        let tx_hash = Hash32::from_bytes([3; 32]);
        let sig1 = signed_signature(&kp1, tx_hash, 1);
        let keys = vec![Hash32::sha256(&kp1.public.to_bytes())];
        let state = state_with(keys, 2, 1);
        let tool = BuiltinDigestTool;
        let candidates = vec![(sig1, 1)];

        assert!(matches!(
            authorize(&candidates, &state, &tx_hash, 10, &tool),
            Err(AccProofError::ThresholdNotMet { .. })
        ));
    }
}
