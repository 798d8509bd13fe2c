use accuproof_core::{AccUrl, Hash32};
use serde::{Deserialize, Serialize};

/// A single Ed25519 signature extracted from a message-ID response
/// (spec.md §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    pub public_key: Hash32,
    #[serde(with = "signature_bytes")]
    pub signature: [u8; 64],
    pub transaction_hash: Hash32,
    pub signer_version: u64,
    pub timestamp: u64,
    pub signer: AccUrl,
}

mod signature_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))
    }
}

/// The metadata object hashed as part of the protocol-specific canonical
/// digest (spec.md §4.7 step 1).
#[derive(Debug, Clone, Serialize)]
pub struct SignatureMetadata {
    pub public_key: Hash32,
    pub signer: AccUrl,
    pub signer_version: u64,
    pub timestamp: u64,
    pub vote: u8,
}

impl SignatureMetadata {
    pub fn from_signature(s: &Signature) -> Self {
        Self {
            public_key: s.public_key,
            signer: s.signer.clone(),
            signer_version: s.signer_version,
            timestamp: s.timestamp,
            vote: 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "public_key": self.public_key.to_hex(),
            "signer": self.signer.as_str(),
            "signer_version": self.signer_version,
            "timestamp": self.timestamp,
            "vote": self.vote,
        })
    }
}

/// A signature that passed every rule in spec.md §4.7's validation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedSignature {
    pub signature: Signature,
    pub key_hash: Hash32,
    pub local_block: u64,
}

/// The outcome of applying M-of-N to a signature chain against a key
/// page's state (spec.md §4.7 "Authorization"). `authority_snapshot` is
/// deliberately not duplicated here — it is already carried one level up
/// as `G1Result::snapshot`, and every `AuthorizationResult` is only ever
/// constructed alongside one (see `accuproof-governance::engine::run_g1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub validated_signatures: Vec<ValidatedSignature>,
    pub unique_valid_keys: u64,
    pub required_threshold: u64,
    pub threshold_satisfied: bool,
    /// `true` iff every validated signature's owning entry had
    /// `local_block <= exec_mbi` (spec.md §4.8 G1 invariant
    /// `timing_valid == true`) — guaranteed by construction, since
    /// `validate_signature` rejects any signature that fails this check
    /// before it is ever added to `validated_signatures`.
    pub timing_valid: bool,
    /// `threshold_satisfied && timing_valid`: the single pass/fail gate
    /// for G1's authorization stage.
    pub execution_success: bool,
}
