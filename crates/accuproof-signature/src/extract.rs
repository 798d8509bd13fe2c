use crate::model::Signature;
use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, AccUrl, Hash32, Result};
use serde_json::Value;

/// Extract an Ed25519 signature from a message-ID response's `message`
/// object, requiring `message.type == "signature"` and
/// `signature.type == "ed25519"` (spec.md §4.7).
pub fn extract_signature(message: &Value) -> Result<Signature> {
    let message_type = get_str_ci(message, "type").unwrap_or_default();
    if !message_type.eq_ignore_ascii_case("signature") {
        return Err(AccProofError::UnknownSignatureType(message_type.to_string()));
    }
    let signature_obj =
        get_ci(message, "signature").ok_or(AccProofError::MissingField("message.signature"))?;
    let signature_type = get_str_ci(signature_obj, "type").unwrap_or_default();
    if !signature_type.eq_ignore_ascii_case("ed25519") {
        return Err(AccProofError::UnknownSignatureType(signature_type.to_string()));
    }

    let public_key = hex_field(signature_obj, "publicKey")?;
    let signature_bytes = hex64_field(signature_obj, "signature")?;
    let transaction_hash = hex_field(signature_obj, "transactionHash")?;
    let signer_version = get_u64_ci(signature_obj, "signerVersion")
        .ok_or(AccProofError::MissingField("signature.signerVersion"))?;
    let timestamp = get_u64_ci(signature_obj, "timestamp").unwrap_or(0);
    let signer_raw =
        get_str_ci(signature_obj, "signer").ok_or(AccProofError::MissingField("signature.signer"))?;
    let signer = AccUrl::normalize(signer_raw)?;

    Ok(Signature {
        public_key,
        signature: signature_bytes,
        transaction_hash,
        signer_version,
        timestamp,
        signer,
    })
}

fn hex_field(value: &Value, key: &'static str) -> Result<Hash32> {
    let raw = get_str_ci(value, key).ok_or(AccProofError::MissingField(key))?;
    Hash32::from_hex(raw)
}

fn hex64_field(value: &Value, key: &'static str) -> Result<[u8; 64]> {
    let raw = get_str_ci(value, key).ok_or(AccProofError::MissingField(key))?;
    let bytes = hex::decode(raw.trim()).map_err(|e| AccProofError::HexDecode(e.to_string()))?;
    if bytes.len() != 64 {
        return Err(AccProofError::BadSignatureLength {
            expected: 64,
            got: bytes.len(),
        });
    }
    let mut arr = [0u8; 64];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}
