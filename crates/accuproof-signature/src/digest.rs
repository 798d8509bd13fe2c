use crate::model::{Signature, SignatureMetadata};
use accuproof_core::{canonical_json, AccProofError, Hash32, Result};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// C11: computes `H_metadata(metadata_object)`, the protocol-defined hash
/// feeding the Ed25519 verification digest (spec.md §4.7 step 2). The
/// engine ships a built-in implementation and supports bridging to an
/// external tool for bit-exact conformance (spec.md §9 "external tool
/// bridging").
pub trait DigestTool: Send + Sync {
    fn metadata_hash(&self, metadata: &SignatureMetadata) -> Result<Hash32>;
}

/// SHA-256 over the canonical JSON rendering of the metadata object.
/// This is an explicit open-question decision (spec.md §9): the
/// authoritative hashing function for `signature.Metadata()` is defined
/// by the external protocol library and must be matched bit-for-bit
/// against a conformance vector when one is available.
pub struct BuiltinDigestTool;

impl DigestTool for BuiltinDigestTool {
    fn metadata_hash(&self, metadata: &SignatureMetadata) -> Result<Hash32> {
        let rendered = canonical_json(&metadata.to_json());
        Ok(Hash32::sha256(rendered.as_bytes()))
    }
}

/// Bridges to an external binary for conformance testing: the metadata
/// object is written to the subprocess's stdin as JSON; stdout is parsed
/// as a `hash=<hex32>` line or a `{"hash":"..."}` JSON object.
pub struct SubprocessDigestTool {
    pub binary: PathBuf,
}

impl DigestTool for SubprocessDigestTool {
    fn metadata_hash(&self, metadata: &SignatureMetadata) -> Result<Hash32> {
        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| AccProofError::Other(format!("digest tool spawn failed: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AccProofError::Other("digest tool stdin unavailable".to_string()))?;
        serde_json::to_writer(stdin, &metadata.to_json())
            .map_err(|e| AccProofError::Other(format!("digest tool write failed: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| AccProofError::Other(format!("digest tool wait failed: {e}")))?;
        parse_hash_output(&output.stdout)
    }
}

fn parse_hash_output(stdout: &[u8]) -> Result<Hash32> {
    let text = String::from_utf8_lossy(stdout);
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text.trim()) {
        if let Some(hex) = json.get("hash").and_then(|v| v.as_str()) {
            return Hash32::from_hex(hex);
        }
    }
    for line in text.lines() {
        if let Some(hex) = line.strip_prefix("hash=") {
            return Hash32::from_hex(hex.trim());
        }
    }
    Err(AccProofError::Other(
        "digest tool produced no parsable hash output".to_string(),
    ))
}

/// `digest := SHA256(md_hash ‖ txn_hash)` (spec.md §4.7 step 3) — the
/// message fed to Ed25519 verification.
pub fn canonical_digest(tool: &dyn DigestTool, signature: &Signature) -> Result<Hash32> {
    let metadata = SignatureMetadata::from_signature(signature);
    let md_hash = tool.metadata_hash(&metadata)?;
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(md_hash.as_bytes());
    buf.extend_from_slice(signature.transaction_hash.as_bytes());
    Ok(Hash32::sha256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use accuproof_core::AccUrl;

    fn sample_signature() -> Signature {
        Signature {
            public_key: Hash32::from_bytes([1; 32]),
            signature: [0u8; 64],
            transaction_hash: Hash32::from_bytes([2; 32]),
            signer_version: 1,
            timestamp: 0,
            signer: AccUrl::normalize("acc://x.acme/book0/1").unwrap(),
        }
    }

    #[test]
    fn builtin_digest_is_deterministic() {
        let tool = BuiltinDigestTool;
        let sig = sample_signature();
        let a = canonical_digest(&tool, &sig).unwrap();
        let b = canonical_digest(&tool, &sig).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_tx_hash_changes_digest() {
        let tool = BuiltinDigestTool;
        let mut sig = sample_signature();
        let base = canonical_digest(&tool, &sig).unwrap();
        sig.transaction_hash = Hash32::from_bytes([9; 32]);
        let changed = canonical_digest(&tool, &sig).unwrap();
        assert_ne!(base, changed);
    }

    #[test]
    fn parse_hash_output_accepts_json_and_line_forms() {
        let hex = "aa".repeat(32);
        let json = format!("{{\"hash\":\"{hex}\"}}");
        assert_eq!(parse_hash_output(json.as_bytes()).unwrap().to_hex(), hex);

        let line = format!("hash={hex}\n");
        assert_eq!(parse_hash_output(line.as_bytes()).unwrap().to_hex(), hex);
    }
}
