use accuproof_core::{canonical_json, AccProofError, Hash32, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// C11: computes a transaction payload's canonical hash for G2's payload
/// binding check (spec.md §4.8 "Payload binding", §4.9 "Canonical-hash
/// tool"). Absence of an external tool degrades G2 gracefully rather
/// than failing the whole run — callers treat `None` from the CLI's
/// optional wiring as "unverified", not as an error.
pub trait CanonicalHashTool: Send + Sync {
    fn canonical_hash(&self, transaction: &Value) -> Result<Hash32>;
}

/// SHA-256 over the canonical JSON rendering of the transaction object.
pub struct BuiltinCanonicalHashTool;

impl CanonicalHashTool for BuiltinCanonicalHashTool {
    fn canonical_hash(&self, transaction: &Value) -> Result<Hash32> {
        let rendered = canonical_json(transaction);
        Ok(Hash32::sha256(rendered.as_bytes()))
    }
}

/// Bridges to an external binary: stdin is the transaction JSON, stdout
/// is a `hash=<hex32>` line or a `{"hash":"..."}` object.
pub struct SubprocessCanonicalHashTool {
    pub binary: PathBuf,
}

impl CanonicalHashTool for SubprocessCanonicalHashTool {
    fn canonical_hash(&self, transaction: &Value) -> Result<Hash32> {
        let mut child = Command::new(&self.binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| AccProofError::Other(format!("canonical-hash tool spawn failed: {e}")))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            AccProofError::Other("canonical-hash tool stdin unavailable".to_string())
        })?;
        serde_json::to_writer(stdin, transaction)
            .map_err(|e| AccProofError::Other(format!("canonical-hash tool write failed: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| AccProofError::Other(format!("canonical-hash tool wait failed: {e}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        if let Ok(json) = serde_json::from_str::<Value>(text.trim()) {
            if let Some(hex) = json.get("hash").and_then(Value::as_str) {
                return Hash32::from_hex(hex);
            }
        }
        for line in text.lines() {
            if let Some(hex) = line.strip_prefix("hash=") {
                return Hash32::from_hex(hex.trim());
            }
        }
        Err(AccProofError::Other(
            "canonical-hash tool produced no parsable hash output".to_string(),
        ))
    }
}
