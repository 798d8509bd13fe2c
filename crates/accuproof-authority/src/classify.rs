use crate::model::KeyPageState;
use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, AccUrl, Hash32, Result};
use serde_json::Value;

/// The parsed shape of one main-chain entry's transaction body
/// (spec.md §4.6 step 3; §9 "tagged sum types").
pub enum TxBody {
    SyntheticCreateIdentity { page_state: KeyPageState },
    UpdateKeyPage { previous_state: KeyPageState, new_state: KeyPageState },
    Other,
}

/// Classify an expanded transaction body, resolving `syntheticCreateIdentity`
/// against the target key page's normalized URL inside `accounts[]`.
pub fn classify_tx_body(transaction: &Value, page_url: &AccUrl) -> Result<TxBody> {
    let body = get_ci(transaction, "body")
        .ok_or(AccProofError::MissingField("transaction.body"))?;
    let tx_type = get_str_ci(body, "type").unwrap_or_default();

    match tx_type {
        "syntheticCreateIdentity" => {
            let accounts = get_ci(body, "accounts")
                .and_then(Value::as_array)
                .ok_or(AccProofError::MissingField("transaction.body.accounts"))?;
            let account = accounts
                .iter()
                .find(|a| is_target_key_page(a, page_url))
                .ok_or_else(|| AccProofError::KeyPageNotInGenesis(page_url.as_str().to_string()))?;
            let page_state = parse_key_page_state(account)?;
            Ok(TxBody::SyntheticCreateIdentity { page_state })
        }
        "updateKeyPage" => {
            let previous = get_ci(body, "previousState")
                .ok_or(AccProofError::MissingField("transaction.body.previousState"))?;
            let new = get_ci(body, "newState")
                .or_else(|| get_ci(body, "keyPage"))
                .ok_or(AccProofError::MissingField("transaction.body.newState"))?;
            Ok(TxBody::UpdateKeyPage {
                previous_state: parse_key_page_state(previous)?,
                new_state: parse_key_page_state(new)?,
            })
        }
        _ => Ok(TxBody::Other),
    }
}

fn is_target_key_page(account: &Value, page_url: &AccUrl) -> bool {
    let url = get_str_ci(account, "url").unwrap_or_default();
    let kind = get_str_ci(account, "type").unwrap_or_default();
    kind.eq_ignore_ascii_case("keypage")
        && AccUrl::normalize(url)
            .map(|normalized| normalized.as_str() == page_url.as_str())
            .unwrap_or(false)
}

/// `version` defaults to 1 when absent (a freshly-created key page carries
/// no explicit version field in some records).
fn parse_key_page_state(value: &Value) -> Result<KeyPageState> {
    let version = get_u64_ci(value, "version").unwrap_or(1);
    let threshold = get_u64_ci(value, "threshold")
        .ok_or(AccProofError::MissingField("keyPage.threshold"))?;
    let keys_json = get_ci(value, "keys")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut keys = Vec::with_capacity(keys_json.len());
    for key in &keys_json {
        let hash = parse_key_hash(key)?;
        if keys.contains(&hash) {
            return Err(AccProofError::DuplicateKey);
        }
        keys.push(hash);
    }

    // spec.md §3 Key Page State invariant: 1 ≤ threshold ≤ len(keys). A
    // threshold of 0 would let an empty signature set satisfy M-of-N.
    if threshold == 0 || threshold as usize > keys.len() {
        return Err(AccProofError::InvalidThreshold {
            threshold,
            num_keys: keys.len(),
        });
    }

    Ok(KeyPageState {
        version,
        threshold,
        keys,
    })
}

/// A key is identified by `publicKeyHash`, else `keyHash`, else
/// `SHA-256(publicKey)` (spec.md §4.6 "Key parsing").
fn parse_key_hash(key: &Value) -> Result<Hash32> {
    if let Some(hex) = get_str_ci(key, "publicKeyHash") {
        return Hash32::from_hex(hex);
    }
    if let Some(hex) = get_str_ci(key, "keyHash") {
        return Hash32::from_hex(hex);
    }
    let public_key = get_str_ci(key, "publicKey")
        .ok_or(AccProofError::MissingField("key.publicKey"))?;
    let bytes = hex::decode(public_key.trim())
        .map_err(|e| AccProofError::HexDecode(e.to_string()))?;
    Ok(Hash32::sha256(&bytes))
}
