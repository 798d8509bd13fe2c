use accuproof_core::Hash32;
use serde_json::{json, Value};

/// Builds the canonical query-object payloads named bit-exact in spec.md
/// §4.3. Every function returns the object to be sent as `query` in a
/// JSON-RPC `query` call's `params`.
pub struct QueryBuilder;

impl QueryBuilder {
    /// `{queryType:"chain", name:<chain>}`
    pub fn chain_count(chain_name: &str) -> Value {
        json!({ "queryType": "chain", "name": chain_name })
    }

    /// `{queryType:"chain", name, entry:<hex32>, includeReceipt:true, expand:true}`
    pub fn chain_by_entry(chain_name: &str, entry: &Hash32) -> Value {
        json!({
            "queryType": "chain",
            "name": chain_name,
            "entry": entry.to_hex(),
            "includeReceipt": true,
            "expand": true,
        })
    }

    /// Main-chain range query:
    /// `{queryType:"chain", name, range:{start,count}, includeReceipt:{forAny:true}, expand:true}`
    pub fn chain_range_main(chain_name: &str, start: u64, count: u64) -> Value {
        json!({
            "queryType": "chain",
            "name": chain_name,
            "range": { "start": start, "count": count },
            "includeReceipt": { "forAny": true },
            "expand": true,
        })
    }

    /// Signature-chain range query — identical to `chain_range_main` but
    /// omits expansion (spec.md §4.3).
    pub fn chain_range_signature(chain_name: &str, start: u64, count: u64) -> Value {
        json!({
            "queryType": "chain",
            "name": chain_name,
            "range": { "start": start, "count": count },
            "includeReceipt": { "forAny": true },
        })
    }

    /// `{queryType:"default", includeReceipt:{forAny:true}, expand:true}`
    pub fn message_id_resolution() -> Value {
        json!({
            "queryType": "default",
            "includeReceipt": { "forAny": true },
            "expand": true,
        })
    }

    /// `{queryType:"anchorSearch", anchor:<hex32>, includeReceipt:true}`
    pub fn anchor_search(anchor: &Hash32) -> Value {
        json!({
            "queryType": "anchorSearch",
            "anchor": anchor.to_hex(),
            "includeReceipt": true,
        })
    }
}
