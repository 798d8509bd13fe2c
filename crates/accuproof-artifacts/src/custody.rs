use accuproof_core::Hash32;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the append-only custody chain (spec.md §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub timestamp: DateTime<Utc>,
    pub artifact_id: String,
    pub operation: String,
    pub hash: Hash32,
    pub previous_hash: Hash32,
    pub validated: bool,
}
