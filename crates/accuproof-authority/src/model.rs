use accuproof_core::Hash32;
use serde::{Deserialize, Serialize};

/// A key page's authorization state: how many distinct keys must sign,
/// and which key hashes are authorized (spec.md §3, §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPageState {
    pub version: u64,
    pub threshold: u64,
    pub keys: Vec<Hash32>,
}

impl KeyPageState {
    pub fn contains_key(&self, key_hash: &Hash32) -> bool {
        self.keys.contains(key_hash)
    }
}

/// The `syntheticCreateIdentity` entry that establishes a key page's
/// initial state (spec.md §4.6 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisEvent {
    pub entry_hash: Hash32,
    pub local_block: u64,
    pub page_state: KeyPageState,
}

/// An `updateKeyPage` entry advancing a key page's state by exactly one
/// version (spec.md §4.6 step 3, invariant `new_state.version ==
/// previous_state.version + 1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationEvent {
    pub entry_hash: Hash32,
    pub local_block: u64,
    pub chain_index: u32,
    pub previous_state: KeyPageState,
    pub new_state: KeyPageState,
}

/// KPSW-EXEC: the key page's state as witnessed at execution block
/// `exec_mbi`, built once per `(page, exec_mbi)` pair by replaying
/// `genesis ▹ mutations` (spec.md §4.6, §GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySnapshot {
    pub page_url: String,
    pub exec_mbi: u64,
    pub genesis: GenesisEvent,
    pub mutations: Vec<MutationEvent>,
    pub state_exec: KeyPageState,
}
