use crate::classify::{classify_tx_body, TxBody};
use crate::model::{AuthoritySnapshot, GenesisEvent, KeyPageState, MutationEvent};
use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, AccUrl, Cancellation, Hash32, Result};
use accuproof_rpc::{QueryBuilder, RpcClient};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::warn;

const PAGE_SIZE: u64 = 50;

struct RawEntry {
    entry_hash: Hash32,
    local_block: u64,
    transaction: Option<Value>,
}

/// Reconstructs a key page's KPSW-EXEC snapshot by enumerating its own
/// main chain, classifying genesis/mutation entries, and replaying them
/// in deterministic order (spec.md C8 / §4.6).
pub struct AuthoritySnapshotBuilder<'a> {
    pub rpc: &'a dyn RpcClient,
}

impl<'a> AuthoritySnapshotBuilder<'a> {
    pub fn new(rpc: &'a dyn RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn build(
        &self,
        page_url: &AccUrl,
        exec_mbi: u64,
        cancel: &Cancellation,
    ) -> Result<AuthoritySnapshot> {
        cancel.check()?;
        let total = self.chain_count(page_url).await?;

        let mut page_starts = Vec::new();
        let mut start = 0u64;
        while start < total {
            page_starts.push(start);
            start += PAGE_SIZE;
        }

        cancel.check()?;
        let pages = try_join_all(
            page_starts
                .iter()
                .map(|&page_start| self.fetch_page(page_url, page_start, total)),
        )
        .await?;

        let mut genesis_candidates = Vec::new();
        let mut mutations = Vec::new();

        for entry in pages.into_iter().flatten() {
            if entry.local_block > exec_mbi {
                continue;
            }
            let Some(transaction) = entry.transaction.as_ref() else {
                continue;
            };
            match classify_tx_body(transaction, page_url)? {
                TxBody::SyntheticCreateIdentity { page_state } => {
                    genesis_candidates.push(GenesisEvent {
                        entry_hash: entry.entry_hash,
                        local_block: entry.local_block,
                        page_state,
                    });
                }
                TxBody::UpdateKeyPage {
                    previous_state,
                    new_state,
                } => {
                    mutations.push(MutationEvent {
                        entry_hash: entry.entry_hash,
                        local_block: entry.local_block,
                        chain_index: chain_index_of(&entry.entry_hash),
                        previous_state,
                        new_state,
                    });
                }
                TxBody::Other => {}
            }
        }

        if genesis_candidates.len() != 1 {
            return Err(AccProofError::GenesisCountMismatch(genesis_candidates.len()));
        }
        let genesis = genesis_candidates.remove(0);

        mutations.sort_by(|a, b| {
            (a.local_block, a.chain_index, a.entry_hash.as_bytes())
                .cmp(&(b.local_block, b.chain_index, b.entry_hash.as_bytes()))
        });

        let state_exec = replay(&genesis, &mutations)?;

        Ok(AuthoritySnapshot {
            page_url: page_url.as_str().to_string(),
            exec_mbi,
            genesis,
            mutations,
            state_exec,
        })
    }

    async fn chain_count(&self, page_url: &AccUrl) -> Result<u64> {
        let response = self
            .rpc
            .query(page_url.as_str(), &QueryBuilder::chain_count("main"))
            .await?;
        get_u64_ci(&response, "total")
            .or_else(|| get_u64_ci(&response, "count"))
            .ok_or(AccProofError::MissingField("chain.total"))
    }

    async fn fetch_page(
        &self,
        page_url: &AccUrl,
        page_start: u64,
        total: u64,
    ) -> Result<Vec<RawEntry>> {
        let count = PAGE_SIZE.min(total - page_start);
        let query = QueryBuilder::chain_range_main("main", page_start, count);
        let response = self.rpc.query(page_url.as_str(), &query).await?;
        parse_range_response(&response)
    }
}

fn parse_range_response(response: &Value) -> Result<Vec<RawEntry>> {
    let items = get_ci(response, "records")
        .or_else(|| get_ci(response, "entries"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    items
        .iter()
        .map(|item| {
            let entry_hash = get_str_ci(item, "entry")
                .ok_or(AccProofError::MissingField("range.entry"))
                .and_then(Hash32::from_hex)?;
            let receipt = get_ci(item, "receipt");
            let local_block = receipt
                .and_then(|r| get_u64_ci(r, "localBlock"))
                .or_else(|| get_u64_ci(item, "localBlock"))
                .ok_or(AccProofError::MissingField("range.receipt.localBlock"))?;
            let transaction = get_ci(item, "transaction")
                .or_else(|| get_ci(item, "message").and_then(|m| get_ci(m, "transaction")))
                .cloned();
            Ok(RawEntry {
                entry_hash,
                local_block,
                transaction,
            })
        })
        .collect()
}

/// First 4 bytes of the entry hash, big-endian, as the mutation
/// tie-breaker (spec.md §4.6 step 5; §9 open question — a canonical
/// chain index, if the network ever surfaces one, supersedes this).
fn chain_index_of(entry_hash: &Hash32) -> u32 {
    let b = entry_hash.as_bytes();
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn replay(genesis: &GenesisEvent, mutations: &[MutationEvent]) -> Result<KeyPageState> {
    let mut state = genesis.page_state.clone();
    for mutation in mutations {
        if mutation.previous_state.version != state.version {
            return Err(AccProofError::MutationVersionGap {
                state_version: state.version,
                mutation_version: mutation.previous_state.version,
            });
        }
        if mutation.new_state.version != state.version + 1 {
            return Err(AccProofError::MutationVersionGap {
                state_version: state.version,
                mutation_version: mutation.new_state.version,
            });
        }
        state = mutation.new_state.clone();
        warn!(
            entry_hash = %mutation.entry_hash,
            version = state.version,
            "applied key page mutation"
        );
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyPageState;

    fn state(version: u64, threshold: u64) -> KeyPageState {
        KeyPageState {
            version,
            threshold,
            keys: vec![Hash32::from_bytes([1; 32])],
        }
    }

    fn genesis() -> GenesisEvent {
        GenesisEvent {
            entry_hash: Hash32::from_bytes([0; 32]),
            local_block: 1,
            page_state: state(1, 1),
        }
    }

    #[test]
    fn replay_empty_mutations_returns_genesis_state() {
        let g = genesis();
        let s = replay(&g, &[]).unwrap();
        assert_eq!(s, g.page_state);
    }

    #[test]
    fn replay_chains_versions_forward() {
        let g = genesis();
        let m1 = MutationEvent {
            entry_hash: Hash32::from_bytes([1; 32]),
            local_block: 2,
            chain_index: 0,
            previous_state: state(1, 1),
            new_state: state(2, 2),
        };
        let s = replay(&g, &[m1]).unwrap();
        assert_eq!(s.version, 2);
        assert_eq!(s.threshold, 2);
    }

    #[test]
    fn replay_rejects_version_gap() {
        let g = genesis();
        let bad = MutationEvent {
            entry_hash: Hash32::from_bytes([1; 32]),
            local_block: 2,
            chain_index: 0,
            previous_state: state(5, 1),
            new_state: state(6, 2),
        };
        assert!(matches!(
            replay(&g, &[bad]),
            Err(AccProofError::MutationVersionGap { .. })
        ));
    }

    #[test]
    fn chain_index_reads_first_four_bytes_be() {
        let h = Hash32::from_bytes([0x01, 0x02, 0x03, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(chain_index_of(&h), 0x01020304);
    }
}
