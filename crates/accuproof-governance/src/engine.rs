use crate::config::EngineConfig;
use crate::model::{BindingCheck, G0Result, G1Result, G2Result, ProofOutcome, ProofRequest, ProofStage};
use accuproof_authority::AuthoritySnapshotBuilder;
use accuproof_chainproof::ChainedProofBuilder;
use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, AccUrl, Cancellation, Hash32, MessageId, Result};
use accuproof_receipt::parse_receipt;
use accuproof_rpc::{QueryBuilder, RpcClient};
use accuproof_signature::{authorize, extract_signature, CanonicalHashTool, DigestTool, Signature};
use futures::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

struct SignatureChainEntry {
    entry_hash: Hash32,
    local_block: u64,
}

/// Orchestrates G0 → G1 → G2 (spec.md C10 / §4.8): each higher level
/// reuses the lower level's result as a literal prefix, so a G2 run's
/// output always contains its G1 and G0 results unchanged.
pub struct GovernanceProofEngine {
    rpc: Arc<dyn RpcClient>,
    config: EngineConfig,
}

impl GovernanceProofEngine {
    pub fn new(rpc: Arc<dyn RpcClient>, config: EngineConfig) -> Self {
        Self { rpc, config }
    }

    pub async fn run(
        &self,
        request: &ProofRequest,
        cancel: &Cancellation,
        digest_tool: &dyn DigestTool,
        canonical_hash_tool: Option<&dyn CanonicalHashTool>,
    ) -> Result<ProofOutcome> {
        use crate::model::ProofLevel::*;
        let level_timeout = self.config.level_timeout;

        let run_future = async {
            match request.level {
                G0 => self.run_g0(request, cancel).await.map(ProofOutcome::G0),
                G1 => self
                    .run_g1(request, cancel, digest_tool)
                    .await
                    .map(ProofOutcome::G1),
                G2 => self
                    .run_g2(request, cancel, digest_tool, canonical_hash_tool)
                    .await
                    .map(ProofOutcome::G2),
            }
        };

        let result = match tokio::time::timeout(level_timeout, run_future).await {
            Ok(result) => result,
            Err(_) => Err(AccProofError::Transport(format!(
                "proof level {} exceeded {:?} timeout",
                request.level, level_timeout
            ))
            .at_stage(request.level.to_string())),
        };

        let stage = stage_reached(&result);
        info!(level = %request.level, ?stage, "proof run reached stage");
        result
    }

    /// G0 — resolve the message ID, confirm it lives on `main` with a
    /// receipt, and derive `exec_mbi`/`exec_witness`/`principal`.
    pub async fn run_g0(&self, request: &ProofRequest, cancel: &Cancellation) -> Result<G0Result> {
        cancel.check()?;
        let message_id = MessageId {
            tx_hash: request.tx_hash,
            scope: request.account.clone(),
        };
        let response = self
            .rpc
            .query(&message_id.to_string_canonical(), &QueryBuilder::message_id_resolution())
            .await
            .map_err(|e| e.at_stage("G0"))?;

        let chain_name = get_str_ci(&response, "chainName").unwrap_or("main");
        if !chain_name.eq_ignore_ascii_case("main") {
            return Err(
                AccProofError::Other(format!("message id resolved on chain {chain_name}, not main"))
                    .at_stage("G0"),
            );
        }

        let receipt_json =
            get_ci(&response, "receipt").ok_or(AccProofError::MissingField("message.receipt"))?;
        let receipt = parse_receipt(receipt_json).map_err(|e| e.at_stage("G0"))?;
        receipt.validate_integrity().map_err(|e| e.at_stage("G0"))?;

        let exec_mbi = receipt.local_block;
        let exec_witness = receipt.anchor;
        let principal = request.account.authority().to_string();
        let transaction = get_ci(&response, "transaction")
            .or_else(|| get_ci(&response, "message").and_then(|m| get_ci(m, "transaction")))
            .cloned();

        let chain_index = get_u64_ci(&response, "index").unwrap_or(0);
        let chained_proof = self.try_build_chained_proof(request, chain_index, cancel).await;

        Ok(G0Result {
            principal,
            exec_mbi,
            exec_witness,
            receipt,
            transaction,
            chained_proof,
        })
    }

    /// L1/L2 chained proofs are an independent, best-effort output of G0
    /// (spec.md §4.8 introduction: "independent outputs" sharing the
    /// artifact store and cache) — a failure here never fails G0 itself.
    async fn try_build_chained_proof(
        &self,
        request: &ProofRequest,
        chain_index: u64,
        cancel: &Cancellation,
    ) -> Option<accuproof_chainproof::ChainedProof> {
        let builder = ChainedProofBuilder::new(self.rpc.as_ref());
        match builder
            .build_chained_proof(
                &request.account,
                &request.chain_name,
                &request.tx_hash,
                chain_index,
                &request.network,
                request.proof_grade,
                cancel,
            )
            .await
        {
            Ok(proof) => Some(proof),
            Err(e) => {
                warn!(error = %e, "chained proof construction failed, continuing without it");
                None
            }
        }
    }

    /// G1 — build the authority snapshot, validate the signature chain
    /// against it, and apply M-of-N.
    pub async fn run_g1(
        &self,
        request: &ProofRequest,
        cancel: &Cancellation,
        digest_tool: &dyn DigestTool,
    ) -> Result<G1Result> {
        let g0 = self.run_g0(request, cancel).await?;
        let key_page = request
            .key_page
            .clone()
            .ok_or(AccProofError::MissingField("--keypage"))
            .map_err(|e| e.at_stage("G1"))?;

        // Authority snapshot construction and signature-chain collection
        // are independent sub-proofs over disjoint chains (main vs.
        // signature) — run them concurrently rather than sequentially.
        let (snapshot, candidates) = tokio::try_join!(
            async {
                AuthoritySnapshotBuilder::new(self.rpc.as_ref())
                    .build(&key_page, g0.exec_mbi, cancel)
                    .await
                    .map_err(|e| e.at_stage("G1"))
            },
            async {
                self.collect_signature_candidates(&key_page, g0.exec_mbi, cancel)
                    .await
                    .map_err(|e| e.at_stage("G1"))
            }
        )?;

        let authorization = authorize(
            &candidates,
            &snapshot.state_exec,
            &request.tx_hash,
            g0.exec_mbi,
            digest_tool,
        )
        .map_err(|e| e.at_stage("G1"))?;

        Ok(G1Result {
            g0,
            snapshot,
            authorization,
        })
    }

    async fn collect_signature_candidates(
        &self,
        key_page: &AccUrl,
        exec_mbi: u64,
        cancel: &Cancellation,
    ) -> Result<Vec<(Signature, u64)>> {
        let total = self.signature_chain_count(key_page).await?;

        const PAGE_SIZE: u64 = 50;
        let mut page_starts = Vec::new();
        let mut start = 0u64;
        while start < total {
            page_starts.push(start);
            start += PAGE_SIZE;
        }

        cancel.check()?;
        let pages = try_join_all(page_starts.iter().map(|&page_start| {
            let count = PAGE_SIZE.min(total - page_start);
            async move {
                let response = self
                    .rpc
                    .query(
                        key_page.as_str(),
                        &QueryBuilder::chain_range_signature("signature", page_start, count),
                    )
                    .await?;
                parse_signature_range(&response)
            }
        }))
        .await?;
        let entries: Vec<SignatureChainEntry> = pages.into_iter().flatten().collect();

        let relevant: Vec<&SignatureChainEntry> = entries
            .iter()
            .filter(|entry| entry.local_block <= exec_mbi)
            .collect();
        cancel.check()?;
        let expanded = try_join_all(relevant.iter().map(|entry| async move {
            let response = self
                .rpc
                .query(
                    key_page.as_str(),
                    &QueryBuilder::chain_by_entry("signature", &entry.entry_hash),
                )
                .await?;
            Ok((entry.local_block, entry.entry_hash, response))
        }))
        .await?;

        let mut candidates = Vec::new();
        for (local_block, entry_hash, response) in expanded {
            let message = get_ci(&response, "message")
                .or_else(|| get_ci(&response, "expand").and_then(|e| get_ci(e, "message")));
            let Some(message) = message else {
                warn!(entry_hash = %entry_hash, "signature chain entry missing expanded message, skipping");
                continue;
            };
            match extract_signature(message) {
                Ok(signature) => candidates.push((signature, local_block)),
                Err(e) => warn!(entry_hash = %entry_hash, error = %e, "failed to extract signature, skipping"),
            }
        }
        Ok(candidates)
    }

    async fn signature_chain_count(&self, key_page: &AccUrl) -> Result<u64> {
        let response = self
            .rpc
            .query(key_page.as_str(), &QueryBuilder::chain_count("signature"))
            .await?;
        get_u64_ci(&response, "total")
            .or_else(|| get_u64_ci(&response, "count"))
            .ok_or(AccProofError::MissingField("signature chain total"))
    }

    /// G2 — requires G1, then binds payload, receipt, witness, and
    /// effect (spec.md §4.8 "G2 — Outcome Binding").
    pub async fn run_g2(
        &self,
        request: &ProofRequest,
        cancel: &Cancellation,
        digest_tool: &dyn DigestTool,
        canonical_hash_tool: Option<&dyn CanonicalHashTool>,
    ) -> Result<G2Result> {
        let g1 = self.run_g1(request, cancel, digest_tool).await?;

        let payload_binding = match (&g1.g0.transaction, canonical_hash_tool) {
            (Some(tx), Some(tool)) => match tool.canonical_hash(tx) {
                Ok(hash) if hash == request.tx_hash => {
                    BindingCheck::ok("canonical hash matches transaction hash")
                }
                Ok(_) => BindingCheck::fail("canonical hash does not match transaction hash"),
                Err(e) => BindingCheck::fail(format!("canonical-hash tool error: {e}")),
            },
            (None, _) => BindingCheck::fail("no transaction payload available to hash"),
            (_, None) => BindingCheck::fail("canonical-hash tool not configured; payload binding unverified"),
        };

        let receipt_binding = if g1.g0.receipt.start == request.tx_hash
            && g1.g0.receipt.anchor == g1.g0.exec_witness
        {
            BindingCheck::ok("main chain receipt binds tx_hash to exec_witness")
        } else {
            BindingCheck::fail("main chain receipt does not bind tx_hash to exec_witness")
        };

        let witness_consistency = self.check_witness_consistency(request, &g1.g0.exec_witness).await;

        let effect_binding = match request.expect_entry_hash {
            Some(expected) if expected == request.tx_hash => {
                BindingCheck::ok("effect hash matches expected entry hash")
            }
            Some(_) => BindingCheck::fail("effect hash does not match expected entry hash"),
            None => BindingCheck::ok("no expected entry hash supplied; effect hash equals tx_hash"),
        };

        let g2_proof_complete = payload_binding.verified
            && receipt_binding.verified
            && witness_consistency.verified
            && effect_binding.verified;

        Ok(G2Result {
            g1,
            payload_binding,
            receipt_binding,
            witness_consistency,
            effect_binding,
            g2_proof_complete,
        })
    }

    async fn check_witness_consistency(&self, request: &ProofRequest, exec_witness: &Hash32) -> BindingCheck {
        let message_id = MessageId {
            tx_hash: request.tx_hash,
            scope: request.account.clone(),
        };
        let response = self
            .rpc
            .query(&message_id.to_string_canonical(), &QueryBuilder::message_id_resolution())
            .await;
        match response {
            Ok(value) => {
                let receipt = get_ci(&value, "receipt").and_then(|r| parse_receipt(r).ok());
                match receipt {
                    Some(r) if r.anchor == *exec_witness => {
                        BindingCheck::ok("re-query returned the same anchor")
                    }
                    Some(_) => BindingCheck::fail("re-query returned a different anchor"),
                    None => BindingCheck::fail("re-query returned no receipt"),
                }
            }
            Err(e) => BindingCheck::fail(format!("re-query failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProofLevel;
    use accuproof_signature::{canonical_digest, BuiltinDigestTool, Signature as SigValue};
    use async_trait::async_trait;
    use ed25519_dalek::{Keypair, Signer};
    use rand::rngs::OsRng;
    use serde_json::json;

    struct MockRpc {
        tx_hash: Hash32,
        key_page: String,
        genesis_entry: Hash32,
        sig_entry: Hash32,
        signature_json: Value,
    }

    #[async_trait]
    impl RpcClient for MockRpc {
        async fn query(&self, scope: &str, query: &Value) -> Result<Value> {
            let query_type = query.get("queryType").and_then(Value::as_str).unwrap_or("");

            if query_type == "default" {
                return Ok(json!({
                    "chainName": "main",
                    "index": 0,
                    "receipt": {
                        "start": self.tx_hash.to_hex(),
                        "anchor": self.tx_hash.to_hex(),
                        "localBlock": 10,
                        "entries": [],
                    },
                    "transaction": {"body": {"type": "sendTokens"}},
                }));
            }

            if query_type == "anchorSearch" {
                return Ok(json!({
                    "receipt": {
                        "start": self.tx_hash.to_hex(),
                        "anchor": self.tx_hash.to_hex(),
                        "localBlock": 20,
                        "entries": [],
                    }
                }));
            }

            if scope == self.key_page {
                if query_type == "chain" && query.get("name").and_then(Value::as_str) == Some("main") {
                    if query.get("entry").is_none() && query.get("range").is_none() {
                        return Ok(json!({"total": 1}));
                    }
                    if query.get("range").is_some() {
                        let public_key_hex = self.signature_json["signature"]["publicKey"]
                            .as_str()
                            .unwrap();
                        let public_key_bytes = hex::decode(public_key_hex).unwrap();
                        let key_hash = Hash32::sha256(&public_key_bytes).to_hex();
                        return Ok(json!({
                            "records": [{
                                "index": 0,
                                "entry": self.genesis_entry.to_hex(),
                                "receipt": {"localBlock": 1},
                                "transaction": {
                                    "body": {
                                        "type": "syntheticCreateIdentity",
                                        "accounts": [{
                                            "url": self.key_page,
                                            "type": "keypage",
                                            "threshold": 1,
                                            "keys": [{"publicKeyHash": key_hash}],
                                        }],
                                    }
                                }
                            }]
                        }));
                    }
                }
                if query_type == "chain" && query.get("name").and_then(Value::as_str) == Some("signature") {
                    if query.get("range").is_some() {
                        return Ok(json!({
                            "records": [{
                                "entry": self.sig_entry.to_hex(),
                                "receipt": {"localBlock": 1},
                            }]
                        }));
                    }
                    if query.get("entry").is_some() {
                        return Ok(json!({"message": self.signature_json}));
                    }
                    return Ok(json!({"total": 1}));
                }
            }

            Err(AccProofError::Other(format!("unmocked query: scope={scope} query={query}")))
        }

        async fn query_raw(&self, _scope: &str, _query: &Value) -> Result<Vec<u8>> {
            unimplemented!("not exercised by these tests")
        }

        fn endpoint(&self) -> &str {
            "mock://test"
        }
    }

    fn mock_setup() -> (MockRpc, Hash32) {
        let tx_hash = Hash32::from_bytes([0x11; 32]);
        let keypair = Keypair::generate(&mut OsRng);
        let tool = BuiltinDigestTool;
        let mut sig = SigValue {
            public_key: Hash32::from_bytes(keypair.public.to_bytes()),
            signature: [0u8; 64],
            transaction_hash: tx_hash,
            signer_version: 1,
            timestamp: 0,
            signer: AccUrl::normalize("acc://x.acme/book0/1").unwrap(),
        };
        let digest = canonical_digest(&tool, &sig).unwrap();
        sig.signature = keypair.sign(digest.as_bytes()).to_bytes();

        let signature_json = json!({
            "type": "signature",
            "signature": {
                "type": "ed25519",
                "publicKey": hex::encode(keypair.public.to_bytes()),
                "signature": hex::encode(sig.signature),
                "transactionHash": tx_hash.to_hex(),
                "signerVersion": 1,
                "timestamp": 0,
                "signer": "acc://x.acme/book0/1",
            }
        });

        let rpc = MockRpc {
            tx_hash,
            key_page: "acc://x.acme/book0/1".to_string(),
            genesis_entry: Hash32::from_bytes([0x05; 32]),
            sig_entry: Hash32::from_bytes([0x06; 32]),
            signature_json,
        };
        (rpc, tx_hash)
    }

    fn request(tx_hash: Hash32, level: ProofLevel) -> ProofRequest {
        ProofRequest {
            account: AccUrl::normalize("acc://x.acme/data1").unwrap(),
            chain_name: "main".to_string(),
            tx_hash,
            level,
            key_page: Some(AccUrl::normalize("acc://x.acme/book0/1").unwrap()),
            expect_entry_hash: None,
            network: "mainnet".to_string(),
            proof_grade: false,
        }
    }

    #[tokio::test]
    async fn g0_happy_path() {
        let (rpc, tx_hash) = mock_setup();
        let engine = GovernanceProofEngine::new(Arc::new(rpc), EngineConfig::default());
        let cancel = Cancellation::new();
        let req = request(tx_hash, ProofLevel::G0);

        let g0 = engine.run_g0(&req, &cancel).await.unwrap();
        assert_eq!(g0.principal, "x.acme");
        assert_eq!(g0.exec_mbi, 10);
        assert_eq!(g0.exec_witness, tx_hash);
    }

    #[tokio::test]
    async fn g1_happy_path_threshold_satisfied() {
        let (rpc, tx_hash) = mock_setup();
        let engine = GovernanceProofEngine::new(Arc::new(rpc), EngineConfig::default());
        let cancel = Cancellation::new();
        let req = request(tx_hash, ProofLevel::G1);
        let digest_tool = BuiltinDigestTool;

        let g1 = engine.run_g1(&req, &cancel, &digest_tool).await.unwrap();
        assert_eq!(g1.snapshot.state_exec.threshold, 1);
        assert!(g1.authorization.threshold_satisfied);
        assert_eq!(g1.authorization.unique_valid_keys, 1);
    }
}

/// Maps a finished run's outcome onto the `INIT → G0_OK → G1_OK → G2_OK`
/// / `FAIL` state machine (spec.md §4.8) for logging and diagnostics —
/// the level actually reached before success or failure.
fn stage_reached(result: &Result<ProofOutcome>) -> ProofStage {
    match result {
        Ok(ProofOutcome::G0(_)) => ProofStage::G0Ok,
        Ok(ProofOutcome::G1(_)) => ProofStage::G1Ok,
        Ok(ProofOutcome::G2(_)) => ProofStage::G2Ok,
        Err(_) => ProofStage::Fail,
    }
}

fn parse_signature_range(response: &Value) -> Result<Vec<SignatureChainEntry>> {
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
            Ok(SignatureChainEntry {
                entry_hash,
                local_block,
            })
        })
        .collect()
}
