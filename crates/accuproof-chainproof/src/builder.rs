use crate::model::{ChainedProof, ConsensusFinality, Layer1, Layer2, ValidatorVote};
use accuproof_core::json_ext::{get_ci, get_str_ci, get_u64_ci};
use accuproof_core::{AccProofError, AccUrl, Cancellation, Hash32, Result};
use accuproof_receipt::parse_receipt;
use accuproof_rpc::{QueryBuilder, RpcClient};
use chrono::Utc;
use serde_json::{json, Value};

const DN_SCOPE: &str = "acc://dn.acme/anchors";

/// Builds L1/L2 chained proofs and, optionally, their consensus-finality
/// bindings (spec.md C6 / §4.5).
pub struct ChainedProofBuilder<'a> {
    pub rpc: &'a dyn RpcClient,
}

impl<'a> ChainedProofBuilder<'a> {
    pub fn new(rpc: &'a dyn RpcClient) -> Self {
        Self { rpc }
    }

    /// L1: a `chainEntry` record with receipt, on `<scope>/<chain_name>`.
    pub async fn build_layer1(
        &self,
        scope: &AccUrl,
        chain_name: &str,
        tx_hash: &Hash32,
        chain_index: u64,
        cancel: &Cancellation,
    ) -> Result<Layer1> {
        cancel.check()?;
        let query = QueryBuilder::chain_by_entry(chain_name, tx_hash);
        let response = self.rpc.query(scope.as_str(), &query).await?;
        let receipt_json = get_ci(&response, "receipt")
            .ok_or(AccProofError::MissingField("chainEntry.receipt"))?;
        let receipt = parse_receipt(receipt_json)?;
        receipt.validate_integrity()?;

        let source_partition = get_str_ci(&response, "partition")
            .map(str::to_string)
            .unwrap_or_else(|| scope.authority().to_string());

        Ok(Layer1 {
            scope: scope.as_str().to_string(),
            chain_name: chain_name.to_string(),
            chain_index,
            source_partition,
            receipt,
        })
    }

    /// L2: anchor-search on the DN for `layer1.anchor`; require
    /// `l2.start == l1.anchor` byte-exactly.
    pub async fn build_layer2(&self, layer1: &Layer1, cancel: &Cancellation) -> Result<Layer2> {
        cancel.check()?;
        let query = QueryBuilder::anchor_search(&layer1.anchor());
        let response = self.rpc.query(DN_SCOPE, &query).await?;
        let receipt_json = get_ci(&response, "receipt")
            .ok_or(AccProofError::MissingField("anchorSearch.receipt"))?;
        let receipt = parse_receipt(receipt_json)?;
        if receipt.start != layer1.anchor() {
            return Err(AccProofError::StitchMismatch);
        }
        receipt.validate_integrity()?;
        Ok(Layer2 { receipt })
    }

    /// Optional proof-grade consensus finality for one layer's anchor
    /// block, at height `local_block + 1` (spec.md §4.5).
    pub async fn build_finality(
        &self,
        partition_scope: &AccUrl,
        network: &str,
        local_block: u64,
        cancel: &Cancellation,
    ) -> Result<ConsensusFinality> {
        cancel.check()?;
        let height = local_block + 1;
        let status_query = json!({ "queryType": "status" });
        let status = self
            .rpc
            .query(partition_scope.join("status").as_str(), &status_query)
            .await?;

        let block_query = json!({ "queryType": "block", "height": height });
        let block = self.rpc.query(partition_scope.as_str(), &block_query).await?;

        let root = get_str_ci(&block, "root")
            .ok_or(AccProofError::MissingField("block.root"))
            .and_then(Hash32::from_hex)?;
        let commit = get_ci(&block, "commit").ok_or(AccProofError::MissingField("block.commit"))?;
        let commit_root = get_str_ci(commit, "root")
            .ok_or(AccProofError::MissingField("block.commit.root"))
            .and_then(Hash32::from_hex)?;

        let validators = get_ci(&status, "validators")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(parse_validator_vote)
            .collect::<Result<Vec<_>>>()?;

        let total_power: u128 = validators.iter().map(|v| v.power as u128).sum();
        let signing_power: u128 = validators
            .iter()
            .filter(|v| v.signed)
            .map(|v| v.power as u128)
            .sum();
        let power_ok = total_power > 0 && signing_power * 3 >= total_power * 2;
        let root_binding_ok = commit_root == root;

        Ok(ConsensusFinality {
            partition: partition_scope.authority().to_string(),
            network: network.to_string(),
            height,
            root,
            commit_root,
            validators,
            power_ok,
            root_binding_ok,
        })
    }

    /// Build a full chained proof: L1, L2, and (if `proof_grade`) both
    /// finality bindings.
    pub async fn build_chained_proof(
        &self,
        scope: &AccUrl,
        chain_name: &str,
        tx_hash: &Hash32,
        chain_index: u64,
        network: &str,
        proof_grade: bool,
        cancel: &Cancellation,
    ) -> Result<ChainedProof> {
        let layer1 = self
            .build_layer1(scope, chain_name, tx_hash, chain_index, cancel)
            .await?;
        let layer2 = self.build_layer2(&layer1, cancel).await?;

        let (layer1_finality, layer2_finality) = if proof_grade {
            let partition_scope = AccUrl::normalize(&layer1.source_partition)?;
            let dn_scope = AccUrl::normalize("dn.acme")?;
            let l1f = self
                .build_finality(&partition_scope, network, layer1.local_block(), cancel)
                .await?;
            let l2f = self
                .build_finality(&dn_scope, network, layer2.local_block(), cancel)
                .await?;
            (Some(l1f), Some(l2f))
        } else {
            (None, None)
        };

        Ok(ChainedProof {
            version: 1,
            timestamp: Utc::now(),
            layer1,
            layer1_finality,
            layer2,
            layer2_finality,
        })
    }
}

fn parse_validator_vote(value: &Value) -> Result<ValidatorVote> {
    let address = get_str_ci(value, "address")
        .unwrap_or_default()
        .to_string();
    let power = get_u64_ci(value, "power").ok_or(AccProofError::MissingField("validator.power"))?;
    let signed = get_ci(value, "signed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(ValidatorVote {
        address,
        power,
        signed,
    })
}
