use accuproof_core::Hash32;
use accuproof_receipt::MerkleReceipt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// L1: entry → partition anchor (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer1 {
    pub scope: String,
    pub chain_name: String,
    pub chain_index: u64,
    pub source_partition: String,
    pub receipt: MerkleReceipt,
}

impl Layer1 {
    pub fn leaf(&self) -> Hash32 {
        self.receipt.start
    }
    pub fn anchor(&self) -> Hash32 {
        self.receipt.anchor
    }
    pub fn local_block(&self) -> u64 {
        self.receipt.local_block
    }
}

/// L2: partition anchor → Directory Network root (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer2 {
    pub receipt: MerkleReceipt,
}

impl Layer2 {
    pub fn start(&self) -> Hash32 {
        self.receipt.start
    }
    pub fn anchor(&self) -> Hash32 {
        self.receipt.anchor
    }
    pub fn local_block(&self) -> u64 {
        self.receipt.local_block
    }
}

/// A validator's vote on a block, used for BFT finality accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorVote {
    pub address: String,
    pub power: u64,
    pub signed: bool,
}

/// Consensus finality binding for one layer's anchor block
/// (spec.md §3 "Consensus Finality", §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusFinality {
    pub partition: String,
    pub network: String,
    pub height: u64,
    pub root: Hash32,
    pub commit_root: Hash32,
    pub validators: Vec<ValidatorVote>,
    pub power_ok: bool,
    pub root_binding_ok: bool,
}

impl ConsensusFinality {
    pub fn verified(&self) -> bool {
        self.power_ok && self.root_binding_ok
    }
}

/// `{version, timestamp, layer1, layer1_finality?, layer2, layer2_finality?}`
/// (spec.md §3 "Chained Proof"). Invariant: `layer2.start == layer1.anchor`
/// byte-exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedProof {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub layer1: Layer1,
    pub layer1_finality: Option<ConsensusFinality>,
    pub layer2: Layer2,
    pub layer2_finality: Option<ConsensusFinality>,
}

/// Strictly decreasing trust levels (spec.md §4.5, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    ProofGrade,
    DnAnchored,
    PartitionTrust,
    Invalid,
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrustLevel::ProofGrade => "Proof-Grade",
            TrustLevel::DnAnchored => "DN Anchored",
            TrustLevel::PartitionTrust => "Partition Trust",
            TrustLevel::Invalid => "Invalid",
        };
        write!(f, "{s}")
    }
}
