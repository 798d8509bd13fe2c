use accuproof_authority::AuthoritySnapshot;
use accuproof_chainproof::ChainedProof;
use accuproof_core::{AccUrl, Hash32};
use accuproof_receipt::MerkleReceipt;
use accuproof_signature::AuthorizationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `G0 | G1 | G2` (spec.md §6 `--level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofLevel {
    G0,
    G1,
    G2,
}

impl FromStr for ProofLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "G0" => Ok(Self::G0),
            "G1" => Ok(Self::G1),
            "G2" => Ok(Self::G2),
            other => Err(format!("unknown proof level: {other}")),
        }
    }
}

impl fmt::Display for ProofLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofLevel::G0 => write!(f, "G0"),
            ProofLevel::G1 => write!(f, "G1"),
            ProofLevel::G2 => write!(f, "G2"),
        }
    }
}

/// `INIT → G0_OK → G1_OK → G2_OK`, `FAIL` terminal at any stage
/// (spec.md §4.8 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofStage {
    Init,
    G0Ok,
    G1Ok,
    G2Ok,
    Fail,
}

/// One proof run's parameters: level, target transaction, and the
/// optional inputs each higher level requires (spec.md §6 CLI surface).
#[derive(Debug, Clone)]
pub struct ProofRequest {
    pub account: AccUrl,
    pub chain_name: String,
    pub tx_hash: Hash32,
    pub level: ProofLevel,
    pub key_page: Option<AccUrl>,
    pub expect_entry_hash: Option<Hash32>,
    pub network: String,
    pub proof_grade: bool,
}

/// A single pass/fail check with a human-readable explanation, used for
/// G2's four binding checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingCheck {
    pub verified: bool,
    pub detail: String,
}

impl BindingCheck {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            verified: true,
            detail: detail.into(),
        }
    }
    pub fn fail(detail: impl Into<String>) -> Self {
        Self {
            verified: false,
            detail: detail.into(),
        }
    }
}

/// G0 — Inclusion & Finality (spec.md §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct G0Result {
    pub principal: String,
    pub exec_mbi: u64,
    pub exec_witness: Hash32,
    pub receipt: MerkleReceipt,
    pub transaction: Option<serde_json::Value>,
    pub chained_proof: Option<ChainedProof>,
}

/// G1 — Governance Correctness. Carries `g0` as a prefix of its result,
/// per spec.md §8 property 9 ("G2 implies G1 implies G0").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct G1Result {
    pub g0: G0Result,
    pub snapshot: AuthoritySnapshot,
    pub authorization: AuthorizationResult,
}

/// G2 — Outcome Binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct G2Result {
    pub g1: G1Result,
    pub payload_binding: BindingCheck,
    pub receipt_binding: BindingCheck,
    pub witness_consistency: BindingCheck,
    pub effect_binding: BindingCheck,
    pub g2_proof_complete: bool,
}

/// The top-level result of a proof run, carrying whichever level was
/// actually reached (spec.md §6 JSON output wraps this as the `proof`
/// field alongside `level`/`ok`/`errors`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProofOutcome {
    G0(G0Result),
    G1(G1Result),
    G2(G2Result),
}

impl ProofOutcome {
    pub fn level(&self) -> ProofLevel {
        match self {
            ProofOutcome::G0(_) => ProofLevel::G0,
            ProofOutcome::G1(_) => ProofLevel::G1,
            ProofOutcome::G2(_) => ProofLevel::G2,
        }
    }
}
