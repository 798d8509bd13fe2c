//! accuproof-governance
//!
//! Orchestrates the G0/G1/G2 governance proof state machine: inclusion
//! and finality, authority-snapshot-backed signature authorization, and
//! payload/receipt/witness/effect binding (spec.md C10, §4.8).

pub mod config;
pub mod engine;
pub mod model;

pub use config::EngineConfig;
pub use engine::GovernanceProofEngine;
pub use model::{
    BindingCheck, G0Result, G1Result, G2Result, ProofLevel, ProofOutcome, ProofRequest, ProofStage,
};
