//! accuproof-chainproof
//!
//! Builds and verifies two-layer chained Merkle proofs: an entry's local
//! chain receipt (L1) stitched to its DN anchor receipt (L2), optionally
//! bound to BFT consensus finality at each layer (spec.md C6/C7, §4.5).

pub mod builder;
pub mod model;
pub mod verifier;

pub use builder::ChainedProofBuilder;
pub use model::{ChainedProof, ConsensusFinality, Layer1, Layer2, TrustLevel, ValidatorVote};
pub use verifier::ChainedProofVerifier;
