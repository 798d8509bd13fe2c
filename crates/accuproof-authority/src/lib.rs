//! accuproof-authority
//!
//! KPSW-EXEC: reconstructs a key page's authorization state as witnessed
//! at a given execution block, by enumerating and replaying its own main
//! chain (spec.md C8, §4.6).

pub mod builder;
pub mod classify;
pub mod model;

pub use builder::AuthoritySnapshotBuilder;
pub use classify::{classify_tx_body, TxBody};
pub use model::{AuthoritySnapshot, GenesisEvent, KeyPageState, MutationEvent};
