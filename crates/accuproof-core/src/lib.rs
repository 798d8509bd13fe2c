//! accuproof-core
//!
//! Shared primitives for the Accumulate governance/anchoring proof engine:
//! hash and URL canonicalization (spec.md C1), the error taxonomy every
//! other crate returns, canonical JSON rendering, and the cancellation
//! token threaded through the whole engine.

pub mod canonical;
pub mod cancel;
pub mod error;
pub mod hash;
pub mod json_ext;
pub mod url;

pub use cancel::Cancellation;
pub use canonical::canonical_json;
pub use error::{AccProofError, Result};
pub use hash::Hash32;
pub use url::{AccUrl, MessageId};
