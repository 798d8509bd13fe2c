//! accuproof-signature
//!
//! Extracts and validates Ed25519 signatures against a key page's
//! authority snapshot, applies M-of-N threshold authorization, and hosts
//! the pluggable digest/canonical-hash tools from spec.md C11.

pub mod canonical_hash;
pub mod digest;
pub mod extract;
pub mod model;
pub mod validate;

pub use canonical_hash::{BuiltinCanonicalHashTool, CanonicalHashTool, SubprocessCanonicalHashTool};
pub use digest::{canonical_digest, BuiltinDigestTool, DigestTool, SubprocessDigestTool};
pub use extract::extract_signature;
pub use model::{AuthorizationResult, Signature, SignatureMetadata, ValidatedSignature};
pub use validate::{authorize, validate_signature};
