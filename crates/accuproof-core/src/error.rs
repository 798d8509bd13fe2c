use thiserror::Error;

/// Typed error taxonomy shared by every component of the proof engine.
///
/// Variants are grouped by the kind of failure, not by which component
/// raised them — a leaf component returns the narrowest variant that
/// applies, and `accuproof-governance` wraps it with level/stage context
/// on the way out.
#[derive(Debug, Error)]
pub enum AccProofError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("malformed hex: expected {expected} bytes, got {got}")]
    BadHexLength { expected: usize, got: usize },

    #[error("invalid hex encoding: {0}")]
    HexDecode(String),

    #[error("url is not an acc:// url: {0}")]
    NotAccUrl(String),

    #[error("malformed message id: {0}")]
    BadMessageId(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    // ── RPC ──────────────────────────────────────────────────────────────────
    #[error("rpc transport failure: {0}")]
    Transport(String),

    #[error("rpc response was not valid json: {0}")]
    NonJsonBody(String),

    #[error("rpc returned a json-rpc error: {0}")]
    RpcError(String),

    #[error("rpc response is missing `result`")]
    MissingResult,

    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("receipt failed root recomputation")]
    ReceiptRootMismatch,

    #[error("layer2.start does not equal layer1.anchor")]
    StitchMismatch,

    #[error("custody chain mismatch for artifact {0}")]
    CustodyMismatch(String),

    // ── Authority ────────────────────────────────────────────────────────────
    #[error("expected exactly one genesis event, found {0}")]
    GenesisCountMismatch(usize),

    #[error("mutation version gap: state at {state_version}, mutation expects {mutation_version}")]
    MutationVersionGap {
        state_version: u64,
        mutation_version: u64,
    },

    #[error("unknown transaction body type: {0}")]
    UnknownTxBody(String),

    #[error("key page {0} not found in genesis accounts")]
    KeyPageNotInGenesis(String),

    #[error("duplicate key in key page state")]
    DuplicateKey,

    #[error("invalid key page threshold {threshold} for {num_keys} keys")]
    InvalidThreshold { threshold: u64, num_keys: usize },

    // ── Signature ────────────────────────────────────────────────────────────
    #[error("signature has wrong length: expected {expected}, got {got}")]
    BadSignatureLength { expected: usize, got: usize },

    #[error("unknown signature type: {0}")]
    UnknownSignatureType(String),

    #[error("signer key not present in authority set")]
    KeyNotInAuthoritySet,

    #[error("signer version mismatch: expected {expected}, got {got}")]
    SignerVersionMismatch { expected: u64, got: u64 },

    #[error("ed25519 signature verification failed")]
    Ed25519VerifyFailed,

    #[error("signature timing violation: local_block {local_block} > exec_mbi {exec_mbi}")]
    TimingViolation { local_block: u64, exec_mbi: u64 },

    // ── Threshold ────────────────────────────────────────────────────────────
    #[error("threshold not satisfied: need {need}, have {have} unique valid keys")]
    ThresholdNotMet { need: u64, have: u64 },

    // ── Outcome (G2) ─────────────────────────────────────────────────────────
    #[error("payload binding mismatch: canonical hash does not equal transaction hash")]
    PayloadBindingMismatch,

    #[error("receipt binding mismatch: G0 receipt does not match execution witness")]
    ReceiptBindingMismatch,

    #[error("witness consistency check failed: re-query returned a different anchor")]
    WitnessInconsistent,

    #[error("effect binding mismatch against expected entry hash")]
    EffectBindingMismatch,

    // ── Cancelled ────────────────────────────────────────────────────────────
    #[error("operation cancelled")]
    Cancelled,

    // ── Catch-all, context-wrapped ───────────────────────────────────────────
    #[error("{stage}: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<AccProofError>,
    },

    #[error("{0}")]
    Other(String),
}

impl AccProofError {
    /// Wrap this error with a `level/stage` prefix, as the governance
    /// engine does when a leaf error propagates out of G0/G1/G2.
    pub fn at_stage(self, stage: impl Into<String>) -> Self {
        AccProofError::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The error-taxonomy "kind" string used in machine-readable output
    /// (spec.md §7: `{ok:false, stage:"G1", kind:"Signature.NotAuthorized", ...}`).
    pub fn kind(&self) -> &'static str {
        use AccProofError::*;
        match self {
            BadHexLength { .. } | HexDecode(_) | NotAccUrl(_) | BadMessageId(_)
            | MissingField(_) => "Validation",
            Transport(_) | NonJsonBody(_) | RpcError(_) | MissingResult => "Rpc",
            ReceiptRootMismatch | StitchMismatch | CustodyMismatch(_) => "Integrity",
            GenesisCountMismatch(_)
            | MutationVersionGap { .. }
            | UnknownTxBody(_)
            | KeyPageNotInGenesis(_)
            | DuplicateKey
            | InvalidThreshold { .. } => "Authority",
            BadSignatureLength { .. }
            | UnknownSignatureType(_)
            | KeyNotInAuthoritySet
            | SignerVersionMismatch { .. }
            | Ed25519VerifyFailed
            | TimingViolation { .. } => "Signature",
            ThresholdNotMet { .. } => "Threshold",
            PayloadBindingMismatch
            | ReceiptBindingMismatch
            | WitnessInconsistent
            | EffectBindingMismatch => "Outcome",
            Cancelled => "Cancelled",
            Stage { source, .. } => source.kind(),
            Other(_) => "Other",
        }
    }
}

pub type Result<T> = std::result::Result<T, AccProofError>;
