use std::path::PathBuf;
use std::time::Duration;

/// Engine-wide configuration; field defaults mirror spec.md §5/§6 exactly
/// (60 s per RPC, 180 s per proof level, `accumulate_ed25519` signing
/// domain).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub endpoint: String,
    pub rpc_timeout: Duration,
    pub level_timeout: Duration,
    pub signing_domain: String,
    pub workdir: PathBuf,
    pub network: String,
    pub proof_grade: bool,
}

impl EngineConfig {
    pub fn new(endpoint: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            workdir: workdir.into(),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            rpc_timeout: Duration::from_secs(60),
            level_timeout: Duration::from_secs(180),
            signing_domain: "accumulate_ed25519".to_string(),
            workdir: PathBuf::from("."),
            network: "mainnet".to_string(),
            proof_grade: false,
        }
    }
}
