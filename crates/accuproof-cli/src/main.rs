//! accuproof
//!
//! CLI wrapper around the governance proof engine: resolves a transaction's
//! inclusion, governance correctness, and outcome binding against an
//! Accumulate node and reports the result as human-readable text or JSON.
//!
//! Usage:
//!   accuproof <account> [<chain>] <tx_hash> --level G0 [--endpoint <url>] [--json]
//!   accuproof <account> <tx_hash> --level G1 --keypage <acc://…>
//!   accuproof <account> <tx_hash> --level G2 --keypage <acc://…> --txhash <tool> --expect-entry <hex32>

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use accuproof_artifacts::{ArtifactRecordingClient, ArtifactStore};
use accuproof_cache::{CacheStats, QueryCache};
use accuproof_core::{AccProofError, AccUrl, Cancellation, Hash32};
use accuproof_governance::{EngineConfig, GovernanceProofEngine, ProofLevel, ProofOutcome, ProofRequest};
use accuproof_rpc::{CachedRpcClient, HttpRpcClient, RpcClient};
use accuproof_signature::{BuiltinCanonicalHashTool, BuiltinDigestTool, SubprocessCanonicalHashTool, SubprocessDigestTool};

#[derive(Parser, Debug)]
#[command(
    name = "accuproof",
    version,
    about = "Accumulate governance & chained anchoring proof engine"
)]
struct Args {
    /// Account URL that owns the chain (e.g. acc://x.acme/data1).
    account: String,

    /// Chain name, or the transaction hash if only two positionals are given.
    chain_or_tx_hash: String,

    /// Transaction hash, when a chain name was also given.
    tx_hash: Option<String>,

    /// Proof level to reach.
    #[arg(long, default_value = "G0")]
    level: String,

    /// Key page URL; required for --level G1 and G2.
    #[arg(long)]
    keypage: Option<String>,

    /// Signing domain for digest computation.
    #[arg(long, default_value = "accumulate_ed25519")]
    signing_domain: String,

    /// Node RPC endpoint.
    #[arg(long, default_value = "http://127.0.0.1:26660/v3")]
    endpoint: String,

    /// Path to an external canonical-hash tool binary (G2 payload binding).
    #[arg(long)]
    txhash: Option<PathBuf>,

    /// Path to an external digest tool binary (conformance check for the
    /// Ed25519 signing digest).
    #[arg(long)]
    sigbytes: Option<PathBuf>,

    /// Expected entry hash for G2's effect binding.
    #[arg(long)]
    expect_entry: Option<String>,

    /// Working directory for artifacts and the custody chain.
    #[arg(long, default_value = "./accuproof-run")]
    workdir: PathBuf,

    /// Emit machine-readable JSON instead of human text.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(long, default_value_t = false, conflicts_with = "verbose")]
    quiet: bool,

    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// Per-proof-level timeout, in seconds.
    #[arg(long, default_value_t = 180)]
    timeout: u64,

    /// Additionally request consensus finality (L1C/L2C) for the chained
    /// proof built alongside G0.
    #[arg(long, default_value_t = false)]
    proof_grade: bool,
}

#[derive(Serialize)]
struct ErrorEntry {
    stage: String,
    kind: String,
    detail: String,
}

#[derive(Serialize)]
struct JsonOutput {
    level: String,
    ok: bool,
    proof: Option<ProofOutcome>,
    errors: Vec<ErrorEntry>,
    cache: CacheStats,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let filter = if args.quiet {
        "error"
    } else if args.verbose {
        "debug,accuproof=trace"
    } else {
        "warn,accuproof=info"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::process::exit(run(args).await);
}

/// Validates and normalizes the raw CLI arguments into a proof request plus
/// a ready artifact store. Kept separate from `run` so every failure here
/// maps uniformly to exit code 1 (spec.md §6 "validation/usage error"),
/// the same split the wallet's own `main.rs` draws between argument
/// decoding and the RPC-driving command bodies.
fn parse_request(args: &Args) -> anyhow::Result<(ProofLevel, ProofRequest, ArtifactStore)> {
    let level: ProofLevel = args.level.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let (chain_name, tx_hash_raw) = match &args.tx_hash {
        Some(tx) => (args.chain_or_tx_hash.clone(), tx.clone()),
        None => ("main".to_string(), args.chain_or_tx_hash.clone()),
    };

    let account = AccUrl::normalize(&args.account).context("invalid account url")?;
    let tx_hash = Hash32::from_hex(&tx_hash_raw).context("invalid tx_hash")?;
    let key_page = args
        .keypage
        .as_deref()
        .map(AccUrl::normalize)
        .transpose()
        .context("invalid --keypage")?;
    if matches!(level, ProofLevel::G1 | ProofLevel::G2) && key_page.is_none() {
        anyhow::bail!("--keypage is required for --level G1 and G2");
    }
    let expect_entry_hash = args
        .expect_entry
        .as_deref()
        .map(Hash32::from_hex)
        .transpose()
        .context("invalid --expect-entry")?;

    let store = ArtifactStore::new(&args.workdir)
        .with_context(|| format!("failed to initialize workdir {}", args.workdir.display()))?;

    let request = ProofRequest {
        account,
        chain_name,
        tx_hash,
        level,
        key_page,
        expect_entry_hash,
        network: "mainnet".to_string(),
        proof_grade: args.proof_grade,
    };
    Ok((level, request, store))
}

async fn run(args: Args) -> i32 {
    let (level, request, store) = match parse_request(&args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e:#}");
            return 1;
        }
    };

    let rpc_timeout = Duration::from_secs(args.timeout.min(60).max(1));
    let http = HttpRpcClient::new(&args.endpoint, rpc_timeout);
    let cached = CachedRpcClient::new(http, QueryCache::global());
    let recording = ArtifactRecordingClient::new(cached, Arc::new(store));
    let rpc: Arc<dyn RpcClient> = Arc::new(recording);

    let mut config = EngineConfig::new(args.endpoint.clone(), args.workdir.clone());
    config.level_timeout = Duration::from_secs(args.timeout);
    config.signing_domain = args.signing_domain.clone();
    config.proof_grade = args.proof_grade;

    let engine = GovernanceProofEngine::new(rpc, config);
    let cancel = Cancellation::new();

    let digest_tool: Box<dyn accuproof_signature::DigestTool> = match &args.sigbytes {
        Some(path) => Box::new(SubprocessDigestTool { binary: path.clone() }),
        None => Box::new(BuiltinDigestTool),
    };
    let canonical_hash_tool: Option<Box<dyn accuproof_signature::CanonicalHashTool>> = match &args.txhash {
        Some(path) => Some(Box::new(SubprocessCanonicalHashTool { binary: path.clone() })),
        None => Some(Box::new(BuiltinCanonicalHashTool)),
    };

    info!(level = %request.level, account = %request.account, "starting proof run");
    let result = engine
        .run(
            &request,
            &cancel,
            digest_tool.as_ref(),
            canonical_hash_tool.as_deref(),
        )
        .await;

    let cache_stats = QueryCache::global().stats();
    report(level, result, args.json, cache_stats)
}

fn report(
    level: ProofLevel,
    result: accuproof_core::Result<ProofOutcome>,
    as_json: bool,
    cache: CacheStats,
) -> i32 {
    match result {
        Ok(outcome) => {
            if as_json {
                let out = JsonOutput {
                    level: level.to_string(),
                    ok: true,
                    proof: Some(outcome),
                    errors: vec![],
                    cache,
                };
                println!("{}", serde_json::to_string_pretty(&out).unwrap());
            } else {
                print_human(&outcome);
            }
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            let entry = flatten_error(&e);
            if as_json {
                let out = JsonOutput {
                    level: level.to_string(),
                    ok: false,
                    proof: None,
                    errors: vec![entry],
                    cache,
                };
                println!("{}", serde_json::to_string_pretty(&out).unwrap());
            } else {
                eprintln!("proof run failed at stage {}: [{}] {}", entry.stage, entry.kind, entry.detail);
            }
            exit_code
        }
    }
}

/// Unwrap a (possibly nested) `Stage` wrapper into a single `{stage, kind,
/// detail}` entry, keeping the outermost stage label (spec.md §7).
fn flatten_error(err: &AccProofError) -> ErrorEntry {
    let mut stage = "unknown".to_string();
    let mut current = err;
    loop {
        match current {
            AccProofError::Stage { stage: s, source } => {
                stage = s.clone();
                current = source;
            }
            other => {
                return ErrorEntry {
                    stage,
                    kind: other.kind().to_string(),
                    detail: other.to_string(),
                };
            }
        }
    }
}

fn exit_code_for(err: &AccProofError) -> i32 {
    match err.kind() {
        "Rpc" => 3,
        "Cancelled" => 3,
        "Validation" => 1,
        _ => 2,
    }
}

fn print_human(outcome: &ProofOutcome) {
    match outcome {
        ProofOutcome::G0(g0) => {
            println!("Level:        G0 (Inclusion & Finality)");
            println!("Principal:    {}", g0.principal);
            println!("exec_mbi:     {}", g0.exec_mbi);
            println!("exec_witness: {}", g0.exec_witness);
            println!(
                "Chained proof: {}",
                if g0.chained_proof.is_some() { "built" } else { "unavailable" }
            );
            println!("Result: OK");
        }
        ProofOutcome::G1(g1) => {
            print_human(&ProofOutcome::G0(g1.g0.clone()));
            println!("---");
            println!("Level:        G1 (Governance Correctness)");
            println!("Threshold:    {}", g1.snapshot.state_exec.threshold);
            println!("Valid keys:   {}", g1.authorization.unique_valid_keys);
            println!("Satisfied:    {}", g1.authorization.threshold_satisfied);
            println!("Timing valid: {}", g1.authorization.timing_valid);
            println!("Result: OK");
        }
        ProofOutcome::G2(g2) => {
            print_human(&ProofOutcome::G1(g2.g1.clone()));
            println!("---");
            println!("Level:        G2 (Outcome Binding)");
            println!("Payload binding:     {}", g2.payload_binding.verified);
            println!("Receipt binding:     {}", g2.receipt_binding.verified);
            println!("Witness consistency: {}", g2.witness_consistency.verified);
            println!("Effect binding:      {}", g2.effect_binding.verified);
            println!("G2 complete:         {}", g2.g2_proof_complete);
            println!("Result: OK");
        }
    }
}
