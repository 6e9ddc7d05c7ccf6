//! Securi Certify CLI
//!
//! Certify and verify image authorship against the ledger.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod output;
mod settings;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use securi_certify::{fingerprint_file, render, CertificationWorkflow, SessionContext, StateTag, WorkflowState};
use securi_core::{Address, ErrorKind, Principal};
use securi_ledger::{ErrorClassifier, JsonRpcClient, MemoryLedger, RpcSigningProvider};
use settings::Settings;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Author of dry-run certifications
const DRY_RUN_AUTHOR: Address = Address::from_bytes([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0xd1, 0x70,
]);

#[derive(Parser)]
#[command(name = "securi")]
#[command(about = "Securi Certify - tamper-evident proof of authorship for images", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for securi crates (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of a file
    Hash {
        /// Image file
        file: PathBuf,
    },
    /// Check whether an image is certified, without a wallet
    Verify {
        /// Image file
        file: PathBuf,
        /// Public read endpoint
        #[arg(long)]
        rpc: Option<String>,
    },
    /// Certify an image through an external signer
    Certify {
        /// Image file
        file: PathBuf,
        /// Signer JSON-RPC endpoint
        #[arg(long, required_unless_present = "dry_run")]
        wallet: Option<String>,
        /// Run against an in-memory ledger
        #[arg(long)]
        dry_run: bool,
    },
}

/// Exit status of a finished attempt
fn exit_code(state: &WorkflowState, verifying: bool) -> ExitCode {
    match state {
        WorkflowState::Exists { .. } | WorkflowState::Certified { .. } => ExitCode::SUCCESS,
        WorkflowState::NotFound { .. } if verifying => ExitCode::from(1),
        WorkflowState::NotFound { .. } => ExitCode::SUCCESS,
        WorkflowState::Failed { error, .. } if error.kind() == ErrorKind::UserCancelled => ExitCode::SUCCESS,
        WorkflowState::Failed { .. } => ExitCode::from(2),
        // Abandoned
        _ => ExitCode::from(130),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    settings::init_logging(cli.log_level.as_deref(), cli.log_json)?;
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Hash { file } => {
            let fingerprint = fingerprint_file(&file).await?;
            if cli.json {
                let out = serde_json::json!({ "file": file, "fingerprint": fingerprint });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}  {}", fingerprint, file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { file, rpc } => {
            if let Some(rpc) = rpc {
                settings.ledger.public_rpc_url = rpc;
            }
            let context = SessionContext::public(&settings.ledger)?;
            run(context, &settings, &file, cli.json, true).await
        }
        Commands::Certify { file, wallet, dry_run } => {
            let context = if dry_run {
                info!(author = %DRY_RUN_AUTHOR, "dry run against in-memory ledger");
                SessionContext::in_memory(&MemoryLedger::new(), Principal::Authenticated(DRY_RUN_AUTHOR))
            } else {
                let wallet = wallet.ok_or_else(|| color_eyre::eyre::eyre!("--wallet is required"))?;
                let rpc = JsonRpcClient::untimed(wallet.as_str()).wrap_err("building signer client")?;
                let classifier = ErrorClassifier::new(&settings.ledger.already_certified_markers);
                let signer = Arc::new(RpcSigningProvider::new(rpc, classifier));
                SessionContext::connect(signer, &settings.ledger)
                    .await
                    .wrap_err_with(|| format!("connecting to signer at {}", wallet))?
            };
            run(context, &settings, &file, cli.json, false).await
        }
    }
}

async fn run(
    context: SessionContext,
    settings: &Settings,
    file: &Path,
    json: bool,
    verifying: bool,
) -> Result<ExitCode> {
    let mode = context.mode();
    let mut workflow = CertificationWorkflow::with_config(context, settings.workflow.clone());

    let bar = output::spinner(json);
    workflow.add_listener(output::narrate(bar.clone()));

    let abandon = workflow.abandon_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, abandoning attempt");
            abandon.cancel();
        }
    });

    let state = workflow.submit_path(file).await?.clone();
    interrupt.abort();
    bar.finish_and_clear();

    let view = render(&state, mode);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        output::print_view(&view);
        if state.tag() == StateTag::Idle {
            println!("Stopped waiting. A submitted certification may still be confirmed on the ledger.");
        }
    }
    Ok(exit_code(&state, verifying))
}
