//! # Run Subcommand
//!
//! `dossier run --manifest dossier.yaml` drives the submission orchestrator.
//!
//! The manifest lists products under local ids and the documents to upload
//! for each, with paths relative to the manifest:
//!
//! ```yaml
//! products:
//!   - localId: oil
//!     type: FOOD
//!     name: Olive oil
//!     originCountry: MA
//!     tariffCode: "1509.10"
//!     quantity: 20 t
//! documents:
//!   - product: oil
//!     documentType: SANITARY_CERT
//!     location: docs/sanitary.pdf
//! ```
//!
//! Progress goes to a JSON state file (default `<manifest>.state.json`),
//! written after creation, after the upload pass and after submission. A
//! later run with the same state file picks up where the last one stopped:
//! the case is never created twice and uploaded documents are not sent
//! again unless their manifest entry changed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use dossier_client::orchestrator::DEFAULT_UPLOAD_CONCURRENCY;
use dossier_client::{
    ClientConfig, DossierApi, DossierClient, FsDocumentSource, OrchestratorError,
    OrchestratorState, SubmissionOrchestrator, SubmissionOutcome, SubmissionPlan,
};

use crate::{EXIT_NOT_SUBMITTED, EXIT_SESSION_EXPIRED};

/// Arguments for the `dossier run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// YAML manifest listing products and documents.
    #[arg(long, short)]
    pub manifest: PathBuf,

    /// State file. Defaults to `<manifest>.state.json`.
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Uploads in flight at once.
    #[arg(long, default_value_t = DEFAULT_UPLOAD_CONCURRENCY)]
    pub concurrency: usize,
}

impl RunArgs {
    pub fn state_path(&self) -> PathBuf {
        self.state.clone().unwrap_or_else(|| {
            let mut name = self.manifest.as_os_str().to_owned();
            name.push(".state.json");
            PathBuf::from(name)
        })
    }

    /// Directory document locations are relative to.
    fn document_root(&self) -> PathBuf {
        match self.manifest.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Execute the run subcommand against the configured service.
pub fn run_submit(args: &RunArgs) -> Result<u8> {
    let client = DossierClient::new(ClientConfig::from_env()?)?;
    crate::runtime()?.block_on(drive(Arc::new(client), args))
}

/// Load the plan and any saved progress, run every phase, and save progress
/// after each one.
pub async fn drive(api: Arc<dyn DossierApi>, args: &RunArgs) -> Result<u8> {
    let plan = load_plan(&args.manifest)?;
    let state_path = args.state_path();
    let state = prepare_state(plan, load_state(&state_path)?)?;

    let source = Arc::new(FsDocumentSource::new(args.document_root()));
    let mut orch = SubmissionOrchestrator::resume(api, source, state).with_concurrency(args.concurrency);

    let outcome = run_phases(&mut orch, &state_path).await;
    save_state(&state_path, orch.state())?;

    match outcome {
        Ok(outcome) => {
            print!("{}", render_outcome(&outcome));
            Ok(exit_code(&outcome))
        }
        Err(PhaseError::Orchestrator(OrchestratorError::SessionExpired(message))) => {
            eprintln!("session expired ({message}); renew DOSSIER_API_TOKEN and run again");
            Ok(EXIT_SESSION_EXPIRED)
        }
        Err(PhaseError::Orchestrator(e)) => Err(e.into()),
        Err(PhaseError::Save(e)) => Err(e),
    }
}

enum PhaseError {
    Orchestrator(OrchestratorError),
    Save(anyhow::Error),
}

impl From<OrchestratorError> for PhaseError {
    fn from(err: OrchestratorError) -> Self {
        Self::Orchestrator(err)
    }
}

async fn run_phases(
    orch: &mut SubmissionOrchestrator,
    state_path: &Path,
) -> Result<SubmissionOutcome, PhaseError> {
    let case_id = orch.ensure_case().await?;
    checkpoint(orch, state_path)?;
    tracing::info!(case_id = %case_id, "dossier ready");

    if orch.state().status.is_some_and(|s| s != dossier_state::CaseStatus::Draft) {
        return Ok(orch.submit().await?);
    }

    let report = orch.upload_pending().await?;
    checkpoint(orch, state_path)?;
    if !report.failed.is_empty() {
        return Ok(SubmissionOutcome::UploadsFailed {
            failed: report.failed,
        });
    }
    Ok(orch.submit().await?)
}

fn checkpoint(orch: &SubmissionOrchestrator, state_path: &Path) -> Result<(), PhaseError> {
    save_state(state_path, orch.state()).map_err(PhaseError::Save)
}

/// Parse a YAML manifest.
pub fn load_plan(path: &Path) -> Result<SubmissionPlan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let plan: SubmissionPlan = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;
    plan.validate()?;
    Ok(plan)
}

/// Saved progress, or `None` when there is no state file yet.
pub fn load_state(path: &Path) -> Result<Option<OrchestratorState>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file {}", path.display()))?;
    let state = serde_json::from_str(&content)
        .with_context(|| format!("state file {} is corrupt", path.display()))?;
    Ok(Some(state))
}

/// Write the state next to its final path, then rename over it.
pub fn save_state(path: &Path, state: &OrchestratorState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json)
        .with_context(|| format!("failed to write state file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "state saved");
    Ok(())
}

/// Merge the manifest into saved progress, or start from the manifest.
pub fn prepare_state(
    plan: SubmissionPlan,
    saved: Option<OrchestratorState>,
) -> Result<OrchestratorState> {
    match saved {
        Some(mut state) => {
            state
                .reconcile(plan)
                .context("the manifest no longer matches the saved progress")?;
            Ok(state)
        }
        None => Ok(OrchestratorState::from_plan(plan)?),
    }
}

pub fn exit_code(outcome: &SubmissionOutcome) -> u8 {
    match outcome {
        SubmissionOutcome::Submitted { .. } => 0,
        SubmissionOutcome::Incomplete { .. } | SubmissionOutcome::UploadsFailed { .. } => {
            EXIT_NOT_SUBMITTED
        }
    }
}

fn render_outcome(outcome: &SubmissionOutcome) -> String {
    let mut out = String::new();
    match outcome {
        SubmissionOutcome::Submitted {
            case_id,
            reference,
            status,
        } => {
            out.push_str(&format!("OK: dossier {reference} ({case_id}) is {status}\n"));
        }
        SubmissionOutcome::Incomplete { missing } => {
            out.push_str(&format!("NOT SUBMITTED: {} required document(s) missing\n", missing.len()));
            for slot in missing {
                let product = slot.product.as_deref().unwrap_or("(not in manifest)");
                out.push_str(&format!("  - {product}: {} ({})\n", slot.document_type, slot.label));
            }
        }
        SubmissionOutcome::UploadsFailed { failed } => {
            out.push_str(&format!("NOT SUBMITTED: {} upload(s) failed\n", failed.len()));
            for upload in failed {
                let hint = if upload.retryable { "run again" } else { "fix the manifest" };
                out.push_str(&format!(
                    "  - {}: {}: {} [{hint}]\n",
                    upload.product, upload.document_type, upload.reason
                ));
            }
        }
    }
    out
}
