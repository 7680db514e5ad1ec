//! `dossier run` end to end: manifest and files on disk, an in-process
//! engine behind the [`DossierApi`] seam, and the state file between runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dossier_cli::submit::{drive, load_state, RunArgs};
use dossier_cli::{EXIT_NOT_SUBMITTED, EXIT_SESSION_EXPIRED};
use dossier_client::{
    CaseRecord, CaseSummary, ClientError, CompletenessReport, DocumentRecord, DossierApi,
    UploadProgress, UploadRequest,
};
use dossier_core::{Actor, ActorId, CaseId, DossierError, NewProduct};
use dossier_engine::DossierEngine;
use dossier_state::CaseStatus;

struct EngineApi {
    engine: DossierEngine,
    actor: Actor,
    expired: AtomicBool,
}

impl EngineApi {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            engine: DossierEngine::in_memory(),
            actor: Actor::exporter(ActorId::new()),
            expired: AtomicBool::new(false),
        })
    }

    fn check(&self) -> Result<(), ClientError> {
        if self.expired.load(Ordering::SeqCst) {
            return Err(ClientError::SessionExpired {
                code: "SessionExpired".into(),
                message: "token expired".into(),
            });
        }
        Ok(())
    }
}

fn api_error(err: DossierError) -> ClientError {
    ClientError::Api {
        endpoint: "engine".into(),
        status: 409,
        source: err,
    }
}

#[async_trait]
impl DossierApi for EngineApi {
    async fn create_case(&self, products: &[NewProduct]) -> Result<CaseRecord, ClientError> {
        self.check()?;
        self.engine
            .create_case(&self.actor, products.to_vec())
            .map_err(api_error)
    }

    async fn case_status(&self) -> Result<CaseSummary, ClientError> {
        self.check()?;
        self.engine.dossier_status(&self.actor).map_err(api_error)
    }

    async fn get_case(&self, case_id: CaseId) -> Result<CaseRecord, ClientError> {
        self.check()?;
        self.engine.get_case(&self.actor, case_id).map_err(api_error)
    }

    async fn upload_document(
        &self,
        case_id: CaseId,
        upload: UploadRequest,
    ) -> Result<DocumentRecord, ClientError> {
        self.check()?;
        self.engine
            .upload(&self.actor, case_id, upload)
            .await
            .map_err(api_error)
    }

    async fn completeness(&self, case_id: CaseId) -> Result<CompletenessReport, ClientError> {
        self.check()?;
        let check = self
            .engine
            .completeness_check(&self.actor, case_id)
            .map_err(api_error)?;
        Ok(CompletenessReport {
            complete: check.complete,
            missing: check.missing,
            slots: self.engine.slots(&self.actor, case_id).map_err(api_error)?,
        })
    }

    async fn submit(&self, case_id: CaseId) -> Result<CaseRecord, ClientError> {
        self.check()?;
        self.engine.submit(&self.actor, case_id).map_err(api_error)
    }
}

const MANIFEST: &str = r#"
products:
  - localId: cable
    type: INDUSTRIAL
    name: Copper cable
    originCountry: MA
    tariffCode: "8544.49"
    quantity: 40 t
documents:
  - product: cable
    documentType: CONFORMITY_CERT_ANALYSIS_REPORT
    location: docs/conformity.pdf
"#;

fn workspace(with_document: bool) -> (tempfile::TempDir, RunArgs) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    if with_document {
        std::fs::write(dir.path().join("docs/conformity.pdf"), b"%PDF-1.7 conformity").unwrap();
    }
    let manifest = dir.path().join("dossier.yaml");
    std::fs::write(&manifest, MANIFEST).unwrap();
    let args = RunArgs {
        manifest,
        state: None,
        concurrency: 2,
    };
    (dir, args)
}

fn state_file(args: &RunArgs) -> PathBuf {
    args.state_path()
}

fn saved_case(path: &Path) -> Option<CaseId> {
    load_state(path).unwrap().and_then(|s| s.case_id)
}

#[tokio::test]
async fn run_submits_and_records_progress() {
    let api = EngineApi::new();
    let (_dir, args) = workspace(true);

    assert_eq!(drive(api.clone(), &args).await.unwrap(), 0);

    let state = load_state(&state_file(&args)).unwrap().unwrap();
    assert_eq!(state.status, Some(CaseStatus::Submitted));
    assert!(state.reference.as_deref().unwrap().starts_with("DOS-"));
    assert!(matches!(state.documents[0].progress, UploadProgress::Uploaded { .. }));

    let case = api.engine.get_case(&api.actor, state.case_id.unwrap()).unwrap();
    assert_eq!(case.status, CaseStatus::Submitted);

    // A second run is a no-op that still reports success.
    assert_eq!(drive(api.clone(), &args).await.unwrap(), 0);
    assert_eq!(api.engine.store().len(), 1);
}

#[tokio::test]
async fn missing_file_blocks_submission_until_it_exists() {
    let api = EngineApi::new();
    let (dir, args) = workspace(false);

    assert_eq!(drive(api.clone(), &args).await.unwrap(), EXIT_NOT_SUBMITTED);
    let case_id = saved_case(&state_file(&args)).unwrap();
    assert_eq!(
        api.engine.get_case(&api.actor, case_id).unwrap().status,
        CaseStatus::Draft
    );

    std::fs::write(dir.path().join("docs/conformity.pdf"), b"%PDF-1.7 conformity").unwrap();
    assert_eq!(drive(api.clone(), &args).await.unwrap(), 0);
    assert_eq!(saved_case(&state_file(&args)), Some(case_id));
}

#[tokio::test]
async fn expired_session_exits_with_its_own_code() {
    let api = EngineApi::new();
    let (_dir, args) = workspace(true);

    api.expired.store(true, Ordering::SeqCst);
    assert_eq!(drive(api.clone(), &args).await.unwrap(), EXIT_SESSION_EXPIRED);
    assert_eq!(saved_case(&state_file(&args)), None);

    api.expired.store(false, Ordering::SeqCst);
    assert_eq!(drive(api.clone(), &args).await.unwrap(), 0);
    assert!(saved_case(&state_file(&args)).is_some());
}
