//! End-to-end workflow tests for the dossier engine.

use std::sync::Arc;

use bytes::Bytes;
use dossier_core::{
    required_slots, Actor, ActorId, DocumentType, DossierError, NewProduct, ProductPatch,
    ProductType,
};
use dossier_engine::{CaseRecord, DossierEngine, MemoryBlobStore, UploadRequest};
use dossier_state::{CaseStatus, DocumentDecision, DocumentStatus};

fn new_product(product_type: ProductType, has_brand_license: bool) -> NewProduct {
    NewProduct {
        product_type,
        name: "Deglet Nour dates".into(),
        origin_country: "TN".into(),
        tariff_code: "0804.10".into(),
        quantity: "300 t".into(),
        brand_name: None,
        category: None,
        has_brand_license,
    }
}

fn pdf(product_id: dossier_core::ProductId, document_type: DocumentType, body: &'static [u8]) -> UploadRequest {
    UploadRequest {
        product_id,
        document_type,
        file_name: format!("{document_type}.pdf"),
        content_type: "application/pdf".into(),
        bytes: Bytes::from_static(body),
    }
}

async fn upload_all_required(engine: &DossierEngine, owner: &Actor, case: &CaseRecord) {
    for product in &case.products {
        for slot in required_slots(product) {
            engine
                .upload(owner, case.id, pdf(product.id, slot, b"%PDF-1.7"))
                .await
                .unwrap();
        }
    }
}

/// Drive a submitted case to UNDER_REVIEW.
fn to_review(engine: &DossierEngine, case: &CaseRecord) {
    let validator = Actor::validator(ActorId::new());
    let admin = Actor::admin(ActorId::new());
    engine.require_payment(&validator, case.id, "250.00", "TND").unwrap();
    engine.confirm_payment(&admin, case.id, "pi_3Nx").unwrap();
    engine.begin_review(&validator, case.id).unwrap();
}

#[test]
fn dossier_status_answers_first_time_exporters() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());

    let before = engine.dossier_status(&owner).unwrap();
    assert!(!before.has_dossier);
    assert_eq!(before.case_id, None);
    assert_eq!(engine.case_status(&owner).unwrap_err().code(), "NotFoundError");

    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, false)])
        .unwrap();
    let after = engine.dossier_status(&owner).unwrap();
    assert!(after.has_dossier);
    assert_eq!(after.case_id, Some(case.id));
    assert_eq!(after.status, Some(CaseStatus::Draft));
}

#[tokio::test]
async fn incomplete_dossier_lists_exactly_the_missing_slot() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, false)])
        .unwrap();
    let product = &case.products[0];
    let required = required_slots(product);
    let (last, rest) = required.split_last().unwrap();

    for slot in rest {
        engine
            .upload(&owner, case.id, pdf(product.id, *slot, b"scan"))
            .await
            .unwrap();
    }

    match engine.submit(&owner, case.id) {
        Err(DossierError::IncompleteDossier { missing }) => {
            assert_eq!(missing.len(), 1);
            assert_eq!(missing[0].document_type, *last);
            assert_eq!(missing[0].product_id, product.id);
        }
        other => panic!("expected IncompleteDossier, got {other:?}"),
    }
    assert_eq!(engine.get_case(&owner, case.id).unwrap().status, CaseStatus::Draft);

    engine
        .upload(&owner, case.id, pdf(product.id, *last, b"scan"))
        .await
        .unwrap();
    let submitted = engine.submit(&owner, case.id).unwrap();
    assert_eq!(submitted.status, CaseStatus::Submitted);
    assert!(submitted.submitted_at.is_some());
    assert_eq!(submitted.history.len(), 1);
}

#[tokio::test]
async fn two_products_submit_then_products_are_frozen() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(
            &owner,
            vec![
                new_product(ProductType::Food, false),
                new_product(ProductType::Industrial, false),
            ],
        )
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;

    assert!(engine.completeness_check(&owner, case.id).unwrap().complete);
    assert_eq!(engine.submit(&owner, case.id).unwrap().status, CaseStatus::Submitted);

    let err = engine
        .add_product(&owner, case.id, new_product(ProductType::Food, false))
        .unwrap_err();
    assert_eq!(err.code(), "ConflictError");

    let patch = ProductPatch {
        has_brand_license: Some(true),
        ..Default::default()
    };
    let err = engine
        .update_product(&owner, case.id, case.products[0].id, &patch)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ConflictError");
    assert_eq!(engine.get_case(&owner, case.id).unwrap().products.len(), 2);
}

#[tokio::test]
async fn submit_twice_is_idempotent() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;

    let first = engine.submit(&owner, case.id).unwrap();
    let second = engine.submit(&owner, case.id).unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(second.history.len(), 1);

    // A retry arriving after payment was requested is still harmless.
    let validator = Actor::validator(ActorId::new());
    engine.require_payment(&validator, case.id, "100", "TND").unwrap();
    let late = engine.submit(&owner, case.id).unwrap();
    assert_eq!(late.status, CaseStatus::AwaitingPayment);
    assert_eq!(late.history.len(), 2);
}

#[tokio::test]
async fn brand_license_flag_changes_the_requirement_set() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    assert!(engine.completeness_check(&owner, case.id).unwrap().complete);

    let patch = ProductPatch {
        has_brand_license: Some(true),
        ..Default::default()
    };
    let update = engine
        .update_product(&owner, case.id, case.products[0].id, &patch)
        .await
        .unwrap();
    assert!(update.product.has_brand_license);
    assert!(update.dropped.is_empty());

    let completeness = engine.completeness_check(&owner, case.id).unwrap();
    assert!(!completeness.complete);
    assert_eq!(completeness.missing.len(), 1);
    assert_eq!(completeness.missing[0].document_type, DocumentType::BrandLicense);

    let err = engine.submit(&owner, case.id).unwrap_err();
    assert_eq!(err.code(), "IncompleteDossierError");

    engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::BrandLicense, b"license"),
        )
        .await
        .unwrap();
    assert_eq!(engine.submit(&owner, case.id).unwrap().status, CaseStatus::Submitted);
}

#[tokio::test]
async fn clearing_the_brand_license_flag_drops_the_license_document() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let engine = DossierEngine::new(blobs.clone());
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, true)])
        .unwrap();
    let product_id = case.products[0].id;
    upload_all_required(&engine, &owner, &case).await;
    let license = engine
        .list_documents(&owner, case.id)
        .unwrap()
        .into_iter()
        .find(|d| d.document_type == DocumentType::BrandLicense)
        .unwrap();
    let stored = blobs.len();

    let off = ProductPatch {
        has_brand_license: Some(false),
        ..Default::default()
    };
    let update = engine
        .update_product(&owner, case.id, product_id, &off)
        .await
        .unwrap();
    assert_eq!(update.dropped.len(), 1);
    assert_eq!(update.dropped[0].id, license.id);
    assert_eq!(blobs.len(), stored - 1);

    let listed = engine.list_documents(&owner, case.id).unwrap();
    assert!(listed.iter().all(|d| d.document_type != DocumentType::BrandLicense));
    let err = engine.get_document(&owner, license.id).unwrap_err();
    assert_eq!(err.code(), "NotFoundError");
    let err = engine.download(&owner, license.id).await.unwrap_err();
    assert_eq!(err.code(), "NotFoundError");
    assert!(engine.completeness_check(&owner, case.id).unwrap().complete);

    // Turning the flag back on asks for a fresh license.
    let on = ProductPatch {
        has_brand_license: Some(true),
        ..Default::default()
    };
    engine
        .update_product(&owner, case.id, product_id, &on)
        .await
        .unwrap();
    let slot = engine
        .slots(&owner, case.id)
        .unwrap()
        .into_iter()
        .find(|s| s.document_type == DocumentType::BrandLicense)
        .unwrap();
    assert_eq!(slot.status, DocumentStatus::Pending);
    assert_eq!(slot.document_id, None);
    let completeness = engine.completeness_check(&owner, case.id).unwrap();
    assert_eq!(completeness.missing.len(), 1);
    assert_eq!(completeness.missing[0].document_type, DocumentType::BrandLicense);
}

#[tokio::test]
async fn brand_license_is_not_a_slot_without_the_flag() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, false)])
        .unwrap();
    let err = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::BrandLicense, b"license"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationError");
}

#[tokio::test]
async fn industrial_product_rejects_food_documents() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let err = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::SanitaryCert, b"x"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationError");
    assert!(engine.list_documents(&owner, case.id).unwrap().is_empty());
}

#[tokio::test]
async fn reupload_replaces_file_and_resets_status() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let engine = DossierEngine::new(blobs.clone());
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let product_id = case.products[0].id;

    let first = engine
        .upload(
            &owner,
            case.id,
            pdf(product_id, DocumentType::ConformityCertAnalysisReport, b"old"),
        )
        .await
        .unwrap();
    let validator = Actor::validator(ActorId::new());
    let reviewed = engine
        .review_document(&validator, first.id, DocumentDecision::Validated, None)
        .unwrap();
    assert_eq!(reviewed.status, DocumentStatus::Validated);

    let second = engine
        .upload(
            &owner,
            case.id,
            pdf(product_id, DocumentType::ConformityCertAnalysisReport, b"new"),
        )
        .await
        .unwrap();
    assert_eq!(second.status, DocumentStatus::Uploaded);
    assert_ne!(second.id, first.id);

    let docs = engine.list_documents(&owner, case.id).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].id, second.id);
    assert_eq!(docs[0].status, DocumentStatus::Uploaded);

    let (_, bytes) = engine.download(&owner, second.id).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"new"));
    assert_eq!(
        engine.get_document(&owner, first.id).unwrap_err().code(),
        "NotFoundError"
    );
    assert_eq!(blobs.len(), 1);
}

#[tokio::test]
async fn rejected_document_does_not_count_towards_completeness() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let doc = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"blurry"),
        )
        .await
        .unwrap();
    let validator = Actor::validator(ActorId::new());
    engine
        .review_document(
            &validator,
            doc.id,
            DocumentDecision::Rejected,
            Some("illegible scan".into()),
        )
        .unwrap();

    let completeness = engine.completeness_check(&owner, case.id).unwrap();
    assert!(!completeness.complete);
    assert_eq!(engine.submit(&owner, case.id).unwrap_err().code(), "IncompleteDossierError");
}

#[tokio::test]
async fn non_owners_can_neither_read_nor_mutate() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let intruder = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let doc = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"x"),
        )
        .await
        .unwrap();

    assert_eq!(engine.get_case(&intruder, case.id).unwrap_err().code(), "AuthorizationError");
    assert_eq!(engine.submit(&intruder, case.id).unwrap_err().code(), "AuthorizationError");
    assert_eq!(
        engine
            .upload(
                &intruder,
                case.id,
                pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"y"),
            )
            .await
            .unwrap_err()
            .code(),
        "AuthorizationError"
    );
    assert_eq!(engine.get_document(&intruder, doc.id).unwrap_err().code(), "AuthorizationError");
    assert_eq!(engine.download(&intruder, doc.id).await.unwrap_err().code(), "AuthorizationError");
    assert_eq!(engine.list_documents(&intruder, case.id).unwrap_err().code(), "AuthorizationError");

    // The owner's document is untouched.
    let (_, bytes) = engine.download(&owner, doc.id).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(b"x"));

    // Validators read, but cannot act as the owner.
    let validator = Actor::validator(ActorId::new());
    assert!(engine.get_case(&validator, case.id).is_ok());
    assert_eq!(engine.submit(&validator, case.id).unwrap_err().code(), "AuthorizationError");
}

#[tokio::test]
async fn uploads_after_submission_conflict() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    engine.submit(&owner, case.id).unwrap();

    let err = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"late"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ConflictError");
}

#[tokio::test]
async fn unknown_case_and_product_are_not_found() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();

    let err = engine
        .upload(
            &owner,
            dossier_core::CaseId::new(),
            pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"x"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFoundError");

    let err = engine
        .upload(
            &owner,
            case.id,
            pdf(dossier_core::ProductId::new(), DocumentType::ConformityCertAnalysisReport, b"x"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NotFoundError");
}

#[tokio::test]
async fn empty_file_is_a_validation_error() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let err = engine
        .upload(
            &owner,
            case.id,
            pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b""),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ValidationError");
}

#[tokio::test]
async fn full_lifecycle_to_approval() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, true)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    engine.submit(&owner, case.id).unwrap();
    to_review(&engine, &case);

    let validator = Actor::validator(ActorId::new());
    let approved = engine
        .approve(&validator, case.id, Some("all good".into()))
        .unwrap();
    assert_eq!(approved.status, CaseStatus::Approved);
    let decision = approved.decision.as_ref().unwrap();
    assert!(decision.approval_number.as_deref().unwrap().starts_with("AGR-"));
    let invoice = approved.payment.as_ref().unwrap();
    assert_eq!(invoice.payment_reference.as_deref(), Some("pi_3Nx"));
    assert!(invoice.paid_at.is_some());

    let history = engine.history(&owner, case.id).unwrap();
    let statuses: Vec<CaseStatus> = history.iter().map(|h| h.to).collect();
    assert_eq!(
        statuses,
        vec![
            CaseStatus::Submitted,
            CaseStatus::AwaitingPayment,
            CaseStatus::Paid,
            CaseStatus::UnderReview,
            CaseStatus::Approved,
        ]
    );

    // Terminal: no further decisions, no document reviews.
    assert_eq!(
        engine.reject(&validator, case.id, "late").unwrap_err().code(),
        "InvalidTransitionError"
    );
    let doc = engine.list_documents(&owner, case.id).unwrap().remove(0);
    assert_eq!(
        engine
            .review_document(&validator, doc.id, DocumentDecision::Validated, None)
            .unwrap_err()
            .code(),
        "ConflictError"
    );
}

#[tokio::test]
async fn out_of_order_transitions_are_rejected() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let validator = Actor::validator(ActorId::new());
    let admin = Actor::admin(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();

    assert_eq!(
        engine.begin_review(&validator, case.id).unwrap_err().code(),
        "InvalidTransitionError"
    );
    assert_eq!(
        engine.confirm_payment(&admin, case.id, "pi_1").unwrap_err().code(),
        "InvalidTransitionError"
    );
    assert_eq!(
        engine.approve(&validator, case.id, None).unwrap_err().code(),
        "InvalidTransitionError"
    );
    assert_eq!(engine.get_case(&owner, case.id).unwrap().status, CaseStatus::Draft);
}

#[tokio::test]
async fn payment_is_invoiced_once_and_gated_by_role() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let validator = Actor::validator(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    engine.submit(&owner, case.id).unwrap();

    assert_eq!(
        engine.require_payment(&owner, case.id, "100", "TND").unwrap_err().code(),
        "AuthorizationError"
    );
    let first = engine.require_payment(&validator, case.id, "100", "TND").unwrap();
    let retry = engine.require_payment(&validator, case.id, "100", "TND").unwrap();
    assert_eq!(
        first.payment.as_ref().unwrap().invoice_id,
        retry.payment.as_ref().unwrap().invoice_id
    );
    assert_eq!(retry.history.len(), 2);

    assert_eq!(
        engine.confirm_payment(&validator, case.id, "pi_1").unwrap_err().code(),
        "AuthorizationError"
    );
    assert_eq!(
        engine
            .confirm_payment(&Actor::admin(ActorId::new()), case.id, "  ")
            .unwrap_err()
            .code(),
        "ValidationError"
    );
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    engine.submit(&owner, case.id).unwrap();
    to_review(&engine, &case);

    let validator = Actor::validator(ActorId::new());
    assert_eq!(
        engine.reject(&validator, case.id, "").unwrap_err().code(),
        "ValidationError"
    );
    let rejected = engine
        .reject(&validator, case.id, "analysis report expired")
        .unwrap();
    assert_eq!(rejected.status, CaseStatus::Rejected);
    assert_eq!(
        rejected.decision.unwrap().comment.as_deref(),
        Some("analysis report expired")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_to_distinct_slots_all_land() {
    let engine = Arc::new(DossierEngine::in_memory());
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Food, true)])
        .unwrap();
    let case_id = case.id;
    let product = case.products[0].clone();
    let product_id = product.id;

    let uploads = required_slots(&product).into_iter().map(|slot| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .upload(&owner, case_id, pdf(product_id, slot, b"parallel"))
                .await
        })
    });
    for result in futures::future::join_all(uploads).await {
        result.unwrap().unwrap();
    }

    assert!(engine.completeness_check(&owner, case_id).unwrap().complete);
    assert_eq!(engine.submit(&owner, case_id).unwrap().status, CaseStatus::Submitted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_to_one_slot_keep_a_single_document() {
    let engine = Arc::new(DossierEngine::in_memory());
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let case_id = case.id;
    let product_id = case.products[0].id;

    let uploads = (0..8).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .upload(
                    &owner,
                    case_id,
                    pdf(product_id, DocumentType::ConformityCertAnalysisReport, b"race"),
                )
                .await
        })
    });
    let mut committed: Vec<_> = futures::future::join_all(uploads)
        .await
        .into_iter()
        .map(|result| result.unwrap().unwrap())
        .collect();
    let listed = engine.list_documents(&owner, case_id).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(engine.registry().len(), 1);

    // Commit order and upload time agree, so the survivor is the newest.
    committed.sort_by_key(|d| d.uploaded_at);
    committed.dedup_by_key(|d| d.uploaded_at);
    assert_eq!(committed.len(), 8);
    assert_eq!(committed[7].id, listed[0].id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_produce_one_transition() {
    let engine = Arc::new(DossierEngine::in_memory());
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    let case_id = case.id;

    let submits = (0..8).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.submit(&owner, case_id) })
    });
    for result in futures::future::join_all(submits).await {
        assert_eq!(result.unwrap().unwrap().status, CaseStatus::Submitted);
    }
    assert_eq!(engine.history(&owner, case_id).unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submit_racing_final_upload_never_leaves_a_gap() {
    // Whatever the interleaving, a SUBMITTED case has every required slot filled,
    // and an upload that lost the race is refused rather than half-applied.
    for _ in 0..20 {
        let engine = Arc::new(DossierEngine::in_memory());
        let owner = Actor::exporter(ActorId::new());
        let case = engine
            .create_case(&owner, vec![new_product(ProductType::Food, false)])
            .unwrap();
        let case_id = case.id;
        let product_id = case.products[0].id;
        let required = required_slots(&case.products[0]);
        let (last, rest) = required.split_last().unwrap();
        for slot in rest {
            engine
                .upload(&owner, case_id, pdf(product_id, *slot, b"ok"))
                .await
                .unwrap();
        }

        let uploader = {
            let engine = engine.clone();
            let last = *last;
            tokio::spawn(async move {
                engine
                    .upload(&owner, case_id, pdf(product_id, last, b"ok"))
                    .await
            })
        };
        let submitter = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&owner, case_id) })
        };
        let upload = uploader.await.unwrap();
        let submit = submitter.await.unwrap();

        let status = engine.get_case(&owner, case_id).unwrap().status;
        match submit {
            Ok(c) => {
                assert_eq!(c.status, CaseStatus::Submitted);
                assert!(upload.is_ok());
                assert!(engine.completeness_check(&owner, case_id).unwrap().complete);
            }
            Err(e) => {
                assert_eq!(e.code(), "IncompleteDossierError");
                assert_eq!(status, CaseStatus::Draft);
            }
        }
    }
}

#[tokio::test]
async fn abandoned_upload_leaves_slot_pending() {
    use std::time::Duration;

    use async_trait::async_trait;
    use dossier_engine::{BlobError, BlobStore};

    /// Blob store whose writes never finish.
    struct StalledStore;

    #[async_trait]
    impl BlobStore for StalledStore {
        async fn put(&self, _key: &str, _bytes: Bytes) -> Result<(), BlobError> {
            std::future::pending::<()>().await;
            Ok(())
        }
        async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
            Err(BlobError::NotFound(key.to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), BlobError> {
            Ok(())
        }
        fn kind(&self) -> &'static str {
            "stalled"
        }
    }

    let engine = DossierEngine::new(Arc::new(StalledStore));
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    let upload = engine.upload(
        &owner,
        case.id,
        pdf(case.products[0].id, DocumentType::ConformityCertAnalysisReport, b"x"),
    );
    assert!(tokio::time::timeout(Duration::from_millis(20), upload).await.is_err());

    let slots = engine.slots(&owner, case.id).unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].status, DocumentStatus::Pending);
    assert!(slots[0].document_id.is_none());
}

#[tokio::test]
async fn restore_rebuilds_cases_and_documents() {
    let engine = DossierEngine::in_memory();
    let owner = Actor::exporter(ActorId::new());
    let case = engine
        .create_case(&owner, vec![new_product(ProductType::Industrial, false)])
        .unwrap();
    upload_all_required(&engine, &owner, &case).await;
    let docs = engine.list_documents(&owner, case.id).unwrap();
    let case = engine.get_case(&owner, case.id).unwrap();

    let fresh = DossierEngine::in_memory();
    fresh.restore(case.clone(), docs.clone());
    assert_eq!(fresh.get_document(&owner, docs[0].id).unwrap(), docs[0]);
    assert!(fresh.completeness_check(&owner, case.id).unwrap().complete);
}
