//! Document persistence. One row per occupied slot.

use chrono::{DateTime, Utc};
use dossier_core::{ActorId, CaseId, DocumentId, DocumentType, ProductId};
use dossier_engine::DocumentRecord;
use dossier_state::DocumentStatus;
use sqlx::PgPool;
use uuid::Uuid;

use super::corrupt;

/// Save a document record.
///
/// A re-upload replaces the row occupying the same slot, so the previous
/// document id disappears together with its blob. Concurrent uploads to one
/// slot may reach the database in any order: a row is only replaced by a
/// newer upload, or updated by a review of the same document.
pub async fn save_document(pool: &PgPool, doc: &DocumentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO documents (id, case_id, product_id, document_type, file_name, content_type,
                                size_bytes, sha256, blob_key, status, review_comment,
                                uploaded_at, reviewed_at, reviewed_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         ON CONFLICT (case_id, product_id, document_type) DO UPDATE SET
            id = EXCLUDED.id,
            file_name = EXCLUDED.file_name,
            content_type = EXCLUDED.content_type,
            size_bytes = EXCLUDED.size_bytes,
            sha256 = EXCLUDED.sha256,
            blob_key = EXCLUDED.blob_key,
            status = EXCLUDED.status,
            review_comment = EXCLUDED.review_comment,
            uploaded_at = EXCLUDED.uploaded_at,
            reviewed_at = EXCLUDED.reviewed_at,
            reviewed_by = EXCLUDED.reviewed_by
         WHERE documents.id = EXCLUDED.id OR documents.uploaded_at < EXCLUDED.uploaded_at",
    )
    .bind(*doc.id.as_uuid())
    .bind(*doc.case_id.as_uuid())
    .bind(*doc.product_id.as_uuid())
    .bind(doc.document_type.as_str())
    .bind(&doc.file_name)
    .bind(&doc.content_type)
    .bind(doc.size_bytes as i64)
    .bind(&doc.sha256)
    .bind(&doc.blob_key)
    .bind(doc.status.as_str())
    .bind(&doc.review_comment)
    .bind(doc.uploaded_at)
    .bind(doc.reviewed_at)
    .bind(doc.reviewed_by.map(|a| *a.as_uuid()))
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a document row.
pub async fn delete_document(pool: &PgPool, id: DocumentId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(*id.as_uuid())
        .execute(pool)
        .await?;
    Ok(())
}

/// Load every committed document.
pub async fn load_all(pool: &PgPool) -> Result<Vec<DocumentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        "SELECT id, case_id, product_id, document_type, file_name, content_type, size_bytes,
                sha256, blob_key, status, review_comment, uploaded_at, reviewed_at, reviewed_by
         FROM documents ORDER BY uploaded_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(DocumentRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    case_id: Uuid,
    product_id: Uuid,
    document_type: String,
    file_name: String,
    content_type: String,
    size_bytes: i64,
    sha256: String,
    blob_key: String,
    status: String,
    review_comment: Option<String>,
    uploaded_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<Uuid>,
}

impl DocumentRow {
    fn into_record(self) -> Result<DocumentRecord, sqlx::Error> {
        let document_type: DocumentType = self
            .document_type
            .parse()
            .map_err(|e| corrupt("document type", self.id, e))?;
        let status: DocumentStatus = self
            .status
            .parse()
            .map_err(|e| corrupt("document status", self.id, e))?;
        let size_bytes =
            u64::try_from(self.size_bytes).map_err(|e| corrupt("document size", self.id, e))?;

        Ok(DocumentRecord {
            id: DocumentId::from_uuid(self.id),
            case_id: CaseId::from_uuid(self.case_id),
            product_id: ProductId::from_uuid(self.product_id),
            document_type,
            file_name: self.file_name,
            content_type: self.content_type,
            size_bytes,
            sha256: self.sha256,
            blob_key: self.blob_key,
            status,
            review_comment: self.review_comment,
            uploaded_at: self.uploaded_at,
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by.map(ActorId::from_uuid),
        })
    }
}
