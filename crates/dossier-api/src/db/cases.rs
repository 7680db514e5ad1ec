//! Case persistence: the case row, its products and its transition log.

use chrono::{DateTime, Utc};
use dossier_core::{ActorId, CaseId, Product};
use dossier_engine::CaseRecord;
use dossier_state::{CaseStatus, TransitionRecord};
use sqlx::PgPool;
use uuid::Uuid;

use super::corrupt;

/// Save a case record (upsert), its products and any new history entries.
pub async fn save_case(pool: &PgPool, case: &CaseRecord) -> Result<(), sqlx::Error> {
    let payment = case
        .payment
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize payment: {e}")))?;
    let decision = case
        .decision
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize decision: {e}")))?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO cases (id, reference, owner_id, status, created_at, updated_at, submitted_at, payment, decision, assigned_to)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at,
            submitted_at = EXCLUDED.submitted_at,
            payment = EXCLUDED.payment,
            decision = EXCLUDED.decision,
            assigned_to = EXCLUDED.assigned_to",
    )
    .bind(*case.id.as_uuid())
    .bind(&case.reference)
    .bind(*case.owner_id.as_uuid())
    .bind(case.status.as_str())
    .bind(case.created_at)
    .bind(case.updated_at)
    .bind(case.submitted_at)
    .bind(payment)
    .bind(decision)
    .bind(case.assigned_to.map(|id| *id.as_uuid()))
    .execute(&mut *tx)
    .await?;

    for (position, product) in case.products.iter().enumerate() {
        let attributes = serde_json::to_value(product)
            .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize product: {e}")))?;
        sqlx::query(
            "INSERT INTO case_products (id, case_id, position, product_type, attributes)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                position = EXCLUDED.position,
                attributes = EXCLUDED.attributes",
        )
        .bind(*product.id.as_uuid())
        .bind(*case.id.as_uuid())
        .bind(position as i32)
        .bind(product.product_type.as_str())
        .bind(attributes)
        .execute(&mut *tx)
        .await?;
    }

    // History is append-only; existing sequence numbers are left alone.
    for (seq, entry) in case.history.iter().enumerate() {
        let value = serde_json::to_value(entry)
            .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize history: {e}")))?;
        sqlx::query(
            "INSERT INTO case_history (case_id, seq, transition, entry, at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (case_id, seq) DO NOTHING",
        )
        .bind(*case.id.as_uuid())
        .bind(seq as i32)
        .bind(entry.transition.as_str())
        .bind(value)
        .bind(entry.at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Load every case with its products and history.
pub async fn load_all(pool: &PgPool) -> Result<Vec<CaseRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CaseRow>(
        "SELECT id, reference, owner_id, status, created_at, updated_at, submitted_at, payment, decision, assigned_to
         FROM cases ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let products = load_products(pool, row.id).await?;
        let history = load_history(pool, row.id).await?;
        let status: CaseStatus = row.status.parse().map_err(|e| corrupt("case status", row.id, e))?;
        let payment = row
            .payment
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| corrupt("payment", row.id, e))?;
        let decision = row
            .decision
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| corrupt("decision", row.id, e))?;

        records.push(CaseRecord {
            id: CaseId::from_uuid(row.id),
            reference: row.reference,
            owner_id: ActorId::from_uuid(row.owner_id),
            status,
            products,
            created_at: row.created_at,
            updated_at: row.updated_at,
            submitted_at: row.submitted_at,
            payment,
            decision,
            assigned_to: row.assigned_to.map(ActorId::from_uuid),
            history,
        });
    }
    Ok(records)
}

async fn load_products(pool: &PgPool, case_id: Uuid) -> Result<Vec<Product>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, attributes FROM case_products WHERE case_id = $1 ORDER BY position",
    )
    .bind(case_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| serde_json::from_value(r.attributes).map_err(|e| corrupt("product", r.id, e)))
        .collect()
}

async fn load_history(pool: &PgPool, case_id: Uuid) -> Result<Vec<TransitionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT seq, entry FROM case_history WHERE case_id = $1 ORDER BY seq",
    )
    .bind(case_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            serde_json::from_value(r.entry)
                .map_err(|e| corrupt("history entry", format!("{case_id}#{}", r.seq), e))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct CaseRow {
    id: Uuid,
    reference: String,
    owner_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    payment: Option<serde_json::Value>,
    decision: Option<serde_json::Value>,
    assigned_to: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    attributes: serde_json::Value,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    seq: i32,
    entry: serde_json::Value,
}
