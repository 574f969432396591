// src/db/document_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Role, User},
        documents::{NewProforma, Proforma, Receipt, ReceiptOutcome},
    },
};

const PROFORMA_COLUMNS: &str = r#"
    p.id, p.request_id, p.file_path, p.file_url, p.uploaded_at, p.vendor_name,
    p.vendor_address, p.total_amount, p.items_data, p.terms, p.extraction_metadata
"#;

const RECEIPT_COLUMNS: &str = r#"
    r.id, r.request_id, r.file_path, r.file_url, r.uploaded_at, r.uploaded_by,
    r.validation_status, r.extracted_data, r.validation_results, r.discrepancies, r.validated_at
"#;

// Proformas e recibos: os documentos enviados pelos usuários
#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  PROFORMAS
    // =========================================================================

    pub async fn insert_proforma<'e, E>(&self, executor: E, proforma: &NewProforma) -> Result<Proforma, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Proforma>(
            r#"
            INSERT INTO proformas AS p (
                request_id, file_path, file_url, vendor_name, vendor_address,
                total_amount, items_data, terms, extraction_metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING p.id, p.request_id, p.file_path, p.file_url, p.uploaded_at, p.vendor_name,
                      p.vendor_address, p.total_amount, p.items_data, p.terms, p.extraction_metadata
            "#,
        )
        .bind(proforma.request_id)
        .bind(&proforma.file_path)
        .bind(&proforma.file_url)
        .bind(&proforma.vendor_name)
        .bind(&proforma.vendor_address)
        .bind(proforma.total_amount)
        .bind(Json(&proforma.items_data))
        .bind(&proforma.terms)
        .bind(Json(&proforma.extraction_metadata))
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return match db_err.constraint() {
                        // Duas proformas chegando ao mesmo tempo para a mesma requisição
                        Some("proformas_request_id_key") => AppError::ProformaAlreadyExists,
                        Some(constraint) => AppError::UniqueConstraintViolation(constraint.to_string()),
                        None => AppError::UniqueConstraintViolation("proformas".to_string()),
                    };
                }
            }
            e.into()
        })?;

        Ok(created)
    }

    pub async fn find_proforma_by_request<'e, E>(&self, executor: E, request_id: Uuid) -> Result<Option<Proforma>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let proforma = sqlx::query_as::<_, Proforma>(&format!(
            "SELECT {PROFORMA_COLUMNS} FROM proformas p WHERE p.request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(executor)
        .await?;

        Ok(proforma)
    }

    // Staff vê só as proformas das próprias requisições; os demais papéis veem todas
    pub async fn list_proformas(&self, user: &User) -> Result<Vec<Proforma>, AppError> {
        let sql = match user.role {
            Role::Staff => format!(
                r#"
                SELECT {PROFORMA_COLUMNS}
                FROM proformas p
                JOIN purchase_requests pr ON pr.id = p.request_id
                WHERE pr.created_by = $1
                ORDER BY p.uploaded_at DESC
                "#
            ),
            _ => format!("SELECT {PROFORMA_COLUMNS} FROM proformas p ORDER BY p.uploaded_at DESC"),
        };

        let mut query = sqlx::query_as::<_, Proforma>(&sql);
        if user.role == Role::Staff {
            query = query.bind(user.id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    // =========================================================================
    //  RECIBOS
    // =========================================================================

    pub async fn insert_receipt<'e, E>(
        &self,
        executor: E,
        request_id: Uuid,
        file_path: &str,
        file_url: &str,
        uploaded_by: Uuid,
    ) -> Result<Receipt, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts AS r (request_id, file_path, file_url, uploaded_by)
            VALUES ($1, $2, $3, $4)
            RETURNING r.id, r.request_id, r.file_path, r.file_url, r.uploaded_at, r.uploaded_by,
                      r.validation_status, r.extracted_data, r.validation_results, r.discrepancies, r.validated_at
            "#,
        )
        .bind(request_id)
        .bind(file_path)
        .bind(file_url)
        .bind(uploaded_by)
        .fetch_one(executor)
        .await?;

        Ok(receipt)
    }

    /// Grava o resultado da extração e, quando houve conciliação, o veredito.
    pub async fn save_receipt_outcome<'e, E>(
        &self,
        executor: E,
        receipt_id: Uuid,
        outcome: &ReceiptOutcome,
        validated_at: DateTime<Utc>,
    ) -> Result<Receipt, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (results, discrepancies, validated_at) = match &outcome.verdict {
            Some((results, discrepancies)) => (Some(Json(results)), Json(discrepancies.clone()), Some(validated_at)),
            None => (None, Json(Vec::new()), None),
        };

        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            UPDATE receipts AS r
            SET extracted_data = $2,
                validation_status = $3,
                validation_results = $4,
                discrepancies = $5,
                validated_at = $6
            WHERE r.id = $1
            RETURNING r.id, r.request_id, r.file_path, r.file_url, r.uploaded_at, r.uploaded_by,
                      r.validation_status, r.extracted_data, r.validation_results, r.discrepancies, r.validated_at
            "#,
        )
        .bind(receipt_id)
        .bind(Json(&outcome.extracted_data))
        .bind(outcome.status())
        .bind(results)
        .bind(discrepancies)
        .bind(validated_at)
        .fetch_one(executor)
        .await?;

        Ok(receipt)
    }

    pub async fn find_receipt<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Receipt>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let receipt = sqlx::query_as::<_, Receipt>(&format!("SELECT {RECEIPT_COLUMNS} FROM receipts r WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(receipt)
    }

    pub async fn list_receipts_by_request<'e, E>(&self, executor: E, request_id: Uuid) -> Result<Vec<Receipt>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let receipts = sqlx::query_as::<_, Receipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts r WHERE r.request_id = $1 ORDER BY r.uploaded_at DESC"
        ))
        .bind(request_id)
        .fetch_all(executor)
        .await?;

        Ok(receipts)
    }

    pub async fn list_receipts(&self, user: &User) -> Result<Vec<Receipt>, AppError> {
        let sql = match user.role {
            Role::Staff => format!(
                r#"
                SELECT {RECEIPT_COLUMNS}
                FROM receipts r
                JOIN purchase_requests pr ON pr.id = r.request_id
                WHERE pr.created_by = $1
                ORDER BY r.uploaded_at DESC
                "#
            ),
            _ => format!("SELECT {RECEIPT_COLUMNS} FROM receipts r ORDER BY r.uploaded_at DESC"),
        };

        let mut query = sqlx::query_as::<_, Receipt>(&sql);
        if user.role == Role::Staff {
            query = query.bind(user.id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}
