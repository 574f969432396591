// src/db/purchase_order_repo.rs

use sqlx::{Executor, PgPool, Postgres, types::Json};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Role, User},
        documents::{PurchaseOrder, PurchaseOrderDraft},
    },
};

const PO_COLUMNS: &str = r#"
    po.id, po.request_id, po.po_number, po.file_path, po.file_url, po.generated_at,
    po.generated_by, po.vendor_name, po.vendor_address, po.items_data, po.total_amount, po.terms
"#;

#[derive(Clone)]
pub struct PurchaseOrderRepository {
    pool: PgPool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Serializa a alocação de números do dia até o fim da transação.
    pub async fn lock_day<'e, E>(&self, executor: E, prefix: &str) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(prefix)
            .execute(executor)
            .await?;
        Ok(())
    }

    // Maior número já emitido com o prefixo do dia (ex: "PO-20250601-").
    // Ordena pelo tamanho antes do texto para "-10000" vir depois de "-9999".
    pub async fn last_number_with_prefix<'e, E>(&self, executor: E, prefix: &str) -> Result<Option<String>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let last: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT po_number FROM purchase_orders
            WHERE po_number LIKE $1 || '%'
            ORDER BY length(po_number) DESC, po_number DESC
            LIMIT 1
            "#,
        )
        .bind(prefix)
        .fetch_optional(executor)
        .await?;

        Ok(last.map(|(number,)| number))
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        draft: &PurchaseOrderDraft,
        po_number: &str,
        generated_by: Uuid,
    ) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            INSERT INTO purchase_orders AS po (
                request_id, po_number, generated_by, vendor_name, vendor_address,
                items_data, total_amount, terms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING po.id, po.request_id, po.po_number, po.file_path, po.file_url, po.generated_at,
                      po.generated_by, po.vendor_name, po.vendor_address, po.items_data, po.total_amount, po.terms
            "#,
        )
        .bind(draft.request_id)
        .bind(po_number)
        .bind(generated_by)
        .bind(&draft.vendor_name)
        .bind(&draft.vendor_address)
        .bind(Json(&draft.items_data))
        .bind(draft.total_amount)
        .bind(&draft.terms)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or("purchase_orders").to_string();
                    return AppError::UniqueConstraintViolation(constraint);
                }
            }
            e.into()
        })?;

        Ok(po)
    }

    pub async fn attach_file<'e, E>(&self, executor: E, id: Uuid, file_path: &str, file_url: &str) -> Result<PurchaseOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders AS po
            SET file_path = $2, file_url = $3
            WHERE po.id = $1
            RETURNING po.id, po.request_id, po.po_number, po.file_path, po.file_url, po.generated_at,
                      po.generated_by, po.vendor_name, po.vendor_address, po.items_data, po.total_amount, po.terms
            "#,
        )
        .bind(id)
        .bind(file_path)
        .bind(file_url)
        .fetch_one(executor)
        .await?;

        Ok(po)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(&format!("SELECT {PO_COLUMNS} FROM purchase_orders po WHERE po.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(po)
    }

    pub async fn find_by_request<'e, E>(&self, executor: E, request_id: Uuid) -> Result<Option<PurchaseOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let po = sqlx::query_as::<_, PurchaseOrder>(&format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders po WHERE po.request_id = $1"
        ))
        .bind(request_id)
        .fetch_optional(executor)
        .await?;
        Ok(po)
    }

    pub async fn list_for_user(&self, user: &User) -> Result<Vec<PurchaseOrder>, AppError> {
        let sql = match user.role {
            Role::Staff => format!(
                r#"
                SELECT {PO_COLUMNS}
                FROM purchase_orders po
                JOIN purchase_requests pr ON pr.id = po.request_id
                WHERE pr.created_by = $1
                ORDER BY po.generated_at DESC
                "#
            ),
            _ => format!("SELECT {PO_COLUMNS} FROM purchase_orders po ORDER BY po.generated_at DESC"),
        };

        let mut query = sqlx::query_as::<_, PurchaseOrder>(&sql);
        if user.role == Role::Staff {
            query = query.bind(user.id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}
