// src/db/request_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::{Role, User},
        requests::{PurchaseRequest, RequestItem, RequestStatus},
    },
};

const REQUEST_COLUMNS: &str = r#"
    id, title, description, amount, status, created_by,
    approved_by_level_1, approved_by_level_2, created_at, updated_at,
    level_1_approved_at, approved_at, rejected_at, rejection_reason
"#;

#[derive(Clone)]
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  REQUISIÇÕES
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        created_by: Uuid,
        title: &str,
        description: &str,
        amount: Decimal,
    ) -> Result<PurchaseRequest, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, PurchaseRequest>(&format!(
            r#"
            INSERT INTO purchase_requests (title, description, amount, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(title)
        .bind(description)
        .bind(amount)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok(request)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PurchaseRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, PurchaseRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM purchase_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(request)
    }

    /// Trava a linha até o fim da transação (aprovar/rejeitar).
    pub async fn find_by_id_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<PurchaseRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, PurchaseRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM purchase_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(request)
    }

    // Lista filtrada pelo papel de quem pergunta
    pub async fn list_for_user(&self, user: &User) -> Result<Vec<PurchaseRequest>, AppError> {
        let (filter, binds_user) = match user.role {
            Role::Staff => ("created_by = $1", true),
            Role::ApproverLevel1 | Role::ApproverLevel2 => (
                "status = 'pending' OR approved_by_level_1 = $1 OR approved_by_level_2 = $1",
                true,
            ),
            Role::Finance => ("status = 'approved'", false),
        };

        let sql = format!("SELECT {REQUEST_COLUMNS} FROM purchase_requests WHERE {filter} ORDER BY created_at DESC");
        let mut query = sqlx::query_as::<_, PurchaseRequest>(&sql);
        if binds_user {
            query = query.bind(user.id);
        }

        let requests = query.fetch_all(&self.pool).await?;

        Ok(requests)
    }

    /// Atualiza o cabeçalho apenas se a requisição ainda estiver pendente.
    pub async fn update_header<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        title: &str,
        description: &str,
        amount: Decimal,
    ) -> Result<Option<PurchaseRequest>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let request = sqlx::query_as::<_, PurchaseRequest>(&format!(
            r#"
            UPDATE purchase_requests
            SET title = $2, description = $3, amount = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(amount)
        .fetch_optional(executor)
        .await?;

        Ok(request)
    }

    /// Persiste uma transição com compare-and-set sobre o estado lido.
    /// Retorna `false` quando outra operação chegou antes.
    pub async fn save_transition<'e, E>(
        &self,
        executor: E,
        request: &PurchaseRequest,
        seen_level_1: Option<Uuid>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE purchase_requests
            SET status = $2,
                approved_by_level_1 = $3,
                approved_by_level_2 = $4,
                level_1_approved_at = $5,
                approved_at = $6,
                rejected_at = $7,
                rejection_reason = $8,
                updated_at = $9
            WHERE id = $1
              AND status = $10
              AND approved_by_level_1 IS NOT DISTINCT FROM $11
              AND approved_by_level_2 IS NULL
            "#,
        )
        .bind(request.id)
        .bind(request.status)
        .bind(request.approved_by_level_1)
        .bind(request.approved_by_level_2)
        .bind(request.level_1_approved_at)
        .bind(request.approved_at)
        .bind(request.rejected_at)
        .bind(&request.rejection_reason)
        .bind(request.updated_at)
        .bind(RequestStatus::Pending)
        .bind(seen_level_1)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn add_item<'e, E>(
        &self,
        executor: E,
        request_id: Uuid,
        position: i32,
        description: &str,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<RequestItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, RequestItem>(
            r#"
            INSERT INTO request_items (request_id, position, description, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, request_id, position, description, quantity, unit_price
            "#,
        )
        .bind(request_id)
        .bind(position)
        .bind(description)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(executor)
        .await?;

        Ok(item)
    }

    pub async fn delete_items<'e, E>(&self, executor: E, request_id: Uuid) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM request_items WHERE request_id = $1")
            .bind(request_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn list_items<'e, E>(&self, executor: E, request_id: Uuid) -> Result<Vec<RequestItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, RequestItem>(
            r#"
            SELECT id, request_id, position, description, quantity, unit_price
            FROM request_items
            WHERE request_id = $1
            ORDER BY position
            "#,
        )
        .bind(request_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }
}
