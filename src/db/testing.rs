// src/db/testing.rs

// Apoio aos testes com banco (só rodam com TEST_DATABASE_URL definida)

use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::models::auth::Role;

pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();
    Some(pool)
}

pub async fn insert_user(pool: &PgPool, role: Role) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, email, role) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(format!("user-{id}"))
        .bind(format!("{id}@example.com"))
        .bind(role)
        .execute(pool)
        .await
        .unwrap();
    id
}

pub async fn insert_pending_request(pool: &PgPool, created_by: Uuid) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO purchase_requests (title, description, amount, created_by) VALUES ('Cadeiras', '', 900.00, $1) RETURNING id",
    )
    .bind(created_by)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_approved_request(pool: &PgPool, approver: Uuid) -> Uuid {
    let staff = insert_user(pool, Role::Staff).await;
    let level_1 = insert_user(pool, Role::ApproverLevel1).await;

    sqlx::query_scalar(
        r#"
        INSERT INTO purchase_requests
            (title, description, amount, status, created_by, approved_by_level_1, approved_by_level_2,
             level_1_approved_at, approved_at)
        VALUES ('Cadeiras', '', 900.00, 'approved', $1, $2, $3, NOW(), NOW())
        RETURNING id
        "#,
    )
    .bind(staff)
    .bind(level_1)
    .bind(approver)
    .fetch_one(pool)
    .await
    .unwrap()
}
