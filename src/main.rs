//src/main.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Nível de log via RUST_LOG (padrão: info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = AppConfig::from_env()?;
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let auth_routes = Router::new().route("/me", get(handlers::auth::get_me));

    let request_routes = Router::new()
        .route(
            "/",
            post(handlers::requests::create_request).get(handlers::requests::list_requests),
        )
        .route(
            "/{id}",
            get(handlers::requests::get_request).patch(handlers::requests::update_request),
        )
        .route("/{id}/approve", patch(handlers::requests::approve_request))
        .route("/{id}/reject", patch(handlers::requests::reject_request))
        .route("/{id}/history", get(handlers::requests::get_history));

    // Uploads aceitam corpos maiores que o padrão do axum
    let upload_limit = DefaultBodyLimit::max(app_state.config.max_upload_bytes);

    let proforma_routes = Router::new()
        .route(
            "/",
            post(handlers::documents::upload_proforma).get(handlers::documents::list_proformas),
        )
        .layer(upload_limit.clone());

    let receipt_routes = Router::new()
        .route(
            "/",
            post(handlers::documents::upload_receipt).get(handlers::documents::list_receipts),
        )
        .route("/{id}/validate", post(handlers::documents::validate_receipt))
        .layer(upload_limit);

    let purchase_order_routes = Router::new()
        .route("/", get(handlers::purchase_orders::list_purchase_orders))
        .route("/{id}", get(handlers::purchase_orders::get_purchase_order))
        .route("/{id}/pdf", get(handlers::purchase_orders::download_purchase_order_pdf));

    // Tudo em /api exige token, exceto o health
    let protected = Router::new()
        .nest("/auth", auth_routes)
        .nest("/requests", request_routes)
        .nest("/proformas", proforma_routes)
        .nest("/receipts", receipt_routes)
        .nest("/purchase-orders", purchase_order_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let bind_addr = app_state.config.bind_addr.clone();

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
