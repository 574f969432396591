// src/handlers/purchase_orders.rs

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::documents::PurchaseOrder,
};

#[utoipa::path(
    get,
    path = "/api/purchase-orders",
    tag = "Purchase Orders",
    responses((status = 200, description = "Ordens de compra visíveis para o usuário", body = Vec<PurchaseOrder>)),
    security(("api_jwt" = []))
)]
pub async fn list_purchase_orders(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = app_state
        .po_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(orders))
}

#[utoipa::path(
    get,
    path = "/api/purchase-orders/{id}",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem de compra")),
    responses(
        (status = 200, description = "Ordem de compra", body = PurchaseOrder),
        (status = 403, description = "Ordem de outra pessoa"),
        (status = 404, description = "Ordem de compra não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_purchase_order(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let po = app_state
        .po_service
        .get(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(po))
}

#[utoipa::path(
    get,
    path = "/api/purchase-orders/{id}/pdf",
    tag = "Purchase Orders",
    params(("id" = Uuid, Path, description = "ID da ordem de compra")),
    responses(
        (status = 200, description = "PDF da ordem de compra", content_type = "application/pdf"),
        (status = 404, description = "Ordem de compra não encontrada"),
        (status = 500, description = "Falha ao gerar o PDF")
    ),
    security(("api_jwt" = []))
)]
pub async fn download_purchase_order_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (po, pdf_bytes) = app_state
        .po_service
        .pdf(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}.pdf\"", po.po_number)),
    ];

    Ok((headers, pdf_bytes).into_response())
}
