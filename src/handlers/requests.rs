// src/handlers/requests.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{Approver, RequireRole},
    },
    models::requests::{ApprovalHistoryEntry, NewRequestItem, PurchaseRequest, PurchaseRequestDetail, non_negative},
    services::request_service::RequestChanges,
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestPayload {
    #[validate(length(min = 1, max = 200, message = "O título deve ter entre 1 e 200 caracteres."))]
    #[schema(example = "Notebooks para o time de dados")]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[validate(custom(function = "non_negative"))]
    #[schema(example = "4500.00")]
    pub amount: Decimal,

    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<NewRequestItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequestPayload {
    #[validate(length(min = 1, max = 200, message = "O título deve ter entre 1 e 200 caracteres."))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[validate(custom(function = "non_negative"))]
    pub amount: Option<Decimal>,

    // Quando presente, substitui todos os itens
    #[validate(nested)]
    pub items: Option<Vec<NewRequestItem>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    #[validate(length(max = 1000))]
    #[serde(default)]
    #[schema(example = "Fora do orçamento do trimestre")]
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<ApprovalHistoryEntry>,
}

// ---
// Handlers
// ---

#[utoipa::path(
    post,
    path = "/api/requests",
    tag = "Requests",
    request_body = CreateRequestPayload,
    responses(
        (status = 201, description = "Requisição criada", body = PurchaseRequestDetail),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_request(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let detail = app_state
        .request_service
        .create(&user, payload.title.trim(), &payload.description, payload.amount, &payload.items)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(detail)))
}

#[utoipa::path(
    get,
    path = "/api/requests",
    tag = "Requests",
    responses(
        (status = 200, description = "Requisições visíveis para o papel do usuário", body = Vec<PurchaseRequest>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_requests(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let requests = app_state
        .request_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "ID da requisição")),
    responses(
        (status = 200, description = "Requisição com itens, proforma, ordem de compra e recibos", body = PurchaseRequestDetail),
        (status = 404, description = "Requisição não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_request(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = app_state
        .request_service
        .detail(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}

#[utoipa::path(
    patch,
    path = "/api/requests/{id}",
    tag = "Requests",
    request_body = UpdateRequestPayload,
    params(("id" = Uuid, Path, description = "ID da requisição")),
    responses(
        (status = 200, description = "Requisição atualizada", body = PurchaseRequestDetail),
        (status = 400, description = "Requisição não está pendente"),
        (status = 403, description = "Apenas o criador ou o financeiro podem editar"),
        (status = 404, description = "Requisição não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_request(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRequestPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let changes = RequestChanges {
        title: payload.title.map(|t| t.trim().to_string()),
        description: payload.description,
        amount: payload.amount,
        items: payload.items,
    };

    let detail = app_state
        .request_service
        .update(id, &user, changes)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(detail))
}

#[utoipa::path(
    patch,
    path = "/api/requests/{id}/approve",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "ID da requisição")),
    responses(
        (status = 200, description = "Aprovada no nível aguardado", body = PurchaseRequest),
        (status = 400, description = "Requisição não está pendente"),
        (status = 403, description = "Papel não corresponde ao nível aguardado"),
        (status = 404, description = "Requisição não encontrada"),
        (status = 409, description = "Outra decisão foi registrada ao mesmo tempo")
    ),
    security(("api_jwt" = []))
)]
pub async fn approve_request(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<Approver>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = app_state
        .approval_service
        .approve(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

#[utoipa::path(
    patch,
    path = "/api/requests/{id}/reject",
    tag = "Approvals",
    request_body = RejectPayload,
    params(("id" = Uuid, Path, description = "ID da requisição")),
    responses(
        (status = 200, description = "Requisição rejeitada", body = PurchaseRequest),
        (status = 400, description = "Requisição não está pendente"),
        (status = 404, description = "Requisição não encontrada"),
        (status = 409, description = "Outra decisão foi registrada ao mesmo tempo")
    ),
    security(("api_jwt" = []))
)]
pub async fn reject_request(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<Approver>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RejectPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    // Corpo opcional: rejeitar sem motivo é permitido
    let payload = payload.map(|Json(p)| p).unwrap_or(RejectPayload { reason: String::new() });
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let request = app_state
        .approval_service
        .reject(id, &user, payload.reason.trim())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}/history",
    tag = "Approvals",
    params(("id" = Uuid, Path, description = "ID da requisição")),
    responses(
        (status = 200, description = "Histórico de aprovação", body = HistoryResponse),
        (status = 404, description = "Requisição não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_history(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let history = app_state
        .request_service
        .history(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(HistoryResponse { history }))
}
