// src/common/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::{
    common::i18n::{DEFAULT_LANG, I18nStore},
    middleware::i18n::Locale,
    models::requests::TransitionError,
    services::{file_store::FileStoreError, pdf_renderer::RenderError},
};

// Erro de domínio da aplicação. Cada variante vira um status HTTP e uma chave de tradução.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Permissão negada")]
    PermissionDenied,

    #[error("Requisição não pode ser editada")]
    RequestNotEditable,

    #[error("Proforma já enviada para a requisição")]
    ProformaAlreadyExists,

    #[error("Requisição não aprovada")]
    RequestNotApproved,

    #[error("Requisição sem ordem de compra")]
    PurchaseOrderMissing,

    #[error("Upload inválido: {0}")]
    InvalidUpload(String),

    #[error("Transição de aprovação inválida: {0}")]
    Transition(#[from] TransitionError),

    #[error("Conflito de concorrência")]
    ConcurrentModification,

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    #[error("Falha ao processar documento: {0}")]
    ProcessingFailed(String),

    #[error("Erro de armazenamento de arquivo: {0}")]
    FileStore(#[from] FileStoreError),

    #[error("Erro ao renderizar PDF: {0}")]
    Render(#[from] RenderError),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// O corpo de erro que o cliente recebe
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::RequestNotEditable
            | AppError::ProformaAlreadyExists
            | AppError::RequestNotApproved
            | AppError::PurchaseOrderMissing
            | AppError::InvalidUpload(_) => StatusCode::BAD_REQUEST,

            AppError::Transition(TransitionError::Inconsistent(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Transition(_) => StatusCode::BAD_REQUEST,

            AppError::InvalidToken | AppError::UserNotFound | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::ResourceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConcurrentModification | AppError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,

            AppError::ProcessingFailed(_)
            | AppError::FileStore(_)
            | AppError::Render(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta da API, traduzindo a mensagem para o idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, i18n_store: &I18nStore) -> ApiError {
        let status = self.status();
        let lang = locale.0.as_str();

        if status.is_server_error() {
            tracing::error!(error = %self, "Erro Interno do Servidor");
        }

        let (key, args, details): (&str, Vec<(&str, String)>, Option<Value>) = match self {
            AppError::ValidationError(errors) => ("validation", vec![], Some(validation_details(&errors))),
            AppError::InvalidToken | AppError::JwtError(_) => ("invalid_token", vec![], None),
            AppError::UserNotFound => ("user_not_found", vec![], None),
            AppError::ResourceNotFound(resource) => ("not_found", vec![("resource", resource)], None),
            AppError::PermissionDenied => ("permission_denied", vec![], None),
            AppError::RequestNotEditable => ("request_not_editable", vec![], None),
            AppError::ProformaAlreadyExists => ("proforma_exists", vec![], None),
            AppError::RequestNotApproved => ("request_not_approved", vec![], None),
            AppError::PurchaseOrderMissing => ("purchase_order_missing", vec![], None),
            AppError::InvalidUpload(reason) => ("invalid_upload", vec![("reason", reason)], None),
            AppError::Transition(TransitionError::NotPending(_)) => ("request_not_pending", vec![], None),
            AppError::Transition(TransitionError::WrongLevel(level)) => {
                ("wrong_level", vec![("level", level.to_string())], None)
            }
            AppError::ConcurrentModification => ("conflict", vec![], Some(json!({ "retryable": true }))),
            AppError::UniqueConstraintViolation(constraint) => ("duplicate", vec![], Some(json!({ "constraint": constraint }))),
            AppError::ProcessingFailed(_) => ("processing_failed", vec![], None),
            // Inconsistências, banco, arquivos: o detalhe fica só no log
            _ => ("internal", vec![], None),
        };

        ApiError {
            status,
            error: i18n_store.translate(lang, key, &args),
            details,
        }
    }
}

fn validation_details(errors: &validator::ValidationErrors) -> Value {
    let details: serde_json::Map<String, Value> = errors
        .field_errors()
        .into_iter()
        .map(|(field, field_errors)| {
            let messages: Vec<Value> = field_errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => Value::String(message.to_string()),
                    None => Value::String(e.code.to_string()),
                })
                .collect();
            (field.to_string(), Value::Array(messages))
        })
        .collect();
    Value::Object(details)
}

// Usado por middlewares, onde não temos o Locale à mão.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale(DEFAULT_LANG.to_string()), &I18nStore::new())
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::requests::{ApprovalLevel, RequestStatus};

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn business_rules_map_to_bad_request() {
        let store = I18nStore::new();
        let api = AppError::ProformaAlreadyExists.to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.error, "Já existe uma proforma para esta requisição.");

        let api = AppError::Transition(TransitionError::WrongLevel(ApprovalLevel::Level2)).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert!(api.error.contains('2'));
    }

    #[test]
    fn conflict_is_retryable() {
        let api = AppError::ConcurrentModification.to_api_error(&pt(), &I18nStore::new());
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert_eq!(api.details, Some(json!({ "retryable": true })));
    }

    #[test]
    fn corrupted_state_is_internal() {
        let err = AppError::Transition(TransitionError::Inconsistent("x"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = AppError::Transition(TransitionError::NotPending(RequestStatus::Approved));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn permission_and_not_found_codes() {
        assert_eq!(AppError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::ResourceNotFound("Recibo".into()).status(), StatusCode::NOT_FOUND);
    }
}
