// src/handlers/documents.rs

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::documents::{Proforma, Receipt},
};

// Formulário multipart aceito pelos uploads (só para a documentação)
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
    /// ID da requisição
    request: Uuid,
    /// PDF ou imagem (jpg, png, gif, bmp)
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Debug)]
pub struct Upload {
    pub request_id: Uuid,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Lê os campos `request` e `file` do multipart.
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut request_id = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidUpload(e.body_text()))?
    {
        match field.name() {
            Some("request") => {
                let text = field.text().await.map_err(|e| AppError::InvalidUpload(e.body_text()))?;
                let id = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::InvalidUpload("'request' não é um UUID válido".into()))?;
                request_id = Some(id);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::InvalidUpload(e.body_text()))?;
                file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let request_id = request_id.ok_or_else(|| AppError::InvalidUpload("campo 'request' ausente".into()))?;
    let (filename, bytes) = file.ok_or_else(|| AppError::InvalidUpload("campo 'file' ausente".into()))?;
    if bytes.is_empty() {
        return Err(AppError::InvalidUpload("arquivo vazio".into()));
    }

    Ok(Upload { request_id, filename, bytes })
}

// ---
// Proformas
// ---

#[utoipa::path(
    post,
    path = "/api/proformas",
    tag = "Documents",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Proforma enviada e extraída", body = Proforma),
        (status = 400, description = "Upload inválido ou proforma já existente"),
        (status = 403, description = "Apenas o criador ou o financeiro podem enviar"),
        (status = 404, description = "Requisição não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_proforma(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let proforma = app_state
        .document_service
        .upload_proforma(&user, upload.request_id, &upload.filename, upload.bytes)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(proforma)))
}

#[utoipa::path(
    get,
    path = "/api/proformas",
    tag = "Documents",
    responses((status = 200, description = "Proformas visíveis para o usuário", body = Vec<Proforma>)),
    security(("api_jwt" = []))
)]
pub async fn list_proformas(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let proformas = app_state
        .document_service
        .list_proformas(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(proformas))
}

// ---
// Recibos
// ---

#[utoipa::path(
    post,
    path = "/api/receipts",
    tag = "Documents",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Recibo enviado; conciliado se houver ordem de compra", body = Receipt),
        (status = 400, description = "Upload inválido ou requisição não aprovada"),
        (status = 403, description = "Apenas o criador ou o financeiro podem enviar"),
        (status = 404, description = "Requisição não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_receipt(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let receipt = app_state
        .document_service
        .upload_receipt(&user, upload.request_id, &upload.filename, upload.bytes)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[utoipa::path(
    get,
    path = "/api/receipts",
    tag = "Documents",
    responses((status = 200, description = "Recibos visíveis para o usuário", body = Vec<Receipt>)),
    security(("api_jwt" = []))
)]
pub async fn list_receipts(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let receipts = app_state
        .document_service
        .list_receipts(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(receipts))
}

#[utoipa::path(
    post,
    path = "/api/receipts/{id}/validate",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "ID do recibo")),
    responses(
        (status = 200, description = "Recibo reprocessado e conciliado", body = Receipt),
        (status = 400, description = "Requisição ainda sem ordem de compra"),
        (status = 404, description = "Recibo não encontrado"),
        (status = 500, description = "Falha ao reprocessar o recibo")
    ),
    security(("api_jwt" = []))
)]
pub async fn validate_receipt(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = app_state
        .document_service
        .revalidate(id, &user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, extract::FromRequest, http::Request};

    const BOUNDARY: &str = "XBOUNDARYX";

    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, filename, content) in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match filename {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: application/pdf\r\n\r\n"
                )),
                None => body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        Request::builder()
            .method("POST")
            .uri("/api/proformas")
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn parse(parts: &[(&str, Option<&str>, &str)]) -> Result<Upload, AppError> {
        let multipart = Multipart::from_request(multipart_body(parts), &()).await.unwrap();
        read_upload(multipart).await
    }

    #[tokio::test]
    async fn reads_request_and_file_fields() {
        let id = Uuid::new_v4();
        let upload = parse(&[("request", None, &id.to_string()), ("file", Some("quote.pdf"), "%PDF-1.4")])
            .await
            .unwrap();

        assert_eq!(upload.request_id, id);
        assert_eq!(upload.filename, "quote.pdf");
        assert_eq!(upload.bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn missing_or_invalid_fields_are_rejected() {
        assert!(matches!(
            parse(&[("file", Some("quote.pdf"), "%PDF")]).await,
            Err(AppError::InvalidUpload(_))
        ));
        assert!(matches!(
            parse(&[("request", None, "not-a-uuid"), ("file", Some("quote.pdf"), "%PDF")]).await,
            Err(AppError::InvalidUpload(_))
        ));
        assert!(matches!(
            parse(&[("request", None, &Uuid::new_v4().to_string())]).await,
            Err(AppError::InvalidUpload(_))
        ));
    }
}
