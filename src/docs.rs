// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::get_me,

        // --- Requests ---
        handlers::requests::create_request,
        handlers::requests::list_requests,
        handlers::requests::get_request,
        handlers::requests::update_request,

        // --- Approvals ---
        handlers::requests::approve_request,
        handlers::requests::reject_request,
        handlers::requests::get_history,

        // --- Documents ---
        handlers::documents::upload_proforma,
        handlers::documents::list_proformas,
        handlers::documents::upload_receipt,
        handlers::documents::list_receipts,
        handlers::documents::validate_receipt,

        // --- Purchase Orders ---
        handlers::purchase_orders::list_purchase_orders,
        handlers::purchase_orders::get_purchase_order,
        handlers::purchase_orders::download_purchase_order_pdf,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::User,

            // --- Requests ---
            models::requests::RequestStatus,
            models::requests::ApprovalLevel,
            models::requests::PurchaseRequest,
            models::requests::RequestItem,
            models::requests::RequestItemView,
            models::requests::NewRequestItem,
            models::requests::PurchaseRequestDetail,
            models::requests::ApprovalHistoryEntry,

            // --- Documents ---
            models::documents::ValidationStatus,
            models::documents::Proforma,
            models::documents::PurchaseOrder,
            models::documents::Receipt,
            models::extraction::LineItem,

            // --- Payloads ---
            handlers::requests::CreateRequestPayload,
            handlers::requests::UpdateRequestPayload,
            handlers::requests::RejectPayload,
            handlers::requests::HistoryResponse,
            handlers::documents::UploadForm,
        )
    ),
    tags(
        (name = "Auth", description = "Usuário autenticado"),
        (name = "Requests", description = "Requisições de compra"),
        (name = "Approvals", description = "Aprovação em dois níveis"),
        (name = "Documents", description = "Proformas e recibos (upload, extração e conciliação)"),
        (name = "Purchase Orders", description = "Ordens de compra e PDF")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented_with_bearer_auth() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/requests",
            "/api/requests/{id}/approve",
            "/api/receipts/{id}/validate",
            "/api/purchase-orders/{id}/pdf",
        ] {
            assert!(doc.paths.paths.contains_key(path), "faltando {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
