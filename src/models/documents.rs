// src/models/documents.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::models::extraction::{ExtractionMetadata, ExtractionResult, ItemsPayload};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "validation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Valid,
    Invalid,
    Discrepancy,
}

impl ValidationStatus {
    /// Válido vence; senão, qualquer divergência marca `discrepancy`; senão `invalid`.
    pub fn from_outcome(results: &ValidationResults, discrepancies: &[Discrepancy]) -> Self {
        if results.overall_valid {
            ValidationStatus::Valid
        } else if !discrepancies.is_empty() {
            ValidationStatus::Discrepancy
        } else {
            ValidationStatus::Invalid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

// --- Resultado da conciliação ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationResults {
    pub vendor_match: bool,
    pub amount_match: bool,
    pub items_match: bool,
    pub overall_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Discrepancy {
    VendorMismatch {
        expected: String,
        found: String,
        severity: Severity,
    },
    AmountMismatch {
        expected: Decimal,
        found: Decimal,
        difference: Decimal,
        severity: Severity,
    },
    ItemCountMismatch {
        expected_count: usize,
        found_count: usize,
        severity: Severity,
    },
}

// --- Registros ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Proforma {
    pub id: Uuid,
    pub request_id: Uuid,
    #[serde(skip_serializing)]
    pub file_path: String,
    #[schema(example = "/media/documents/proformas/2025/06/01/9b1c_cotacao.pdf")]
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
    #[schema(example = "Papelaria Central Ltda")]
    pub vendor_name: String,
    pub vendor_address: String,
    pub total_amount: Option<Decimal>,
    #[schema(value_type = Object)]
    pub items_data: Json<ItemsPayload>,
    pub terms: String,
    #[schema(value_type = Option<Object>)]
    pub extraction_metadata: Option<Json<ExtractionMetadata>>,
}

// Limites das colunas de proformas e ordens de compra
pub const VENDOR_NAME_MAX_CHARS: usize = 200;
const AMOUNT_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0); // 10^10, NUMERIC(12, 2)

/// Valor extraído que cabe em NUMERIC(12, 2); o resto vira "sem total".
pub fn storable_amount(amount: Decimal) -> Option<Decimal> {
    let rounded = amount.round_dp(2);
    (rounded.abs() < AMOUNT_LIMIT).then_some(rounded)
}

pub fn storable_vendor_name(name: String) -> String {
    match name.char_indices().nth(VENDOR_NAME_MAX_CHARS) {
        Some((cut, _)) => name[..cut].to_string(),
        None => name,
    }
}

/// Campos extraídos que serão gravados numa proforma.
#[derive(Debug, Clone)]
pub struct NewProforma {
    pub request_id: Uuid,
    pub file_path: String,
    pub file_url: String,
    pub vendor_name: String,
    pub vendor_address: String,
    pub total_amount: Option<Decimal>,
    pub items_data: ItemsPayload,
    pub terms: String,
    pub extraction_metadata: ExtractionMetadata,
}

impl NewProforma {
    pub fn from_extraction(request_id: Uuid, file_path: String, file_url: String, extraction: ExtractionResult) -> Self {
        Self {
            request_id,
            file_path,
            file_url,
            vendor_name: storable_vendor_name(extraction.vendor_name),
            vendor_address: extraction.vendor_address,
            total_amount: extraction.total_amount.and_then(storable_amount),
            items_data: ItemsPayload::new(extraction.items),
            terms: extraction.terms,
            extraction_metadata: extraction.extraction_metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub request_id: Uuid,
    #[schema(example = "PO-20250601-0001")]
    pub po_number: String,
    #[serde(skip_serializing)]
    pub file_path: Option<String>,
    pub file_url: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: Option<Uuid>,
    #[schema(example = "Papelaria Central Ltda")]
    pub vendor_name: String,
    pub vendor_address: String,
    #[schema(value_type = Object)]
    pub items_data: Json<ItemsPayload>,
    #[schema(example = "4500.00")]
    pub total_amount: Decimal,
    pub terms: String,
}

/// Campos de uma ordem de compra antes de receber número e arquivo.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderDraft {
    pub request_id: Uuid,
    pub vendor_name: String,
    pub vendor_address: String,
    pub items_data: ItemsPayload,
    pub total_amount: Decimal,
    pub terms: String,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub request_id: Uuid,
    #[serde(skip_serializing)]
    pub file_path: String,
    pub file_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: Option<Uuid>,
    pub validation_status: ValidationStatus,
    #[schema(value_type = Option<Object>)]
    pub extracted_data: Option<Json<ExtractionResult>>,
    #[schema(value_type = Option<Object>)]
    pub validation_results: Option<Json<ValidationResults>>,
    #[schema(value_type = Vec<Object>)]
    pub discrepancies: Json<Vec<Discrepancy>>,
    pub validated_at: Option<DateTime<Utc>>,
}

/// Tudo o que o processamento de um recibo produz de uma vez.
#[derive(Debug, Clone)]
pub struct ReceiptOutcome {
    pub extracted_data: ExtractionResult,
    pub verdict: Option<(ValidationResults, Vec<Discrepancy>)>,
}

impl ReceiptOutcome {
    pub fn status(&self) -> ValidationStatus {
        match &self.verdict {
            Some((results, discrepancies)) => ValidationStatus::from_outcome(results, discrepancies),
            None => ValidationStatus::Pending,
        }
    }
}
