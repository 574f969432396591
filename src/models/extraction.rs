// src/models/extraction.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tipo de documento enviado para extração. Cada um tem seu próprio esquema de resposta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Proforma,
    Receipt,
}

// Linha de item como aparece nos payloads JSON (proforma, ordem de compra, recibo)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    #[serde(default)]
    #[schema(example = "Notebook 16GB RAM")]
    pub description: String,
    #[serde(default)]
    #[schema(example = "3")]
    pub quantity: Decimal,
    #[serde(default)]
    #[schema(example = "1500.00")]
    pub unit_price: Decimal,
    #[serde(default)]
    #[schema(example = "4500.00")]
    pub total: Decimal,
}

/// Envelope `{"items": [...]}` gravado nas colunas `items_data`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct ItemsPayload {
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl ItemsPayload {
    pub fn new(items: Vec<LineItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Ai,
    BasicTextParsing,
    TextExtraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

// Metadados que dizem ao chamador qual estratégia produziu o resultado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub method: ExtractionMethod,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionMetadata {
    pub fn ai() -> Self {
        Self {
            method: ExtractionMethod::Ai,
            success: true,
            confidence: Some(Confidence::High),
            error: None,
        }
    }

    pub fn basic_text_parsing() -> Self {
        Self {
            method: ExtractionMethod::BasicTextParsing,
            success: true,
            confidence: Some(Confidence::Low),
            error: None,
        }
    }

    pub fn no_text() -> Self {
        Self {
            method: ExtractionMethod::TextExtraction,
            success: false,
            confidence: None,
            error: Some("no text".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub vendor_address: String,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub terms: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub extraction_metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Resultado vazio, usado quando não há texto para analisar.
    pub fn empty(extraction_metadata: ExtractionMetadata) -> Self {
        Self {
            vendor_name: String::new(),
            vendor_address: String::new(),
            total_amount: None,
            items: Vec::new(),
            terms: String::new(),
            date: None,
            extraction_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_uses_snake_case_tags() {
        let json = serde_json::to_value(ExtractionMetadata::basic_text_parsing()).unwrap();
        assert_eq!(json["method"], "basic_text_parsing");
        assert_eq!(json["confidence"], "low");
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(ExtractionMetadata::no_text()).unwrap();
        assert_eq!(json["method"], "text_extraction");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "no text");
    }

    #[test]
    fn items_payload_tolerates_missing_fields() {
        let payload: ItemsPayload = serde_json::from_str(r#"{"items": [{"description": "Cadeira"}]}"#).unwrap();
        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].quantity, Decimal::ZERO);

        let empty: ItemsPayload = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
