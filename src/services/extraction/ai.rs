// src/services/extraction/ai.rs

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ExtractionError, StructuredExtractor};
use crate::models::extraction::{DocumentKind, ExtractionMetadata, ExtractionResult, LineItem};

const SYSTEM_PROMPT: &str =
    "You are a document extraction assistant. Extract structured data from documents and return valid JSON only.";

const PROFORMA_SCHEMA: &str = r#"Return a JSON object with the following structure:
{
    "vendor_name": "name of the vendor/company",
    "vendor_address": "full address of vendor",
    "total_amount": numeric_value_only,
    "items_data": {
        "items": [
            {"description": "item description", "quantity": number, "unit_price": number, "total": number}
        ]
    },
    "terms": "payment terms and conditions"
}

If any field cannot be found, use empty string for text fields, null for numbers, and empty object for objects."#;

const RECEIPT_SCHEMA: &str = r#"Return a JSON object with the following structure:
{
    "vendor_name": "name of the seller/vendor",
    "items": [
        {"description": "item description", "quantity": number, "unit_price": number, "total": number}
    ],
    "total_amount": numeric_value_only,
    "date": "date in YYYY-MM-DD format if available"
}

If any field cannot be found, use empty string for text fields, null for numbers, and empty array for items."#;

/// Chamada a um LLM que devolve um único objeto JSON como texto.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str, schema_hint: &str) -> Result<String, ExtractionError>;
}

// =============================================================================
//  CLIENTE OPENAI (API compatível com /chat/completions)
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Clone)]
pub struct OpenAiCompletionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self, ExtractionError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system: &str, user: &str, schema_hint: &str) -> Result<String, ExtractionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system.to_string() },
                ChatMessage { role: "user".to_string(), content: format!("{user}\n\n{schema_hint}") },
            ],
            temperature: 0.1,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Upstream { status: status.as_u16(), body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ExtractionError::InvalidResponse("resposta sem choices".to_string()))
    }
}

// =============================================================================
//  ESTRATÉGIA DE IA
// =============================================================================

pub struct AiExtractor {
    client: Arc<dyn CompletionClient>,
}

impl AiExtractor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StructuredExtractor for AiExtractor {
    async fn extract(&self, text: &str, kind: DocumentKind) -> Result<ExtractionResult, ExtractionError> {
        let (label, schema) = match kind {
            DocumentKind::Proforma => ("proforma invoice", PROFORMA_SCHEMA),
            DocumentKind::Receipt => ("receipt", RECEIPT_SCHEMA),
        };
        let prompt = format!("Extract the following information from this {label} document text:\n\n{text}");

        let raw = self.client.complete(SYSTEM_PROMPT, &prompt, schema).await?;
        parse_reply(&raw, kind)
    }
}

/// Converte a resposta do modelo sem confiar nos tipos: números podem vir como texto.
pub fn parse_reply(raw: &str, kind: DocumentKind) -> Result<ExtractionResult, ExtractionError> {
    let value: Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| ExtractionError::InvalidResponse("esperado um objeto JSON".to_string()))?;

    let mut result = ExtractionResult::empty(ExtractionMetadata::ai());
    result.vendor_name = text_field(object, "vendor_name");
    result.total_amount = object.get("total_amount").and_then(decimal_value);

    match kind {
        DocumentKind::Proforma => {
            result.vendor_address = text_field(object, "vendor_address");
            result.terms = text_field(object, "terms");
            // O modelo às vezes achata `items_data` para `items`
            let items = object
                .get("items_data")
                .and_then(|data| data.get("items"))
                .or_else(|| object.get("items"));
            result.items = items.map(line_items).unwrap_or_default();
        }
        DocumentKind::Receipt => {
            result.items = object.get("items").map(line_items).unwrap_or_default();
            result.date = object
                .get("date")
                .and_then(Value::as_str)
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());
        }
    }

    Ok(result)
}

fn text_field(object: &Map<String, Value>, key: &str) -> String {
    object.get(key).and_then(Value::as_str).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-')).collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn line_items(value: &Value) -> Vec<LineItem> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| {
            let quantity = entry.get("quantity").and_then(decimal_value).unwrap_or_default();
            let unit_price = entry.get("unit_price").and_then(decimal_value).unwrap_or_default();
            let total = entry
                .get("total")
                .and_then(decimal_value)
                .unwrap_or_else(|| quantity.checked_mul(unit_price).unwrap_or_default());
            LineItem {
                description: text_field(entry, "description"),
                quantity,
                unit_price,
                total,
            }
        })
        .collect()
}
