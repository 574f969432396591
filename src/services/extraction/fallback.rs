// src/services/extraction/fallback.rs

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;

use super::{ExtractionError, StructuredExtractor};
use crate::models::extraction::{DocumentKind, ExtractionMetadata, ExtractionResult};

const VENDOR_MAX_CHARS: usize = 100;

// Ordem de prioridade: o primeiro padrão que casar e for numérico vence
const AMOUNT_PATTERNS: [&str; 3] = [
    r"(?i)total[:\s]+[\$€£]?\s*([\d,]+\.?\d*)",
    r"(?i)amount[:\s]+[\$€£]?\s*([\d,]+\.?\d*)",
    r"[\$€£]\s*([\d,]+\.?\d*)",
];

/// Extração determinística por regex, usada quando a IA não está disponível ou falha.
#[derive(Clone)]
pub struct RegexExtractor {
    patterns: Arc<Vec<Regex>>,
}

impl RegexExtractor {
    pub fn new() -> Self {
        let patterns = AMOUNT_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect();
        Self { patterns: Arc::new(patterns) }
    }

    /// Nunca falha: campos não encontrados ficam vazios.
    pub fn parse(&self, text: &str) -> ExtractionResult {
        let mut result = ExtractionResult::empty(ExtractionMetadata::basic_text_parsing());
        result.vendor_name = vendor_from_first_line(text);
        result.total_amount = self.find_amount(text);
        result
    }

    fn find_amount(&self, text: &str) -> Option<Decimal> {
        self.patterns.iter().find_map(|re| {
            let captured = re.captures(text)?.get(1)?.as_str();
            Decimal::from_str(&captured.replace(',', "")).ok()
        })
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredExtractor for RegexExtractor {
    async fn extract(&self, text: &str, _kind: DocumentKind) -> Result<ExtractionResult, ExtractionError> {
        Ok(self.parse(text))
    }
}

fn vendor_from_first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(VENDOR_MAX_CHARS).collect())
        .unwrap_or_default()
}
