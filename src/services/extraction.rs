// src/services/extraction.rs

pub mod ai;
pub mod fallback;
pub mod text;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::extraction::{DocumentKind, ExtractionMetadata, ExtractionResult};

pub use ai::{AiExtractor, CompletionClient, OpenAiCompletionClient};
pub use fallback::RegexExtractor;
pub use text::{OcrEngine, PdfExtractReader, PdfTextReader, SourceFormat};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("falha ao ler o PDF: {0}")]
    Pdf(String),

    #[error("falha no OCR: {0}")]
    Ocr(String),

    #[error("OCR indisponível neste build")]
    OcrUnavailable,

    #[error("falha na chamada ao serviço de extração: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serviço de extração respondeu {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("resposta de extração inválida: {0}")]
    InvalidResponse(String),

    #[error("JSON inválido na resposta de extração: {0}")]
    Json(#[from] serde_json::Error),
}

/// Uma estratégia que transforma texto bruto em dados estruturados.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, text: &str, kind: DocumentKind) -> Result<ExtractionResult, ExtractionError>;
}

// =============================================================================
//  MOTOR DE EXTRAÇÃO
// =============================================================================

// Bytes do documento -> texto -> dados estruturados. Nunca falha: o pior caso é um
// resultado vazio com os metadados explicando o motivo.
#[derive(Clone)]
pub struct ExtractionEngine {
    pdf: Arc<dyn PdfTextReader>,
    ocr: Arc<dyn OcrEngine>,
    primary: Option<Arc<dyn StructuredExtractor>>,
    fallback: RegexExtractor,
}

impl ExtractionEngine {
    pub fn new(
        pdf: Arc<dyn PdfTextReader>,
        ocr: Arc<dyn OcrEngine>,
        primary: Option<Arc<dyn StructuredExtractor>>,
    ) -> Self {
        Self {
            pdf,
            ocr,
            primary,
            fallback: RegexExtractor::new(),
        }
    }

    pub async fn extract(&self, bytes: Vec<u8>, extension: &str, kind: DocumentKind) -> ExtractionResult {
        let text = text::acquire_text(self.pdf.clone(), self.ocr.clone(), bytes, extension).await;

        if text.trim().is_empty() {
            warn!(extension, ?kind, "Nenhum texto extraído do documento");
            return ExtractionResult::empty(ExtractionMetadata::no_text());
        }

        if let Some(primary) = &self.primary {
            match primary.extract(&text, kind).await {
                Ok(result) => {
                    info!(?kind, "🤖 Documento extraído via IA");
                    return result;
                }
                Err(e) => warn!(error = %e, ?kind, "Extração via IA falhou, usando regex"),
            }
        }

        self.fallback.parse(&text)
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::models::extraction::{Confidence, ExtractionMethod};
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn empty_text_yields_no_text_metadata() {
        let engine = engine(FakePdf(vec!["", "  "]), Some(FakeCompletion::replying("{}")));
        let result = engine.extract(b"%PDF".to_vec(), "pdf", DocumentKind::Proforma).await;

        assert_eq!(result.vendor_name, "");
        assert_eq!(result.total_amount, None);
        assert!(result.items.is_empty());
        assert_eq!(result.extraction_metadata.method, ExtractionMethod::TextExtraction);
        assert!(!result.extraction_metadata.success);
        assert_eq!(result.extraction_metadata.error.as_deref(), Some("no text"));
    }

    #[tokio::test]
    async fn unsupported_extension_reads_nothing() {
        let engine = engine(FakePdf(vec!["Total: 10.00"]), None);
        let result = engine.extract(b"hello".to_vec(), "docx", DocumentKind::Receipt).await;
        assert_eq!(result.extraction_metadata.method, ExtractionMethod::TextExtraction);
    }

    #[tokio::test]
    async fn parser_panic_becomes_empty_text() {
        let engine = engine(PanickingPdf, None);
        let result = engine.extract(b"%PDF".to_vec(), "PDF", DocumentKind::Receipt).await;
        assert_eq!(result.extraction_metadata.error.as_deref(), Some("no text"));
    }

    #[tokio::test]
    async fn without_ai_uses_regex_fallback() {
        let engine = engine(FakePdf(vec!["ACME Supplies", "Total: $1,234.50"]), None);
        let result = engine.extract(b"%PDF".to_vec(), "pdf", DocumentKind::Proforma).await;

        assert_eq!(result.vendor_name, "ACME Supplies");
        assert_eq!(result.total_amount, Some(Decimal::new(123450, 2)));
        assert_eq!(result.extraction_metadata.method, ExtractionMethod::BasicTextParsing);
        assert_eq!(result.extraction_metadata.confidence, Some(Confidence::Low));
    }

    #[tokio::test]
    async fn ai_failure_falls_back_to_regex() {
        let engine = engine(FakePdf(vec!["Globex Corp\nAmount: 99.90"]), Some(FakeCompletion::failing()));
        let result = engine.extract(b"%PDF".to_vec(), "pdf", DocumentKind::Receipt).await;

        assert_eq!(result.extraction_metadata.method, ExtractionMethod::BasicTextParsing);
        assert_eq!(result.total_amount, Some(Decimal::new(9990, 2)));
    }

    #[tokio::test]
    async fn ai_success_is_tagged_high_confidence() {
        let reply = r#"{"vendor_name": "Globex Corp", "items": [], "total_amount": 42.5, "date": "2025-03-01"}"#;
        let engine = engine(FakePdf(vec!["Globex Corp receipt"]), Some(FakeCompletion::replying(reply)));
        let result = engine.extract(b"%PDF".to_vec(), "pdf", DocumentKind::Receipt).await;

        assert_eq!(result.vendor_name, "Globex Corp");
        assert_eq!(result.total_amount, Some(Decimal::new(425, 1)));
        assert_eq!(result.extraction_metadata.method, ExtractionMethod::Ai);
        assert!(result.extraction_metadata.success);
        assert_eq!(result.extraction_metadata.confidence, Some(Confidence::High));
    }

    #[tokio::test]
    async fn images_go_through_ocr() {
        let engine = ExtractionEngine::new(Arc::new(FakePdf(vec![])), Arc::new(FakeOcr("Corner Shop\nTOTAL 12.00")), None);
        let result = engine.extract(vec![0xFF, 0xD8], "JPG", DocumentKind::Receipt).await;
        assert_eq!(result.vendor_name, "Corner Shop");
        assert_eq!(result.total_amount, Some(Decimal::new(1200, 2)));
    }
}
