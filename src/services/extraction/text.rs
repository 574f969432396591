// src/services/extraction/text.rs

use std::sync::Arc;

use tracing::warn;

use super::ExtractionError;

/// Leitor de texto de PDF, uma string por página.
pub trait PdfTextReader: Send + Sync {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

pub trait OcrEngine: Send + Sync {
    fn image_text(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Pdf,
    Image,
    Unsupported,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => SourceFormat::Pdf,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" => SourceFormat::Image,
            _ => SourceFormat::Unsupported,
        }
    }
}

// --- pdf-extract ---

pub struct PdfExtractReader;

impl PdfTextReader for PdfExtractReader {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))
    }
}

// --- OCR ---
// Tesseract só entra com a feature `ocr`, que exige leptonica/tesseract instalados.

#[cfg(feature = "ocr")]
pub struct TesseractOcr {
    language: String,
}

#[cfg(feature = "ocr")]
impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for TesseractOcr {
    fn image_text(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let mut lt = leptess::LepTess::new(None, &self.language)
            .map_err(|e| ExtractionError::Ocr(format!("tesseract init: {e}")))?;
        lt.set_image_from_mem(bytes)
            .map_err(|e| ExtractionError::Ocr(format!("imagem inválida: {e}")))?;
        lt.get_utf8_text()
            .map_err(|e| ExtractionError::Ocr(format!("tesseract run: {e}")))
    }
}

pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn image_text(&self, _bytes: &[u8]) -> Result<String, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }
}

#[cfg(feature = "ocr")]
pub fn default_ocr() -> Arc<dyn OcrEngine> {
    Arc::new(TesseractOcr::new("eng"))
}

#[cfg(not(feature = "ocr"))]
pub fn default_ocr() -> Arc<dyn OcrEngine> {
    Arc::new(UnavailableOcr)
}

// =============================================================================
//  AQUISIÇÃO DE TEXTO
// =============================================================================

/// Lê o texto do documento fora do runtime async. Erros e panics viram texto vazio.
pub async fn acquire_text(
    pdf: Arc<dyn PdfTextReader>,
    ocr: Arc<dyn OcrEngine>,
    bytes: Vec<u8>,
    extension: &str,
) -> String {
    let format = SourceFormat::from_extension(extension);

    let task = match format {
        SourceFormat::Pdf => tokio::task::spawn_blocking(move || pdf.page_texts(&bytes).map(|pages| pages.join("\n"))),
        SourceFormat::Image => tokio::task::spawn_blocking(move || ocr.image_text(&bytes)),
        SourceFormat::Unsupported => return String::new(),
    };

    match task.await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, ?format, "Falha ao obter texto do documento");
            String::new()
        }
        Err(join_err) => {
            warn!(error = %join_err, ?format, "Leitor de documento entrou em pânico");
            String::new()
        }
    }
}
