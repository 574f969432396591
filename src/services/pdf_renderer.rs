// src/services/pdf_renderer.rs

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use genpdf::{Element, elements, style};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::extraction::LineItem;

const DESCRIPTION_MAX_CHARS: usize = 200;
const ITEM_DESCRIPTION_MAX_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("fonte não encontrada em {dir}: {reason}")]
    Font { dir: String, reason: String },

    #[error("falha ao montar o PDF: {0}")]
    Layout(String),
}

impl From<genpdf::error::Error> for RenderError {
    fn from(e: genpdf::error::Error) -> Self {
        RenderError::Layout(e.to_string())
    }
}

// --- Dados que vão para o documento ---

#[derive(Debug, Clone)]
pub struct ApprovalLine {
    pub level: u8,
    pub approver: String,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Tudo o que o PDF da ordem de compra mostra, já resolvido (nomes, itens, datas).
#[derive(Debug, Clone)]
pub struct PurchaseOrderDocument {
    pub po_number: String,
    pub date: NaiveDate,
    pub vendor_name: String,
    pub vendor_address: String,
    pub request_title: String,
    pub request_description: String,
    pub requested_by: String,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub terms: String,
    pub approvals: Vec<ApprovalLine>,
}

pub trait DocumentRenderer: Send + Sync {
    fn render_purchase_order(&self, document: &PurchaseOrderDocument) -> Result<Vec<u8>, RenderError>;
}

// =============================================================================
//  GENPDF
// =============================================================================

#[derive(Clone)]
pub struct GenPdfRenderer {
    font_dir: PathBuf,
    font_name: String,
}

impl GenPdfRenderer {
    pub fn new(font_dir: impl Into<PathBuf>, font_name: &str) -> Self {
        Self { font_dir: font_dir.into(), font_name: font_name.to_string() }
    }
}

impl DocumentRenderer for GenPdfRenderer {
    fn render_purchase_order(&self, po: &PurchaseOrderDocument) -> Result<Vec<u8>, RenderError> {
        // Carrega a fonte da pasta configurada (ex: ./fonts/Roboto-Regular.ttf)
        let font_family = genpdf::fonts::from_files(&self.font_dir, &self.font_name, None).map_err(|e| RenderError::Font {
            dir: self.font_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Purchase Order {}", po.po_number));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        let bold = style::Style::new().bold();
        let heading = style::Style::new().bold().with_font_size(14);

        // --- TÍTULO ---
        let mut title = elements::Paragraph::new("PURCHASE ORDER");
        title.set_alignment(genpdf::Alignment::Center);
        doc.push(title.styled(style::Style::new().bold().with_font_size(22)));
        doc.push(elements::Break::new(1.5));

        doc.push(elements::Paragraph::new(format!("PO Number: {}", po.po_number)).styled(bold));
        doc.push(elements::Paragraph::new(format!("Date: {}", po.date.format("%B %d, %Y"))));
        doc.push(elements::Break::new(1.5));

        // --- FORNECEDOR ---
        doc.push(elements::Paragraph::new("Vendor Information").styled(heading));
        doc.push(elements::Paragraph::new(format!("Vendor Name: {}", po.vendor_name)));
        let address = if po.vendor_address.trim().is_empty() { "N/A" } else { po.vendor_address.as_str() };
        doc.push(elements::Paragraph::new(format!("Address: {}", address)));
        doc.push(elements::Break::new(1.5));

        // --- REQUISIÇÃO ---
        doc.push(elements::Paragraph::new("Request Information").styled(heading));
        doc.push(elements::Paragraph::new(format!("Request Title: {}", po.request_title)));
        doc.push(elements::Paragraph::new(format!(
            "Description: {}",
            truncate_with_ellipsis(&po.request_description, DESCRIPTION_MAX_CHARS)
        )));
        doc.push(elements::Paragraph::new(format!("Requested By: {}", po.requested_by)));
        doc.push(elements::Break::new(1.5));

        // --- TABELA DE ITENS ---
        // Pesos das colunas: # (1), Descrição (6), Qtd (2), Unitário (3), Total (3)
        doc.push(elements::Paragraph::new("Items").styled(heading));
        let mut table = elements::TableLayout::new(vec![1, 6, 2, 3, 3]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        table
            .row()
            .element(elements::Paragraph::new("#").styled(bold))
            .element(elements::Paragraph::new("Description").styled(bold))
            .element(elements::Paragraph::new("Quantity").styled(bold))
            .element(elements::Paragraph::new("Unit Price").styled(bold))
            .element(elements::Paragraph::new("Total").styled(bold))
            .push()?;

        for (idx, item) in po.items.iter().enumerate() {
            table
                .row()
                .element(elements::Paragraph::new((idx + 1).to_string()))
                .element(elements::Paragraph::new(truncate_with_ellipsis(&item.description, ITEM_DESCRIPTION_MAX_CHARS)))
                .element(elements::Paragraph::new(item.quantity.normalize().to_string()))
                .element(elements::Paragraph::new(money(item.unit_price)))
                .element(elements::Paragraph::new(money(item.total)))
                .push()?;
        }

        table
            .row()
            .element(elements::Paragraph::new(""))
            .element(elements::Paragraph::new(""))
            .element(elements::Paragraph::new(""))
            .element(elements::Paragraph::new("TOTAL:").styled(bold))
            .element(elements::Paragraph::new(money(po.total_amount)).styled(bold))
            .push()?;

        doc.push(table);
        doc.push(elements::Break::new(1.5));

        // --- TERMOS ---
        if !po.terms.trim().is_empty() {
            doc.push(elements::Paragraph::new("Terms and Conditions").styled(heading));
            doc.push(elements::Paragraph::new(po.terms.clone()));
            doc.push(elements::Break::new(1.5));
        }

        // --- APROVAÇÕES ---
        doc.push(elements::Paragraph::new("Approvals").styled(heading));
        for approval in &po.approvals {
            let date = approval
                .approved_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "N/A".to_string());
            doc.push(elements::Paragraph::new(format!(
                "Level {} Approval: {} ({})",
                approval.level, approval.approver, date
            )));
        }

        // Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)?;
        Ok(buffer)
    }
}

pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

fn money(value: Decimal) -> String {
    format!("${:.2}", value.round_dp(2))
}

/// Devolve um "PDF" mínimo sem precisar de fontes.
#[cfg(test)]
pub(crate) struct StubRenderer;

#[cfg(test)]
impl DocumentRenderer for StubRenderer {
    fn render_purchase_order(&self, document: &PurchaseOrderDocument) -> Result<Vec<u8>, RenderError> {
        Ok(format!("%PDF-1.4 {}", document.po_number).into_bytes())
    }
}
