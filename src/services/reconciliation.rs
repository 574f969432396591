// src/services/reconciliation.rs

use rust_decimal::Decimal;

use crate::models::{
    documents::{Discrepancy, PurchaseOrder, Severity, ValidationResults},
    extraction::ExtractionResult,
};

/// Diferença máxima (exclusiva) aceita entre o total do recibo e o da ordem de compra.
pub const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

// Compara o que foi extraído do recibo com a ordem de compra. Função pura.
pub fn validate(receipt: &ExtractionResult, po: &PurchaseOrder) -> (ValidationResults, Vec<Discrepancy>) {
    let mut results = ValidationResults::default();
    let mut discrepancies = Vec::new();

    // --- Fornecedor ---
    results.vendor_match = vendors_match(&receipt.vendor_name, &po.vendor_name);
    if !results.vendor_match {
        discrepancies.push(Discrepancy::VendorMismatch {
            expected: po.vendor_name.clone(),
            found: receipt.vendor_name.clone(),
            severity: Severity::High,
        });
    }

    // --- Valor (só quando o recibo trouxe um total) ---
    if let Some(found) = receipt.total_amount {
        // Valores absurdos vindos da extração não podem estourar a subtração
        let difference = found.checked_sub(po.total_amount).map_or(Decimal::MAX, |d| d.abs());
        results.amount_match = difference < AMOUNT_TOLERANCE;
        if !results.amount_match {
            discrepancies.push(Discrepancy::AmountMismatch {
                expected: po.total_amount,
                found,
                difference,
                severity: Severity::High,
            });
        }
    }

    // --- Itens (só quando os dois lados têm itens) ---
    let po_items = &po.items_data.items;
    if !receipt.items.is_empty() && !po_items.is_empty() {
        results.items_match = receipt.items.len() == po_items.len();
        if !results.items_match {
            discrepancies.push(Discrepancy::ItemCountMismatch {
                expected_count: po_items.len(),
                found_count: receipt.items.len(),
                severity: Severity::Medium,
            });
        }
    }

    results.overall_valid =
        results.vendor_match && results.amount_match && (receipt.items.is_empty() || results.items_match);

    (results, discrepancies)
}

fn vendors_match(found: &str, expected: &str) -> bool {
    let found = found.trim().to_lowercase();
    let expected = expected.trim().to_lowercase();
    found == expected || found.contains(&expected) || expected.contains(&found)
}

#[cfg(test)]
pub(crate) fn test_po(vendor: &str, total: Decimal, item_count: usize) -> PurchaseOrder {
    use crate::models::extraction::{ItemsPayload, LineItem};
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    let items = (0..item_count)
        .map(|i| LineItem { description: format!("Item {i}"), ..Default::default() })
        .collect();
    PurchaseOrder {
        id: Uuid::new_v4(),
        request_id: Uuid::new_v4(),
        po_number: "PO-20250101-0001".into(),
        file_path: None,
        file_url: None,
        generated_at: Utc::now(),
        generated_by: None,
        vendor_name: vendor.into(),
        vendor_address: String::new(),
        items_data: Json(ItemsPayload::new(items)),
        total_amount: total,
        terms: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extraction::{ExtractionMetadata, LineItem};

    fn receipt(vendor: &str, total: Option<Decimal>, item_count: usize) -> ExtractionResult {
        let mut result = ExtractionResult::empty(ExtractionMetadata::ai());
        result.vendor_name = vendor.into();
        result.total_amount = total;
        result.items = vec![LineItem::default(); item_count];
        result
    }

    #[test]
    fn substring_vendor_and_sub_cent_difference_is_valid() {
        let po = test_po("ACME Corp", Decimal::new(10000, 2), 0);
        let (results, discrepancies) = validate(&receipt("acme corp ltd", Some(Decimal::new(100005, 3)), 0), &po);

        assert!(results.vendor_match);
        assert!(results.amount_match);
        assert!(results.overall_valid);
        assert!(discrepancies.is_empty());
    }

    #[test]
    fn vendor_mismatch_is_high_severity() {
        let po = test_po("ACME Corp", Decimal::new(10000, 2), 0);
        let (results, discrepancies) = validate(&receipt("Globex", Some(Decimal::new(10000, 2)), 0), &po);

        assert!(!results.vendor_match);
        assert!(!results.overall_valid);
        assert_eq!(
            discrepancies,
            vec![Discrepancy::VendorMismatch {
                expected: "ACME Corp".into(),
                found: "Globex".into(),
                severity: Severity::High,
            }]
        );
    }

    #[test]
    fn one_cent_difference_is_a_mismatch() {
        let po = test_po("ACME", Decimal::new(10000, 2), 0);
        let (results, discrepancies) = validate(&receipt("ACME", Some(Decimal::new(10001, 2)), 0), &po);

        assert!(!results.amount_match);
        assert_eq!(
            discrepancies,
            vec![Discrepancy::AmountMismatch {
                expected: Decimal::new(10000, 2),
                found: Decimal::new(10001, 2),
                difference: Decimal::new(1, 2),
                severity: Severity::High,
            }]
        );
    }

    #[test]
    fn two_cents_off_records_the_difference() {
        let po = test_po("ACME CORPORATION LTD", Decimal::new(10000, 2), 0);
        let (results, discrepancies) = validate(&receipt("Acme Corp", Some(Decimal::new(10002, 2)), 0), &po);

        assert!(results.vendor_match);
        assert!(!results.amount_match);
        assert!(matches!(
            discrepancies.as_slice(),
            [Discrepancy::AmountMismatch { difference, .. }] if *difference == Decimal::new(2, 2)
        ));
    }

    #[test]
    fn absurd_receipt_total_is_a_mismatch() {
        let po = test_po("ACME", Decimal::new(10000, 2), 0);
        let (results, discrepancies) = validate(&receipt("ACME", Some(Decimal::MIN), 0), &po);

        assert!(!results.amount_match);
        assert!(matches!(
            discrepancies.as_slice(),
            [Discrepancy::AmountMismatch { difference, .. }] if *difference == Decimal::MAX
        ));
    }

    #[test]
    fn missing_total_is_not_a_discrepancy_but_not_valid() {
        let po = test_po("ACME", Decimal::new(10000, 2), 2);
        let (results, discrepancies) = validate(&receipt("ACME", None, 0), &po);

        assert!(results.vendor_match);
        assert!(!results.amount_match);
        assert!(!results.overall_valid);
        assert!(discrepancies.is_empty());
    }

    #[test]
    fn item_count_mismatch_is_medium() {
        let po = test_po("ACME", Decimal::new(5000, 2), 2);
        let (results, discrepancies) = validate(&receipt("ACME", Some(Decimal::new(5000, 2)), 3), &po);

        assert!(!results.items_match);
        assert!(!results.overall_valid);
        assert_eq!(
            discrepancies,
            vec![Discrepancy::ItemCountMismatch { expected_count: 2, found_count: 3, severity: Severity::Medium }]
        );
    }

    #[test]
    fn receipt_items_ignored_when_po_has_none() {
        let po = test_po("ACME", Decimal::new(5000, 2), 0);
        let (results, discrepancies) = validate(&receipt("ACME", Some(Decimal::new(5000, 2)), 3), &po);

        assert!(!results.items_match);
        assert!(discrepancies.is_empty());
        // Recibo com itens exige items_match, mesmo sem itens na ordem
        assert!(!results.overall_valid);
    }
}
