// src/services/document_service.rs

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, PurchaseOrderRepository, RequestRepository},
    models::{
        auth::{Role, User},
        documents::{NewProforma, Proforma, PurchaseOrder, Receipt, ReceiptOutcome},
        extraction::{DocumentKind, ExtractionResult},
        requests::{PurchaseRequest, RequestStatus},
    },
    services::{
        extraction::ExtractionEngine,
        file_store::{FileStore, extension_of},
        reconciliation,
    },
};

#[derive(Clone)]
pub struct DocumentService {
    pool: PgPool,
    request_repo: RequestRepository,
    document_repo: DocumentRepository,
    po_repo: PurchaseOrderRepository,
    engine: ExtractionEngine,
    files: Arc<dyn FileStore>,
}

impl DocumentService {
    pub fn new(
        pool: PgPool,
        request_repo: RequestRepository,
        document_repo: DocumentRepository,
        po_repo: PurchaseOrderRepository,
        engine: ExtractionEngine,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self { pool, request_repo, document_repo, po_repo, engine, files }
    }

    async fn request(&self, id: Uuid) -> Result<PurchaseRequest, AppError> {
        self.request_repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))
    }

    // =========================================================================
    //  PROFORMA
    // =========================================================================

    /// Grava o arquivo, extrai os dados e registra a proforma (uma por requisição).
    pub async fn upload_proforma(
        &self,
        user: &User,
        request_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Proforma, AppError> {
        let request = self.request(request_id).await?;
        if !request.managed_by(user) {
            return Err(AppError::PermissionDenied);
        }
        if self.document_repo.find_proforma_by_request(&self.pool, request_id).await?.is_some() {
            return Err(AppError::ProformaAlreadyExists);
        }

        let stored = self.files.save("proformas", filename, &bytes).await?;
        let extraction = self.engine.extract(bytes, &extension_of(filename), DocumentKind::Proforma).await;

        // O UNIQUE em request_id cobre uploads simultâneos
        let new_proforma = NewProforma::from_extraction(request_id, stored.path.clone(), stored.url, extraction);
        let proforma = match self.document_repo.insert_proforma(&self.pool, &new_proforma).await {
            Ok(proforma) => proforma,
            Err(e) => {
                self.discard(&stored.path).await;
                return Err(e);
            }
        };

        info!(request_id = %request_id, proforma_id = %proforma.id, vendor = %proforma.vendor_name, "📎 Proforma registrada");
        Ok(proforma)
    }

    pub async fn list_proformas(&self, user: &User) -> Result<Vec<Proforma>, AppError> {
        self.document_repo.list_proformas(user).await
    }

    // =========================================================================
    //  RECIBOS
    // =========================================================================

    /// Registra o recibo e tenta processá-lo na hora. Se o processamento falhar,
    /// o recibo continua `pending` e pode ser revalidado depois.
    pub async fn upload_receipt(
        &self,
        user: &User,
        request_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Receipt, AppError> {
X, filename, &bytes).await?;
        let receipt = self
            .document_repo
            .insert_receipt(&self.pool, request_id, &stored.path, &stored.url, user.id)
            .await?;
        info!(request_id = %request_id, receipt_id = %receipt.id, "🧾 Recibo recebido");

        match self.process_receipt(&receipt, bytes, &extension_of(filename)).await {
            Ok(processed) => Ok(processed),
            Err(e) => {
                warn!(receipt_id = %receipt.id, error = %e, "Falha ao processar o recibo, mantido como pendente");
                Ok(receipt)
            }
        }
    }

    /// Lê de novo o arquivo guardado, extrai e concilia com a ordem de compra.
    pub async fn revalidate(&self, receipt_id: Uuid, user: &User) -> Result<Receipt, AppError> {
        let receipt = self
            .document_repo
            .find_receipt(&self.pool, receipt_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Recibo".into()))?;

        let request = self.request(receipt.request_id).await?;
        if user.role == Role::Staff && request.created_by != user.id {
            return Err(AppError::PermissionDenied);
        }
        if self.po_repo.find_by_request(&self.pool, receipt.request_id).await?.is_none() {
            return Err(AppError::PurchaseOrderMissing);
        }

        let bytes = self
            .files
            .read(&receipt.file_path)
            .await
            .map_err(|e| AppError::ProcessingFailed(e.to_string()))?;

        let updated = self
            .process_receipt(&receipt, bytes, &extension_of(&receipt.file_path))
            .await
            .map_err(|e| AppError::ProcessingFailed(e.to_string()))?;

        info!(receipt_id = %receipt_id, status = ?updated.validation_status, "🔁 Recibo revalidado");
        Ok(updated)
    }

    async fn process_receipt(&self, receipt: &Receipt, bytes: Vec<u8>, extension: &str) -> Result<Receipt, AppError> {
        let extracted = self.engine.extract(bytes, extension, DocumentKind::Receipt).await;
        let po = self.po_repo.find_by_request(&self.pool, receipt.request_id).await?;
        let outcome = build_outcome(extracted, po.as_ref());

        self.document_repo
            .save_receipt_outcome(&self.pool, receipt.id, &outcome, Utc::now())
            .await
    }

    pub async fn list_receipts(&self, user: &User) -> Result<Vec<Receipt>, AppError> {
        self.document_repo.list_receipts(user).await
    }

    // Arquivo gravado cujo registro não entrou no banco
    async fn discard(&self, path: &str) {
        if let Err(e) = self.files.remove(path).await {
            warn!(path = %path, error = %e, "Falha ao apagar arquivo órfão");
        }
    }
}

/// Permissão antes do status, para não revelar o andamento de requisições alheias.
pub fn check_receipt_upload(request: &PurchaseRequest, user: &User) -> Result<(), AppError> {
    if !request.managed_by(user) {
        return Err(AppError::PermissionDenied);
    }
    if request.status != RequestStatus::Approved {
        return Err(AppError::RequestNotApproved);
    }
    Ok(())
}

/// Sem ordem de compra não há com o que conciliar: o recibo fica só com os dados extraídos.
pub fn build_outcome(extracted: ExtractionResult, po: Option<&PurchaseOrder>) -> ReceiptOutcome {
    let verdict = po.map(|po| reconciliation::validate(&extracted, po));
    ReceiptOutcome { extracted_data: extracted, verdict }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            UserRepository,
            testing::{insert_pending_request, insert_user, test_pool},
        },
        models::{
            auth::test_user,
            documents::ValidationStatus,
            extraction::ExtractionMetadata,
            requests::test_request,
        },
        services::{
            extraction::fakes::{FakeCompletion, FakePdf, engine},
            file_store::LocalFileStore,
            reconciliation::test_po,
        },
    };
    use rust_decimal::Decimal;

    fn extracted(vendor: &str, total: Option<Decimal>) -> ExtractionResult {
        let mut result = ExtractionResult::empty(ExtractionMetadata::ai());
        result.vendor_name = vendor.into();
        result.total_amount = total;
        result
    }

    #[test]
    fn receipt_upload_checks_permission_before_status() {
        let owner = test_user(Role::Staff);
        let stranger = test_user(Role::Staff);
        let mut request = test_request(owner.id);

        assert!(matches!(check_receipt_upload(&request, &stranger), Err(AppError::PermissionDenied)));
        assert!(matches!(check_receipt_upload(&request, &owner), Err(AppError::RequestNotApproved)));

        request.status = RequestStatus::Approved;
        assert!(check_receipt_upload(&request, &owner).is_ok());
        assert!(check_receipt_upload(&request, &test_user(Role::Finance)).is_ok());
        assert!(matches!(check_receipt_upload(&request, &stranger), Err(AppError::PermissionDenied)));
    }

    #[test]
    fn receipt_without_po_stays_pending() {
        let outcome = build_outcome(extracted("ACME", Some(Decimal::new(100, 0))), None);
        assert!(outcome.verdict.is_none());
        assert_eq!(outcome.status(), ValidationStatus::Pending);
    }

    #[test]
    fn matching_receipt_is_valid() {
        let po = test_po("ACME Corp", Decimal::new(10000, 2), 0);
        let outcome = build_outcome(extracted("ACME Corp", Some(Decimal::new(10000, 2))), Some(&po));
        assert_eq!(outcome.status(), ValidationStatus::Valid);
    }

    #[test]
    fn wrong_vendor_is_a_discrepancy() {
        let po = test_po("ACME Corp", Decimal::new(10000, 2), 0);
        let outcome = build_outcome(extracted("Globex", Some(Decimal::new(10000, 2))), Some(&po));
        assert_eq!(outcome.status(), ValidationStatus::Discrepancy);
    }

    #[tokio::test]
    async fn extracted_receipt_flows_into_reconciliation() {
        let completion = FakeCompletion::replying(r#"{"vendor_name": "ACME Corp", "total_amount": "100.00", "items": []}"#);
        let engine = engine(FakePdf(vec!["ACME Corp\nTotal: 100.00"]), Some(completion));

        let result = engine.extract(b"%PDF".to_vec(), "pdf", DocumentKind::Receipt).await;
        let po = test_po("ACME Corp", Decimal::new(10000, 2), 0);
        let outcome = build_outcome(result, Some(&po));

        assert_eq!(outcome.status(), ValidationStatus::Valid);
    }

    // --- Com banco de dados (só roda com TEST_DATABASE_URL definida) ---

    fn count_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|entry| {
                        let path = entry.path();
                        if path.is_dir() { count_files(&path) } else { 1 }
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn oversized_extraction_still_stores_the_proforma() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let staff_id = insert_user(&pool, Role::Staff).await;
        let staff = UserRepository::new(pool.clone()).find_by_id(staff_id).await.unwrap().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let service = DocumentService::new(
            pool.clone(),
            RequestRepository::new(pool.clone()),
            DocumentRepository::new(pool.clone()),
            PurchaseOrderRepository::new(pool.clone()),
            engine(FakePdf(vec!["ACME\nInvoice ref Total: 123456789012"]), None),
            Arc::new(LocalFileStore::new(dir.path(), "/media")),
        );

        let request_id = insert_pending_request(&pool, staff_id).await;
        let proforma = service
            .upload_proforma(&staff, request_id, "cotacao.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        assert_eq!(proforma.vendor_name, "ACME");
        assert_eq!(proforma.total_amount, None);

        // Uploads simultâneos: um perde no UNIQUE e não deixa arquivo para trás
        let other_id = insert_pending_request(&pool, staff_id).await;
        let (a, b) = tokio::join!(
            service.upload_proforma(&staff, other_id, "a.pdf", b"%PDF-1.4".to_vec()),
            service.upload_proforma(&staff, other_id, "b.pdf", b"%PDF-1.4".to_vec()),
        );
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(count_files(dir.path()), 2);
    }
}
