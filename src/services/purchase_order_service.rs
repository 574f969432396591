// src/services/purchase_order_service.rs

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, PurchaseOrderRepository, RequestRepository, UserRepository},
    models::{
        auth::{Role, User},
        documents::{Proforma, PurchaseOrder, PurchaseOrderDraft, storable_vendor_name},
        extraction::{ItemsPayload, LineItem},
        requests::{PurchaseRequest, RequestItem, RequestStatus},
    },
    services::{
        file_store::FileStore,
        pdf_renderer::{ApprovalLine, DocumentRenderer, PurchaseOrderDocument},
    },
};

pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";
const MAX_NUMBER_ATTEMPTS: usize = 5;
const REQUEST_ID_CONSTRAINT: &str = "purchase_orders_request_id_key";

// =============================================================================
//  REGRAS PURAS
// =============================================================================

/// `PO-AAAAMMDD-`
pub fn po_prefix(date: NaiveDate) -> String {
    format!("PO-{}-", date.format("%Y%m%d"))
}

/// Próximo número do dia a partir do último emitido (0001 se for o primeiro).
pub fn next_po_number(prefix: &str, last: Option<&str>) -> String {
    let next = last
        .and_then(|number| number.strip_prefix(prefix))
        .and_then(|seq| seq.parse::<u32>().ok())
        .map_or(1, |seq| seq + 1);
    format!("{prefix}{next:04}")
}

/// Monta os campos da ordem priorizando os dados não vazios da proforma.
pub fn draft_from(request: &PurchaseRequest, items: &[RequestItem], proforma: Option<&Proforma>) -> PurchaseOrderDraft {
    let non_empty = |value: Option<&String>| value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string);

    let vendor_name = non_empty(proforma.map(|p| &p.vendor_name))
        .map(storable_vendor_name)
        .unwrap_or_else(|| UNKNOWN_VENDOR.to_string());
    let vendor_address = non_empty(proforma.map(|p| &p.vendor_address)).unwrap_or_default();
    let terms = non_empty(proforma.map(|p| &p.terms)).unwrap_or_default();
    // Total zerado na proforma conta como ausente
    let total_amount = proforma
        .and_then(|p| p.total_amount)
        .filter(|total| !total.is_zero())
        .unwrap_or(request.amount);

    let items_data = match proforma.map(|p| &p.items_data.0) {
        Some(payload) if !payload.is_empty() => payload.clone(),
        _ => ItemsPayload::new(items.iter().map(line_from_request_item).collect()),
    };

    PurchaseOrderDraft {
        request_id: request.id,
        vendor_name,
        vendor_address,
        items_data,
        total_amount,
        terms,
    }
}

fn line_from_request_item(item: &RequestItem) -> LineItem {
    LineItem {
        description: item.description.clone(),
        quantity: item.quantity.into(),
        unit_price: item.unit_price,
        total: item.line_total(),
    }
}

/// O que fazer ao pedir a geração de uma ordem para uma requisição.
#[derive(Debug)]
pub enum GenerationPlan {
    ReturnExisting(PurchaseOrder),
    AttachFile(PurchaseOrder),
    Create,
}

impl GenerationPlan {
    pub fn for_existing(existing: Option<PurchaseOrder>) -> Self {
        match existing {
            Some(po) if po.file_path.is_some() => GenerationPlan::ReturnExisting(po),
            Some(po) => GenerationPlan::AttachFile(po),
            None => GenerationPlan::Create,
        }
    }
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct PurchaseOrderService {
    pool: PgPool,
    po_repo: PurchaseOrderRepository,
    request_repo: RequestRepository,
    document_repo: DocumentRepository,
    user_repo: UserRepository,
    renderer: Arc<dyn DocumentRenderer>,
    files: Arc<dyn FileStore>,
}

impl PurchaseOrderService {
    pub fn new(
        pool: PgPool,
        po_repo: PurchaseOrderRepository,
        request_repo: RequestRepository,
        document_repo: DocumentRepository,
        user_repo: UserRepository,
        renderer: Arc<dyn DocumentRenderer>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self { pool, po_repo, request_repo, document_repo, user_repo, renderer, files }
    }

    /// Gera (ou devolve) a ordem de compra de uma requisição aprovada. Idempotente.
    pub async fn generate(&self, request_id: Uuid, acting_user: Uuid) -> Result<PurchaseOrder, AppError> {
        let existing = self.po_repo.find_by_request(&self.pool, request_id).await?;

        match GenerationPlan::for_existing(existing) {
            GenerationPlan::ReturnExisting(po) => Ok(po),
            GenerationPlan::AttachFile(po) => Ok(self.render_and_attach(po).await),
            GenerationPlan::Create => {
                let request = self
                    .request_repo
                    .find_by_id(&self.pool, request_id)
                    .await?
                    .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))?;

                if request.status != RequestStatus::Approved {
                    return Err(AppError::RequestNotApproved);
                }

                let items = self.request_repo.list_items(&self.pool, request_id).await?;
                let proforma = self.document_repo.find_proforma_by_request(&self.pool, request_id).await?;
                let draft = draft_from(&request, &items, proforma.as_ref());

                let po = self.insert_with_number(&draft, acting_user).await?;
                Ok(self.render_and_attach(po).await)
            }
        }
    }

    // Aloca o número do dia sob advisory lock; o UNIQUE cobre o resto
    async fn insert_with_number(&self, draft: &PurchaseOrderDraft, acting_user: Uuid) -> Result<PurchaseOrder, AppError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            let prefix = po_prefix(Utc::now().date_naive());
            self.po_repo.lock_day(&mut *tx, &prefix).await?;
            let last = self.po_repo.last_number_with_prefix(&mut *tx, &prefix).await?;
            let po_number = next_po_number(&prefix, last.as_deref());

            match self.po_repo.insert(&mut *tx, draft, &po_number, acting_user).await {
                Ok(po) => {
                    tx.commit().await?;
                    info!(po_number = %po.po_number, request_id = %draft.request_id, "📄 Ordem de compra criada");
                    return Ok(po);
                }
                Err(AppError::UniqueConstraintViolation(constraint)) if constraint == REQUEST_ID_CONSTRAINT => {
                    // Outra chamada gerou a ordem desta requisição primeiro
                    drop(tx);
                    return self
                        .po_repo
                        .find_by_request(&self.pool, draft.request_id)
                        .await?
                        .ok_or_else(|| AppError::ResourceNotFound("Ordem de compra".into()));
                }
                Err(AppError::UniqueConstraintViolation(_)) => {
                    warn!(po_number = %po_number, attempt, "Número de ordem de compra já usado, tentando de novo");
                }
                Err(e) => return Err(e),
            }
        }

        Err(anyhow::anyhow!("não foi possível alocar um número de ordem de compra após {MAX_NUMBER_ATTEMPTS} tentativas").into())
    }

    // Falha de renderização nunca bloqueia a ordem: fica registrada no log e a ordem segue sem arquivo
    async fn render_and_attach(&self, po: PurchaseOrder) -> PurchaseOrder {
        match self.try_render_and_attach(&po).await {
            Ok((updated, _)) => updated,
            Err(e) => {
                warn!(po_number = %po.po_number, request_id = %po.request_id, error = %e, "Falha ao gerar o PDF da ordem de compra");
                po
            }
        }
    }

    async fn try_render_and_attach(&self, po: &PurchaseOrder) -> Result<(PurchaseOrder, Vec<u8>), AppError> {
        let bytes = self.render_pdf(po).await?;
        let stored = self
            .files
            .save("purchase_orders", &format!("{}.pdf", po.po_number), &bytes)
            .await?;
        let updated = self.po_repo.attach_file(&self.pool, po.id, &stored.path, &stored.url).await?;
        Ok((updated, bytes))
    }

    async fn render_pdf(&self, po: &PurchaseOrder) -> Result<Vec<u8>, AppError> {
        let document = self.document_for(po).await?;
        let renderer = self.renderer.clone();

        let bytes = tokio::task::spawn_blocking(move || renderer.render_purchase_order(&document))
            .await
            .map_err(|e| anyhow::anyhow!("task de renderização falhou: {}", e))??;
        Ok(bytes)
    }

    async fn document_for(&self, po: &PurchaseOrder) -> Result<PurchaseOrderDocument, AppError> {
        let request = self
            .request_repo
            .find_by_id(&self.pool, po.request_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))?;

        let mut ids = vec![request.created_by];
        ids.extend(request.approved_by_level_1);
        ids.extend(request.approved_by_level_2);
        let users: HashMap<Uuid, User> = self
            .user_repo
            .find_many(&self.pool, &ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let name_of = |id: Uuid| users.get(&id).map(|u| u.display_name().to_string()).unwrap_or_else(|| id.to_string());

        let mut items = po.items_data.items.clone();
        if items.is_empty() {
            let request_items = self.request_repo.list_items(&self.pool, po.request_id).await?;
            items = request_items.iter().map(line_from_request_item).collect();
        }

        let mut approvals = Vec::new();
        if let Some(level_1) = request.approved_by_level_1 {
            approvals.push(ApprovalLine { level: 1, approver: name_of(level_1), approved_at: request.level_1_approved_at });
        }
        if let Some(level_2) = request.approved_by_level_2 {
            approvals.push(ApprovalLine { level: 2, approver: name_of(level_2), approved_at: request.approved_at });
        }

        Ok(PurchaseOrderDocument {
            po_number: po.po_number.clone(),
            date: po.generated_at.date_naive(),
            vendor_name: po.vendor_name.clone(),
            vendor_address: po.vendor_address.clone(),
            request_title: request.title.clone(),
            request_description: request.description.clone(),
            requested_by: name_of(request.created_by),
            items,
            total_amount: po.total_amount,
            terms: po.terms.clone(),
            approvals,
        })
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub async fn list(&self, user: &User) -> Result<Vec<PurchaseOrder>, AppError> {
        self.po_repo.list_for_user(user).await
    }

    pub async fn get(&self, id: Uuid, user: &User) -> Result<PurchaseOrder, AppError> {
        let po = self
            .po_repo
            .find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Ordem de compra".into()))?;

        if user.role == Role::Staff {
            let request = self.request_repo.find_by_id(&self.pool, po.request_id).await?;
            if request.map(|r| r.created_by) != Some(user.id) {
                return Err(AppError::PermissionDenied);
            }
        }

        Ok(po)
    }

    /// Bytes do PDF para download. Se o arquivo sumiu (ou nunca existiu), renderiza de novo.
    pub async fn pdf(&self, id: Uuid, user: &User) -> Result<(PurchaseOrder, Vec<u8>), AppError> {
        let po = self.get(id, user).await?;

        if let Some(path) = po.file_path.as_deref() {
            if self.files.exists(path).await {
                let bytes = self.files.read(path).await?;
                return Ok((po, bytes));
            }
            warn!(po_number = %po.po_number, path, "Arquivo da ordem de compra ausente, renderizando de novo");
        }

        self.try_render_and_attach(&po).await
    }
}
