// src/services/request_service.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DocumentRepository, PurchaseOrderRepository, RequestRepository, UserRepository},
    models::{
        auth::User,
        requests::{ApprovalHistoryEntry, NewRequestItem, PurchaseRequest, PurchaseRequestDetail, RequestItemView},
    },
};

/// Campos alteráveis de uma requisição pendente. `None` mantém o valor atual.
#[derive(Debug, Default)]
pub struct RequestChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub items: Option<Vec<NewRequestItem>>,
}

#[derive(Clone)]
pub struct RequestService {
    pool: PgPool,
    request_repo: RequestRepository,
    document_repo: DocumentRepository,
    po_repo: PurchaseOrderRepository,
    user_repo: UserRepository,
}

impl RequestService {
    pub fn new(
        pool: PgPool,
        request_repo: RequestRepository,
        document_repo: DocumentRepository,
        po_repo: PurchaseOrderRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self { pool, request_repo, document_repo, po_repo, user_repo }
    }

    pub async fn create(
        &self,
        user: &User,
        title: &str,
        description: &str,
        amount: Decimal,
        items: &[NewRequestItem],
    ) -> Result<PurchaseRequestDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let request = self.request_repo.create(&mut *tx, user.id, title, description, amount).await?;
        for (position, item) in items.iter().enumerate() {
            self.request_repo
                .add_item(&mut *tx, request.id, position as i32, &item.description, item.quantity, item.unit_price)
                .await?;
        }

        tx.commit().await?;
        info!(request_id = %request.id, user_id = %user.id, "📝 Requisição criada");

        self.detail_of(request).await
    }

    pub async fn list(&self, user: &User) -> Result<Vec<PurchaseRequest>, AppError> {
        self.request_repo.list_for_user(user).await
    }

    /// Busca respeitando a visibilidade do papel; fora dela a requisição "não existe".
    pub async fn find_visible(&self, id: Uuid, user: &User) -> Result<PurchaseRequest, AppError> {
        self.request_repo
            .find_by_id(&self.pool, id)
            .await?
            .filter(|request| request.visible_to(user))
            .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))
    }

    pub async fn detail(&self, id: Uuid, user: &User) -> Result<PurchaseRequestDetail, AppError> {
        let request = self.find_visible(id, user).await?;
        self.detail_of(request).await
    }

    async fn detail_of(&self, request: PurchaseRequest) -> Result<PurchaseRequestDetail, AppError> {
        let items = self.request_repo.list_items(&self.pool, request.id).await?;
        let proforma = self.document_repo.find_proforma_by_request(&self.pool, request.id).await?;
        let purchase_order = self.po_repo.find_by_request(&self.pool, request.id).await?;
        let receipts = self.document_repo.list_receipts_by_request(&self.pool, request.id).await?;

        Ok(PurchaseRequestDetail {
            can_be_edited: request.can_be_edited(),
            awaiting_level: request.awaiting_level(),
            header: request,
            items: items.into_iter().map(RequestItemView::from).collect(),
            proforma,
            purchase_order,
            receipts,
        })
    }

    /// Edita enquanto pendente. Itens enviados substituem os atuais.
    pub async fn update(&self, id: Uuid, user: &User, changes: RequestChanges) -> Result<PurchaseRequestDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .request_repo
            .find_by_id_for_update(&mut *tx, id)
            .await?
            .filter(|request| request.visible_to(user))
            .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))?;

        if !current.can_be_edited() {
            return Err(AppError::RequestNotEditable);
        }
        if !current.managed_by(user) {
            return Err(AppError::PermissionDenied);
        }

        let title = changes.title.unwrap_or_else(|| current.title.clone());
        let description = changes.description.unwrap_or_else(|| current.description.clone());
        let amount = changes.amount.unwrap_or(current.amount);

        let updated = self
            .request_repo
            .update_header(&mut *tx, id, &title, &description, amount)
            .await?
            .ok_or(AppError::RequestNotEditable)?;

        if let Some(items) = changes.items {
            self.request_repo.delete_items(&mut *tx, id).await?;
            for (position, item) in items.iter().enumerate() {
                self.request_repo
                    .add_item(&mut *tx, id, position as i32, &item.description, item.quantity, item.unit_price)
                    .await?;
            }
        }

        tx.commit().await?;
        info!(request_id = %id, user_id = %user.id, "✏️ Requisição atualizada");

        self.detail_of(updated).await
    }

    pub async fn history(&self, id: Uuid, user: &User) -> Result<Vec<ApprovalHistoryEntry>, AppError> {
        let request = self.find_visible(id, user).await?;

        let approvers: Vec<Uuid> = request.approved_by_level_1.into_iter().chain(request.approved_by_level_2).collect();
        let usernames: HashMap<Uuid, String> = self
            .user_repo
            .find_many(&self.pool, &approvers)
            .await?
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect();

        Ok(request.history(|id| usernames.get(&id).cloned().unwrap_or_else(|| id.to_string())))
    }
}
