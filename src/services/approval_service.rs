// src/services/approval_service.rs

use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RequestRepository,
    models::{
        auth::{Role, User},
        requests::{ApprovalLevel, ApprovalState, PurchaseRequest, TransitionError},
    },
    services::purchase_order_service::PurchaseOrderService,
};

/// Papel exigido para aprovar em cada nível.
pub fn required_role(level: ApprovalLevel) -> Role {
    match level {
        ApprovalLevel::Level1 => Role::ApproverLevel1,
        ApprovalLevel::Level2 => Role::ApproverLevel2,
    }
}

/// Nível que `user` pode aprovar agora nesta requisição.
pub fn level_for(request: &PurchaseRequest, user: &User) -> Result<ApprovalLevel, AppError> {
    let level = match request.approval_state()? {
        ApprovalState::AwaitingLevel1 => ApprovalLevel::Level1,
        ApprovalState::AwaitingLevel2 { .. } => ApprovalLevel::Level2,
        _ => return Err(TransitionError::NotPending(request.status).into()),
    };
    if user.role != required_role(level) {
        return Err(AppError::PermissionDenied);
    }
    Ok(level)
}

#[derive(Clone)]
pub struct ApprovalService {
    pool: PgPool,
    request_repo: RequestRepository,
    po_service: PurchaseOrderService,
}

impl ApprovalService {
    pub fn new(pool: PgPool, request_repo: RequestRepository, po_service: PurchaseOrderService) -> Self {
        Self { pool, request_repo, po_service }
    }

    /// Aprova no nível que a requisição aguarda. A aprovação final dispara a ordem de compra.
    pub async fn approve(&self, id: Uuid, user: &User) -> Result<PurchaseRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut request = self.locked_visible(&mut tx, id, user).await?;
        let seen_level_1 = request.approved_by_level_1;

        let level = level_for(&request, user)?;
        let state = request.approve(level, user.id, Utc::now())?;

        if !self.request_repo.save_transition(&mut *tx, &request, seen_level_1).await? {
            return Err(AppError::ConcurrentModification);
        }
        tx.commit().await?;

        info!(request_id = %id, approver = %user.username, level = %level, "✅ Requisição aprovada");

        // A ordem de compra sai depois do commit; falhar aqui não desfaz a aprovação
        if matches!(state, ApprovalState::Approved { .. }) {
            match self.po_service.generate(id, user.id).await {
                Ok(po) => info!(request_id = %id, po_number = %po.po_number, "🧾 Ordem de compra gerada"),
                Err(e) => warn!(request_id = %id, error = %e, "Falha ao gerar a ordem de compra"),
            }
        }

        Ok(request)
    }

    pub async fn reject(&self, id: Uuid, user: &User, reason: &str) -> Result<PurchaseRequest, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut request = self.locked_visible(&mut tx, id, user).await?;
        let seen_level_1 = request.approved_by_level_1;

        request.reject(user.id, reason, Utc::now())?;

        if !self.request_repo.save_transition(&mut *tx, &request, seen_level_1).await? {
            return Err(AppError::ConcurrentModification);
        }
        tx.commit().await?;

        info!(request_id = %id, approver = %user.username, "⛔ Requisição rejeitada");
        Ok(request)
    }

    async fn locked_visible(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
        user: &User,
    ) -> Result<PurchaseRequest, AppError> {
        if !user.role.is_approver() {
            return Err(AppError::PermissionDenied);
        }

        self.request_repo
            .find_by_id_for_update(&mut **tx, id)
            .await?
            .filter(|request| request.visible_to(user))
            .ok_or_else(|| AppError::ResourceNotFound("Requisição".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::{
        db::{
            DocumentRepository, PurchaseOrderRepository, UserRepository,
            testing::{insert_pending_request, insert_user, test_pool},
        },
        models::{auth::test_user, requests::test_request},
        services::{file_store::LocalFileStore, pdf_renderer::StubRenderer},
    };

    #[test]
    fn each_level_has_its_own_approver_role() {
        assert_eq!(required_role(ApprovalLevel::Level1), Role::ApproverLevel1);
        assert_eq!(required_role(ApprovalLevel::Level2), Role::ApproverLevel2);
    }

    #[test]
    fn approver_must_match_the_awaited_level() {
        let staff = test_user(Role::Staff);
        let first = test_user(Role::ApproverLevel1);
        let second = test_user(Role::ApproverLevel2);
        let mut request = test_request(staff.id);

        assert!(matches!(level_for(&request, &second), Err(AppError::PermissionDenied)));
        assert_eq!(level_for(&request, &first).unwrap(), ApprovalLevel::Level1);

        request.approve_level_1(first.id, Utc::now()).unwrap();
        assert!(matches!(level_for(&request, &first), Err(AppError::PermissionDenied)));
        assert_eq!(level_for(&request, &second).unwrap(), ApprovalLevel::Level2);
    }

    #[test]
    fn decided_request_is_not_pending() {
        let staff = test_user(Role::Staff);
        let approver = test_user(Role::ApproverLevel1);
        let mut request = test_request(staff.id);
        request.reject(approver.id, "sem orçamento", Utc::now()).unwrap();

        assert!(matches!(
            level_for(&request, &approver),
            Err(AppError::Transition(TransitionError::NotPending(_)))
        ));
    }

    #[test]
    fn finishing_level_2_reports_approved_state() {
        let staff = test_user(Role::Staff);
        let first = test_user(Role::ApproverLevel1);
        let second = test_user(Role::ApproverLevel2);
        let mut request = test_request(staff.id);

        request.approve(ApprovalLevel::Level1, first.id, Utc::now()).unwrap();
        assert_eq!(request.awaiting_level(), Some(ApprovalLevel::Level2));
        assert!(request.visible_to(&second));

        let state = request.approve(ApprovalLevel::Level2, second.id, Utc::now()).unwrap();
        assert!(matches!(state, ApprovalState::Approved { .. }));
        // Aprovada deixa de aparecer para quem não participou
        assert!(!request.visible_to(&test_user(Role::ApproverLevel1)));
        assert!(request.visible_to(&second));
    }

    // --- Com banco de dados (só roda com TEST_DATABASE_URL definida) ---

    fn service(pool: &PgPool, media_root: &std::path::Path) -> ApprovalService {
        let po_service = PurchaseOrderService::new(
            pool.clone(),
            PurchaseOrderRepository::new(pool.clone()),
            RequestRepository::new(pool.clone()),
            DocumentRepository::new(pool.clone()),
            UserRepository::new(pool.clone()),
            Arc::new(StubRenderer),
            Arc::new(LocalFileStore::new(media_root, "/media")),
        );
        ApprovalService::new(pool.clone(), RequestRepository::new(pool.clone()), po_service)
    }

    #[tokio::test]
    async fn simultaneous_level_1_approvals_let_only_one_through() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let users = UserRepository::new(pool.clone());
        let staff = insert_user(&pool, Role::Staff).await;
        let first = users.find_by_id(insert_user(&pool, Role::ApproverLevel1).await).await.unwrap().unwrap();
        let second = users.find_by_id(insert_user(&pool, Role::ApproverLevel1).await).await.unwrap().unwrap();
        let request_id = insert_pending_request(&pool, staff).await;

        let dir = tempfile::tempdir().unwrap();
        let service = service(&pool, dir.path());

        let (a, b) = tokio::join!(service.approve(request_id, &first), service.approve(request_id, &second));
        let (won, lost) = match (a, b) {
            (Ok(request), Err(e)) | (Err(e), Ok(request)) => (request, e),
            other => panic!("esperado um sucesso e uma falha, veio {other:?}"),
        };

        // Quem perde a corrida vê a requisição já no nível 2
        assert!(matches!(lost, AppError::ConcurrentModification | AppError::PermissionDenied));
        assert_eq!(won.awaiting_level(), Some(ApprovalLevel::Level2));

        let stored = RequestRepository::new(pool.clone()).find_by_id(&pool, request_id).await.unwrap().unwrap();
        assert_eq!(stored.approved_by_level_1, won.approved_by_level_1);
        assert_eq!(stored.awaiting_level(), Some(ApprovalLevel::Level2));
    }

    #[tokio::test]
    async fn transition_from_a_stale_snapshot_is_refused() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let staff = insert_user(&pool, Role::Staff).await;
        let first = insert_user(&pool, Role::ApproverLevel1).await;
        let second = insert_user(&pool, Role::ApproverLevel1).await;
        let request_id = insert_pending_request(&pool, staff).await;

        let repo = RequestRepository::new(pool.clone());
        let snapshot = repo.find_by_id(&pool, request_id).await.unwrap().unwrap();

        let mut approved = snapshot.clone();
        approved.approve(ApprovalLevel::Level1, first, Utc::now()).unwrap();
        let mut rejected = snapshot.clone();
        rejected.reject(second, "duplicada", Utc::now()).unwrap();

        assert!(repo.save_transition(&pool, &approved, snapshot.approved_by_level_1).await.unwrap());
        assert!(!repo.save_transition(&pool, &rejected, snapshot.approved_by_level_1).await.unwrap());

        let stored = repo.find_by_id(&pool, request_id).await.unwrap().unwrap();
        assert_eq!(stored.approved_by_level_1, Some(first));
        assert_eq!(stored.rejection_reason, "");
    }
}
