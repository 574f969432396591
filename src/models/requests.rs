// src/models/requests.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::models::{
    auth::{Role, User},
    documents::{Proforma, PurchaseOrder, Receipt},
};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ApprovalLevel {
    #[serde(rename = "level_1")]
    Level1,
    #[serde(rename = "level_2")]
    Level2,
}

impl std::fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApprovalLevel::Level1 => write!(f, "1"),
            ApprovalLevel::Level2 => write!(f, "2"),
        }
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub id: Uuid,
    #[schema(example = "Notebooks para o time de dados")]
    pub title: String,
    #[schema(example = "Substituição de 3 notebooks com mais de 5 anos de uso")]
    pub description: String,
    #[schema(example = "4500.00")]
    pub amount: Decimal,
    pub status: RequestStatus,
    pub created_by: Uuid,
    pub approved_by_level_1: Option<Uuid>,
    pub approved_by_level_2: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub level_1_approved_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    pub id: Uuid,
    pub request_id: Uuid,
    #[schema(example = 0)]
    pub position: i32,
    #[schema(example = "Notebook 16GB RAM")]
    pub description: String,
    #[schema(example = 3)]
    pub quantity: i32,
    #[schema(example = "1500.00")]
    pub unit_price: Decimal,
}

impl RequestItem {
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewRequestItem {
    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Notebook 16GB RAM")]
    pub description: String,

    #[validate(range(min = 1, message = "must be at least 1"))]
    #[schema(example = 3)]
    pub quantity: i32,

    #[validate(custom(function = "non_negative"))]
    #[schema(example = "1500.00")]
    pub unit_price: Decimal,
}

pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative").with_message("must not be negative".into()));
    }
    Ok(())
}

/// Item com o total da linha já calculado, para respostas da API.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestItemView {
    #[serde(flatten)]
    pub item: RequestItem,
    #[schema(example = "4500.00")]
    pub total_price: Decimal,
}

impl From<RequestItem> for RequestItemView {
    fn from(item: RequestItem) -> Self {
        let total_price = item.line_total();
        Self { item, total_price }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequestDetail {
    #[serde(flatten)]
    pub header: PurchaseRequest,
    pub can_be_edited: bool,
    pub awaiting_level: Option<ApprovalLevel>,
    pub items: Vec<RequestItemView>,
    pub proforma: Option<Proforma>,
    pub purchase_order: Option<PurchaseOrder>,
    pub receipts: Vec<Receipt>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalHistoryEntry {
    #[schema(example = 1)]
    pub level: u8,
    #[schema(example = "carlos.aprovador")]
    pub approver: String,
    #[schema(example = "approved")]
    pub action: String,
    pub timestamp: Option<DateTime<Utc>>,
}

// =============================================================================
//  MÁQUINA DE ESTADOS DE APROVAÇÃO
// =============================================================================

/// Estado explícito de aprovação, derivado das referências anuláveis da tabela.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalState {
    AwaitingLevel1,
    AwaitingLevel2 {
        level_1: Uuid,
    },
    Approved {
        level_1: Uuid,
        level_2: Uuid,
        approved_at: DateTime<Utc>,
    },
    Rejected {
        rejected_at: DateTime<Utc>,
        reason: String,
    },
}

impl ApprovalState {
    pub fn awaiting(&self) -> Option<ApprovalLevel> {
        match self {
            ApprovalState::AwaitingLevel1 => Some(ApprovalLevel::Level1),
            ApprovalState::AwaitingLevel2 { .. } => Some(ApprovalLevel::Level2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("a requisição não está pendente (status atual: {0:?})")]
    NotPending(RequestStatus),

    #[error("a requisição não aguarda aprovação de nível {0}")]
    WrongLevel(ApprovalLevel),

    #[error("estado de aprovação inconsistente: {0}")]
    Inconsistent(&'static str),
}

impl PurchaseRequest {
    pub fn approval_state(&self) -> Result<ApprovalState, TransitionError> {
        match self.status {
            RequestStatus::Pending => match (self.approved_by_level_1, self.approved_by_level_2) {
                (None, None) => Ok(ApprovalState::AwaitingLevel1),
                (Some(level_1), None) => Ok(ApprovalState::AwaitingLevel2 { level_1 }),
                (None, Some(_)) => Err(TransitionError::Inconsistent("nível 2 sem nível 1")),
                (Some(_), Some(_)) => Err(TransitionError::Inconsistent("pendente com as duas aprovações")),
            },
            RequestStatus::Approved => {
                match (self.approved_by_level_1, self.approved_by_level_2, self.approved_at) {
                    (Some(level_1), Some(level_2), Some(approved_at)) => Ok(ApprovalState::Approved {
                        level_1,
                        level_2,
                        approved_at,
                    }),
                    _ => Err(TransitionError::Inconsistent("aprovada sem os dois aprovadores")),
                }
            }
            RequestStatus::Rejected => match self.rejected_at {
                Some(rejected_at) => Ok(ApprovalState::Rejected {
                    rejected_at,
                    reason: self.rejection_reason.clone(),
                }),
                None => Err(TransitionError::Inconsistent("rejeitada sem data de rejeição")),
            },
        }
    }

    /// Mesma regra das listagens: staff vê as próprias, aprovadores as pendentes
    /// e as que decidiram, financeiro as aprovadas.
    pub fn visible_to(&self, user: &User) -> bool {
        match user.role {
            Role::Staff => self.created_by == user.id,
            Role::ApproverLevel1 | Role::ApproverLevel2 => {
                self.status == RequestStatus::Pending
                    || self.approved_by_level_1 == Some(user.id)
                    || self.approved_by_level_2 == Some(user.id)
            }
            Role::Finance => self.status == RequestStatus::Approved,
        }
    }

    /// Quem pode editar a requisição e enviar proforma/recibos: o criador ou o financeiro.
    pub fn managed_by(&self, user: &User) -> bool {
        self.created_by == user.id || user.role.is_finance()
    }

    pub fn can_be_edited(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Nível que a requisição aguarda, ou `None` se não estiver pendente.
    pub fn awaiting_level(&self) -> Option<ApprovalLevel> {
        self.approval_state().ok().and_then(|state| state.awaiting())
    }

    pub fn approve(
        &mut self,
        level: ApprovalLevel,
        approver: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ApprovalState, TransitionError> {
        match level {
            ApprovalLevel::Level1 => self.approve_level_1(approver, now),
            ApprovalLevel::Level2 => self.approve_level_2(approver, now),
        }
    }

    /// O nível 2 é sempre obrigatório: aprovar o nível 1 nunca finaliza a requisição.
    pub fn approve_level_1(&mut self, approver: Uuid, now: DateTime<Utc>) -> Result<ApprovalState, TransitionError> {
        match self.pending_state()? {
            ApprovalState::AwaitingLevel1 => {
                self.approved_by_level_1 = Some(approver);
                self.level_1_approved_at = Some(now);
                self.updated_at = now;
                Ok(ApprovalState::AwaitingLevel2 { level_1: approver })
            }
            _ => Err(TransitionError::WrongLevel(ApprovalLevel::Level1)),
        }
    }

    pub fn approve_level_2(&mut self, approver: Uuid, now: DateTime<Utc>) -> Result<ApprovalState, TransitionError> {
        match self.pending_state()? {
            ApprovalState::AwaitingLevel2 { level_1 } => {
                self.approved_by_level_2 = Some(approver);
                self.status = RequestStatus::Approved;
                self.approved_at = Some(now);
                self.updated_at = now;
                Ok(ApprovalState::Approved {
                    level_1,
                    level_2: approver,
                    approved_at: now,
                })
            }
            _ => Err(TransitionError::WrongLevel(ApprovalLevel::Level2)),
        }
    }

    /// Rejeita e registra o aprovador no primeiro slot vazio (trilha de auditoria).
    pub fn reject(&mut self, approver: Uuid, reason: &str, now: DateTime<Utc>) -> Result<ApprovalState, TransitionError> {
        match self.pending_state()? {
            ApprovalState::AwaitingLevel1 => self.approved_by_level_1 = Some(approver),
            _ => self.approved_by_level_2 = Some(approver),
        }
        self.status = RequestStatus::Rejected;
        self.rejected_at = Some(now);
        self.rejection_reason = reason.to_string();
        self.updated_at = now;

        Ok(ApprovalState::Rejected {
            rejected_at: now,
            reason: self.rejection_reason.clone(),
        })
    }

    fn pending_state(&self) -> Result<ApprovalState, TransitionError> {
        if self.status != RequestStatus::Pending {
            return Err(TransitionError::NotPending(self.status));
        }
        self.approval_state()
    }

    pub fn history(&self, username_of: impl Fn(Uuid) -> String) -> Vec<ApprovalHistoryEntry> {
        let rejected = self.status == RequestStatus::Rejected;
        let mut history = Vec::new();

        if let Some(level_1) = self.approved_by_level_1 {
            // Sem nível 2, o slot 1 guarda quem rejeitou
            let rejected_here = rejected && self.approved_by_level_2.is_none();
            history.push(ApprovalHistoryEntry {
                level: 1,
                approver: username_of(level_1),
                action: if rejected_here { "rejected" } else { "approved" }.to_string(),
                timestamp: if rejected_here { self.rejected_at } else { self.level_1_approved_at },
            });
        }

        if let Some(level_2) = self.approved_by_level_2 {
            history.push(ApprovalHistoryEntry {
                level: 2,
                approver: username_of(level_2),
                action: if rejected { "rejected" } else { "approved" }.to_string(),
                timestamp: self.approved_at.or(self.rejected_at),
            });
        }

        history
    }
}

#[cfg(test)]
pub(crate) fn test_request(created_by: Uuid) -> PurchaseRequest {
    let now = Utc::now();
    PurchaseRequest {
        id: Uuid::new_v4(),
        title: "Monitores".into(),
        description: "Dois monitores 27 polegadas".into(),
        amount: Decimal::new(250_000, 2),
        status: RequestStatus::Pending,
        created_by,
        approved_by_level_1: None,
        approved_by_level_2: None,
        created_at: now,
        updated_at: now,
        level_1_approved_at: None,
        approved_at: None,
        rejected_at: None,
        rejection_reason: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::test_user;

    #[test]
    fn two_level_approval_ends_approved() {
        let mut request = test_request(Uuid::new_v4());
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        let state = request.approve_level_1(first, now).unwrap();
        assert_eq!(state, ApprovalState::AwaitingLevel2 { level_1: first });
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.approved_at.is_none());

        request.approve_level_2(second, now).unwrap();
        assert_eq!(request.status, RequestStatus::Approved);
        assert_eq!(request.approved_by_level_1, Some(first));
        assert_eq!(request.approved_by_level_2, Some(second));
        assert!(request.approved_at.is_some());
    }

    #[test]
    fn approving_again_after_approval_changes_nothing() {
        let mut request = test_request(Uuid::new_v4());
        let now = Utc::now();
        request.approve_level_1(Uuid::new_v4(), now).unwrap();
        request.approve_level_2(Uuid::new_v4(), now).unwrap();
        let before = request.clone();

        let err = request.approve_level_1(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::NotPending(RequestStatus::Approved));
        let err = request.approve_level_2(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::NotPending(RequestStatus::Approved));

        assert_eq!(request.approved_by_level_1, before.approved_by_level_1);
        assert_eq!(request.approved_by_level_2, before.approved_by_level_2);
        assert_eq!(request.approved_at, before.approved_at);
        assert_eq!(request.updated_at, before.updated_at);
    }

    #[test]
    fn level_2_cannot_approve_before_level_1() {
        let mut request = test_request(Uuid::new_v4());
        let err = request.approve_level_2(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::WrongLevel(ApprovalLevel::Level2));
        assert!(request.approved_by_level_2.is_none());
        assert_eq!(request.awaiting_level(), Some(ApprovalLevel::Level1));
    }

    #[test]
    fn level_1_cannot_approve_twice() {
        let mut request = test_request(Uuid::new_v4());
        let first = Uuid::new_v4();
        request.approve_level_1(first, Utc::now()).unwrap();

        let err = request.approve_level_1(Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::WrongLevel(ApprovalLevel::Level1));
        assert_eq!(request.approved_by_level_1, Some(first));
    }

    #[test]
    fn reject_records_reason_and_blocks_further_transitions() {
        let mut request = test_request(Uuid::new_v4());
        let approver = Uuid::new_v4();

        request.reject(approver, "Fora do orçamento", Utc::now()).unwrap();
        assert_eq!(request.status, RequestStatus::Rejected);
        assert_eq!(request.rejection_reason, "Fora do orçamento");
        assert!(request.rejected_at.is_some());
        assert_eq!(request.approved_by_level_1, Some(approver));
        assert!(!request.can_be_edited());

        assert!(request.approve_level_1(Uuid::new_v4(), Utc::now()).is_err());
        assert!(request.approve_level_2(Uuid::new_v4(), Utc::now()).is_err());
        assert_eq!(
            request.reject(Uuid::new_v4(), "de novo", Utc::now()).unwrap_err(),
            TransitionError::NotPending(RequestStatus::Rejected)
        );
        assert_eq!(request.rejection_reason, "Fora do orçamento");
    }

    #[test]
    fn reject_at_level_2_fills_second_slot() {
        let mut request = test_request(Uuid::new_v4());
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        request.approve_level_1(first, Utc::now()).unwrap();
        request.reject(second, "", Utc::now()).unwrap();

        assert_eq!(request.approved_by_level_1, Some(first));
        assert_eq!(request.approved_by_level_2, Some(second));
        assert!(request.approved_at.is_none());

        let history = request.history(|id| id.to_string());
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, "approved");
        assert_eq!(history[1].action, "rejected");
    }

    #[test]
    fn inconsistent_references_are_reported() {
        let mut request = test_request(Uuid::new_v4());
        request.approved_by_level_2 = Some(Uuid::new_v4());
        assert!(matches!(request.approval_state(), Err(TransitionError::Inconsistent(_))));
        assert!(request.approve_level_1(Uuid::new_v4(), Utc::now()).is_err());
        assert_eq!(request.awaiting_level(), None);
    }

    #[test]
    fn visibility_follows_role() {
        let staff = test_user(Role::Staff);
        let approver = test_user(Role::ApproverLevel2);
        let finance = test_user(Role::Finance);
        let mut request = test_request(staff.id);

        assert!(request.visible_to(&staff));
        assert!(!request.visible_to(&test_user(Role::Staff)));
        assert!(request.visible_to(&approver));
        assert!(!request.visible_to(&finance));

        request.approve_level_1(Uuid::new_v4(), Utc::now()).unwrap();
        request.approve_level_2(approver.id, Utc::now()).unwrap();
        assert!(request.visible_to(&approver));
        assert!(!request.visible_to(&test_user(Role::ApproverLevel1)));
        assert!(request.visible_to(&finance));

        assert!(request.managed_by(&staff));
        assert!(request.managed_by(&finance));
        assert!(!request.managed_by(&approver));
    }

    #[test]
    fn item_validation_rejects_bad_values() {
        let item = NewRequestItem { description: String::new(), quantity: 0, unit_price: Decimal::new(-1, 2) };
        let errors = item.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("description"));
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("unit_price"));

        let ok = NewRequestItem { description: "Mouse".into(), quantity: 1, unit_price: Decimal::ZERO };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn line_total_multiplies_quantity() {
        let item = RequestItem {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            position: 0,
            description: "Cabo HDMI".into(),
            quantity: 4,
            unit_price: Decimal::new(1999, 2),
        };
        assert_eq!(item.line_total(), Decimal::new(7996, 2));
    }
}
