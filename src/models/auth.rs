// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;

// Papéis do sistema (espelha o enum `user_role` do Postgres)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    #[sqlx(rename = "staff")]
    #[serde(rename = "staff")]
    Staff,
    #[sqlx(rename = "approver_level_1")]
    #[serde(rename = "approver_level_1")]
    ApproverLevel1,
    #[sqlx(rename = "approver_level_2")]
    #[serde(rename = "approver_level_2")]
    ApproverLevel2,
    #[sqlx(rename = "finance")]
    #[serde(rename = "finance")]
    Finance,
}

impl Role {
    pub fn is_approver(self) -> bool {
        matches!(self, Role::ApproverLevel1 | Role::ApproverLevel2)
    }

    pub fn is_finance(self) -> bool {
        self == Role::Finance
    }
}

// Representa um usuário vindo do banco de dados.
// O cadastro e a emissão de tokens acontecem fora deste serviço.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "maria.silva")]
    pub username: String,
    #[schema(example = "maria@empresa.com")]
    pub email: String,
    #[schema(example = "Maria Silva")]
    pub full_name: String,
    pub role: Role,
    #[schema(example = "Engenharia")]
    pub department: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Nome exibido em documentos: nome completo, ou o username se vazio.
    pub fn display_name(&self) -> &str {
        let full = self.full_name.trim();
        if full.is_empty() { &self.username } else { full }
    }
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

#[cfg(test)]
pub(crate) fn test_user(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        username: format!("{:?}", role).to_lowercase(),
        email: format!("{}@example.com", Uuid::new_v4()),
        full_name: String::new(),
        role,
        department: String::new(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user = test_user(Role::Staff);
        user.username = "jdoe".into();
        assert_eq!(user.display_name(), "jdoe");

        user.full_name = "  John Doe ".into();
        assert_eq!(user.display_name(), "John Doe");
    }

    #[test]
    fn role_serializes_with_level_suffix() {
        let json = serde_json::to_string(&Role::ApproverLevel2).unwrap();
        assert_eq!(json, "\"approver_level_2\"");
        assert!(Role::ApproverLevel1.is_approver());
        assert!(!Role::Finance.is_approver());
    }
}
