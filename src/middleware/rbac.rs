// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{
    common::error::AppError,
    middleware::auth::AuthenticatedUser,
    models::auth::Role,
};

/// Define quais papéis passam por uma rota.
pub trait RoleRequirement: Send + Sync + 'static {
    fn allows(role: Role) -> bool;
}

/// Guardião de rota: rejeita com 403 quem não tem o papel exigido.
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleRequirement,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)?;

        if !T::allows(user.0.role) {
            tracing::debug!(user_id = %user.0.id, role = ?user.0.role, "Acesso negado pelo papel");
            return Err(AppError::PermissionDenied);
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// PAPÉIS EXIGIDOS
// ---

pub struct Approver;
impl RoleRequirement for Approver {
    fn allows(role: Role) -> bool {
        role.is_approver()
    }
}
