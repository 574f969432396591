// src/services/auth.rs

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, User},
};

// Os tokens são emitidos por outro serviço; aqui só validamos (HS256) e carregamos o usuário.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String) -> Self {
        Self { user_repo, jwt_secret }
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = decode_claims(token, &self.jwt_secret)?;

        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|_| AppError::InvalidToken)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn token(sub: Uuid, secret: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn valid_token_yields_subject() {
        let sub = Uuid::new_v4();
        let claims = decode_claims(&token(sub, "segredo", Duration::hours(1)), "segredo").unwrap();
        assert_eq!(claims.sub, sub);
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let sub = Uuid::new_v4();
        assert!(matches!(
            decode_claims(&token(sub, "outro", Duration::hours(1)), "segredo"),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            decode_claims(&token(sub, "segredo", Duration::hours(-2)), "segredo"),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(decode_claims("não-é-um-jwt", "segredo"), Err(AppError::InvalidToken)));
    }
}
