// src/services/auth.rs

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, User},
};

/// Tokens are issued by the external identity provider with a shared HS256
/// secret. This service only verifies them, `create_token` exists for
/// tooling and tests.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AppError::InvalidToken);
        }

        Ok(User {
            id: token_data.claims.sub,
        })
    }

    pub fn create_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_back_to_the_same_user() {
        let auth = AuthService::new("test-secret".into());
        let token = auth.create_token("auth|42").unwrap();
        assert_eq!(auth.validate_token(&token).unwrap().id, "auth|42");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = AuthService::new("other".into()).create_token("auth|42").unwrap();
        let err = AuthService::new("test-secret".into()).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn garbage_is_rejected() {
        let auth = AuthService::new("test-secret".into());
        assert!(matches!(auth.validate_token("not.a.jwt"), Err(AppError::InvalidToken)));
    }
}
