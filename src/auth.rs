use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::ApiError,
    models::User,
    repository::RepositoryState,
    roles::{Principal, Role, has_any_role},
};

/// Claims
///
/// Payload signed into every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id.
    pub sub: Uuid,
    pub email: String,
    /// Role at issue time. Authorization re-reads the stored role instead.
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

/// issue_token
///
/// Signs an HS256 token for `user`, valid for `config.jwt_ttl`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, ApiError> {
    let now = Utc::now();
    let expires = now
        .checked_add_signed(config.jwt_ttl)
        .ok_or_else(|| ApiError::internal("token lifetime out of range"))?;
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: expires.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::internal(format!("token signing failed: {e}")))
}

/// Verifies signature and expiry, returning the decoded claims.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Role and active flag
/// come from storage, so a demoted or deactivated account loses access
/// immediately even while its token is still valid.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            role: self.role,
        }
    }

    /// 403 unless the caller satisfies at least one of `allowed`.
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if has_any_role(self.role, allowed) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, ?allowed, "insufficient role");
            Err(ApiError::forbidden(
                "No tienes permisos para realizar esta acción",
            ))
        }
    }
}

/// Bearer token extraction, JWT validation and account lookup.
///
/// Rejects with 401 when the header is missing, the token is bad or expired,
/// or the account no longer exists or is inactive.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("No se proporcionó token de autenticación"))?;

        let claims = decode_token(token, &config.jwt_secret).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("expired token presented"),
                kind => tracing::debug!(?kind, "rejected token"),
            }
            ApiError::unauthorized("Token inválido o expirado")
        })?;

        let user = repo
            .get_user(claims.sub)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ApiError::unauthorized("Usuario no autorizado"))?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// `Option<AuthUser>`: no Authorization header yields `None`, while a header
/// carrying a bad token is still rejected.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(None);
        }
        <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

// --- Password hashing ---

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::internal(format!("hash task failed: {e}")))?
        .map_err(|e| ApiError::internal(format!("bcrypt hash failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::internal(format!("verify task failed: {e}")))?;

    Ok(verified.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored password hash could not be verified");
        false
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            nombre: "Ana".into(),
            apellido_paterno: "Rojas".into(),
            apellido_materno: None,
            rut: "123456785".into(),
            email: "ana@example.cl".into(),
            password_hash: String::new(),
            role: Role::Administrador,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_token_decodes_with_same_secret() {
        let config = AppConfig::default();
        let user = user();
        let token = issue_token(&user, &config).expect("sign");

        let claims = decode_token(&token, &config.jwt_secret).expect("decode");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ana@example.cl");
        assert_eq!(claims.role, Role::Administrador);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_rejected_with_other_secret() {
        let token = issue_token(&user(), &AppConfig::default()).expect("sign");
        assert!(decode_token(&token, "another-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = AppConfig {
            jwt_ttl: Duration::seconds(-60),
            ..AppConfig::default()
        };
        let token = issue_token(&user(), &config).expect("sign");
        let err = decode_token(&token, &config.jwt_secret).expect_err("expired");
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn overflowing_lifetime_is_an_error_not_a_panic() {
        let config = AppConfig {
            jwt_ttl: Duration::MAX,
            ..AppConfig::default()
        };
        assert!(matches!(
            issue_token(&user(), &config),
            Err(ApiError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password("secreto123".into(), 4).await.expect("hash");
        assert!(verify_password("secreto123".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("otra".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_never_verifies() {
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }
}
