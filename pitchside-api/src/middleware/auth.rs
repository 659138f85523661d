use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use pitchside_core::{Role, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    fn for_user(user: &User, lifetime_seconds: u64) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            exp: (Utc::now() + Duration::seconds(lifetime_seconds as i64)).timestamp() as usize,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn require(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::AuthorizationError("Forbidden resource".into()))
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_tokens(auth: &AuthConfig, user: &User) -> Result<TokenPair, AppError> {
    let access = Claims::for_user(user, auth.expiration);
    let refresh = Claims::for_user(user, auth.refresh_expiration);

    let access_token = encode(&Header::default(), &access, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;
    let refresh_token = encode(
        &Header::default(),
        &refresh,
        &EncodingKey::from_secret(auth.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok(TokenPair { access_token, refresh_token })
}

pub fn decode_access(auth: &AuthConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(auth.secret.as_bytes()), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

pub fn decode_refresh(auth: &AuthConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(token, &DecodingKey::from_secret(auth.refresh_secret.as_bytes()), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer(req.headers()).ok_or_else(|| AppError::AuthenticationError("Unauthorized".into()))?;
    let claims =
        decode_access(&state.auth, token).ok_or_else(|| AppError::AuthenticationError("Unauthorized".into()))?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Claims of the caller when a valid bearer token came along; anonymous otherwise.
pub struct MaybeClaims(pub Option<Claims>);

impl FromRequestParts<AppState> for MaybeClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeClaims(bearer(&parts.headers).and_then(|token| decode_access(&state.auth, token))))
    }
}
