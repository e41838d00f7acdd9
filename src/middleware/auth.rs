use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::{error::Error, AppState};

pub const PRIVILEGED_ROLES: &[&str] = &["admin", "superuser"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

impl Claims {
    pub fn is_privileged(&self) -> bool {
        let role = self.role.as_deref().unwrap_or_default();
        PRIVILEGED_ROLES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(role))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let Some(auth_header) = headers.get(AUTHORIZATION) else {
        return Err(Error::Unauthorized("missing_authorization".to_string()));
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return Err(Error::Unauthorized("bad_authorization".to_string()));
    };
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
}

/// Lets through bearer tokens whose role is `admin` or `superuser`.
pub async fn require_admin(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = match bearer_token(req.headers())
        .and_then(|token| decode_claims(token, state.config.jwt_secret.expose_secret()))
    {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };
    if !claims.is_privileged() {
        return Error::Forbidden("Administrator role required".to_string()).into_response();
    }
    req.extensions_mut().insert(claims);
    next.run(req).await
}
