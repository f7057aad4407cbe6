// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::Viewer};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the user id, as a string.
    pub sub: String,
    pub username: String,
    /// 'user' or 'admin'.
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    /// `None` when the subject is not a user id.
    pub fn viewer(&self) -> Option<Viewer> {
        let id = self.sub.parse::<i64>().ok()?;
        Some(Viewer {
            id,
            username: self.username.clone(),
            is_admin: self.role == "admin",
        })
    }
}

/// Signs a token for `id`, valid for `expiration_seconds`.
pub fn sign_jwt(
    id: i64,
    username: &str,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| {
            tracing::error!("System clock before unix epoch: {:?}", e);
            AppError::Internal
        })?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        username: username.to_owned(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {:?}", e);
        AppError::Internal
    })
}

/// Verifies and decodes a JWT string.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Axum Middleware: optional authentication.
///
/// A valid `Authorization: Bearer <token>` header injects a `Viewer` into the
/// request extensions. Missing or invalid tokens never reject the request;
/// it simply continues as anonymous.
pub async fn loose_auth(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if let Some(token) = token {
        match verify_jwt(token, &config.jwt_secret) {
            Ok(claims) => match claims.viewer() {
                Some(viewer) => {
                    req.extensions_mut().insert(viewer);
                }
                None => tracing::debug!("Token subject is not a user id, continuing anonymously"),
            },
            Err(e) => tracing::debug!("Ignoring invalid token: {}", e),
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_tokens_decode_into_a_viewer() {
        let token = sign_jwt(7, "alice", "admin", "secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();

        assert_eq!(
            claims.viewer(),
            Some(Viewer {
                id: 7,
                username: "alice".to_owned(),
                is_admin: true,
            })
        );
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = sign_jwt(7, "alice", "user", "secret", 60).unwrap();
        assert!(verify_jwt(&token, "other").is_err());
    }
}
