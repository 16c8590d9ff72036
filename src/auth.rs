//! Caller authentication and playback authorization.
//!
//! Tokens are HS256 JWTs carrying the caller's user id, organization and
//! role. Any authenticated member may play back assets of their own
//! organization; cross-organization access is denied.

use crate::assets::AssetRecord;
use crate::error::{PlaygateError, Result};
use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token claims issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub org_id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub org_id: String,
    pub role: String,
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Permit,
    Deny(String),
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Turn a raw bearer token into a caller.
    fn authenticate(&self, bearer: Option<&str>) -> Result<Caller>;

    /// Decide whether `caller` may play `asset`.
    async fn authorize(&self, caller: &Caller, asset: &AssetRecord) -> Decision;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authorizer backed by HS256-signed JWTs.
#[derive(Clone)]
pub struct JwtAuthorizer {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthorizer {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl Authorizer for JwtAuthorizer {
    fn authenticate(&self, bearer: Option<&str>) -> Result<Caller> {
        let token =
            bearer.ok_or_else(|| PlaygateError::Unauthenticated("Missing bearer token".into()))?;

        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| PlaygateError::Unauthenticated(format!("Invalid token: {e}")))?;
        let claims = data.claims;

        if claims.sub.is_empty() || claims.org_id.is_empty() || claims.role.is_empty() {
            return Err(PlaygateError::Unauthenticated("Invalid token payload".into()));
        }

        debug!("Authenticated user {} in org {}", claims.sub, claims.org_id);

        Ok(Caller {
            user_id: claims.sub,
            org_id: claims.org_id,
            role: claims.role,
            team_id: claims.team_id.filter(|t| !t.is_empty()),
        })
    }

    async fn authorize(&self, caller: &Caller, asset: &AssetRecord) -> Decision {
        if caller.org_id != asset.org_id {
            return Decision::Deny("Cross-org access denied".to_string());
        }
        Decision::Permit
    }
}
