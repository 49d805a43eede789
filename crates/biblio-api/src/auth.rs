//! Caller identity from the `x-user-id` header. The id must name a provisioned user.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use biblio_types::Actor;
use std::sync::Arc;

pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller. Use `Option<AuthUser>` on routes that are also public.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

impl AuthUser {
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.0.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("librarian or admin role required".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))?;
        let user = state
            .library
            .store()
            .get_user(id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized(format!("unknown user {id}")))?;
        Ok(AuthUser(Actor::from(&user)))
    }
}
