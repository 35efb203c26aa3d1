//! Request authentication extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use service_core::error::AppError;
use uuid::Uuid;

use crate::services::AuthenticatedKey;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, resolved from `X-API-Key` and, when the trusted
/// gateway supplies it, the `X-User-Id` delegation header.
#[derive(Debug, Clone)]
pub struct Caller {
    pub key: AuthenticatedKey,
    /// The user this request acts as: the delegated user when the gateway
    /// substitutes one, otherwise the key's owner.
    pub effective_user_id: Uuid,
}

impl Caller {
    pub fn is_delegated(&self) -> bool {
        self.effective_user_id != self.key.user_id
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::AuthMissing)?;

        let key = state.auth.validate_api_key(api_key).await?;

        // Gateway delegation: the upstream gateway is a first-class trust
        // boundary and may substitute the effective user.
        let effective_user_id = match parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            Some(raw) => raw.parse::<Uuid>().map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!("X-User-Id must be a UUID"))
            })?,
            None => key.user_id,
        };

        Ok(Caller {
            key,
            effective_user_id,
        })
    }
}
