//! Caller identity.
//!
//! Requests name their user in the `X-User-Id` header. The id must belong to
//! an existing user; anything else is rejected with 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use crate::db::User;
use crate::error::ServiceError;

use super::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user making the request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| unauthorized("Missing X-User-Id header"))?;

        let user_id: i64 = value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| unauthorized("X-User-Id must be an integer user id"))?;

        let user = state
            .db
            .get_user(user_id)?
            .ok_or_else(|| unauthorized("Unknown user"))?;

        Ok(CurrentUser(user))
    }
}

fn unauthorized(message: &str) -> ServiceError {
    ServiceError::Unauthorized {
        message: message.to_string(),
    }
}
