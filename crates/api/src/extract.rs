//! Request extractors

use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use revu_common::{
    auth::extract_bearer,
    db::{models::User, Repository},
    errors::{AppError, Result},
};

/// The authenticated, active user behind a request.
///
/// The token only asserts identity; role and active state are reloaded from
/// the store on every request so revocations and role changes take effect
/// immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must be a bearer token".to_string(),
        })?;

        let claims = state.jwt.validate_token(token)?;

        let repo = Repository::new(state.db.clone());
        let user = repo
            .find_user_by_username(&claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !user.is_active {
            return Err(AppError::Unauthorized {
                message: "Account is not active".to_string(),
            });
        }

        Ok(CurrentUser(user))
    }
}
