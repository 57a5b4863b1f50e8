//! Signup and token-exchange handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{validate, AppState};
use revu_common::{errors::Result, metrics};

/// Request to register or re-request a confirmation code
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(
        length(min = 1, max = 150),
        custom(function = validate::username_format)
    )]
    pub username: String,

    #[validate(email, length(max = 254))]
    pub email: String,
}

/// Echoes the accepted identity back to the caller
#[derive(Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(
        length(min = 1, max = 150),
        custom(function = validate::username_format)
    )]
    pub username: String,

    #[validate(length(min = 1))]
    pub confirmation_code: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Register a user (or re-issue a code) and dispatch the confirmation code
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<SignupResponse>> {
    request.validate()?;

    state.auth.signup(&request.username, &request.email).await?;
    metrics::increment("signups_total");

    Ok(Json(SignupResponse {
        username: request.username,
        email: request.email,
    }))
}

/// Exchange a confirmation code for an access token
pub async fn token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>> {
    request.validate()?;

    let token = state
        .auth
        .issue_token(&request.username, &request.confirmation_code)
        .await?;
    metrics::increment("tokens_issued_total");

    Ok(Json(TokenResponse { token }))
}
