//! User administration handlers, plus the self-service `me` endpoints
//!
//! Everything keyed by username is admin-only. `me` is available to any
//! authenticated user and never allows changing one's own role.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::CurrentUser;
use crate::pagination::PageQuery;
use crate::permissions;
use crate::{validate, AppState};
use revu_common::{
    db::{
        models::{User, UserRole},
        NewUser, Page, Repository, UserChanges,
    },
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    /// Username substring search
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 1, max = 150),
        custom(function = validate::username_format)
    )]
    pub username: String,

    #[validate(email, length(max = 254))]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[serde(default)]
    #[validate(length(max = 999))]
    pub bio: Option<String>,

    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email, length(max = 254))]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(length(max = 999))]
    pub bio: Option<String>,

    pub role: Option<UserRole>,
}

/// Self-service profile update; note the absence of a role field
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(email, length(max = 254))]
    pub email: Option<String>,

    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(length(max = 999))]
    pub bio: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: UserRole,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let role = user.user_role();
        UserResponse {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role,
        }
    }
}

async fn require_user(repo: &Repository, username: &str) -> Result<User> {
    repo.find_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::UserNotFound {
            username: username.to_string(),
        })
}

/// List users (admin only), optionally filtered by username substring
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<UserResponse>>> {
    permissions::require(permissions::admin_only(&user))?;

    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let repo = Repository::new(state.db.clone());
    let page = repo
        .list_users(query.search.as_deref(), limit, offset)
        .await?;

    Ok(Json(page.map(UserResponse::from)))
}

/// Create a user directly (admin only). Accounts created this way are
/// active immediately and skip the confirmation handshake.
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    permissions::require(permissions::admin_only(&user))?;
    request.validate()?;

    if request.username == state.config.auth.reserved_username {
        return Err(AppError::Validation {
            message: format!("username '{}' is reserved", request.username),
            field: Some("username".to_string()),
        });
    }

    let repo = Repository::new(state.db.clone());
    let created = repo
        .create_user(NewUser {
            username: request.username,
            email: request.email,
            role: request.role.unwrap_or_default(),
            first_name: request.first_name.unwrap_or_default(),
            last_name: request.last_name.unwrap_or_default(),
            bio: request.bio.unwrap_or_default(),
            confirmation_code_hash: None,
            is_active: true,
        })
        .await?;

    tracing::info!(username = %created.username, by = %user.username, "User created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Get a user by username (admin only)
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>> {
    permissions::require(permissions::admin_only(&user))?;

    let repo = Repository::new(state.db.clone());
    let target = require_user(&repo, &username).await?;

    Ok(Json(UserResponse::from(target)))
}

/// Partially update a user (admin only); the only place a role can change
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    permissions::require(permissions::admin_only(&user))?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let target = require_user(&repo, &username).await?;

    let updated = repo
        .update_user(
            target,
            UserChanges {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                bio: request.bio,
                role: request.role,
            },
        )
        .await?;

    tracing::info!(username = %username, by = %user.username, "User updated");

    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user (admin only); their reviews and comments cascade
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(username): Path<String>,
) -> Result<StatusCode> {
    permissions::require(permissions::admin_only(&user))?;

    let repo = Repository::new(state.db.clone());
    let target = require_user(&repo, &username).await?;
    repo.delete_user(target.id).await?;

    tracing::info!(username = %username, by = %user.username, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Get the caller's own profile
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Update the caller's own profile; the role stays whatever it was
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let updated = repo
        .update_user(
            user,
            UserChanges {
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                bio: request.bio,
                role: None,
            },
        )
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_rejects_bad_username() {
        let request = CreateUserRequest {
            username: "bad name!".to_string(),
            email: "a@example.com".to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            role: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_role_deserializes_from_wire_form() {
        let request: CreateUserRequest = serde_json::from_str(
            r#"{"username": "mira", "email": "m@example.com", "role": "moderator"}"#,
        )
        .unwrap();
        assert_eq!(request.role, Some(UserRole::Moderator));
    }

    #[test]
    fn test_bio_length_bounded() {
        let request = UpdateMeRequest {
            email: None,
            first_name: None,
            last_name: None,
            bio: Some("b".repeat(5000)),
        };
        assert!(request.validate().is_err());

        let request = UpdateMeRequest {
            email: None,
            first_name: None,
            last_name: None,
            bio: Some("b".repeat(999)),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_me_update_has_no_role_field() {
        // A role key in the body is simply ignored rather than applied
        let request: UpdateMeRequest =
            serde_json::from_str(r#"{"bio": "hi", "role": "admin"}"#).unwrap();
        assert_eq!(request.bio.as_deref(), Some("hi"));
    }
}
