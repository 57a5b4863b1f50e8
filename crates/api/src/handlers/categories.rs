//! Category management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::CurrentUser;
use crate::pagination::PageQuery;
use crate::permissions::{self, Action};
use crate::{validate, AppState};
use revu_common::{
    db::{Page, Repository},
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    /// Name substring search
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50),
        custom(function = validate::slug_format)
    )]
    pub slug: String,
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub name: String,
    pub slug: String,
}

/// List categories, optionally filtered by name substring
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Page<CategoryResponse>>> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let repo = Repository::new(state.db.clone());
    let page = repo
        .list_categories(query.search.as_deref(), limit, offset)
        .await?;

    Ok(Json(page.map(|c| CategoryResponse {
        name: c.name,
        slug: c.slug,
    })))
}

/// Create a category (admin only)
pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>)> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Create))?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let category = repo.create_category(request.name, request.slug).await?;

    tracing::info!(slug = %category.slug, by = %user.username, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            name: category.name,
            slug: category.slug,
        }),
    ))
}

/// Delete a category by slug (admin only). Titles referencing it are kept
/// with their category cleared.
pub async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Delete))?;

    let repo = Repository::new(state.db.clone());
    if !repo.delete_category_by_slug(&slug).await? {
        return Err(AppError::CategoryNotFound { slug });
    }

    tracing::info!(slug = %slug, by = %user.username, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
