//! Genre management handlers

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
pub struct GenreListQuery {
    /// Name substring search
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGenreRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(
        length(min = 1, max = 50),
        custom(function = validate::slug_format)
    )]
    pub slug: String,
}

#[derive(Serialize)]
pub struct GenreResponse {
    pub name: String,
    pub slug: String,
}

/// List genres, optionally filtered by name substring
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<GenreListQuery>,
) -> Result<Json<Page<GenreResponse>>> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let repo = Repository::new(state.db.clone());
    let page = repo
        .list_genres(query.search.as_deref(), limit, offset)
        .await?;

    Ok(Json(page.map(|g| GenreResponse {
        name: g.name,
        slug: g.slug,
    })))
}

/// Create a genre (admin only)
pub async fn create_genre(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateGenreRequest>,
) -> Result<(StatusCode, Json<GenreResponse>)> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Create))?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let genre = repo.create_genre(request.name, request.slug).await?;

    tracing::info!(slug = %genre.slug, by = %user.username, "Genre created");

    Ok((
        StatusCode::CREATED,
        Json(GenreResponse {
            name: genre.name,
            slug: genre.slug,
        }),
    ))
}

/// Delete a genre by slug (admin only); link rows cascade, titles are kept
pub async fn delete_genre(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<StatusCode> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Delete))?;

    let repo = Repository::new(state.db.clone());
    if !repo.delete_genre_by_slug(&slug).await? {
        return Err(AppError::GenreNotFound { slug });
    }

    tracing::info!(slug = %slug, by = %user.username, "Genre deleted");

    Ok(StatusCode::NO_CONTENT)
}
