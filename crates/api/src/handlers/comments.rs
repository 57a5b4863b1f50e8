//! Comment handlers, nested under a review
//!
//! Same ownership policy as reviews: authors edit their own comments,
//! moderators and admins can edit or delete anyone's.

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
use crate::AppState;
use revu_common::{
    db::{
        models::{Comment, Review, User},
        Page, Repository,
    },
    errors::{AppError, Result},
    metrics,
};

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentBody {
    #[validate(length(min = 1))]
    pub text: String,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    /// Author username
    pub author: String,
    pub pub_date: chrono::DateTime<chrono::FixedOffset>,
}

fn comment_response(comment: Comment, author: Option<&User>) -> CommentResponse {
    CommentResponse {
        id: comment.id,
        text: comment.text,
        author: author
            .map(|u| u.username.clone())
            .unwrap_or_default(),
        pub_date: comment.pub_date,
    }
}

/// Resolve the parent review through its title, 404 when either is missing
async fn require_review(repo: &Repository, title_id: i64, review_id: i64) -> Result<Review> {
    repo.find_title_by_id(title_id)
        .await?
        .ok_or_else(|| AppError::TitleNotFound {
            id: title_id.to_string(),
        })?;
    repo.find_review(title_id, review_id)
        .await?
        .ok_or_else(|| AppError::ReviewNotFound {
            id: review_id.to_string(),
        })
}

async fn require_comment(
    repo: &Repository,
    title_id: i64,
    review_id: i64,
    comment_id: i64,
) -> Result<Comment> {
    require_review(repo, title_id, review_id).await?;
    repo.find_comment(review_id, comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })
}

/// List comments on a review
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<Page<CommentResponse>>> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let repo = Repository::new(state.db.clone());
    require_review(&repo, title_id, review_id).await?;

    let page = repo.list_comments(review_id, limit, offset).await?;
    let authors = repo.load_comment_authors(&page.results).await?;

    let count = page.count;
    let results = page
        .results
        .into_iter()
        .zip(authors)
        .map(|(comment, author)| comment_response(comment, author.as_ref()))
        .collect();

    Ok(Json(Page { count, results }))
}

/// Get a single comment
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<Json<CommentResponse>> {
    let repo = Repository::new(state.db.clone());
    let comment = require_comment(&repo, title_id, review_id, comment_id).await?;

    let authors = repo
        .load_comment_authors(std::slice::from_ref(&comment))
        .await?;
    let author = authors.into_iter().next().flatten();

    Ok(Json(comment_response(comment, author.as_ref())))
}

/// Comment on a review (any authenticated user)
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(request): Json<CommentBody>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    require_review(&repo, title_id, review_id).await?;

    let comment = repo.create_comment(review_id, user.id, request.text).await?;
    metrics::increment("comments_created_total");

    tracing::info!(
        comment_id = comment.id,
        review_id = review_id,
        author = %user.username,
        "Comment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(comment_response(comment, Some(&user))),
    ))
}

/// Update a comment's text (author, moderator or admin)
pub async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
    Json(request): Json<CommentBody>,
) -> Result<Json<CommentResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let comment = require_comment(&repo, title_id, review_id, comment_id).await?;

    let is_owner = comment.author_id == user.id;
    permissions::require(permissions::user_or_read_only(
        &user,
        is_owner,
        Action::Update,
    ))?;

    let updated = repo.update_comment(comment, request.text).await?;

    let authors = repo
        .load_comment_authors(std::slice::from_ref(&updated))
        .await?;
    let author = authors.into_iter().next().flatten();

    Ok(Json(comment_response(updated, author.as_ref())))
}

/// Delete a comment (author, moderator or admin)
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id, comment_id)): Path<(i64, i64, i64)>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    let comment = require_comment(&repo, title_id, review_id, comment_id).await?;

    let is_owner = comment.author_id == user.id;
    permissions::require(permissions::user_or_read_only(
        &user,
        is_owner,
        Action::Delete,
    ))?;

    repo.delete_comment(comment.id).await?;

    tracing::info!(
        comment_id = comment_id,
        review_id = review_id,
        by = %user.username,
        "Comment deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_rejected() {
        let request = CommentBody {
            text: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
