//! Review handlers, nested under a title
//!
//! Each author gets one review per title. Authors edit their own reviews;
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
        models::{Review, User},
        Page, Repository,
    },
    errors::{AppError, Result},
    metrics,
};

#[derive(Debug, Deserialize)]
pub struct ReviewListQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1))]
    pub text: String,

    #[validate(range(min = 1, max = 10))]
    pub score: i16,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,

    #[validate(range(min = 1, max = 10))]
    pub score: Option<i16>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub id: i64,
    pub text: String,
    /// Author username
    pub author: String,
    pub score: i16,
    pub pub_date: chrono::DateTime<chrono::FixedOffset>,
}

fn review_response(review: Review, author: Option<&User>) -> ReviewResponse {
    ReviewResponse {
        id: review.id,
        text: review.text,
        author: author
            .map(|u| u.username.clone())
            .unwrap_or_default(),
        score: review.score,
        pub_date: review.pub_date,
    }
}

/// Fail with a not-found error unless the parent title exists
async fn require_title(repo: &Repository, title_id: i64) -> Result<()> {
    repo.find_title_by_id(title_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::TitleNotFound {
            id: title_id.to_string(),
        })
}

async fn require_review(repo: &Repository, title_id: i64, review_id: i64) -> Result<Review> {
    require_title(repo, title_id).await?;
    repo.find_review(title_id, review_id)
        .await?
        .ok_or_else(|| AppError::ReviewNotFound {
            id: review_id.to_string(),
        })
}

/// List reviews for a title
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Page<ReviewResponse>>> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let repo = Repository::new(state.db.clone());
    require_title(&repo, title_id).await?;

    let page = repo.list_reviews(title_id, limit, offset).await?;
    let authors = repo.load_review_authors(&page.results).await?;

    let count = page.count;
    let results = page
        .results
        .into_iter()
        .zip(authors)
        .map(|(review, author)| review_response(review, author.as_ref()))
        .collect();

    Ok(Json(Page { count, results }))
}

/// Get a single review
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<Json<ReviewResponse>> {
    let repo = Repository::new(state.db.clone());
    let review = require_review(&repo, title_id, review_id).await?;

    let authors = repo
        .load_review_authors(std::slice::from_ref(&review))
        .await?;
    let author = authors.into_iter().next().flatten();

    Ok(Json(review_response(review, author.as_ref())))
}

/// Create a review; one per author per title
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(title_id): Path<i64>,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    require_title(&repo, title_id).await?;

    if repo.review_exists(title_id, user.id).await? {
        return Err(AppError::DuplicateReview);
    }

    let review = repo
        .create_review(title_id, user.id, request.text, request.score)
        .await?;
    metrics::increment("reviews_created_total");

    tracing::info!(
        review_id = review.id,
        title_id = title_id,
        author = %user.username,
        "Review created"
    );

    Ok((
        StatusCode::CREATED,
        Json(review_response(review, Some(&user))),
    ))
}

/// Partially update a review (author, moderator or admin)
pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(request): Json<UpdateReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());
    let review = require_review(&repo, title_id, review_id).await?;

    let is_owner = review.author_id == user.id;
    permissions::require(permissions::user_or_read_only(
        &user,
        is_owner,
        Action::Update,
    ))?;

    let updated = repo
        .update_review(review, request.text, request.score)
        .await?;

    let authors = repo
        .load_review_authors(std::slice::from_ref(&updated))
        .await?;
    let author = authors.into_iter().next().flatten();

    Ok(Json(review_response(updated, author.as_ref())))
}

/// Delete a review (author, moderator or admin); comments cascade
pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    let review = require_review(&repo, title_id, review_id).await?;

    let is_owner = review.author_id == user.id;
    permissions::require(permissions::user_or_read_only(
        &user,
        is_owner,
        Action::Delete,
    ))?;

    repo.delete_review(review.id).await?;

    tracing::info!(
        review_id = review_id,
        title_id = title_id,
        by = %user.username,
        "Review deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        let low = CreateReviewRequest {
            text: "ok".to_string(),
            score: 0,
        };
        assert!(low.validate().is_err());

        let high = CreateReviewRequest {
            text: "ok".to_string(),
            score: 11,
        };
        assert!(high.validate().is_err());

        let edge = CreateReviewRequest {
            text: "ok".to_string(),
            score: 10,
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_empty_text_rejected() {
        let request = CreateReviewRequest {
            text: String::new(),
            score: 5,
        };
        assert!(request.validate().is_err());
    }
}
