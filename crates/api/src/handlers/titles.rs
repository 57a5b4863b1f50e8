//! Title management handlers
//!
//! Read responses carry a computed `rating`: the arithmetic mean of the
//! title's review scores, rounded half away from zero to the nearest
//! integer, or null when no reviews exist.

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
    db::{
        models::{Category, Genre, Title},
        Page, Repository, TitleChanges, TitleListFilter,
    },
    errors::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct TitleListQuery {
    /// Category slug
    pub category: Option<String>,
    /// Genre slug
    pub genre: Option<String>,
    /// Name substring
    pub name: Option<String>,
    pub year: Option<i32>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTitleRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(custom(function = validate::title_year))]
    pub year: i32,

    #[validate(length(max = 100))]
    pub description: Option<String>,

    /// Category slug
    pub category: Option<String>,

    /// Genre slugs
    #[serde(default)]
    pub genre: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTitleRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(custom(function = validate::title_year))]
    pub year: Option<i32>,

    /// Absent leaves the description untouched; null clears it
    #[serde(default, deserialize_with = "validate::double_option")]
    #[validate(length(max = 100))]
    pub description: Option<Option<String>>,

    /// Absent leaves the category untouched; null clears it
    #[serde(default, deserialize_with = "validate::double_option")]
    pub category: Option<Option<String>>,

    /// Replaces the full genre set when present
    pub genre: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct SlugRef {
    pub name: String,
    pub slug: String,
}

#[derive(Serialize)]
pub struct TitleResponse {
    pub id: i64,
    pub name: String,
    pub year: i32,
    /// Mean review score, absent when the title has no reviews
    pub rating: Option<i32>,
    pub description: Option<String>,
    pub genre: Vec<SlugRef>,
    pub category: Option<SlugRef>,
}

/// Round a mean score half away from zero to the nearest integer
fn round_rating(mean: f64) -> i32 {
    mean.round() as i32
}

fn title_response(
    title: Title,
    category: Option<Category>,
    genres: Vec<Genre>,
    rating: Option<f64>,
) -> TitleResponse {
    TitleResponse {
        id: title.id,
        name: title.name,
        year: title.year,
        rating: rating.map(round_rating),
        description: title.description,
        genre: genres
            .into_iter()
            .map(|g| SlugRef {
                name: g.name,
                slug: g.slug,
            })
            .collect(),
        category: category.map(|c| SlugRef {
            name: c.name,
            slug: c.slug,
        }),
    }
}

/// Resolve a category slug reference, failing validation when unknown
async fn resolve_category(repo: &Repository, slug: &str) -> Result<Category> {
    repo.find_category_by_slug(slug)
        .await?
        .ok_or_else(|| AppError::Validation {
            message: format!("unknown category slug: {}", slug),
            field: Some("category".to_string()),
        })
}

/// List titles with filtering and computed ratings
pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<TitleListQuery>,
) -> Result<Json<Page<TitleResponse>>> {
    let (limit, offset) = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .resolve(&state.config.pagination);

    let filter = TitleListFilter {
        category: query.category,
        genre: query.genre,
        name: query.name,
        year: query.year,
    };

    let repo = Repository::new(state.db.clone());
    let page = repo.list_titles(&filter, limit, offset).await?;

    let (categories, genres) = repo.load_title_refs(&page.results).await?;
    let ids: Vec<i64> = page.results.iter().map(|t| t.id).collect();
    let ratings = repo.title_ratings(&ids).await?;

    let count = page.count;
    let results = page
        .results
        .into_iter()
        .zip(categories)
        .zip(genres)
        .map(|((title, category), genres)| {
            let rating = ratings.get(&title.id).copied();
            title_response(title, category, genres, rating)
        })
        .collect();

    Ok(Json(Page { count, results }))
}

/// Get a title by id, with computed rating
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> Result<Json<TitleResponse>> {
    let repo = Repository::new(state.db.clone());

    let title = repo
        .find_title_by_id(title_id)
        .await?
        .ok_or_else(|| AppError::TitleNotFound {
            id: title_id.to_string(),
        })?;

    let (mut categories, mut genres) = repo.load_title_refs(std::slice::from_ref(&title)).await?;
    let rating = repo
        .title_ratings(&[title_id])
        .await?
        .get(&title_id)
        .copied();

    Ok(Json(title_response(
        title,
        categories.pop().flatten(),
        genres.pop().unwrap_or_default(),
        rating,
    )))
}

/// Create a title (admin only); genre/category arrive as slug references
pub async fn create_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateTitleRequest>,
) -> Result<(StatusCode, Json<TitleResponse>)> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Create))?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let category = match request.category.as_deref() {
        Some(slug) => Some(resolve_category(&repo, slug).await?),
        None => None,
    };
    let genres = repo.resolve_genre_slugs(&request.genre).await?;

    let title = repo
        .create_title(
            request.name,
            request.year,
            request.description,
            category.as_ref().map(|c| c.id),
            genres.iter().map(|g| g.id).collect(),
        )
        .await?;

    tracing::info!(title_id = title.id, by = %user.username, "Title created");

    Ok((
        StatusCode::CREATED,
        Json(title_response(title, category, genres, None)),
    ))
}

/// Partially update a title (admin only)
pub async fn update_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(title_id): Path<i64>,
    Json(request): Json<UpdateTitleRequest>,
) -> Result<Json<TitleResponse>> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Update))?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let title = repo
        .find_title_by_id(title_id)
        .await?
        .ok_or_else(|| AppError::TitleNotFound {
            id: title_id.to_string(),
        })?;

    let category_id = match request.category {
        None => None,
        Some(None) => Some(None),
        Some(Some(ref slug)) => Some(Some(resolve_category(&repo, slug).await?.id)),
    };

    let genre_ids = match request.genre {
        None => None,
        Some(ref slugs) => Some(
            repo.resolve_genre_slugs(slugs)
                .await?
                .into_iter()
                .map(|g| g.id)
                .collect(),
        ),
    };

    let updated = repo
        .update_title(
            title,
            TitleChanges {
                name: request.name,
                year: request.year,
                description: request.description,
                category_id,
                genre_ids,
            },
        )
        .await?;

    tracing::info!(title_id = updated.id, by = %user.username, "Title updated");

    let (mut categories, mut genres) =
        repo.load_title_refs(std::slice::from_ref(&updated)).await?;
    let rating = repo
        .title_ratings(&[title_id])
        .await?
        .get(&title_id)
        .copied();

    Ok(Json(title_response(
        updated,
        categories.pop().flatten(),
        genres.pop().unwrap_or_default(),
        rating,
    )))
}

/// Delete a title (admin only); dependent reviews and comments cascade
pub async fn delete_title(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(title_id): Path<i64>,
) -> Result<StatusCode> {
    permissions::require(permissions::admin_or_read_only(&user, Action::Delete))?;

    let repo = Repository::new(state.db.clone());
    if !repo.delete_title(title_id).await? {
        return Err(AppError::TitleNotFound {
            id: title_id.to_string(),
        });
    }

    tracing::info!(title_id = title_id, by = %user.username, "Title deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_rating_half_away_from_zero() {
        assert_eq!(round_rating(7.5), 8);
        assert_eq!(round_rating(7.4), 7);
        assert_eq!(round_rating(7.0), 7);
        assert_eq!(round_rating(1.0), 1);
        assert_eq!(round_rating(9.5), 10);
    }

    #[test]
    fn test_create_request_year_validation() {
        let request = CreateTitleRequest {
            name: "Dune".to_string(),
            year: 3000,
            description: None,
            category: None,
            genre: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_patch_description_null_vs_absent() {
        let absent: UpdateTitleRequest = serde_json::from_str(r#"{"name": "Dune"}"#).unwrap();
        assert_eq!(absent.description, None);

        let cleared: UpdateTitleRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn test_patch_description_length_bounded() {
        // Same bound as on create
        let long = UpdateTitleRequest {
            name: None,
            year: None,
            description: Some(Some("d".repeat(500))),
            category: None,
            genre: None,
        };
        assert!(long.validate().is_err());

        let ok = UpdateTitleRequest {
            name: None,
            year: None,
            description: Some(Some("d".repeat(100))),
            category: None,
            genre: None,
        };
        assert!(ok.validate().is_ok());

        let cleared = UpdateTitleRequest {
            name: None,
            year: None,
            description: Some(None),
            category: None,
            genre: None,
        };
        assert!(cleared.validate().is_ok());
    }
}
