//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.
//!
//! Uniqueness invariants (username/email, one review per author per title,
//! category/genre slugs) are backed by unique indexes; inserts map the
//! storage-level violation to a conflict error so the application check and
//! the constraint always agree.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, JoinType, LoaderTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;

/// One page of a list response
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Map the page contents, keeping the total count
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Filters accepted by the title list endpoint
#[derive(Debug, Default, Clone)]
pub struct TitleListFilter {
    /// Category slug
    pub category: Option<String>,
    /// Genre slug
    pub genre: Option<String>,
    /// Name substring
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// Partial update for a title; `None` leaves the column untouched.
/// `category_id` and `description` carry a nested Option since both are
/// nullable columns.
#[derive(Debug, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<i64>>,
    /// Replaces the full genre link set when present
    pub genre_ids: Option<Vec<i64>>,
}

/// Partial update for a user; `None` leaves the column untouched
#[derive(Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<UserRole>,
}

/// Fields for an admin-created or signup-created user
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub confirmation_code_hash: Option<String>,
    pub is_active: bool,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Map a unique-index violation to the given conflict error
    fn on_unique_violation(err: DbErr, conflict: AppError) -> AppError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => conflict,
            _ => err.into(),
        }
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Create a user. A concurrent insert racing the pre-checks surfaces as
    /// a conflict via the unique indexes.
    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        let user = UserActiveModel {
            username: Set(new.username.clone()),
            email: Set(new.email),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            bio: Set(new.bio),
            role: Set(String::from(new.role)),
            is_superuser: Set(false),
            is_staff: Set(false),
            confirmation_code_hash: Set(new.confirmation_code_hash),
            is_active: Set(new.is_active),
            date_joined: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        user.insert(self.conn()).await.map_err(|e| {
            Self::on_unique_violation(
                e,
                AppError::Duplicate {
                    message: format!("username or email already taken: {}", new.username),
                },
            )
        })
    }

    /// Store a freshly generated confirmation code digest
    pub async fn set_confirmation_code(&self, user_id: i64, code_hash: String) -> Result<()> {
        let user = UserActiveModel {
            id: Set(user_id),
            confirmation_code_hash: Set(Some(code_hash)),
            ..Default::default()
        };
        user.update(self.conn()).await?;
        Ok(())
    }

    /// Mark the account active after a successful code exchange
    pub async fn activate_user(&self, user_id: i64) -> Result<()> {
        let user = UserActiveModel {
            id: Set(user_id),
            is_active: Set(true),
            ..Default::default()
        };
        user.update(self.conn()).await?;
        Ok(())
    }

    pub async fn update_user(&self, user: User, changes: UserChanges) -> Result<User> {
        let mut active: UserActiveModel = user.into();

        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(bio) = changes.bio {
            active.bio = Set(bio);
        }
        if let Some(role) = changes.role {
            active.role = Set(String::from(role));
        }

        active.update(self.conn()).await.map_err(|e| {
            Self::on_unique_violation(
                e,
                AppError::Duplicate {
                    message: "email already taken".to_string(),
                },
            )
        })
    }

    /// Delete a user; dependent reviews and comments cascade in the store
    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = UserEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn list_users(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<Page<User>> {
        let mut query = UserEntity::find();
        if let Some(search) = search {
            query = query.filter(UserColumn::Username.contains(search));
        }

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(UserColumn::Username)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    // ========================================================================
    // Category Operations
    // ========================================================================

    pub async fn list_categories(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<Page<Category>> {
        let mut query = CategoryEntity::find();
        if let Some(search) = search {
            query = query.filter(CategoryColumn::Name.contains(search));
        }

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(CategoryColumn::Slug)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    pub async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        CategoryEntity::find()
            .filter(CategoryColumn::Slug.eq(slug))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_category(&self, name: String, slug: String) -> Result<Category> {
        let category = CategoryActiveModel {
            name: Set(name),
            slug: Set(slug.clone()),
            ..Default::default()
        };

        category.insert(self.conn()).await.map_err(|e| {
            Self::on_unique_violation(
                e,
                AppError::Duplicate {
                    message: format!("category slug already exists: {}", slug),
                },
            )
        })
    }

    pub async fn delete_category_by_slug(&self, slug: &str) -> Result<bool> {
        let result = CategoryEntity::delete_many()
            .filter(CategoryColumn::Slug.eq(slug))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Genre Operations
    // ========================================================================

    pub async fn list_genres(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> Result<Page<Genre>> {
        let mut query = GenreEntity::find();
        if let Some(search) = search {
            query = query.filter(GenreColumn::Name.contains(search));
        }

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(GenreColumn::Slug)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    pub async fn find_genre_by_slug(&self, slug: &str) -> Result<Option<Genre>> {
        GenreEntity::find()
            .filter(GenreColumn::Slug.eq(slug))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Resolve a set of genre slugs, failing on the first one that is unknown
    pub async fn resolve_genre_slugs(&self, slugs: &[String]) -> Result<Vec<Genre>> {
        let genres = GenreEntity::find()
            .filter(GenreColumn::Slug.is_in(slugs.iter().cloned()))
            .all(self.conn())
            .await?;

        for slug in slugs {
            if !genres.iter().any(|g| &g.slug == slug) {
                return Err(AppError::Validation {
                    message: format!("unknown genre slug: {}", slug),
                    field: Some("genre".to_string()),
                });
            }
        }

        Ok(genres)
    }

    pub async fn create_genre(&self, name: String, slug: String) -> Result<Genre> {
        let genre = GenreActiveModel {
            name: Set(name),
            slug: Set(slug.clone()),
            ..Default::default()
        };

        genre.insert(self.conn()).await.map_err(|e| {
            Self::on_unique_violation(
                e,
                AppError::Duplicate {
                    message: format!("genre slug already exists: {}", slug),
                },
            )
        })
    }

    pub async fn delete_genre_by_slug(&self, slug: &str) -> Result<bool> {
        let result = GenreEntity::delete_many()
            .filter(GenreColumn::Slug.eq(slug))
            .exec(self.conn())
            .await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Title Operations
    // ========================================================================

    pub async fn find_title_by_id(&self, id: i64) -> Result<Option<Title>> {
        TitleEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_titles(
        &self,
        filter: &TitleListFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Page<Title>> {
        let mut query = TitleEntity::find();

        if let Some(ref category) = filter.category {
            query = query
                .join(JoinType::InnerJoin, title_category_rel())
                .filter(CategoryColumn::Slug.eq(category.as_str()));
        }
        if let Some(ref genre) = filter.genre {
            query = query
                .join(JoinType::InnerJoin, title_genre_links_rel())
                .join(JoinType::InnerJoin, link_genre_rel())
                .filter(GenreColumn::Slug.eq(genre.as_str()));
        }
        if let Some(ref name) = filter.name {
            query = query.filter(TitleColumn::Name.contains(name));
        }
        if let Some(year) = filter.year {
            query = query.filter(TitleColumn::Year.eq(year));
        }

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(TitleColumn::Id)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    /// Load the category and genre set for each title, in order
    pub async fn load_title_refs(
        &self,
        titles: &[Title],
    ) -> Result<(Vec<Option<Category>>, Vec<Vec<Genre>>)> {
        let categories = titles.load_one(CategoryEntity, self.conn()).await?;
        let genres = titles
            .load_many_to_many(GenreEntity, GenreTitleEntity, self.conn())
            .await?;
        Ok((categories, genres))
    }

    /// Mean review score per title for the given ids. Titles without reviews
    /// are absent from the map.
    pub async fn title_ratings(&self, title_ids: &[i64]) -> Result<HashMap<i64, f64>> {
        if title_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let reviews = ReviewEntity::find()
            .filter(ReviewColumn::TitleId.is_in(title_ids.iter().copied()))
            .all(self.conn())
            .await?;

        let mut sums: HashMap<i64, (i64, i64)> = HashMap::new();
        for review in reviews {
            let entry = sums.entry(review.title_id).or_insert((0, 0));
            entry.0 += review.score as i64;
            entry.1 += 1;
        }

        Ok(sums
            .into_iter()
            .map(|(title_id, (sum, n))| (title_id, sum as f64 / n as f64))
            .collect())
    }

    /// Create a title and its genre links atomically
    pub async fn create_title(
        &self,
        name: String,
        year: i32,
        description: Option<String>,
        category_id: Option<i64>,
        genre_ids: Vec<i64>,
    ) -> Result<Title> {
        let txn = self.conn().begin().await?;

        let title = TitleActiveModel {
            name: Set(name),
            year: Set(year),
            description: Set(description),
            category_id: Set(category_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for genre_id in genre_ids {
            GenreTitleActiveModel {
                genre_id: Set(genre_id),
                title_id: Set(title.id),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(title)
    }

    /// Apply a partial update; replaces the genre link set when one is given
    pub async fn update_title(&self, title: Title, changes: TitleChanges) -> Result<Title> {
        let txn = self.conn().begin().await?;
        let title_id = title.id;

        let mut active: TitleActiveModel = title.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(year) = changes.year {
            active.year = Set(year);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(category_id) = changes.category_id {
            active.category_id = Set(category_id);
        }
        let updated = active.update(&txn).await?;

        if let Some(genre_ids) = changes.genre_ids {
            GenreTitleEntity::delete_many()
                .filter(GenreTitleColumn::TitleId.eq(title_id))
                .exec(&txn)
                .await?;

            for genre_id in genre_ids {
                GenreTitleActiveModel {
                    genre_id: Set(genre_id),
                    title_id: Set(title_id),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Delete a title; reviews and their comments cascade in the store
    pub async fn delete_title(&self, id: i64) -> Result<bool> {
        let result = TitleEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Review Operations
    // ========================================================================

    pub async fn list_reviews(
        &self,
        title_id: i64,
        limit: u64,
        offset: u64,
    ) -> Result<Page<Review>> {
        let query = ReviewEntity::find().filter(ReviewColumn::TitleId.eq(title_id));

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(ReviewColumn::PubDate)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    /// Find a review scoped to its parent title
    pub async fn find_review(&self, title_id: i64, review_id: i64) -> Result<Option<Review>> {
        ReviewEntity::find_by_id(review_id)
            .filter(ReviewColumn::TitleId.eq(title_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Application-level half of the one-review-per-author invariant; the
    /// unique index closes the remaining race at insert time.
    pub async fn review_exists(&self, title_id: i64, author_id: i64) -> Result<bool> {
        let count = ReviewEntity::find()
            .filter(ReviewColumn::TitleId.eq(title_id))
            .filter(ReviewColumn::AuthorId.eq(author_id))
            .count(self.conn())
            .await?;
        Ok(count > 0)
    }

    pub async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        text: String,
        score: i16,
    ) -> Result<Review> {
        let review = ReviewActiveModel {
            author_id: Set(author_id),
            title_id: Set(title_id),
            text: Set(text),
            score: Set(score),
            pub_date: Set(chrono::Utc::now().into()),
            ..Default::default()
        };

        review
            .insert(self.conn())
            .await
            .map_err(|e| Self::on_unique_violation(e, AppError::DuplicateReview))
    }

    /// Text and score are the only mutable review fields; author, title and
    /// pub_date never change after creation.
    pub async fn update_review(
        &self,
        review: Review,
        text: Option<String>,
        score: Option<i16>,
    ) -> Result<Review> {
        let mut active: ReviewActiveModel = review.into();
        if let Some(text) = text {
            active.text = Set(text);
        }
        if let Some(score) = score {
            active.score = Set(score);
        }
        active.update(self.conn()).await.map_err(Into::into)
    }

    /// Delete a review; its comments cascade in the store
    pub async fn delete_review(&self, id: i64) -> Result<bool> {
        let result = ReviewEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    pub async fn list_comments(
        &self,
        review_id: i64,
        limit: u64,
        offset: u64,
    ) -> Result<Page<Comment>> {
        let query = CommentEntity::find().filter(CommentColumn::ReviewId.eq(review_id));

        let count = query.clone().count(self.conn()).await?;
        let results = query
            .order_by_asc(CommentColumn::PubDate)
            .offset(offset)
            .limit(limit)
            .all(self.conn())
            .await?;

        Ok(Page { count, results })
    }

    /// Find a comment scoped to its parent review
    pub async fn find_comment(&self, review_id: i64, comment_id: i64) -> Result<Option<Comment>> {
        CommentEntity::find_by_id(comment_id)
            .filter(CommentColumn::ReviewId.eq(review_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> Result<Comment> {
        let comment = CommentActiveModel {
            review_id: Set(review_id),
            author_id: Set(author_id),
            text: Set(text),
            pub_date: Set(chrono::Utc::now().into()),
            ..Default::default()
        };
        comment.insert(self.conn()).await.map_err(Into::into)
    }

    pub async fn update_comment(&self, comment: Comment, text: String) -> Result<Comment> {
        let mut active: CommentActiveModel = comment.into();
        active.text = Set(text);
        active.update(self.conn()).await.map_err(Into::into)
    }

    pub async fn delete_comment(&self, id: i64) -> Result<bool> {
        let result = CommentEntity::delete_by_id(id).exec(self.conn()).await?;
        Ok(result.rows_affected > 0)
    }

    /// Load the author username for each row, in order
    pub async fn load_review_authors(&self, reviews: &[Review]) -> Result<Vec<Option<User>>> {
        reviews
            .load_one(UserEntity, self.conn())
            .await
            .map_err(Into::into)
    }

    pub async fn load_comment_authors(&self, comments: &[Comment]) -> Result<Vec<Option<User>>> {
        comments
            .load_one(UserEntity, self.conn())
            .await
            .map_err(Into::into)
    }
}

// Relation defs used by the title list joins
use sea_orm::RelationDef;

fn title_category_rel() -> RelationDef {
    <TitleEntity as sea_orm::Related<CategoryEntity>>::to()
}

fn title_genre_links_rel() -> RelationDef {
    <TitleEntity as sea_orm::Related<GenreTitleEntity>>::to()
}

fn link_genre_rel() -> RelationDef {
    <GenreTitleEntity as sea_orm::Related<GenreEntity>>::to()
}
