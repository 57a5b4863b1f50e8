//! SeaORM entity models
//!
//! Database entities for Revu

mod category;
mod comment;
mod genre;
mod genre_title;
mod review;
mod title;
mod user;

pub use user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Model as User,
    UserRole,
};

pub use category::{
    ActiveModel as CategoryActiveModel,
    Column as CategoryColumn,
    Entity as CategoryEntity,
    Model as Category,
};

pub use genre::{
    ActiveModel as GenreActiveModel,
    Column as GenreColumn,
    Entity as GenreEntity,
    Model as Genre,
};

pub use title::{
    ActiveModel as TitleActiveModel,
    Column as TitleColumn,
    Entity as TitleEntity,
    Model as Title,
};

pub use genre_title::{
    ActiveModel as GenreTitleActiveModel,
    Column as GenreTitleColumn,
    Entity as GenreTitleEntity,
    Model as GenreTitle,
};

pub use review::{
    ActiveModel as ReviewActiveModel,
    Column as ReviewColumn,
    Entity as ReviewEntity,
    Model as Review,
};

pub use comment::{
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
    Entity as CommentEntity,
    Model as Comment,
};
