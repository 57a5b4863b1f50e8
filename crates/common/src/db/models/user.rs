//! User entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User role enum
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Moderator => "moderator",
            UserRole::Admin => "admin",
        }
    }

    /// Parse a role from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(UserRole::User),
            "moderator" => Some(UserRole::Moderator),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        UserRole::parse(&s).unwrap_or_default()
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        role.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "Text", unique)]
    pub username: String,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text")]
    pub first_name: String,

    #[sea_orm(column_type = "Text")]
    pub last_name: String,

    #[sea_orm(column_type = "Text")]
    pub bio: String,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    pub is_superuser: bool,

    pub is_staff: bool,

    /// SHA-256 digest of the last issued confirmation code; never the code
    /// itself
    #[sea_orm(column_type = "Text", nullable)]
    pub confirmation_code_hash: Option<String>,

    pub is_active: bool,

    pub date_joined: DateTimeWithTimeZone,
}

impl Model {
    /// Get the user role as an enum
    pub fn user_role(&self) -> UserRole {
        UserRole::from(self.role.clone())
    }

    /// Admin privileges come from the role or from the staff/superuser flags
    pub fn is_admin(&self) -> bool {
        self.user_role() == UserRole::Admin || self.is_superuser || self.is_staff
    }

    pub fn is_moderator(&self) -> bool {
        self.user_role() == UserRole::Moderator
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(role: &str, superuser: bool, staff: bool) -> Model {
        Model {
            id: 1,
            username: "alice".into(),
            email: "a@x.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: role.into(),
            is_superuser: superuser,
            is_staff: staff,
            confirmation_code_hash: None,
            is_active: true,
            date_joined: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(UserRole::from("moderator".to_string()), UserRole::Moderator);
        assert_eq!(String::from(UserRole::Admin), "admin");
        // Unknown strings degrade to the least-privileged role
        assert_eq!(UserRole::from("root".to_string()), UserRole::User);
    }

    #[test]
    fn test_is_admin_from_role_or_flags() {
        assert!(user_with("admin", false, false).is_admin());
        assert!(user_with("user", true, false).is_admin());
        assert!(user_with("user", false, true).is_admin());
        assert!(!user_with("user", false, false).is_admin());
        assert!(!user_with("moderator", false, false).is_admin());
    }

    #[test]
    fn test_is_moderator() {
        assert!(user_with("moderator", false, false).is_moderator());
        assert!(!user_with("admin", false, false).is_moderator());
    }
}
