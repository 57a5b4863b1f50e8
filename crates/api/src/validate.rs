//! Custom validation functions used by request DTOs

use regex_lite::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;
use validator::ValidationError;

/// Username: leading letter or underscore, then word characters
pub fn username_format(username: &str) -> Result<(), ValidationError> {
    if revu_common::auth::is_valid_username(username) {
        Ok(())
    } else {
        Err(ValidationError::new("username_format"))
    }
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"))
}

/// Slug: letters, digits, hyphens, underscores
pub fn slug_format(slug: &str) -> Result<(), ValidationError> {
    if slug_regex().is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug_format"))
    }
}

/// Title year: 1000 up to and including the current UTC year
pub fn title_year(year: i32) -> Result<(), ValidationError> {
    use chrono::Datelike;
    let current = chrono::Utc::now().year();
    if (1000..=current).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::new("year_out_of_range"))
    }
}

/// Distinguish an absent PATCH field from an explicit null.
///
/// Apply with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>` field: absent stays `None`, `null` becomes
/// `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_format() {
        assert!(username_format("alice").is_ok());
        assert!(username_format("9lives").is_err());
        assert!(username_format("a b").is_err());
    }

    #[test]
    fn test_slug_format() {
        assert!(slug_format("sci-fi").is_ok());
        assert!(slug_format("films_2024").is_ok());
        assert!(slug_format("no spaces").is_err());
        assert!(slug_format("").is_err());
    }

    #[test]
    fn test_title_year_bounds() {
        use chrono::Datelike;
        let current = chrono::Utc::now().year();

        assert!(title_year(1000).is_ok());
        assert!(title_year(current).is_ok());
        assert!(title_year(999).is_err());
        assert!(title_year(current + 1).is_err());
        assert!(title_year(3000).is_err());
    }

    #[test]
    fn test_double_option() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            description: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);

        let null: Patch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(null.description, Some(None));

        let set: Patch = serde_json::from_str(r#"{"description": "x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }
}
