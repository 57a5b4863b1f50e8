//! Authentication for the Revu API
//!
//! Provides:
//! - Confirmation code generation and verification
//! - JWT access token generation and validation
//! - The signup / token-exchange service
//!
//! Tokens assert identity only. Roles are never embedded in a token; every
//! authenticated request reloads the user row and authorizes against its
//! live role.

use crate::db::models::User;
use crate::db::{NewUser, Repository};
use crate::errors::{AppError, Result};
use crate::notify::{dispatch_confirmation, ConfirmationSink};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock};

/// Username pattern shared by signup and the admin user endpoints: a leading
/// letter or underscore followed by word characters (ASCII).
pub const USERNAME_PATTERN: &str = r"^[^\W\d]\w*$";

/// Maximum username length
pub const USERNAME_MAX_LEN: usize = 150;

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(USERNAME_PATTERN).expect("valid username pattern"))
}

/// Check a username against the pattern and length bound
pub fn is_valid_username(username: &str) -> bool {
    username.len() <= USERNAME_MAX_LEN && username_regex().is_match(username)
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (username)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new access token asserting the given identity
    pub fn generate_token(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: username.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode an access token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Generate an unguessable, URL-safe confirmation code from OS entropy
pub fn generate_confirmation_code() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a confirmation code for storage
pub fn hash_confirmation_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a confirmation code against a stored digest
pub fn verify_confirmation_code(code: &str, stored_hash: &str) -> bool {
    hash_confirmation_code(code) == stored_hash
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Reject the reserved self-service name (case-sensitive comparison)
pub fn ensure_not_reserved(username: &str, reserved: &str) -> Result<()> {
    if username == reserved {
        return Err(AppError::Validation {
            message: format!("username '{}' is reserved and cannot be used", reserved),
            field: Some("username".to_string()),
        });
    }
    Ok(())
}

/// What signup should do once the uniqueness cross-checks pass
#[derive(Debug, PartialEq, Eq)]
pub enum SignupOutcome {
    /// Insert a new inactive account carrying the code digest
    CreateInactive,
    /// Overwrite the stored digest for the existing account
    RegenerateCode { user_id: i64 },
}

/// Cross-check a signup request against the accounts already holding its
/// username or email.
pub fn resolve_signup(
    by_username: Option<&User>,
    by_email: Option<&User>,
    email: &str,
) -> Result<SignupOutcome> {
    match (by_username, by_email) {
        (Some(user), _) if user.email != email => Err(AppError::Duplicate {
            message: "username already registered with a different email".to_string(),
        }),
        (None, Some(_)) => Err(AppError::Duplicate {
            message: "email already taken".to_string(),
        }),
        (Some(user), _) => Ok(SignupOutcome::RegenerateCode { user_id: user.id }),
        (None, None) => Ok(SignupOutcome::CreateInactive),
    }
}

/// Signup / token-exchange service
///
/// Stateless apart from its collaborators; operates on plain user records
/// through the repository.
#[derive(Clone)]
pub struct AuthService {
    repo: Repository,
    jwt: Arc<JwtManager>,
    reserved_username: String,
    sink: Arc<dyn ConfirmationSink>,
}

impl AuthService {
    pub fn new(
        repo: Repository,
        jwt: Arc<JwtManager>,
        reserved_username: String,
        sink: Arc<dyn ConfirmationSink>,
    ) -> Self {
        Self {
            repo,
            jwt,
            reserved_username,
            sink,
        }
    }

    fn check_reserved(&self, username: &str) -> Result<()> {
        ensure_not_reserved(username, &self.reserved_username)
    }

    /// Register a user or re-issue a confirmation code for an existing
    /// (username, email) pair.
    ///
    /// Repeat signup regenerates the code but never activates the account;
    /// activation happens only through the token exchange.
    pub async fn signup(&self, username: &str, email: &str) -> Result<()> {
        self.check_reserved(username)?;

        if !is_valid_username(username) {
            return Err(AppError::Validation {
                message: "username must start with a letter or underscore and contain only \
                          word characters"
                    .to_string(),
                field: Some("username".to_string()),
            });
        }

        let by_username = self.repo.find_user_by_username(username).await?;
        let by_email = self.repo.find_user_by_email(email).await?;
        let outcome = resolve_signup(by_username.as_ref(), by_email.as_ref(), email)?;

        let code = generate_confirmation_code();
        let code_hash = hash_confirmation_code(&code);

        match outcome {
            SignupOutcome::RegenerateCode { user_id } => {
                self.repo.set_confirmation_code(user_id, code_hash).await?;
                tracing::info!(username = %username, "Confirmation code regenerated");
            }
            SignupOutcome::CreateInactive => {
                self.repo
                    .create_user(NewUser {
                        username: username.to_string(),
                        email: email.to_string(),
                        role: Default::default(),
                        first_name: String::new(),
                        last_name: String::new(),
                        bio: String::new(),
                        confirmation_code_hash: Some(code_hash),
                        is_active: false,
                    })
                    .await?;
                tracing::info!(username = %username, "User registered, pending confirmation");
            }
        }

        dispatch_confirmation(self.sink.as_ref(), email, &code).await;
        Ok(())
    }

    /// Exchange a confirmation code for an access token, activating the
    /// account on success. A mismatch changes no state.
    pub async fn issue_token(&self, username: &str, confirmation_code: &str) -> Result<String> {
        self.check_reserved(username)?;

        let user = self
            .repo
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound {
                username: username.to_string(),
            })?;

        match user.confirmation_code_hash.as_deref() {
            Some(stored) if verify_confirmation_code(confirmation_code, stored) => {
                self.repo.activate_user(user.id).await?;
                tracing::info!(username = %username, "Account confirmed, token issued");
                self.jwt.generate_token(&user.username)
            }
            _ => Err(AppError::ConfirmationCodeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing_user(id: i64, username: &str, email: &str) -> User {
        User {
            id,
            username: username.into(),
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: "user".into(),
            is_superuser: false,
            is_staff: false,
            confirmation_code_hash: None,
            is_active: false,
            date_joined: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn test_signup_fresh_pair_creates_inactive_account() {
        let outcome = resolve_signup(None, None, "a@x.com").unwrap();
        assert_eq!(outcome, SignupOutcome::CreateInactive);
    }

    #[test]
    fn test_signup_same_pair_regenerates_code() {
        let alice = existing_user(7, "alice", "a@x.com");
        let outcome = resolve_signup(Some(&alice), Some(&alice), "a@x.com").unwrap();
        assert_eq!(outcome, SignupOutcome::RegenerateCode { user_id: 7 });
    }

    #[test]
    fn test_signup_username_taken_with_other_email_conflicts() {
        let alice = existing_user(7, "alice", "a@x.com");
        let err = resolve_signup(Some(&alice), None, "other@x.com").unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[test]
    fn test_signup_email_taken_by_other_username_conflicts() {
        let bob = existing_user(8, "bob", "b@x.com");
        let err = resolve_signup(None, Some(&bob), "b@x.com").unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[test]
    fn test_reserved_name_rejected_case_sensitively() {
        assert!(matches!(
            ensure_not_reserved("me", "me"),
            Err(AppError::Validation { .. })
        ));
        assert!(ensure_not_reserved("Me", "me").is_ok());
        assert!(ensure_not_reserved("alice", "me").is_ok());
    }

    #[test]
    fn test_username_pattern() {
        assert!(is_valid_username("alice"));
        assert!(is_valid_username("_alice"));
        assert!(is_valid_username("alice_42"));
        assert!(!is_valid_username("1alice"));
        assert!(!is_valid_username("alice-42"));
        assert!(!is_valid_username("al ice"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(USERNAME_MAX_LEN + 1)));
    }

    #[test]
    fn test_confirmation_code_is_url_safe_and_unique() {
        let a = generate_confirmation_code();
        let b = generate_confirmation_code();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_confirmation_code_verification() {
        let code = generate_confirmation_code();
        let hash = hash_confirmation_code(&code);
        assert!(verify_confirmation_code(&code, &hash));
        assert!(!verify_confirmation_code("wrong_code", &hash));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let token = manager.generate_token("alice").unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_jwt_rejects_tampering() {
        let manager = JwtManager::new("test_secret", 3600);
        let other = JwtManager::new("other_secret", 3600);

        let token = manager.generate_token("alice").unwrap();
        assert!(matches!(
            other.validate_token(&token),
            Err(AppError::InvalidToken)
        ));
    }
}
