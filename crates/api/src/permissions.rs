//! Permission policy
//!
//! Pure decision functions over (role, ownership, action). Handlers evaluate
//! the policy before touching storage; a deny terminates the request with no
//! side effects.

use revu_common::{
    db::models::User,
    errors::{AppError, Result},
};

/// What a request wants to do with a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn is_safe(&self) -> bool {
        matches!(self, Action::Read)
    }
}

/// Reads for anyone; writes require admin. Used by the title, category and
/// genre controllers.
pub fn admin_or_read_only(user: &User, action: Action) -> bool {
    action.is_safe() || user.is_admin()
}

/// Reads for anyone; create for any authenticated active user; update/delete
/// for the author or a moderator/admin. Used by the review and comment
/// controllers.
pub fn user_or_read_only(user: &User, is_owner: bool, action: Action) -> bool {
    match action {
        Action::Read | Action::Create => true,
        Action::Update | Action::Delete => is_owner || user.is_moderator() || user.is_admin(),
    }
}

/// Every action requires admin. Used by the user controller (the "me"
/// sub-operation only requires authentication and bypasses this policy).
pub fn admin_only(user: &User) -> bool {
    user.is_admin()
}

/// Turn a policy decision into a request outcome
pub fn require(allowed: bool) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: "You do not have permission to perform this action".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_role(role: &str) -> User {
        User {
            id: 1,
            username: "alice".into(),
            email: "a@x.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: role.into(),
            is_superuser: false,
            is_staff: false,
            confirmation_code_hash: None,
            is_active: true,
            date_joined: chrono::Utc::now().into(),
        }
    }

    #[test]
    fn test_admin_or_read_only() {
        let user = user_with_role("user");
        let moderator = user_with_role("moderator");
        let admin = user_with_role("admin");

        for u in [&user, &moderator, &admin] {
            assert!(admin_or_read_only(u, Action::Read));
        }
        for action in [Action::Create, Action::Update, Action::Delete] {
            assert!(!admin_or_read_only(&user, action));
            assert!(!admin_or_read_only(&moderator, action));
            assert!(admin_or_read_only(&admin, action));
        }
    }

    #[test]
    fn test_admin_or_read_only_staff_flag() {
        let mut staff = user_with_role("user");
        staff.is_staff = true;
        assert!(admin_or_read_only(&staff, Action::Delete));
    }

    #[test]
    fn test_user_or_read_only() {
        let user = user_with_role("user");
        let moderator = user_with_role("moderator");
        let admin = user_with_role("admin");

        // Anyone authenticated may create
        assert!(user_or_read_only(&user, false, Action::Create));

        // Mutation needs ownership or elevation
        for action in [Action::Update, Action::Delete] {
            assert!(user_or_read_only(&user, true, action));
            assert!(!user_or_read_only(&user, false, action));
            assert!(user_or_read_only(&moderator, false, action));
            assert!(user_or_read_only(&admin, false, action));
        }
    }

    #[test]
    fn test_admin_only() {
        assert!(!admin_only(&user_with_role("user")));
        assert!(!admin_only(&user_with_role("moderator")));
        assert!(admin_only(&user_with_role("admin")));
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        assert!(require(true).is_ok());
        assert!(matches!(require(false), Err(AppError::Forbidden { .. })));
    }
}
