//! Account service seam.
//!
//! The tracking core only needs to know who is signed in and which internal
//! user id to stamp on location rows. Sign-in and sign-up flows live in the
//! backend's own SDK and are not modeled here.

use parking_lot::RwLock;

use crate::types::{BoxFuture, UserId};

use super::StoreError;

/// The signed-in user, resolved to the internal profile id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    /// Identifier issued by the auth provider.
    pub auth_id: String,
    /// Internal user (profile) id used in trip, booking and location rows.
    pub user_id: UserId,
    /// Name shown on map popups and chat, if known.
    pub display_name: Option<String>,
}

impl CurrentUser {
    /// Create a user without a display name.
    pub fn new(auth_id: impl Into<String>, user_id: impl Into<UserId>) -> Self {
        Self {
            auth_id: auth_id.into(),
            user_id: user_id.into(),
            display_name: None,
        }
    }

    /// Attach a display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Resolves the current session's user.
pub trait AccountService: Send + Sync {
    /// The signed-in user, or `None` when signed out.
    fn current_user(&self) -> BoxFuture<'_, Result<Option<CurrentUser>, StoreError>>;
}

/// Account service with a user set in process.
#[derive(Debug, Default)]
pub struct StaticAccount {
    user: RwLock<Option<CurrentUser>>,
}

impl StaticAccount {
    /// An account service with `user` signed in.
    pub fn signed_in(user: CurrentUser) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    /// An account service with nobody signed in.
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Replace the signed-in user.
    pub fn sign_in(&self, user: CurrentUser) {
        *self.user.write() = Some(user);
    }

    /// Sign the current user out.
    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

impl AccountService for StaticAccount {
    fn current_user(&self) -> BoxFuture<'_, Result<Option<CurrentUser>, StoreError>> {
        let user = self.user.read().clone();
        Box::pin(async move { Ok(user) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let account = StaticAccount::signed_out();
        assert!(account.current_user().await.unwrap().is_none());

        account.sign_in(CurrentUser::new("auth-1", "user-1").with_display_name("Yassine"));
        let user = account.current_user().await.unwrap().unwrap();
        assert_eq!(user.user_id, UserId::new("user-1"));
        assert_eq!(user.display_name.as_deref(), Some("Yassine"));

        account.sign_out();
        assert!(account.current_user().await.unwrap().is_none());
    }
}
