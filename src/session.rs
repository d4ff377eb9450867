//! Auth-session component.
//!
//! The session resolves the "current user" for a request through a
//! [`UserLoader`] passed in explicitly at construction time, rather than a
//! process-wide registration hook. Production code hands it the sqlx pool;
//! tests hand it a mock.

use crate::db::model::User;
use crate::db::{self, Pool};
use anyhow::Result;
use async_trait::async_trait;

/// Lookup-by-id seam used to resolve the current user.
#[async_trait]
pub trait UserLoader: Send + Sync {
    async fn load_user(&self, id: i64) -> Result<Option<User>>;
}

#[async_trait]
impl UserLoader for Pool {
    async fn load_user(&self, id: i64) -> Result<Option<User>> {
        db::get_user(self, id).await
    }
}

/// Per-request session state: at most one logged-in user id.
pub struct AuthSession<L> {
    loader: L,
    user_id: Option<i64>,
}

impl<L: UserLoader> AuthSession<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            user_id: None,
        }
    }

    pub fn log_in(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
    }

    pub fn log_out(&mut self) {
        self.user_id = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Resolve the logged-in user. None when logged out, or when the stored
    /// id no longer resolves (the account was deleted underneath the session).
    pub async fn current_user(&self) -> Result<Option<User>> {
        match self.user_id {
            Some(id) => self.loader.load_user(id).await,
            None => Ok(None),
        }
    }
}
