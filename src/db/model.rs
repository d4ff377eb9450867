use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::avatar;

/// Column bounds, mirrored by the schema in `migrations/`.
pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_EMAIL_LEN: usize = 120;
pub const MAX_ABOUT_ME_LEN: usize = 140;
pub const MAX_POST_BODY_LEN: usize = 140;

/// A registered account. `password_hash` is an argon2 PHC string; it is null
/// until the first `set_password`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Verify a plaintext password against the stored hash. Returns false on
    /// mismatch or when no password has been set, never an error.
    pub fn check_password(&self, password: &str) -> bool {
        match self.password_hash.as_deref() {
            Some(hash) => auth::verify_password(hash, password),
            None => false,
        }
    }

    /// Avatar URL for this user at the given pixel size.
    pub fn avatar(&self, size: u32) -> String {
        avatar::gravatar_url(&self.email, size)
    }
}

/// A short text post authored by a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}
