use super::model::{Post, User, MAX_ABOUT_ME_LEN, MAX_POST_BODY_LEN};
use crate::auth;
use anyhow::{anyhow, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    // WAL + FULL for durability; foreign_keys so deletes cascade to posts
    // and follow edges on every pooled connection.
    let opts = SqliteConnectOptions::from_str(&normalized)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    // Pass through non-sqlite schemes
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    // Strip prefix and optional //
    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    // Separate query string if any
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        // nothing to normalize
        return url.to_string();
    }

    // Expand leading ~/ to HOME
    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    // Ensure parent directory exists if any
    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Rebuild URL, prefer sqlite:// form
    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// True when the error wraps a storage-level uniqueness violation (duplicate
/// username or email). Callers translate this into a user-facing message.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.is_unique_violation(),
        _ => false,
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, about_me, last_seen, created_at";

#[instrument(skip_all)]
pub async fn create_user(
    pool: &Pool,
    username: &str,
    email: &str,
    password: Option<&str>,
) -> Result<i64> {
    auth::validate_username(username).map_err(|msg| anyhow!("{msg}"))?;
    auth::validate_email(email).map_err(|msg| anyhow!("{msg}"))?;
    let password_hash = match password {
        Some(pw) => Some(auth::hash_password(pw)?),
        None => None,
    };

    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, last_seen, created_at) \
         VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn get_user(pool: &Pool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn get_user_by_username(pool: &Pool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

#[instrument(skip_all)]
pub async fn update_about_me(pool: &Pool, user_id: i64, about_me: Option<&str>) -> Result<()> {
    if let Some(text) = about_me {
        if text.chars().count() > MAX_ABOUT_ME_LEN {
            return Err(anyhow!("about_me must be at most {MAX_ABOUT_ME_LEN} characters"));
        }
    }
    sqlx::query("UPDATE users SET about_me = ? WHERE id = ?")
        .bind(about_me)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn touch_last_seen(pool: &Pool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Derive and store a salted hash for the user's new password.
#[instrument(skip_all)]
pub async fn set_password(pool: &Pool, user_id: i64, password: &str) -> Result<()> {
    let hash = auth::hash_password(password)?;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Login path: look the user up by username and verify the password.
/// Returns None for an unknown username or a failed check.
#[instrument(skip_all)]
pub async fn authenticate(pool: &Pool, username: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = get_user_by_username(pool, username).await? else {
        return Ok(None);
    };
    if user.check_password(password) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Administrative removal. Posts and follow edges cascade.
#[instrument(skip_all)]
pub async fn delete_user(pool: &Pool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Add the directed edge (follower -> followed). Idempotent: the composite
/// primary key on the edge table turns a re-follow into a no-op.
#[instrument(skip_all)]
pub async fn follow(pool: &Pool, follower_id: i64, followed_id: i64) -> Result<()> {
    sqlx::query(
        "INSERT INTO followers (follower_id, followed_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT(follower_id, followed_id) DO NOTHING",
    )
    .bind(follower_id)
    .bind(followed_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove the directed edge (follower -> followed). Idempotent.
#[instrument(skip_all)]
pub async fn unfollow(pool: &Pool, follower_id: i64, followed_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM followers WHERE follower_id = ? AND followed_id = ?")
        .bind(follower_id)
        .bind(followed_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn is_following(pool: &Pool, follower_id: i64, followed_id: i64) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM followers WHERE follower_id = ? AND followed_id = ?",
    )
    .bind(follower_id)
    .bind(followed_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// Users the given user follows, evaluated on demand.
#[instrument(skip_all)]
pub async fn followed_users(pool: &Pool, user_id: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email, u.password_hash, u.about_me, u.last_seen, u.created_at \
         FROM users u JOIN followers f ON f.followed_id = u.id \
         WHERE f.follower_id = ? ORDER BY u.username",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Users following the given user, evaluated on demand.
#[instrument(skip_all)]
pub async fn followers_of(pool: &Pool, user_id: i64) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email, u.password_hash, u.about_me, u.last_seen, u.created_at \
         FROM users u JOIN followers f ON f.follower_id = u.id \
         WHERE f.followed_id = ? ORDER BY u.username",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

#[instrument(skip_all)]
pub async fn following_count(pool: &Pool, user_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM followers WHERE follower_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn followers_count(pool: &Pool, user_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM followers WHERE followed_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[instrument(skip_all)]
pub async fn create_post(pool: &Pool, user_id: i64, body: &str) -> Result<i64> {
    if body.trim().is_empty() {
        return Err(anyhow!("post body must be non-empty"));
    }
    if body.chars().count() > MAX_POST_BODY_LEN {
        return Err(anyhow!("post body must be at most {MAX_POST_BODY_LEN} characters"));
    }
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO posts (user_id, body, timestamp) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(body)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn get_post(pool: &Pool, id: i64) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        "SELECT id, user_id, body, timestamp FROM posts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(post)
}

#[instrument(skip_all)]
pub async fn delete_post(pool: &Pool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Posts authored by the given user, newest first.
#[instrument(skip_all)]
pub async fn user_posts(pool: &Pool, user_id: i64) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        "SELECT id, user_id, body, timestamp FROM posts WHERE user_id = ? \
         ORDER BY timestamp DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}

/// The feed: union of posts authored by followed users (join on the edge
/// table) and the caller's own posts, newest first. Ties on timestamp break
/// on id, so equal-timestamp order is deterministic. Evaluated against
/// current data at call time; nothing is materialized.
#[instrument(skip_all)]
pub async fn followed_posts(pool: &Pool, user_id: i64) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        "SELECT p.id, p.user_id, p.body, p.timestamp \
           FROM posts p JOIN followers f ON f.followed_id = p.user_id \
          WHERE f.follower_id = ?1 \
         UNION \
         SELECT p.id, p.user_id, p.body, p.timestamp \
           FROM posts p WHERE p.user_id = ?1 \
         ORDER BY timestamp DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(posts)
}
