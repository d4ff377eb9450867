//! Persistence and domain layer for a social micro-blogging application.
//!
//! User accounts with password authentication, a directed follow graph,
//! short text posts, and a following-aware feed query, all backed by SQLite
//! through `sqlx`. Callers (route handlers, CLI) drive the layer through the
//! async repository functions in [`db`].

pub mod auth;
pub mod avatar;
pub mod config;
pub mod db;
pub mod session;
