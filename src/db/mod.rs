//! Database module: entity models and SQL repositories.
//!
//! This module is split into two submodules:
//! - `model`: typed domain entities returned by repositories.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! External modules should import from `microblog::db` — we re-export the
//! repository API and the domain models for convenience.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{Post, User};
