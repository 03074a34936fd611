//! # Habitrack Shared Library
//!
//! Domain core of Habitrack: storage models, the aggregation engine that
//! nests join rows into habit and tag views, the scoping and soft-delete
//! policy, and the transactional operations built on top of them.
//!
//! ## Module Organization
//!
//! - `models`: database models and their SQL
//! - `aggregate`: flat join rows to nested views
//! - `policy`: per-user scoping, soft-delete and write checks
//! - `service`: the operations exposed to the API
//! - `patch`: tri-state fields for partial updates
//! - `auth`: passwords, tokens, bearer middleware
//! - `db`: connection pool and migrations
//! - `error`: the core error taxonomy

pub mod aggregate;
pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod patch;
pub mod policy;
pub mod service;

/// Current version of the Habitrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
