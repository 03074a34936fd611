//! # Habitrack API Server Library
//!
//! HTTP surface over `habitrack-shared`: configuration, the axum router,
//! request validation, error mapping and per-user rate limiting.

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
