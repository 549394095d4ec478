//! Library crate for live-quiz-back, exposing modules for binaries and integration tests.

/// Application configuration loading.
pub mod config;
/// Storage traits and backends.
pub mod dao;
/// HTTP request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers and handlers.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared application state, session state machine and in-process registries.
pub mod state;
