//! shelfgate: a media library server with per-user content restrictions.
//!
//! Series and books live in a SQLite catalog and are served over a JSON
//! API and OPDS 1.2 feeds. Every listing goes through the same search
//! pipeline: a condition tree over book or series fields, optional
//! full-text terms, and the requesting user's access rules.
//!
//! # Features
//!
//! - Nested `allOf`/`anyOf` search conditions over typed fields
//! - Relative date operators (`isInTheLast`, `isNotInTheLast`)
//! - Library sharing per user
//! - Age rating and sharing-label restrictions
//! - API key authentication with optional anonymous access
//! - Paged results with restrictions applied before pagination

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Content access rules and restriction checks.
pub mod access;
/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Library and book models.
pub mod library;
/// OPDS feed generation.
pub mod opds;
/// Tri-state fields for partial updates.
pub mod patch;
/// Search conditions and their evaluation.
pub mod search;
/// HTTP server.
pub mod server;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
