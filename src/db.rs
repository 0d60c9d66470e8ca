mod schema;

pub use schema::Database;

use crate::access::RestrictionSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role name of administrators.
pub const ROLE_ADMIN: &str = "admin";

/// Role name of regular users.
pub const ROLE_USER: &str = "user";

/// User account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Username.
    pub username: String,
    /// API key used as Bearer token.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// User role: "admin" or "user".
    pub role: String,
    /// Access to every library, present and future.
    pub shared_all_libraries: bool,
    /// Libraries shared with this user when not sharing all.
    pub shared_library_ids: BTreeSet<String>,
    /// Raw content restriction preferences.
    pub restrictions: RestrictionSettings,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// Library collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    /// Unique library ID.
    pub id: String,
    /// Library name.
    pub name: String,
    /// Root path on the filesystem.
    #[serde(default)]
    pub path: String,
    /// Creation timestamp.
    #[serde(default = "now_timestamp")]
    pub created_at: i64,
}

/// Reading progress of one user on one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadProgress {
    /// User ID.
    pub user_id: String,
    /// Book ID.
    pub book_id: String,
    /// Last page read.
    pub page: u32,
    /// Book finished.
    pub completed: bool,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
