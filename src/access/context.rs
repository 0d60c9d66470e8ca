//! Per-request search context.

use super::restriction::ContentRestrictions;
use std::collections::BTreeSet;

/// Principal id used for anonymous read paths.
pub const ANONYMOUS_USER_ID: &str = "anonymous";

/// Who is searching, what they may see, and in which libraries.
///
/// Built once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    user_id: Option<String>,
    restrictions: ContentRestrictions,
    authorized_library_ids: Option<BTreeSet<String>>,
}

impl SearchContext {
    /// Context for an authenticated user. `None` libraries means all.
    pub fn new(
        user_id: impl Into<String>,
        restrictions: ContentRestrictions,
        authorized_library_ids: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            restrictions,
            authorized_library_ids,
        }
    }

    /// Trusted context: no principal, no restriction, every library.
    pub fn empty() -> Self {
        Self {
            user_id: None,
            restrictions: ContentRestrictions::none(),
            authorized_library_ids: None,
        }
    }

    /// Anonymous reader: sentinel principal, no restriction, every library.
    pub fn of_anonymous_user() -> Self {
        Self {
            user_id: Some(ANONYMOUS_USER_ID.to_string()),
            restrictions: ContentRestrictions::none(),
            authorized_library_ids: None,
        }
    }

    /// Principal id, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Effective content restrictions.
    pub fn restrictions(&self) -> &ContentRestrictions {
        &self.restrictions
    }

    /// Authorized libraries; `None` means every library.
    pub fn authorized_library_ids(&self) -> Option<&BTreeSet<String>> {
        self.authorized_library_ids.as_ref()
    }

    /// Whether this context belongs to the anonymous sentinel.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.as_deref() == Some(ANONYMOUS_USER_ID)
    }
}
