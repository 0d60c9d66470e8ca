//! Authentication and per-user access settings.

use crate::access::{AgeRestriction, ContentRestrictions, SearchContext};
use crate::db::{Database, ROLE_ADMIN, ROLE_USER, User, now_timestamp};
use crate::error::{AppError, Result};
use crate::patch::Patch;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Generate a random API key.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Partial update of a user's access settings.
///
/// Every field is tri-state: a missing key leaves the setting untouched,
/// `null` clears it, a value replaces it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AccessUpdate {
    /// Share every library.
    #[serde(default)]
    pub shared_all_libraries: Patch<bool>,
    /// Libraries shared when not sharing all.
    #[serde(default)]
    pub shared_library_ids: Patch<BTreeSet<String>>,
    /// Age restriction.
    #[serde(default)]
    pub age_restriction: Patch<AgeRestriction>,
    /// Allowed sharing labels.
    #[serde(default)]
    pub labels_allow: Patch<BTreeSet<String>>,
    /// Excluded sharing labels.
    #[serde(default)]
    pub labels_exclude: Patch<BTreeSet<String>>,
}

impl AccessUpdate {
    /// Apply to `user` in place.
    pub fn apply_to(self, user: &mut User) -> Result<()> {
        if let Patch::Present(restriction) = &self.age_restriction
            && restriction.age < 0
        {
            return Err(AppError::InvalidRequest(
                "Age restriction must not be negative".to_string(),
            ));
        }

        user.shared_all_libraries = self
            .shared_all_libraries
            .apply_or_default(user.shared_all_libraries);
        user.shared_library_ids = self
            .shared_library_ids
            .apply_or_default(std::mem::take(&mut user.shared_library_ids));

        let settings = &mut user.restrictions;
        settings.age_restriction = self.age_restriction.apply(settings.age_restriction);
        settings.labels_allow = self
            .labels_allow
            .apply_or_default(std::mem::take(&mut settings.labels_allow));
        settings.labels_exclude = self
            .labels_exclude
            .apply_or_default(std::mem::take(&mut settings.labels_exclude));
        Ok(())
    }
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    anonymous_access: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, anonymous_access: bool) -> Self {
        Self {
            db,
            anonymous_access,
        }
    }

    /// Create a new user sharing every library, without restrictions.
    pub fn create_user(&self, username: &str, role: &str) -> Result<User> {
        // Validate username
        if username.is_empty() || username.len() > 64 {
            return Err(AppError::InvalidRequest(
                "Username must be 1-64 characters".to_string(),
            ));
        }

        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::InvalidRequest(
                "Username can only contain letters, numbers, _ and -".to_string(),
            ));
        }

        // Validate role
        if role != ROLE_ADMIN && role != ROLE_USER {
            return Err(AppError::InvalidRequest(
                "Role must be 'admin' or 'user'".to_string(),
            ));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            api_key: generate_api_key(),
            role: role.to_string(),
            shared_all_libraries: true,
            shared_library_ids: BTreeSet::new(),
            restrictions: Default::default(),
            created_at: now_timestamp(),
        };

        self.db.create_user(&user)?;
        tracing::info!(user = %user.username, role = %user.role, "User created");
        Ok(user)
    }

    /// Resolve an API key to its user.
    pub fn authenticate(&self, api_key: &str) -> Result<Option<User>> {
        if api_key.is_empty() {
            return Ok(None);
        }
        self.db.get_user_by_api_key(api_key)
    }

    /// Search context of a request. `None` is an unauthenticated request,
    /// allowed only when anonymous access is enabled.
    pub fn context_for_request(&self, user: Option<&User>) -> Result<SearchContext> {
        match user {
            Some(user) => Ok(context_for(user)),
            None if self.anonymous_access => Ok(SearchContext::of_anonymous_user()),
            None => Err(AppError::Unauthorized("Missing API key".to_string())),
        }
    }

    /// Apply a partial access update to the user with `user_id`.
    pub fn update_access(&self, user_id: &str, update: AccessUpdate) -> Result<User> {
        let mut user = self
            .db
            .get_user_by_id(user_id)?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        update.apply_to(&mut user)?;
        if !self.db.update_user_access(&user)? {
            return Err(AppError::NotFound(format!("User {}", user_id)));
        }

        tracing::info!(
            user = %user.username,
            shared_all = user.shared_all_libraries,
            libraries = user.shared_library_ids.len(),
            "Access settings updated"
        );
        Ok(user)
    }

    /// Delete a user.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.db.delete_user(username)
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Check if a user is admin.
    pub fn is_admin(&self, user: &User) -> bool {
        user.role == ROLE_ADMIN
    }
}

/// Search context of an authenticated user.
pub fn context_for(user: &User) -> SearchContext {
    let libraries = if user.shared_all_libraries {
        None
    } else {
        Some(user.shared_library_ids.clone())
    };

    SearchContext::new(
        user.id.clone(),
        ContentRestrictions::derive(&user.restrictions),
        libraries,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AllowExclude;
    use serde_json::json;

    fn user() -> User {
        User {
            id: "u1".into(),
            username: "reader".into(),
            api_key: "key".into(),
            role: ROLE_USER.into(),
            shared_all_libraries: true,
            shared_library_ids: BTreeSet::new(),
            restrictions: Default::default(),
            created_at: 0,
        }
    }

    #[test]
    fn test_generate_api_key() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();

        assert_eq!(key1.len(), 43); // Base64 of 32 bytes
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_access_update_tri_state() {
        let mut user = user();
        user.restrictions.labels_exclude = ["adult".to_string()].into_iter().collect();

        let update: AccessUpdate = serde_json::from_value(json!({
            "sharedAllLibraries": false,
            "sharedLibraryIds": ["L1"],
            "ageRestriction": {"age": 12, "mode": "ALLOW_ONLY"}
        }))
        .unwrap();
        update.apply_to(&mut user).unwrap();

        assert!(!user.shared_all_libraries);
        assert!(user.shared_library_ids.contains("L1"));
        assert_eq!(
            user.restrictions.age_restriction.map(|r| r.mode),
            Some(AllowExclude::AllowOnly)
        );
        // Untouched by the update
        assert!(user.restrictions.labels_exclude.contains("adult"));

        let clear: AccessUpdate =
            serde_json::from_value(json!({"ageRestriction": null, "labelsExclude": null})).unwrap();
        clear.apply_to(&mut user).unwrap();
        assert!(user.restrictions.age_restriction.is_none());
        assert!(user.restrictions.labels_exclude.is_empty());
        assert!(user.shared_library_ids.contains("L1"));
    }

    #[test]
    fn test_access_update_rejects_negative_age() {
        let update: AccessUpdate =
            serde_json::from_value(json!({"ageRestriction": {"age": -1, "mode": "EXCLUDE"}}))
                .unwrap();
        assert!(matches!(
            update.apply_to(&mut user()),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_context_for_user() {
        let mut user = user();
        assert!(context_for(&user).authorized_library_ids().is_none());

        user.shared_all_libraries = false;
        user.shared_library_ids = ["L2".to_string()].into_iter().collect();
        user.restrictions.age_restriction = Some(AgeRestriction::exclude(16));

        let ctx = context_for(&user);
        assert_eq!(ctx.user_id(), Some("u1"));
        assert!(ctx.restrictions().is_restricted());
        assert!(ctx.authorized_library_ids().is_some_and(|ids| ids.contains("L2")));
    }
}
