//! Content access decisions.
//!
//! The same [`check_access`] call guards direct lookups and every search
//! result, so the two paths cannot disagree.

use super::context::SearchContext;
use super::restriction::ContentRestrictions;
use crate::error::{AppError, Result};

/// Attributes an access decision looks at. For a book these come from its
/// library and its series.
pub trait ContentAttributes {
    /// Owning library.
    fn library_id(&self) -> &str;
    /// Age rating, if rated.
    fn age_rating(&self) -> Option<i32>;
    /// Sharing labels.
    fn sharing_labels(&self) -> &[String];
}

/// Why access was refused. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// Library outside the authorized scope.
    LibraryScope,
    /// Age or label restriction.
    ContentRestricted,
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Visible.
    Allowed,
    /// Hidden.
    Denied(DenialReason),
}

impl Access {
    /// Whether the entity is visible.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }
}

/// Whether `context` may see anything in `library_id`.
pub fn can_access_library(context: &SearchContext, library_id: &str) -> bool {
    context
        .authorized_library_ids()
        .is_none_or(|ids| ids.contains(library_id))
}

/// Whether content with `age_rating` and `labels` passes every restriction
/// component. Missing components impose nothing.
pub fn is_content_allowed(
    restrictions: &ContentRestrictions,
    age_rating: Option<i32>,
    labels: &[String],
) -> bool {
    restrictions
        .age_restriction()
        .is_none_or(|r| r.allows(age_rating))
        && restrictions
            .labels_allow_restriction()
            .is_none_or(|r| r.allows(labels))
        && restrictions
            .labels_exclude_restriction()
            .is_none_or(|r| r.allows(labels))
}

/// Decide whether `context` may see `entity`. Library scope is checked first.
pub fn check_access<E: ContentAttributes + ?Sized>(context: &SearchContext, entity: &E) -> Access {
    if !can_access_library(context, entity.library_id()) {
        return Access::Denied(DenialReason::LibraryScope);
    }

    let restrictions = context.restrictions();
    if restrictions.is_restricted()
        && !is_content_allowed(restrictions, entity.age_rating(), entity.sharing_labels())
    {
        return Access::Denied(DenialReason::ContentRestricted);
    }

    Access::Allowed
}

/// [`check_access`] for a direct lookup, mapping a denial to
/// [`AppError::AccessDenied`]. Call only for an entity known to exist.
pub fn ensure_access<E: ContentAttributes + ?Sized>(
    context: &SearchContext,
    entity: &E,
    entity_id: &str,
) -> Result<()> {
    match check_access(context, entity) {
        Access::Allowed => Ok(()),
        Access::Denied(reason) => {
            tracing::info!(
                user = context.user_id().unwrap_or("-"),
                entity = entity_id,
                reason = ?reason,
                "Access denied"
            );
            Err(AppError::AccessDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::restriction::{AgeRestriction, RestrictionSettings};
    use std::collections::BTreeSet;

    struct Item {
        library: &'static str,
        age: Option<i32>,
        labels: Vec<String>,
    }

    impl Item {
        fn new(library: &'static str, age: Option<i32>, labels: &[&str]) -> Self {
            Self {
                library,
                age,
                labels: labels.iter().map(|l| l.to_string()).collect(),
            }
        }
    }

    impl ContentAttributes for Item {
        fn library_id(&self) -> &str {
            self.library
        }
        fn age_rating(&self) -> Option<i32> {
            self.age
        }
        fn sharing_labels(&self) -> &[String] {
            &self.labels
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn context(settings: RestrictionSettings, libraries: Option<&[&str]>) -> SearchContext {
        SearchContext::new(
            "user-1",
            ContentRestrictions::derive(&settings),
            libraries.map(set),
        )
    }

    #[test]
    fn age_allow_only_scenario() {
        let ctx = context(
            RestrictionSettings {
                age_restriction: Some(AgeRestriction::allow_only(12)),
                ..Default::default()
            },
            None,
        );

        assert_eq!(
            check_access(&ctx, &Item::new("L1", Some(15), &[])),
            Access::Denied(DenialReason::ContentRestricted)
        );
        assert!(check_access(&ctx, &Item::new("L1", None, &[])).is_allowed());
    }

    #[test]
    fn label_exclusion_scenario() {
        let ctx = context(
            RestrictionSettings {
                labels_exclude: set(&["adult"]),
                ..Default::default()
            },
            None,
        );

        assert!(!check_access(&ctx, &Item::new("L1", None, &["adult", "kids"])).is_allowed());
        assert!(check_access(&ctx, &Item::new("L1", None, &["kids"])).is_allowed());
    }

    #[test]
    fn label_allow_requires_overlap() {
        let ctx = context(
            RestrictionSettings {
                labels_allow: set(&["kids"]),
                ..Default::default()
            },
            None,
        );

        assert!(check_access(&ctx, &Item::new("L1", None, &["Kids"])).is_allowed());
        assert!(!check_access(&ctx, &Item::new("L1", None, &[])).is_allowed());
    }

    #[test]
    fn library_scope_checked_before_content() {
        let ctx = context(
            RestrictionSettings {
                age_restriction: Some(AgeRestriction::exclude(18)),
                ..Default::default()
            },
            Some(&["L1"]),
        );

        assert_eq!(
            check_access(&ctx, &Item::new("L2", Some(18), &[])),
            Access::Denied(DenialReason::LibraryScope)
        );
        assert_eq!(
            check_access(&ctx, &Item::new("L2", None, &[])),
            Access::Denied(DenialReason::LibraryScope)
        );
        assert!(matches!(
            ensure_access(&ctx, &Item::new("L2", None, &[]), "b1"),
            Err(AppError::AccessDenied)
        ));
        assert!(ensure_access(&ctx, &Item::new("L1", Some(3), &[]), "b2").is_ok());
    }

    #[test]
    fn empty_library_scope_denies_everything() {
        let ctx = context(RestrictionSettings::default(), Some(&[]));
        assert!(!can_access_library(&ctx, "L1"));
        assert!(can_access_library(&SearchContext::empty(), "L1"));
    }

    #[test]
    fn removing_a_component_never_revokes_access() {
        let full = RestrictionSettings {
            age_restriction: Some(AgeRestriction::allow_only(12)),
            labels_allow: set(&["kids", "teen"]),
            labels_exclude: set(&["adult"]),
        };

        let reduced = [
            RestrictionSettings {
                age_restriction: None,
                ..full.clone()
            },
            RestrictionSettings {
                labels_allow: BTreeSet::new(),
                ..full.clone()
            },
            RestrictionSettings {
                labels_exclude: BTreeSet::new(),
                ..full.clone()
            },
            RestrictionSettings::default(),
        ];

        let label_sets: [&[&str]; 5] = [&[], &["kids"], &["adult"], &["teen", "adult"], &["other"]];
        let full_restrictions = ContentRestrictions::derive(&full);

        for age in [None, Some(0), Some(12), Some(13), Some(18)] {
            for labels in label_sets {
                let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                if !is_content_allowed(&full_restrictions, age, &labels) {
                    continue;
                }
                for settings in &reduced {
                    let restrictions = ContentRestrictions::derive(settings);
                    assert!(
                        is_content_allowed(&restrictions, age, &labels),
                        "{settings:?} revoked access for {age:?} {labels:?}"
                    );
                }
            }
        }
    }
}
