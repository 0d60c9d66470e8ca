//! Content restrictions derived from user preferences.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether a restriction lists what is allowed or what is excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowExclude {
    /// Only matching content is visible.
    AllowOnly,
    /// Matching content is hidden.
    Exclude,
}

/// Age-rating restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgeRestriction {
    /// Threshold age.
    pub age: i32,
    /// How the threshold applies.
    pub mode: AllowExclude,
}

impl AgeRestriction {
    /// Only content rated at most `age` (or unrated).
    pub fn allow_only(age: i32) -> Self {
        Self {
            age,
            mode: AllowExclude::AllowOnly,
        }
    }

    /// Hide content rated `age` or more.
    pub fn exclude(age: i32) -> Self {
        Self {
            age,
            mode: AllowExclude::Exclude,
        }
    }

    /// Whether content with `rating` passes. Unrated content always passes.
    pub fn allows(&self, rating: Option<i32>) -> bool {
        match (self.mode, rating) {
            (_, None) => true,
            (AllowExclude::AllowOnly, Some(rating)) => rating <= self.age,
            (AllowExclude::Exclude, Some(rating)) => rating < self.age,
        }
    }
}

/// Sharing-label restriction over a non-empty, normalized label set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LabelRestriction {
    labels: BTreeSet<String>,
    mode: AllowExclude,
}

impl LabelRestriction {
    /// Normalized labels (never empty).
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    /// Allow-list or exclusion list.
    pub fn mode(&self) -> AllowExclude {
        self.mode
    }

    /// Whether content carrying `labels` passes. Labels are normalized
    /// before comparison.
    pub fn allows<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let shared = labels
            .into_iter()
            .filter_map(|l| normalize_label(l))
            .any(|l| self.labels.contains(&l));

        match self.mode {
            AllowExclude::AllowOnly => shared,
            AllowExclude::Exclude => !shared,
        }
    }
}

/// Restriction preferences as stored on a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionSettings {
    /// Age restriction, if any.
    #[serde(default)]
    pub age_restriction: Option<AgeRestriction>,
    /// Labels the user may see.
    #[serde(default)]
    pub labels_allow: BTreeSet<String>,
    /// Labels hidden from the user.
    #[serde(default)]
    pub labels_exclude: BTreeSet<String>,
}

/// Effective restrictions. Built only through [`ContentRestrictions::derive`],
/// so every present component is minimal and normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRestrictions {
    age_restriction: Option<AgeRestriction>,
    labels_allow_restriction: Option<LabelRestriction>,
    labels_exclude_restriction: Option<LabelRestriction>,
}

impl ContentRestrictions {
    /// No restriction at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Derive the effective policy from raw settings.
    ///
    /// Labels are lowercased and trimmed, blanks dropped. An allowed label
    /// that is also excluded is removed from the allow-list, so exclusion
    /// always wins. Empty label sets produce no restriction.
    pub fn derive(settings: &RestrictionSettings) -> Self {
        let exclude = normalize_labels(&settings.labels_exclude);
        let allow: BTreeSet<String> = normalize_labels(&settings.labels_allow)
            .difference(&exclude)
            .cloned()
            .collect();

        Self {
            age_restriction: settings.age_restriction,
            labels_allow_restriction: label_restriction(allow, AllowExclude::AllowOnly),
            labels_exclude_restriction: label_restriction(exclude, AllowExclude::Exclude),
        }
    }

    /// Age restriction, if any.
    pub fn age_restriction(&self) -> Option<&AgeRestriction> {
        self.age_restriction.as_ref()
    }

    /// Allow-list restriction, if any.
    pub fn labels_allow_restriction(&self) -> Option<&LabelRestriction> {
        self.labels_allow_restriction.as_ref()
    }

    /// Exclusion restriction, if any.
    pub fn labels_exclude_restriction(&self) -> Option<&LabelRestriction> {
        self.labels_exclude_restriction.as_ref()
    }

    /// Whether any component is present.
    pub fn is_restricted(&self) -> bool {
        self.age_restriction.is_some()
            || self.labels_allow_restriction.is_some()
            || self.labels_exclude_restriction.is_some()
    }
}

fn label_restriction(labels: BTreeSet<String>, mode: AllowExclude) -> Option<LabelRestriction> {
    (!labels.is_empty()).then_some(LabelRestriction { labels, mode })
}

/// Lowercase and trim a label; `None` when blank.
pub fn normalize_label(label: &str) -> Option<String> {
    let label = label.trim().to_lowercase();
    (!label.is_empty()).then_some(label)
}

/// Normalize a set of labels, dropping blanks.
pub fn normalize_labels<'a, I>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    labels.into_iter().filter_map(|l| normalize_label(l)).collect()
}
