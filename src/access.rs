//! Per-user content access policy.

pub mod checker;
pub mod context;
pub mod restriction;

pub use checker::{Access, ContentAttributes, DenialReason, check_access, ensure_access};
pub use context::SearchContext;
pub use restriction::{
    AgeRestriction, AllowExclude, ContentRestrictions, LabelRestriction, RestrictionSettings,
};
