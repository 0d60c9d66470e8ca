//! Condition language used to filter books and series.

pub mod condition;
pub mod duration;
pub mod operator;
pub mod wire;

pub use condition::{
    Author, AuthorMatch, BookCondition, BookFields, Conditions, EvalContext, MediaStatus,
    ReadStatus, SeriesCondition, SeriesFields, SeriesStatus,
};
pub use operator::{
    BooleanOp, CaseSensitivity, DateOp, Equality, Numeric, NumericNullable, StringOp, ValueKind,
};
pub use wire::{BookSearch, SearchRequest, SeriesSearch};
