//! Book and series conditions.
//!
//! The two capabilities are two enums: a field that only exists on series
//! (age rating, sharing label, ...) is simply not a [`BookCondition`] variant.
//! Composites hold a [`Conditions`] list that cannot be empty.

use super::operator::{
    BooleanOp, CaseSensitivity, DateOp, Equality, Numeric, NumericNullable, StringOp,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user reading state of a book or series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadStatus {
    /// Never opened.
    Unread,
    /// Started but not finished.
    InProgress,
    /// Finished.
    Read,
}

/// Analysis state of a book file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    /// Not analyzed yet.
    #[default]
    Unknown,
    /// Readable.
    Ready,
    /// Analysis failed.
    Error,
    /// Format not supported.
    Unsupported,
    /// File changed since analysis.
    Outdated,
}

/// Publication state of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeriesStatus {
    /// Finished.
    Ended,
    /// Still publishing.
    #[default]
    Ongoing,
    /// Dropped.
    Abandoned,
    /// Paused.
    Hiatus,
}

/// A credited author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Credit role (writer, penciller, ...).
    pub role: String,
}

/// Author pattern used by `author` conditions. Unset parts match anything,
/// but at least one part must be set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AuthorMatchParts")]
pub struct AuthorMatch {
    /// Author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Credit role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorMatchParts {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl TryFrom<AuthorMatchParts> for AuthorMatch {
    type Error = String;

    fn try_from(parts: AuthorMatchParts) -> std::result::Result<Self, Self::Error> {
        let set = |part: &Option<String>| part.as_deref().is_some_and(|p| !p.trim().is_empty());
        if !set(&parts.name) && !set(&parts.role) {
            return Err("an author match needs a name or a role".to_string());
        }
        Ok(AuthorMatch {
            name: parts.name,
            role: parts.role,
        })
    }
}

impl AuthorMatch {
    fn matches(&self, author: &Author, case: CaseSensitivity) -> bool {
        self.name.as_deref().is_none_or(|n| case.equals(n, &author.name))
            && self.role.as_deref().is_none_or(|r| case.equals(r, &author.role))
    }
}

/// Evaluation inputs that do not come from the entity.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// Reference instant for `isInTheLast` / `isNotInTheLast`.
    pub now: DateTime<Utc>,
    /// Case policy for text fields.
    pub case: CaseSensitivity,
}

impl EvalContext {
    /// Context anchored at `now` with the default case policy.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            case: CaseSensitivity::default(),
        }
    }

    /// Override the case policy.
    pub fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }
}

/// Non-empty list of child conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<C>", into = "Vec<C>")]
pub struct Conditions<C: Clone>(Vec<C>);

impl<C: Clone> Conditions<C> {
    /// Wrap `children`, refusing an empty list.
    pub fn new(children: Vec<C>) -> Result<Self> {
        if children.is_empty() {
            return Err(AppError::malformed(
                "",
                "allOf/anyOf requires at least one condition",
            ));
        }
        Ok(Self(children))
    }

    /// Children in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        self.0.iter()
    }

    /// Number of children (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl<C: Clone> TryFrom<Vec<C>> for Conditions<C> {
    type Error = AppError;

    fn try_from(children: Vec<C>) -> Result<Self> {
        Self::new(children)
    }
}

impl<C: Clone> From<Conditions<C>> for Vec<C> {
    fn from(conditions: Conditions<C>) -> Self {
        conditions.0
    }
}

impl<'a, C: Clone> IntoIterator for &'a Conditions<C> {
    type Item = &'a C;
    type IntoIter = std::slice::Iter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read access to the searchable attributes of a book.
pub trait BookFields {
    /// Owning library.
    fn library_id(&self) -> &str;
    /// Owning series.
    fn series_id(&self) -> &str;
    /// Soft-deleted (file missing).
    fn deleted(&self) -> bool;
    /// Standalone book shown as its own series.
    fn one_shot(&self) -> bool;
    /// Book title.
    fn title(&self) -> &str;
    /// Release date, if known.
    fn release_date(&self) -> Option<DateTime<Utc>>;
    /// Sort key of the book number.
    fn number_sort(&self) -> f32;
    /// Book tags.
    fn tags(&self) -> &[String];
    /// Read status for the requesting user.
    fn read_status(&self) -> ReadStatus;
    /// Media analysis status.
    fn media_status(&self) -> MediaStatus;
    /// Credited authors.
    fn authors(&self) -> &[Author];
}

/// Read access to the searchable attributes of a series.
pub trait SeriesFields {
    /// Owning library.
    fn library_id(&self) -> &str;
    /// Soft-deleted.
    fn deleted(&self) -> bool;
    /// All expected books are present.
    fn complete(&self) -> bool;
    /// Series made of a single standalone book.
    fn one_shot(&self) -> bool;
    /// Series title.
    fn title(&self) -> &str;
    /// Title used for sorting.
    fn title_sort(&self) -> &str;
    /// Release date, if known.
    fn release_date(&self) -> Option<DateTime<Utc>>;
    /// Series tags.
    fn tags(&self) -> &[String];
    /// Sharing labels.
    fn sharing_labels(&self) -> &[String];
    /// Publisher.
    fn publisher(&self) -> &str;
    /// Language code.
    fn language(&self) -> &str;
    /// Genres.
    fn genres(&self) -> &[String];
    /// Age rating, if any.
    fn age_rating(&self) -> Option<i32>;
    /// Aggregated read status for the requesting user.
    fn read_status(&self) -> ReadStatus;
    /// Publication status.
    fn status(&self) -> SeriesStatus;
    /// Authors of the series' books.
    fn authors(&self) -> &[Author];
}

/// Condition over books.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookCondition {
    /// Every child holds.
    AllOf(Conditions<BookCondition>),
    /// At least one child holds.
    AnyOf(Conditions<BookCondition>),
    /// Library the book belongs to.
    LibraryId(Equality<String>),
    /// Series the book belongs to.
    SeriesId(Equality<String>),
    /// Soft-deleted flag.
    Deleted(BooleanOp),
    /// One-shot flag.
    OneShot(BooleanOp),
    /// Book title.
    Title(StringOp),
    /// Release date.
    ReleaseDate(DateOp),
    /// Number sort key.
    NumberSort(Numeric<f32>),
    /// Book tag.
    Tag(Equality<String>),
    /// Read status of the requesting user.
    ReadStatus(Equality<ReadStatus>),
    /// Media analysis status.
    MediaStatus(Equality<MediaStatus>),
    /// Credited author.
    Author(Equality<AuthorMatch>),
}

/// Condition over series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeriesCondition {
    /// Every child holds.
    AllOf(Conditions<SeriesCondition>),
    /// At least one child holds.
    AnyOf(Conditions<SeriesCondition>),
    /// Library the series belongs to.
    LibraryId(Equality<String>),
    /// Soft-deleted flag.
    Deleted(BooleanOp),
    /// Completeness flag.
    Complete(BooleanOp),
    /// One-shot flag.
    OneShot(BooleanOp),
    /// Series title.
    Title(StringOp),
    /// Sort title.
    TitleSort(StringOp),
    /// Release date.
    ReleaseDate(DateOp),
    /// Series tag.
    Tag(Equality<String>),
    /// Sharing label.
    SharingLabel(Equality<String>),
    /// Publisher.
    Publisher(Equality<String>),
    /// Language code.
    Language(Equality<String>),
    /// Genre.
    Genre(Equality<String>),
    /// Age rating.
    AgeRating(NumericNullable<i32>),
    /// Aggregated read status of the requesting user.
    ReadStatus(Equality<ReadStatus>),
    /// Publication status.
    SeriesStatus(Equality<SeriesStatus>),
    /// Author of any book in the series.
    Author(Equality<AuthorMatch>),
}

impl BookCondition {
    /// `AllOf(children)`, failing on an empty list.
    pub fn all_of(children: Vec<BookCondition>) -> Result<Self> {
        Conditions::new(children).map(BookCondition::AllOf)
    }

    /// `AnyOf(children)`, failing on an empty list.
    pub fn any_of(children: Vec<BookCondition>) -> Result<Self> {
        Conditions::new(children).map(BookCondition::AnyOf)
    }

    /// Reference evaluation against one book.
    pub fn evaluate<B: BookFields + ?Sized>(&self, book: &B, ctx: &EvalContext) -> bool {
        match self {
            BookCondition::AllOf(children) => children.iter().all(|c| c.evaluate(book, ctx)),
            BookCondition::AnyOf(children) => children.iter().any(|c| c.evaluate(book, ctx)),
            BookCondition::LibraryId(op) => op.matches_by(book.library_id(), |v, c| v == c),
            BookCondition::SeriesId(op) => op.matches_by(book.series_id(), |v, c| v == c),
            BookCondition::Deleted(op) => op.matches(book.deleted()),
            BookCondition::OneShot(op) => op.matches(book.one_shot()),
            BookCondition::Title(op) => op.matches_with(book.title(), ctx.case),
            BookCondition::ReleaseDate(op) => op.matches(book.release_date(), ctx.now),
            BookCondition::NumberSort(op) => op.matches(&book.number_sort()),
            BookCondition::Tag(op) => op.matches_any_text(book.tags(), ctx.case),
            BookCondition::ReadStatus(op) => op.matches(&book.read_status()),
            BookCondition::MediaStatus(op) => op.matches(&book.media_status()),
            BookCondition::Author(op) => {
                op.matches_any_by(book.authors(), |m, a| m.matches(a, ctx.case))
            }
        }
    }
}

impl SeriesCondition {
    /// `AllOf(children)`, failing on an empty list.
    pub fn all_of(children: Vec<SeriesCondition>) -> Result<Self> {
        Conditions::new(children).map(SeriesCondition::AllOf)
    }

    /// `AnyOf(children)`, failing on an empty list.
    pub fn any_of(children: Vec<SeriesCondition>) -> Result<Self> {
        Conditions::new(children).map(SeriesCondition::AnyOf)
    }

    /// Reference evaluation against one series.
    pub fn evaluate<S: SeriesFields + ?Sized>(&self, series: &S, ctx: &EvalContext) -> bool {
        match self {
            SeriesCondition::AllOf(children) => children.iter().all(|c| c.evaluate(series, ctx)),
            SeriesCondition::AnyOf(children) => children.iter().any(|c| c.evaluate(series, ctx)),
            SeriesCondition::LibraryId(op) => op.matches_by(series.library_id(), |v, c| v == c),
            SeriesCondition::Deleted(op) => op.matches(series.deleted()),
            SeriesCondition::Complete(op) => op.matches(series.complete()),
            SeriesCondition::OneShot(op) => op.matches(series.one_shot()),
            SeriesCondition::Title(op) => op.matches_with(series.title(), ctx.case),
            SeriesCondition::TitleSort(op) => op.matches_with(series.title_sort(), ctx.case),
            SeriesCondition::ReleaseDate(op) => op.matches(series.release_date(), ctx.now),
            SeriesCondition::Tag(op) => op.matches_any_text(series.tags(), ctx.case),
            SeriesCondition::SharingLabel(op) => {
                op.matches_any_text(series.sharing_labels(), ctx.case)
            }
            SeriesCondition::Publisher(op) => op.matches_text(series.publisher(), ctx.case),
            SeriesCondition::Language(op) => op.matches_text(series.language(), ctx.case),
            SeriesCondition::Genre(op) => op.matches_any_text(series.genres(), ctx.case),
            SeriesCondition::AgeRating(op) => op.matches(series.age_rating().as_ref()),
            SeriesCondition::ReadStatus(op) => op.matches(&series.read_status()),
            SeriesCondition::SeriesStatus(op) => op.matches(&series.status()),
            SeriesCondition::Author(op) => {
                op.matches_any_by(series.authors(), |m, a| m.matches(a, ctx.case))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::cell::Cell;

    struct TestBook {
        library_id: &'static str,
        tags: Vec<String>,
        authors: Vec<Author>,
        evaluated: Cell<usize>,
    }

    impl TestBook {
        fn new(library_id: &'static str, tags: &[&str]) -> Self {
            Self {
                library_id,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                authors: vec![Author {
                    name: "Alan Moore".into(),
                    role: "writer".into(),
                }],
                evaluated: Cell::new(0),
            }
        }
    }

    impl BookFields for TestBook {
        fn library_id(&self) -> &str {
            self.evaluated.set(self.evaluated.get() + 1);
            self.library_id
        }
        fn series_id(&self) -> &str {
            "s1"
        }
        fn deleted(&self) -> bool {
            false
        }
        fn one_shot(&self) -> bool {
            false
        }
        fn title(&self) -> &str {
            "Watchmen"
        }
        fn release_date(&self) -> Option<DateTime<Utc>> {
            Utc.with_ymd_and_hms(1986, 9, 1, 0, 0, 0).single()
        }
        fn number_sort(&self) -> f32 {
            1.0
        }
        fn tags(&self) -> &[String] {
            &self.tags
        }
        fn read_status(&self) -> ReadStatus {
            ReadStatus::InProgress
        }
        fn media_status(&self) -> MediaStatus {
            MediaStatus::Ready
        }
        fn authors(&self) -> &[Author] {
            &self.authors
        }
    }

    fn ctx() -> EvalContext {
        EvalContext::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn library(id: &str) -> BookCondition {
        BookCondition::LibraryId(Equality::Is { value: id.to_string() })
    }

    fn tag(t: &str) -> BookCondition {
        BookCondition::Tag(Equality::Is { value: t.to_string() })
    }

    #[test]
    fn empty_composites_fail_construction() {
        assert!(BookCondition::all_of(vec![]).is_err());
        assert!(BookCondition::any_of(vec![]).is_err());
        assert!(SeriesCondition::all_of(vec![]).is_err());
        assert!(SeriesCondition::any_of(vec![]).is_err());

        let err = serde_json::from_value::<BookCondition>(json!({"allOf": []}));
        assert!(err.is_err());
    }

    #[test]
    fn all_of_library_and_tag() {
        let condition = BookCondition::all_of(vec![library("L1"), tag("kids")]).unwrap();

        let books = [
            TestBook::new("L1", &["kids"]),
            TestBook::new("L1", &["Kids", "comedy"]),
            TestBook::new("L2", &["kids"]),
        ];

        let hits = books.iter().filter(|b| condition.evaluate(*b, &ctx())).count();
        assert_eq!(hits, 2);
    }

    #[test]
    fn composites_short_circuit_in_order() {
        let book = TestBook::new("L2", &[]);

        let all = BookCondition::all_of(vec![library("L1"), library("L2")]).unwrap();
        assert!(!all.evaluate(&book, &ctx()));
        assert_eq!(book.evaluated.get(), 1);

        let book = TestBook::new("L1", &[]);
        let any = BookCondition::any_of(vec![library("L1"), library("L2")]).unwrap();
        assert!(any.evaluate(&book, &ctx()));
        assert_eq!(book.evaluated.get(), 1);
    }

    #[test]
    fn author_match_on_name_and_role() {
        let book = TestBook::new("L1", &[]);

        let by_name = BookCondition::Author(Equality::Is {
            value: AuthorMatch {
                name: Some("alan moore".into()),
                role: None,
            },
        });
        let wrong_role = BookCondition::Author(Equality::Is {
            value: AuthorMatch {
                name: Some("Alan Moore".into()),
                role: Some("penciller".into()),
            },
        });
        let not_gaiman = BookCondition::Author(Equality::IsNot {
            value: AuthorMatch {
                name: Some("Neil Gaiman".into()),
                role: None,
            },
        });

        assert!(by_name.evaluate(&book, &ctx()));
        assert!(!wrong_role.evaluate(&book, &ctx()));
        assert!(not_gaiman.evaluate(&book, &ctx()));
    }

    #[test]
    fn release_date_relative_to_context_clock() {
        let book = TestBook::new("L1", &[]);
        let recent = BookCondition::ReleaseDate(DateOp::IsInTheLast {
            duration: Duration::days(30),
        });
        assert!(!recent.evaluate(&book, &ctx()));

        let then = EvalContext::at(Utc.with_ymd_and_hms(1986, 9, 15, 0, 0, 0).unwrap());
        assert!(recent.evaluate(&book, &then));
    }

    #[test]
    fn book_condition_wire_shape() {
        let condition = BookCondition::all_of(vec![
            library("L1"),
            BookCondition::ReadStatus(Equality::IsNot {
                value: ReadStatus::Read,
            }),
            BookCondition::Deleted(BooleanOp::IsFalse),
        ])
        .unwrap();

        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({"allOf": [
                {"libraryId": {"operator": "is", "value": "L1"}},
                {"readStatus": {"operator": "isNot", "value": "READ"}},
                {"deleted": {"operator": "isFalse"}}
            ]})
        );
    }

    #[test]
    fn every_variant_round_trips() {
        let at = Utc.with_ymd_and_hms(2023, 5, 1, 12, 30, 0).unwrap();
        let author = AuthorMatch {
            name: Some("Hergé".into()),
            role: Some("writer".into()),
        };

        let book_leaves = vec![
            library("L1"),
            BookCondition::SeriesId(Equality::IsNot { value: "s9".into() }),
            BookCondition::Deleted(BooleanOp::IsTrue),
            BookCondition::OneShot(BooleanOp::IsFalse),
            BookCondition::Title(StringOp::EndsWith { value: "II".into() }),
            BookCondition::ReleaseDate(DateOp::After { date_time: at }),
            BookCondition::NumberSort(Numeric::LessThan { value: 10.5 }),
            tag("noir"),
            BookCondition::ReadStatus(Equality::Is { value: ReadStatus::Unread }),
            BookCondition::MediaStatus(Equality::Is { value: MediaStatus::Outdated }),
            BookCondition::Author(Equality::Is { value: author.clone() }),
        ];
        let book = BookCondition::any_of(vec![
            BookCondition::all_of(book_leaves).unwrap(),
            tag("other"),
        ])
        .unwrap();
        let json = serde_json::to_string(&book).unwrap();
        assert_eq!(serde_json::from_str::<BookCondition>(&json).unwrap(), book);

        let series_leaves = vec![
            SeriesCondition::LibraryId(Equality::Is { value: "L1".into() }),
            SeriesCondition::Deleted(BooleanOp::IsFalse),
            SeriesCondition::Complete(BooleanOp::IsTrue),
            SeriesCondition::OneShot(BooleanOp::IsFalse),
            SeriesCondition::Title(StringOp::Contains { value: "tin".into() }),
            SeriesCondition::TitleSort(StringOp::BeginsWith { value: "a".into() }),
            SeriesCondition::ReleaseDate(DateOp::IsNotInTheLast {
                duration: Duration::days(7),
            }),
            SeriesCondition::Tag(Equality::Is { value: "adventure".into() }),
            SeriesCondition::SharingLabel(Equality::IsNot { value: "adult".into() }),
            SeriesCondition::Publisher(Equality::Is { value: "Casterman".into() }),
            SeriesCondition::Language(Equality::Is { value: "fr".into() }),
            SeriesCondition::Genre(Equality::Is { value: "bd".into() }),
            SeriesCondition::AgeRating(NumericNullable::IsNull),
            SeriesCondition::ReadStatus(Equality::Is { value: ReadStatus::InProgress }),
            SeriesCondition::SeriesStatus(Equality::Is { value: SeriesStatus::Hiatus }),
            SeriesCondition::Author(Equality::IsNot { value: author }),
        ];
        let series = SeriesCondition::all_of(series_leaves).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(serde_json::from_str::<SeriesCondition>(&json).unwrap(), series);
    }
}
