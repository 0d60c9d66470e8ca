//! JSON wire contract for conditions.
//!
//! A condition is an object with exactly one key. Resolution order:
//!
//! 1. `allOf` / `anyOf`: the value must be a non-empty array of conditions.
//! 2. A field from [`FIELDS`] that is valid for the queried capability: the
//!    value must be an operator object whose `"operator"` belongs to the
//!    field's [`ValueKind`].
//!
//! Anything else is rejected. The key alone decides what a node is.

use super::condition::{BookCondition, SeriesCondition};
use super::operator::ValueKind;
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which entity a condition filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Book search.
    Book,
    /// Series search.
    Series,
}

impl Capability {
    fn name(self) -> &'static str {
        match self {
            Capability::Book => "book",
            Capability::Series => "series",
        }
    }
}

/// One entry of the field registry.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Wire key.
    pub name: &'static str,
    /// Operator family.
    pub kind: ValueKind,
    /// Usable in book conditions.
    pub book: bool,
    /// Usable in series conditions.
    pub series: bool,
}

impl FieldDef {
    /// Whether this field may appear in a condition for `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Book => self.book,
            Capability::Series => self.series,
        }
    }
}

const fn field(name: &'static str, kind: ValueKind, book: bool, series: bool) -> FieldDef {
    FieldDef {
        name,
        kind,
        book,
        series,
    }
}

/// Composite keys, resolved before any field.
pub const COMPOSITES: [&str; 2] = ["allOf", "anyOf"];

/// Every leaf field known to the condition language.
pub static FIELDS: &[FieldDef] = &[
    field("libraryId", ValueKind::Equality, true, true),
    field("seriesId", ValueKind::Equality, true, false),
    field("deleted", ValueKind::Boolean, true, true),
    field("oneShot", ValueKind::Boolean, true, true),
    field("complete", ValueKind::Boolean, false, true),
    field("title", ValueKind::String, true, true),
    field("titleSort", ValueKind::String, false, true),
    field("releaseDate", ValueKind::Date, true, true),
    field("numberSort", ValueKind::Numeric, true, false),
    field("tag", ValueKind::Equality, true, true),
    field("sharingLabel", ValueKind::Equality, false, true),
    field("publisher", ValueKind::Equality, false, true),
    field("language", ValueKind::Equality, false, true),
    field("genre", ValueKind::Equality, false, true),
    field("ageRating", ValueKind::NumericNullable, false, true),
    field("readStatus", ValueKind::Equality, true, true),
    field("mediaStatus", ValueKind::Equality, true, false),
    field("seriesStatus", ValueKind::Equality, false, true),
    field("author", ValueKind::Equality, true, true),
];

/// Look up a field by wire key.
pub fn lookup(name: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Search request body: `{"condition": ..., "fullTextSearch": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<C> {
    /// Structural filter; `None` means no constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<C>,
    /// Free-text terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_search: Option<String>,
}

impl<C> Default for SearchRequest<C> {
    fn default() -> Self {
        Self {
            condition: None,
            full_text_search: None,
        }
    }
}

impl<C> SearchRequest<C> {
    /// Request carrying only a condition.
    pub fn with_condition(condition: C) -> Self {
        Self {
            condition: Some(condition),
            full_text_search: None,
        }
    }

    /// Free-text terms, ignoring blank input.
    pub fn text(&self) -> Option<&str> {
        self.full_text_search
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Book search request.
pub type BookSearch = SearchRequest<BookCondition>;
/// Series search request.
pub type SeriesSearch = SearchRequest<SeriesCondition>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchRequest {
    #[serde(default)]
    condition: Option<Value>,
    #[serde(default)]
    full_text_search: Option<String>,
}

/// Parse a book condition, validating it against the registry first.
pub fn parse_book_condition(value: &Value) -> Result<BookCondition> {
    parse_condition(value, Capability::Book)
}

/// Parse a series condition, validating it against the registry first.
pub fn parse_series_condition(value: &Value) -> Result<SeriesCondition> {
    parse_condition(value, Capability::Series)
}

/// Parse a book search request body.
pub fn parse_book_search(body: &Value) -> Result<BookSearch> {
    parse_search(body, Capability::Book)
}

/// Parse a series search request body.
pub fn parse_series_search(body: &Value) -> Result<SeriesSearch> {
    parse_search(body, Capability::Series)
}

fn parse_search<C: DeserializeOwned>(
    body: &Value,
    capability: Capability,
) -> Result<SearchRequest<C>> {
    if body.is_null() {
        return Ok(SearchRequest::default());
    }

    let raw: RawSearchRequest = RawSearchRequest::deserialize(body)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let condition = match raw.condition {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_condition(&value, capability)?),
    };

    Ok(SearchRequest {
        condition,
        full_text_search: raw.full_text_search,
    })
}

fn parse_condition<C: DeserializeOwned>(value: &Value, capability: Capability) -> Result<C> {
    let mut path = String::new();
    validate(value, capability, &mut path)?;

    C::deserialize(value).map_err(|e| AppError::malformed("/", e.to_string()))
}

fn validate(value: &Value, capability: Capability, path: &mut String) -> Result<()> {
    let here = || if path.is_empty() { "/".to_string() } else { path.clone() };

    let Value::Object(map) = value else {
        return Err(AppError::malformed(here(), "expected a condition object"));
    };

    let mut entries = map.iter();
    let (key, inner) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(AppError::malformed(
                here(),
                format!("a condition must have exactly one key, found {}", map.len()),
            ));
        }
    };

    let mark = path.len();
    path.push('/');
    path.push_str(key);

    if COMPOSITES.contains(&key.as_str()) {
        let Value::Array(children) = inner else {
            return Err(AppError::malformed(path.clone(), "expected an array of conditions"));
        };
        if children.is_empty() {
            return Err(AppError::malformed(
                path.clone(),
                format!("'{}' requires at least one condition", key),
            ));
        }
        for (idx, child) in children.iter().enumerate() {
            let child_mark = path.len();
            path.push_str(&format!("/{}", idx));
            validate(child, capability, path)?;
            path.truncate(child_mark);
        }
        path.truncate(mark);
        return Ok(());
    }

    let def = lookup(key)
        .ok_or_else(|| AppError::malformed(path.clone(), format!("unknown field '{}'", key)))?;

    if !def.supports(capability) {
        return Err(AppError::malformed(
            path.clone(),
            format!(
                "field '{}' is not valid for {} conditions",
                key,
                capability.name()
            ),
        ));
    }

    let operator = inner
        .get("operator")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::malformed(path.clone(), "missing 'operator'"))?;

    if !def.kind.accepts(operator) {
        return Err(AppError::UnsupportedOperator {
            field: key.clone(),
            operator: operator.to_string(),
        });
    }

    let payload = def.kind.payload(operator);
    if let Value::Object(fields) = inner
        && let Some(extra) = fields
            .keys()
            .find(|k| k.as_str() != "operator" && Some(k.as_str()) != payload)
    {
        return Err(AppError::malformed(
            path.clone(),
            format!("unexpected key '{}' for operator '{}'", extra, operator),
        ));
    }

    path.truncate(mark);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::condition::{EvalContext, SeriesFields};
    use crate::search::operator::{Equality, NumericNullable};
    use crate::search::{Author, AuthorMatch, ReadStatus, SeriesStatus};
    use chrono::{DateTime, Utc};
    use serde_json::json;

    #[test]
    fn registry_is_consistent() {
        for (i, a) in FIELDS.iter().enumerate() {
            assert!(a.book || a.series, "{} belongs to no capability", a.name);
            assert!(!COMPOSITES.contains(&a.name));
            for b in &FIELDS[i + 1..] {
                assert_ne!(a.name, b.name, "duplicate field");
            }
        }
    }

    #[test]
    fn parses_leaf_examples() {
        let tag =
            parse_book_condition(&json!({"tag": {"operator": "is", "value": "kids"}})).unwrap();
        assert_eq!(tag, BookCondition::Tag(Equality::Is { value: "kids".into() }));

        let age = parse_series_condition(&json!({"ageRating": {"operator": "isNull"}})).unwrap();
        assert_eq!(age, SeriesCondition::AgeRating(NumericNullable::IsNull));

        let recent = parse_series_condition(
            &json!({"releaseDate": {"operator": "isInTheLast", "duration": "P30D"}}),
        );
        assert!(recent.is_ok());
    }

    #[test]
    fn rejects_field_from_other_capability() {
        let err = parse_book_condition(&json!({"ageRating": {"operator": "isNull"}})).unwrap_err();
        assert!(matches!(
            err,
            AppError::MalformedCondition { ref path, .. } if path == "/ageRating"
        ));

        let err = parse_series_condition(&json!({"numberSort": {"operator": "is", "value": 1}}))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));
    }

    #[test]
    fn rejects_unsupported_operator() {
        let err = parse_series_condition(&json!({
            "deleted": {"operator": "greaterThan", "value": 1}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::UnsupportedOperator { ref field, ref operator }
                if field == "deleted" && operator == "greaterThan"
        ));

        let err = parse_book_condition(&json!({"tag": {"operator": "contains", "value": "x"}}))
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedOperator { .. }));
    }

    #[test]
    fn rejects_ambiguous_shapes() {
        let two_keys = json!({
            "tag": {"operator": "is", "value": "a"},
            "title": {"operator": "is", "value": "b"}
        });
        assert!(parse_book_condition(&two_keys).is_err());
        assert!(parse_book_condition(&json!({})).is_err());
        assert!(parse_book_condition(&json!([])).is_err());
        assert!(parse_book_condition(&json!({"tags": {"operator": "is", "value": "a"}})).is_err());
        assert!(parse_book_condition(&json!({"tag": {"value": "a"}})).is_err());
    }

    #[test]
    fn rejects_empty_composites_with_path() {
        let err = parse_book_condition(&json!({"anyOf": [
            {"tag": {"operator": "is", "value": "a"}},
            {"allOf": []}
        ]}))
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::MalformedCondition { ref path, .. } if path == "/anyOf/1/allOf"
        ));
    }

    #[test]
    fn rejects_bad_payload() {
        let err = parse_book_condition(&json!({
            "releaseDate": {"operator": "isInTheLast", "duration": "30 days"}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let err = parse_book_condition(&json!({
            "readStatus": {"operator": "is", "value": "SKIMMED"}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));
    }

    #[test]
    fn absent_and_null_condition_mean_no_constraint() {
        let search = parse_book_search(&json!({"fullTextSearch": "batman"})).unwrap();
        assert!(search.condition.is_none());
        assert_eq!(search.text(), Some("batman"));

        let search = parse_series_search(&json!({"condition": null})).unwrap();
        assert!(search.condition.is_none());

        let search = parse_series_search(&Value::Null).unwrap();
        assert_eq!(search, SeriesSearch::default());

        assert!(parse_series_search(&json!({"condition": {"allOf": []}})).is_err());
    }

    struct Rated(Option<i32>);

    impl SeriesFields for Rated {
        fn library_id(&self) -> &str {
            "L1"
        }
        fn deleted(&self) -> bool {
            false
        }
        fn complete(&self) -> bool {
            false
        }
        fn one_shot(&self) -> bool {
            false
        }
        fn title(&self) -> &str {
            "t"
        }
        fn title_sort(&self) -> &str {
            "t"
        }
        fn release_date(&self) -> Option<DateTime<Utc>> {
            None
        }
        fn tags(&self) -> &[String] {
            &[]
        }
        fn sharing_labels(&self) -> &[String] {
            &[]
        }
        fn publisher(&self) -> &str {
            ""
        }
        fn language(&self) -> &str {
            ""
        }
        fn genres(&self) -> &[String] {
            &[]
        }
        fn age_rating(&self) -> Option<i32> {
            self.0
        }
        fn read_status(&self) -> ReadStatus {
            ReadStatus::Unread
        }
        fn status(&self) -> SeriesStatus {
            SeriesStatus::Ongoing
        }
        fn authors(&self) -> &[Author] {
            &[]
        }
    }

    #[test]
    fn rejects_keys_the_operator_does_not_take() {
        let err = parse_series_condition(&json!({
            "ageRating": {"operator": "isNull", "value": 5}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::MalformedCondition { ref path, .. } if path == "/ageRating"
        ));

        let err = parse_book_condition(&json!({"deleted": {"operator": "isTrue", "value": false}}))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let err = parse_book_condition(&json!({
            "releaseDate": {"operator": "isInTheLast", "dateTime": "2020-01-01T00:00:00Z"}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let err = parse_book_condition(&json!({"title": {"operator": "is", "valeu": "x"}}))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        assert!(parse_book_condition(&json!({
            "releaseDate": {"operator": "isInTheLast", "duration": "P30D"}
        }))
        .is_ok());
    }

    #[test]
    fn author_match_rejects_unknown_and_empty_parts() {
        let err = parse_book_condition(&json!({
            "author": {"operator": "is", "value": {"nmae": "Moore"}}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let err = parse_book_condition(&json!({"author": {"operator": "is", "value": {}}}))
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let err = parse_series_condition(&json!({
            "author": {"operator": "isNot", "value": {"name": " ", "role": ""}}
        }))
        .unwrap_err();
        assert!(matches!(err, AppError::MalformedCondition { .. }));

        let by_role = parse_book_condition(&json!({
            "author": {"operator": "is", "value": {"role": "writer"}}
        }))
        .unwrap();
        assert_eq!(
            by_role,
            BookCondition::Author(Equality::Is {
                value: AuthorMatch {
                    name: None,
                    role: Some("writer".into()),
                },
            })
        );
    }

    #[test]
    fn age_rating_is_null_matches_only_unrated() {
        let condition =
            parse_series_condition(&json!({"ageRating": {"operator": "isNull"}})).unwrap();
        let ctx = EvalContext::at(Utc::now());

        assert!(condition.evaluate(&Rated(None), &ctx));
        assert!(!condition.evaluate(&Rated(Some(0)), &ctx));
        assert!(!condition.evaluate(&Rated(Some(16)), &ctx));
    }
}
