//! Typed comparison operators.
//!
//! Every operator family targets one value kind, so a field declared with a
//! boolean operator cannot be given `greaterThan`: the variant does not exist.
//! On the wire each operator is an object tagged by `"operator"`.

use super::duration;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Case policy for text comparisons.
///
/// The default is [`CaseSensitivity::Insensitive`], applied uniformly to
/// every string operator and to text equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    /// Compare Unicode-lowercased text.
    #[default]
    Insensitive,
    /// Compare text as-is.
    Sensitive,
}

impl CaseSensitivity {
    /// Fold `text` according to this policy.
    pub fn fold<'a>(self, text: &'a str) -> Cow<'a, str> {
        match self {
            CaseSensitivity::Insensitive => Cow::Owned(text.to_lowercase()),
            CaseSensitivity::Sensitive => Cow::Borrowed(text),
        }
    }

    /// Compare two strings under this policy.
    pub fn equals(self, a: &str, b: &str) -> bool {
        self.fold(a) == self.fold(b)
    }
}

/// Equality operators: `is` / `isNot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum Equality<T> {
    /// Field equals `value`.
    Is {
        /// Expected value.
        value: T,
    },
    /// Field differs from `value`.
    IsNot {
        /// Rejected value.
        value: T,
    },
}

impl<T> Equality<T> {
    /// The operand.
    pub fn value(&self) -> &T {
        match self {
            Equality::Is { value } | Equality::IsNot { value } => value,
        }
    }

    /// Test a single-valued field with a custom equivalence.
    pub fn matches_by<C: ?Sized>(&self, candidate: &C, eq: impl Fn(&T, &C) -> bool) -> bool {
        match self {
            Equality::Is { value } => eq(value, candidate),
            Equality::IsNot { value } => !eq(value, candidate),
        }
    }

    /// Test a multi-valued field: `is` holds when any element is equal,
    /// `isNot` when none is.
    pub fn matches_any_by<'a, C, I>(&self, candidates: I, eq: impl Fn(&T, &C) -> bool) -> bool
    where
        C: ?Sized + 'a,
        I: IntoIterator<Item = &'a C>,
    {
        let mut candidates = candidates.into_iter();
        match self {
            Equality::Is { value } => candidates.any(|c| eq(value, c)),
            Equality::IsNot { value } => !candidates.any(|c| eq(value, c)),
        }
    }
}

impl<T: PartialEq> Equality<T> {
    /// Test a single-valued field.
    pub fn matches(&self, candidate: &T) -> bool {
        self.matches_by(candidate, |a, b| a == b)
    }
}

impl Equality<String> {
    /// Test a text field under `case`.
    pub fn matches_text(&self, candidate: &str, case: CaseSensitivity) -> bool {
        self.matches_by(candidate, |value, c| case.equals(value, c))
    }

    /// Test a multi-valued text field under `case`.
    pub fn matches_any_text<'a, I>(&self, candidates: I, case: CaseSensitivity) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        self.matches_any_by(candidates, |value, c: &String| case.equals(value, c))
    }
}

/// String operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum StringOp {
    /// Whole value equals.
    Is {
        /// Operand.
        value: String,
    },
    /// Whole value differs.
    IsNot {
        /// Operand.
        value: String,
    },
    /// Value contains the operand.
    Contains {
        /// Operand.
        value: String,
    },
    /// Value does not contain the operand.
    DoesNotContain {
        /// Operand.
        value: String,
    },
    /// Value starts with the operand.
    BeginsWith {
        /// Operand.
        value: String,
    },
    /// Value does not start with the operand.
    DoesNotBeginWith {
        /// Operand.
        value: String,
    },
    /// Value ends with the operand.
    EndsWith {
        /// Operand.
        value: String,
    },
    /// Value does not end with the operand.
    DoesNotEndWith {
        /// Operand.
        value: String,
    },
}

impl StringOp {
    /// The operand.
    pub fn value(&self) -> &str {
        match self {
            StringOp::Is { value }
            | StringOp::IsNot { value }
            | StringOp::Contains { value }
            | StringOp::DoesNotContain { value }
            | StringOp::BeginsWith { value }
            | StringOp::DoesNotBeginWith { value }
            | StringOp::EndsWith { value }
            | StringOp::DoesNotEndWith { value } => value,
        }
    }

    /// Test `candidate` with the default (case-insensitive) policy.
    pub fn matches(&self, candidate: &str) -> bool {
        self.matches_with(candidate, CaseSensitivity::default())
    }

    /// Test `candidate` under an explicit case policy.
    pub fn matches_with(&self, candidate: &str, case: CaseSensitivity) -> bool {
        let candidate = case.fold(candidate);
        let value = case.fold(self.value());
        let (candidate, value) = (candidate.as_ref(), value.as_ref());

        match self {
            StringOp::Is { .. } => candidate == value,
            StringOp::IsNot { .. } => candidate != value,
            StringOp::Contains { .. } => candidate.contains(value),
            StringOp::DoesNotContain { .. } => !candidate.contains(value),
            StringOp::BeginsWith { .. } => candidate.starts_with(value),
            StringOp::DoesNotBeginWith { .. } => !candidate.starts_with(value),
            StringOp::EndsWith { .. } => candidate.ends_with(value),
            StringOp::DoesNotEndWith { .. } => !candidate.ends_with(value),
        }
    }
}

/// Numeric operators on a non-nullable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum Numeric<T> {
    /// Equal.
    Is {
        /// Operand.
        value: T,
    },
    /// Not equal.
    IsNot {
        /// Operand.
        value: T,
    },
    /// Strictly greater.
    GreaterThan {
        /// Operand.
        value: T,
    },
    /// Strictly less.
    LessThan {
        /// Operand.
        value: T,
    },
}

impl<T: PartialOrd> Numeric<T> {
    /// Test `candidate`.
    pub fn matches(&self, candidate: &T) -> bool {
        match self {
            Numeric::Is { value } => candidate == value,
            Numeric::IsNot { value } => candidate != value,
            Numeric::GreaterThan { value } => candidate > value,
            Numeric::LessThan { value } => candidate < value,
        }
    }
}

/// Numeric operators on a nullable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum NumericNullable<T> {
    /// Field has no value.
    IsNull,
    /// Field has a value.
    IsNotNull,
    /// Equal.
    Is {
        /// Operand.
        value: T,
    },
    /// Not equal.
    IsNot {
        /// Operand.
        value: T,
    },
    /// Strictly greater.
    GreaterThan {
        /// Operand.
        value: T,
    },
    /// Strictly less.
    LessThan {
        /// Operand.
        value: T,
    },
}

impl<T: PartialOrd> NumericNullable<T> {
    /// Test `candidate`. Comparisons against a missing value are false.
    pub fn matches(&self, candidate: Option<&T>) -> bool {
        match (self, candidate) {
            (NumericNullable::IsNull, c) => c.is_none(),
            (NumericNullable::IsNotNull, c) => c.is_some(),
            (_, None) => false,
            (NumericNullable::Is { value }, Some(c)) => c == value,
            (NumericNullable::IsNot { value }, Some(c)) => c != value,
            (NumericNullable::GreaterThan { value }, Some(c)) => c > value,
            (NumericNullable::LessThan { value }, Some(c)) => c < value,
        }
    }
}

/// Date operators. Instants travel as RFC 3339 `dateTime`, spans as
/// ISO-8601 `duration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum DateOp {
    /// Same instant.
    Is {
        /// Operand.
        #[serde(rename = "dateTime")]
        date_time: DateTime<Utc>,
    },
    /// Different instant.
    IsNot {
        /// Operand.
        #[serde(rename = "dateTime")]
        date_time: DateTime<Utc>,
    },
    /// Strictly before.
    Before {
        /// Operand.
        #[serde(rename = "dateTime")]
        date_time: DateTime<Utc>,
    },
    /// Strictly after.
    After {
        /// Operand.
        #[serde(rename = "dateTime")]
        date_time: DateTime<Utc>,
    },
    /// Within `duration` before now (or later).
    IsInTheLast {
        /// Look-back window.
        #[serde(with = "duration::iso8601")]
        duration: Duration,
    },
    /// Older than `duration` before now.
    IsNotInTheLast {
        /// Look-back window.
        #[serde(with = "duration::iso8601")]
        duration: Duration,
    },
}

impl DateOp {
    /// Test `candidate` relative to the caller-supplied `now`.
    /// A missing date never matches.
    pub fn matches(&self, candidate: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };

        match self {
            DateOp::Is { date_time } => candidate == *date_time,
            DateOp::IsNot { date_time } => candidate != *date_time,
            DateOp::Before { date_time } => candidate < *date_time,
            DateOp::After { date_time } => candidate > *date_time,
            DateOp::IsInTheLast { duration } => candidate >= threshold(now, *duration),
            DateOp::IsNotInTheLast { duration } => candidate < threshold(now, *duration),
        }
    }
}

fn threshold(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(duration)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "camelCase")]
pub enum BooleanOp {
    /// Field is true.
    IsTrue,
    /// Field is false.
    IsFalse,
}

impl BooleanOp {
    /// Test `candidate`.
    pub fn matches(&self, candidate: bool) -> bool {
        match self {
            BooleanOp::IsTrue => candidate,
            BooleanOp::IsFalse => !candidate,
        }
    }
}

/// Value kind of a field, naming the operator family it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// [`Equality`].
    Equality,
    /// [`StringOp`].
    String,
    /// [`Numeric`].
    Numeric,
    /// [`NumericNullable`].
    NumericNullable,
    /// [`DateOp`].
    Date,
    /// [`BooleanOp`].
    Boolean,
}

impl ValueKind {
    /// Wire names of the operators this kind accepts.
    pub const fn operators(self) -> &'static [&'static str] {
        match self {
            ValueKind::Equality => &["is", "isNot"],
            ValueKind::String => &[
                "is",
                "isNot",
                "contains",
                "doesNotContain",
                "beginsWith",
                "doesNotBeginWith",
                "endsWith",
                "doesNotEndWith",
            ],
            ValueKind::Numeric => &["is", "isNot", "greaterThan", "lessThan"],
            ValueKind::NumericNullable => &[
                "is",
                "isNot",
                "greaterThan",
                "lessThan",
                "isNull",
                "isNotNull",
            ],
            ValueKind::Date => &[
                "is",
                "isNot",
                "before",
                "after",
                "isInTheLast",
                "isNotInTheLast",
            ],
            ValueKind::Boolean => &["isTrue", "isFalse"],
        }
    }

    /// Whether `operator` belongs to this kind.
    pub fn accepts(self, operator: &str) -> bool {
        self.operators().contains(&operator)
    }

    /// Key carrying the operand next to `operator`, if the operator takes one.
    pub fn payload(self, operator: &str) -> Option<&'static str> {
        match (self, operator) {
            (ValueKind::Boolean, _) | (_, "isNull" | "isNotNull") => None,
            (ValueKind::Date, "isInTheLast" | "isNotInTheLast") => Some("duration"),
            (ValueKind::Date, _) => Some("dateTime"),
            _ => Some("value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn string_ops_share_one_case_policy() {
        let title = "The Dark Knight Returns";
        let cases: [(fn(String) -> StringOp, &str, bool); 8] = [
            (|value| StringOp::Is { value }, "the dark knight returns", true),
            (|value| StringOp::Contains { value }, "KNIGHT", true),
            (|value| StringOp::BeginsWith { value }, "the dark", true),
            (|value| StringOp::EndsWith { value }, "RETURNS", true),
            (|value| StringOp::DoesNotContain { value }, "knight", false),
            (|value| StringOp::DoesNotBeginWith { value }, "THE", false),
            (|value| StringOp::DoesNotEndWith { value }, "returns", false),
            (|value| StringOp::IsNot { value }, "THE DARK KNIGHT RETURNS", false),
        ];

        for (make, value, expected) in cases {
            let op = make(value.to_string());
            assert_eq!(op.matches(title), expected, "{op:?}");
        }
    }

    #[test]
    fn string_ops_case_sensitive_opt_in() {
        let op = StringOp::Contains {
            value: "knight".into(),
        };
        assert!(!op.matches_with("Dark Knight", CaseSensitivity::Sensitive));
        assert!(op.matches_with("Dark knight", CaseSensitivity::Sensitive));
    }

    #[test]
    fn equality_on_multi_valued_fields() {
        let tags = vec!["kids".to_string(), "comedy".to_string()];

        let is = Equality::Is {
            value: "Kids".to_string(),
        };
        let is_not = Equality::IsNot {
            value: "kids".to_string(),
        };

        assert!(is.matches_any_text(&tags, CaseSensitivity::Insensitive));
        assert!(!is.matches_any_text(&tags, CaseSensitivity::Sensitive));
        assert!(!is_not.matches_any_text(&tags, CaseSensitivity::Insensitive));
        assert!(is_not.matches_any_text(&[], CaseSensitivity::Insensitive));
    }

    #[test]
    fn numeric_ops() {
        assert!(Numeric::GreaterThan { value: 2.0_f32 }.matches(&2.5));
        assert!(!Numeric::LessThan { value: 2.0_f32 }.matches(&2.0));
        assert!(Numeric::IsNot { value: 3 }.matches(&4));
    }

    #[test]
    fn nullable_short_circuits_before_comparison() {
        assert!(NumericNullable::<i32>::IsNull.matches(None));
        assert!(!NumericNullable::IsNull.matches(Some(&12)));
        assert!(NumericNullable::IsNotNull.matches(Some(&0)));

        assert!(!NumericNullable::GreaterThan { value: 10 }.matches(None));
        assert!(!NumericNullable::IsNot { value: 10 }.matches(None));
        assert!(NumericNullable::LessThan { value: 16 }.matches(Some(&12)));
    }

    #[test]
    fn date_ops_use_injected_clock() {
        let now = at(2024, 6, 30);
        let last_30_days = DateOp::IsInTheLast {
            duration: Duration::days(30),
        };
        let older = DateOp::IsNotInTheLast {
            duration: Duration::days(30),
        };

        assert!(last_30_days.matches(Some(at(2024, 6, 15)), now));
        assert!(last_30_days.matches(Some(at(2024, 5, 31)), now));
        assert!(!last_30_days.matches(Some(at(2024, 5, 1)), now));
        assert!(older.matches(Some(at(2024, 5, 1)), now));
        assert!(!older.matches(None, now));
        assert!(!last_30_days.matches(None, now));

        let before = DateOp::Before {
            date_time: at(2020, 1, 1),
        };
        assert!(before.matches(Some(at(2019, 12, 31)), now));
        assert!(!before.matches(Some(at(2020, 1, 1)), now));
    }

    #[test]
    fn boolean_ops() {
        assert!(BooleanOp::IsTrue.matches(true));
        assert!(BooleanOp::IsFalse.matches(false));
        assert!(!BooleanOp::IsFalse.matches(true));
    }

    #[test]
    fn wire_shapes() {
        let tag = Equality::Is {
            value: "kids".to_string(),
        };
        assert_eq!(
            serde_json::to_value(tag).unwrap(),
            json!({"operator": "is", "value": "kids"})
        );
        assert_eq!(
            serde_json::to_value(NumericNullable::<i32>::IsNull).unwrap(),
            json!({"operator": "isNull"})
        );
        let recent = DateOp::IsInTheLast {
            duration: Duration::days(30),
        };
        assert_eq!(
            serde_json::to_value(recent).unwrap(),
            json!({"operator": "isInTheLast", "duration": "P30D"})
        );
        let prefix = StringOp::DoesNotBeginWith { value: "a".into() };
        assert_eq!(
            serde_json::to_value(prefix).unwrap(),
            json!({"operator": "doesNotBeginWith", "value": "a"})
        );

        let before: DateOp = serde_json::from_value(
            json!({"operator": "before", "dateTime": "2020-01-01T00:00:00Z"}),
        )
        .unwrap();
        assert_eq!(
            before,
            DateOp::Before {
                date_time: at(2020, 1, 1)
            }
        );
    }

    #[test]
    fn operator_round_trips() {
        let dates = [
            DateOp::Is {
                date_time: at(2021, 3, 4),
            },
            DateOp::IsNot {
                date_time: at(2021, 3, 4),
            },
            DateOp::After {
                date_time: at(1999, 1, 1),
            },
            DateOp::IsNotInTheLast {
                duration: Duration::hours(36) + Duration::seconds(5),
            },
        ];
        for op in dates {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(serde_json::from_str::<DateOp>(&json).unwrap(), op);
        }

        let nullable = [
            NumericNullable::IsNotNull,
            NumericNullable::Is { value: 18 },
            NumericNullable::GreaterThan { value: -1 },
        ];
        for op in nullable {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(serde_json::from_str::<NumericNullable<i32>>(&json).unwrap(), op);
        }

        for op in [BooleanOp::IsTrue, BooleanOp::IsFalse] {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(serde_json::from_str::<BooleanOp>(&json).unwrap(), op);
        }
    }

    #[test]
    fn value_kinds_reject_foreign_operators() {
        assert!(ValueKind::Boolean.accepts("isTrue"));
        assert!(!ValueKind::Boolean.accepts("greaterThan"));
        assert!(!ValueKind::Equality.accepts("contains"));
        assert!(ValueKind::NumericNullable.accepts("isNull"));
        assert!(!ValueKind::Numeric.accepts("isNull"));
    }

    #[test]
    fn payload_key_follows_operator() {
        assert_eq!(ValueKind::String.payload("contains"), Some("value"));
        assert_eq!(ValueKind::NumericNullable.payload("isNull"), None);
        assert_eq!(ValueKind::NumericNullable.payload("lessThan"), Some("value"));
        assert_eq!(ValueKind::Date.payload("before"), Some("dateTime"));
        assert_eq!(ValueKind::Date.payload("isNotInTheLast"), Some("duration"));
        assert_eq!(ValueKind::Boolean.payload("isTrue"), None);
    }
}
