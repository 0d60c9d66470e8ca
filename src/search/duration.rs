//! ISO-8601 durations (`P30D`, `PT12H30M`, `P2W`, `-PT1.5S`).
//!
//! Calendar units (years, months) are rejected: their length depends on the
//! anchor date and a look-back window must be exact.

use chrono::Duration;
use thiserror::Error;

const SECONDS_PER_DAY: i64 = 86_400;

/// Invalid ISO-8601 duration literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ISO-8601 duration '{0}'")]
pub struct InvalidDuration(pub String);

/// Parse an ISO-8601 duration.
pub fn parse(input: &str) -> Result<Duration, InvalidDuration> {
    let invalid = || InvalidDuration(input.to_string());

    let text = input.trim();
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let text = text
        .strip_prefix('P')
        .or_else(|| text.strip_prefix('p'))
        .ok_or_else(invalid)?;

    let (date_part, time_part) = match text.find(['T', 't']) {
        Some(idx) => {
            let time = &text[idx + 1..];
            if time.is_empty() {
                return Err(invalid());
            }
            (&text[..idx], Some(time))
        }
        None => (text, None),
    };

    if date_part.is_empty() && time_part.is_none() {
        return Err(invalid());
    }

    let mut total = Duration::zero();
    let mut seen = Vec::new();

    for (number, unit) in components(date_part).ok_or_else(invalid)? {
        let part = match unit {
            'W' => parse_whole(number).and_then(Duration::try_weeks),
            'D' => parse_whole(number).and_then(Duration::try_days),
            _ => None,
        }
        .ok_or_else(invalid)?;
        if seen.contains(&unit) {
            return Err(invalid());
        }
        seen.push(unit);
        total = total.checked_add(&part).ok_or_else(invalid)?;
    }

    if let Some(time_part) = time_part {
        for (number, unit) in components(time_part).ok_or_else(invalid)? {
            let part = match unit {
                'H' => parse_whole(number).and_then(Duration::try_hours),
                'M' => parse_whole(number).and_then(Duration::try_minutes),
                'S' => parse_seconds(number),
                _ => None,
            }
            .ok_or_else(invalid)?;
            // Time units share the seen list; tag them so 'M' here is not months.
            let tag = unit.to_ascii_lowercase();
            if seen.contains(&tag) {
                return Err(invalid());
            }
            seen.push(tag);
            total = total.checked_add(&part).ok_or_else(invalid)?;
        }
    }

    Ok(if negative { -total } else { total })
}

/// Format a duration as ISO-8601, using days and time units.
pub fn format(duration: &Duration) -> String {
    if *duration < Duration::zero() {
        return format!("-{}", format(&-*duration));
    }

    let total_seconds = duration.num_seconds();
    let nanos = (*duration - Duration::seconds(total_seconds))
        .num_nanoseconds()
        .unwrap_or(0);

    let days = total_seconds / SECONDS_PER_DAY;
    let rest = total_seconds % SECONDS_PER_DAY;
    let (hours, minutes, seconds) = (rest / 3600, (rest % 3600) / 60, rest % 60);

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }

    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 || nanos > 0 {
            if nanos > 0 {
                let fraction = format!("{:09}", nanos);
                out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{}S", seconds));
            }
        }
    } else if days == 0 {
        out.push_str("T0S");
    }

    out
}

/// Split `"1D"`, `"12H30M"`, `"1.5S"` into `(number, UNIT)` pairs.
fn components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut out = Vec::new();
    let mut start = 0;

    for (idx, ch) in part.char_indices() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            continue;
        }
        if !ch.is_ascii_alphabetic() || idx == start {
            return None;
        }
        out.push((&part[start..idx], ch.to_ascii_uppercase()));
        start = idx + ch.len_utf8();
    }

    (start == part.len()).then_some(out)
}

fn parse_whole(number: &str) -> Option<i64> {
    number.parse().ok()
}

fn parse_seconds(number: &str) -> Option<Duration> {
    let number = number.replace(',', ".");
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number.as_str(), ""),
    };

    if whole.is_empty() || fraction.len() > 9 || fraction.contains('.') {
        return None;
    }

    let seconds = Duration::try_seconds(whole.parse().ok()?)?;
    if fraction.is_empty() {
        return Some(seconds);
    }

    let nanos: i64 = format!("{:0<9}", fraction).parse().ok()?;
    seconds.checked_add(&Duration::nanoseconds(nanos))
}

/// Serde adapter for `#[serde(with = "duration::iso8601")]`.
pub mod iso8601 {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    /// Serialize as an ISO-8601 string.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(duration))
    }

    /// Deserialize from an ISO-8601 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(D::Error::custom)
    }
}
