//! Field normalizers for raw JSON values.
//!
//! Each normalizer coerces a single raw value into its target type or `None`
//! and never fails. Values that look like they were meant to carry data but
//! cannot be coerced are reported to a [`Diagnostics`] sink, which logs them
//! through `tracing` and keeps them for the caller to inspect.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Date formats tried in order for string publication dates.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

fn author_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]").expect("author separator pattern is valid"))
}

/// A single non-fatal coercion failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiagnostic {
    /// Core field the value was destined for
    pub field: &'static str,
    /// The raw value as it appeared in the record
    pub raw: Value,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (raw={})", self.field, self.message, self.raw)
    }
}

/// Collects field diagnostics produced while constructing one entity.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<FieldDiagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a coercion failure and emit it as a warning.
    pub fn report(&mut self, field: &'static str, raw: &Value, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(field, raw = %raw, "{}", message);
        self.entries.push(FieldDiagnostic {
            field,
            raw: raw.clone(),
            message,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDiagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<FieldDiagnostic> {
        self.entries
    }
}

/// A publication date, either parsed or kept verbatim for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PublicationDate {
    Date(NaiveDate),
    Unparsed(String),
}

impl From<NaiveDate> for PublicationDate {
    fn from(date: NaiveDate) -> Self {
        PublicationDate::Date(date)
    }
}

impl fmt::Display for PublicationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublicationDate::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            PublicationDate::Unparsed(s) => write!(f, "{}", s),
        }
    }
}

/// Render a JSON value as text.
///
/// Strings are returned without quotes; everything else uses its JSON form.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True for `null`, `""` and whitespace-only strings.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Collapse internal whitespace runs to a single space and trim both ends.
///
/// Already-normalized input is returned unchanged.
pub fn collapse_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text.trim(), " ").into_owned()
}

/// Normalize a trimmed string field.
///
/// `null`, empty and whitespace-only values become `None`; non-string scalars
/// are stringified first.
pub fn normalize_string(value: &Value) -> Option<String> {
    if is_blank(value) {
        return None;
    }

    let normalized = collapse_whitespace(&stringify(value));
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Normalize a list-of-strings field such as `authors`.
///
/// # Examples
///
/// ```
/// use metabrowse::normalize::normalize_string_list;
/// use serde_json::json;
///
/// assert_eq!(normalize_string_list(&json!("A, B; C")), vec!["A", "B", "C"]);
/// assert_eq!(normalize_string_list(&json!(["  Anna  ", ""])), vec!["Anna"]);
/// ```
pub fn normalize_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) => author_separator()
            .split(s)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            // null elements carry no name
            .filter(|item| !item.is_null())
            .map(|item| stringify(item).trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        other => {
            let single = stringify(other).trim().to_string();
            if single.is_empty() {
                Vec::new()
            } else {
                vec![single]
            }
        }
    }
}

/// Normalize a positive integer field such as `pages`.
///
/// Integers, integral-truncated floats and integer strings are accepted.
/// Non-numeric input is reported and yields `None`; values `<= 0` yield `None`.
pub fn normalize_positive_int(
    field: &'static str,
    value: &Value,
    diagnostics: &mut Diagnostics,
) -> Option<u32> {
    if is_blank(value) {
        return None;
    }

    let parsed: Option<i64> = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let Some(number) = parsed else {
        diagnostics.report(field, value, format!("cannot parse {} value, setting to null", field));
        return None;
    };

    if number <= 0 {
        tracing::debug!(field, number, "discarding non-positive value");
        return None;
    }

    match u32::try_from(number) {
        Ok(n) => Some(n),
        Err(_) => {
            diagnostics.report(field, value, format!("{} value {} is out of range", field, number));
            None
        }
    }
}

/// Normalize a non-negative float field such as `price`.
pub fn normalize_non_negative_float(
    field: &'static str,
    value: &Value,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    if is_blank(value) {
        return None;
    }

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        None => {
            diagnostics.report(field, value, format!("cannot parse {} value, setting to null", field));
            None
        }
        Some(f) if !f.is_finite() => {
            diagnostics.report(field, value, format!("{} value is not finite", field));
            None
        }
        Some(f) if f < 0.0 => {
            tracing::debug!(field, value = f, "discarding negative value");
            None
        }
        Some(f) => Some(f),
    }
}

/// Normalize a date field such as `publication_date`.
///
/// Strings are tried against [`DATE_FORMATS`] in order. A string matching none
/// of them is kept verbatim (trimmed) and reported. Other JSON types are
/// stringified.
pub fn normalize_date(
    field: &'static str,
    value: &Value,
    diagnostics: &mut Diagnostics,
) -> Option<PublicationDate> {
    if is_blank(value) {
        return None;
    }

    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok());

            match parsed {
                Some(date) => Some(PublicationDate::Date(date)),
                None => {
                    diagnostics.report(field, value, "cannot parse date format, storing as string");
                    Some(PublicationDate::Unparsed(trimmed.to_string()))
                }
            }
        }
        other => Some(PublicationDate::Unparsed(stringify(other))),
    }
}
