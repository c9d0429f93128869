//! Shared parsing helpers for feature-service attributes.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;

/// Converts an epoch-millisecond UTC timestamp into `tz`, keeping the
/// resulting UTC offset. Returns `None` for out-of-range values.
#[must_use]
pub fn epoch_ms_to_local(ms: i64, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let utc = DateTime::<Utc>::from_timestamp_millis(ms)?;
    Some(utc.with_timezone(&tz).fixed_offset())
}

/// Reads an epoch-millisecond attribute. ArcGIS sometimes encodes dates as
/// floats, so whole-number floats are accepted too.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn attr_epoch_ms(value: &serde_json::Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Reads a string attribute, coercing numbers to their text form. `null` and
/// missing values become an empty string.
#[must_use]
pub fn attr_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Quotes a value as a SQL string literal for an ArcGIS `where` clause.
#[must_use]
pub fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
