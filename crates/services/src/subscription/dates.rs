//! Text encoding of dates for backends that store them as strings.
//!
//! Timestamps are written as `%Y-%m-%d %H:%M:%S`. Date-only values (`%Y-%m-%d`)
//! are accepted on read and mean midnight. Values carry no zone and are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::ports::SubscriptionError;

pub const STORED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_stored(value: DateTime<Utc>) -> String {
    value.format(STORED_DATETIME_FORMAT).to_string()
}

pub fn parse_stored(value: &str) -> Result<DateTime<Utc>, SubscriptionError> {
    let trimmed = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, STORED_DATETIME_FORMAT) {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(trimmed, STORED_DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SubscriptionError::DateParseFault {
            value: value.to_string(),
        })
}

/// Like [`parse_stored`] but treats a blank cell as absent
pub fn parse_stored_opt(value: &str) -> Result<Option<DateTime<Utc>>, SubscriptionError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_stored(value).map(Some)
}
