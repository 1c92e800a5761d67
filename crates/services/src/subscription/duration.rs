//! Compact duration strings: `30`, `30d`, `12h`, `45m`.
//!
//! A bare integer counts days. No range is enforced beyond what a
//! [`chrono::Duration`] can represent.

use chrono::Duration;

use super::ports::SubscriptionError;

/// Parse a duration string into an absolute time delta
pub fn parse_duration(input: &str) -> Result<Duration, SubscriptionError> {
    let trimmed = input.trim().to_ascii_lowercase();
    let invalid = || SubscriptionError::InvalidDurationFormat(input.to_string());

    let (digits, unit) = match trimmed.char_indices().last() {
        None => return Err(invalid()),
        Some((idx, c @ ('m' | 'h' | 'd'))) => (&trimmed[..idx], c),
        Some(_) => (trimmed.as_str(), 'd'),
    };

    // `u64::from_str` would accept a leading '+'
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let amount: i64 = digits.parse().map_err(|_| invalid())?;

    let delta = match unit {
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        _ => Duration::try_days(amount),
    };
    delta.ok_or_else(invalid)
}
