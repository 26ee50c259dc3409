//! Remaining-time formatting for the passcode screen

use chrono::{DateTime, Utc};

/// Text shown once the deadline has passed
pub const EXPIRED_LABEL: &str = "expired";

/// Whole seconds left until `expires_at`, rounded up and clamped at zero
pub fn remaining_seconds(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = expires_at.signed_duration_since(now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis as u64 + 999) / 1000
}

/// "mm:ss remaining" for a future deadline, "expired" otherwise
pub fn format_countdown(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = remaining_seconds(expires_at, now);
    if secs == 0 {
        return EXPIRED_LABEL.to_string();
    }
    format!("{:02}:{:02} remaining", secs / 60, secs % 60)
}
