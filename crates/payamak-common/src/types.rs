//! Common types for Payamak

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for segments
pub type SegmentId = Uuid;

/// Unique identifier for users
pub type UserId = Uuid;

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

/// Normalize a raw phone number entry: strips whitespace and common
/// punctuation, then accepts it only if what remains is all digits and at
/// least 9 characters long.
///
/// Returns the cleaned digit string, or `None` if the entry is unusable.
pub fn sanitize_number(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.' | '+'))
        .collect();

    if cleaned.len() >= 9 && cleaned.chars().all(|c| c.is_ascii_digit()) {
        Some(cleaned)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_number() {
        assert_eq!(
            sanitize_number("989121234567").as_deref(),
            Some("989121234567")
        );
    }

    #[test]
    fn test_sanitize_strips_punctuation() {
        assert_eq!(
            sanitize_number("+98 (912) 123-4567").as_deref(),
            Some("989121234567")
        );
        assert_eq!(
            sanitize_number("0912.123.4567").as_deref(),
            Some("09121234567")
        );
    }

    #[test]
    fn test_sanitize_rejects_short() {
        assert!(sanitize_number("12345678").is_none());
        assert!(sanitize_number("").is_none());
    }

    #[test]
    fn test_sanitize_rejects_non_digit() {
        assert!(sanitize_number("98912abc4567").is_none());
        assert!(sanitize_number("not a number").is_none());
    }
}
