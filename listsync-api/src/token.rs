//! Change tokens: the continuation cursor of a list's change feed.
//!
//! Upstream produces tokens of the form `{version};{scope};{scopeId};{ticks};{changeNumber}`,
//! where `ticks` counts 100ns intervals since 0001-01-01T00:00:00Z. Apart from synthesizing
//! a bootstrap token and comparing positions, the token is carried as an opaque string.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Token version and list scope used when synthesizing a bootstrap token.
const TOKEN_VERSION: &str = "1";
const LIST_SCOPE: &str = "3";

/// Opaque continuation cursor into an upstream change feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

/// Position of a token within the feed, used only for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenPosition {
    /// Time component in 100ns ticks since 0001-01-01
    pub ticks: i64,
    /// Change sequence number, `-1` for synthetic tokens
    pub change_number: i64,
}

impl ChangeToken {
    /// Wrap a token string received from upstream or read from storage.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Synthesize a token positioned at `at` for the given list.
    ///
    /// Used when no cursor exists for a subscription: the feed is read from that
    /// point in time instead of from the beginning of the list's history.
    pub fn bootstrap(resource_id: Uuid, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{TOKEN_VERSION};{LIST_SCOPE};{resource_id};{};-1",
            datetime_to_ticks(at)
        ))
    }

    /// Bootstrap token positioned `lookback` before `now`.
    pub fn bootstrap_before(resource_id: Uuid, now: DateTime<Utc>, lookback: Duration) -> Self {
        Self::bootstrap(resource_id, now - lookback)
    }

    /// Get the raw token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the feed position out of the token, if it has the expected shape.
    pub fn position(&self) -> Option<TokenPosition> {
        let parts: Vec<&str> = self.0.split(';').collect();
        if parts.len() != 5 {
            return None;
        }
        let ticks = parts[3].trim().parse::<i64>().ok()?;
        let change_number = parts[4].trim().parse::<i64>().ok()?;
        Some(TokenPosition {
            ticks,
            change_number,
        })
    }

    /// Point in time the token refers to.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.position().and_then(|p| ticks_to_datetime(p.ticks))
    }

    /// Compare two tokens using the feed's ordering.
    ///
    /// Returns `None` if either token does not carry a parseable position.
    pub fn feed_cmp(&self, other: &ChangeToken) -> Option<Ordering> {
        Some(self.position()?.cmp(&other.position()?))
    }

    /// Whether this token is positioned strictly after `other`.
    pub fn is_after(&self, other: &ChangeToken) -> bool {
        matches!(self.feed_cmp(other), Some(Ordering::Greater))
    }
}

impl std::fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChangeToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChangeToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Convert a UTC timestamp into upstream ticks.
pub fn datetime_to_ticks(at: DateTime<Utc>) -> i64 {
    UNIX_EPOCH_TICKS
        + at.timestamp() * TICKS_PER_SECOND
        + i64::from(at.timestamp_subsec_nanos()) / NANOS_PER_TICK
}

/// Convert upstream ticks into a UTC timestamp.
pub fn ticks_to_datetime(ticks: i64) -> Option<DateTime<Utc>> {
    let since_epoch = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
    DateTime::from_timestamp(secs, u32::try_from(nanos).ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn list_id() -> Uuid {
        Uuid::parse_str("5c1b4e3a-6a1f-4c0e-9a55-3f2b1d7e9c10").unwrap()
    }

    #[test]
    fn test_unix_epoch_ticks() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(datetime_to_ticks(epoch), UNIX_EPOCH_TICKS);
        assert_eq!(ticks_to_datetime(UNIX_EPOCH_TICKS), Some(epoch));
    }

    #[test]
    fn test_bootstrap_token_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let token = ChangeToken::bootstrap(list_id(), at);

        let parts: Vec<&str> = token.as_str().split(';').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0], "1");
        assert_eq!(parts[1], "3");
        assert_eq!(parts[2], list_id().to_string());
        assert_eq!(parts[4], "-1");
        assert_eq!(token.timestamp(), Some(at));
    }

    #[test]
    fn test_bootstrap_before_is_lookback_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let token = ChangeToken::bootstrap_before(list_id(), now, Duration::minutes(5));
        assert_eq!(
            token.timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 55, 0).unwrap())
        );
    }

    #[test]
    fn test_position_parsing() {
        let token =
            ChangeToken::new("1;3;5c1b4e3a-6a1f-4c0e-9a55-3f2b1d7e9c10;638450000000000000;1234");
        assert_eq!(
            token.position(),
            Some(TokenPosition {
                ticks: 638_450_000_000_000_000,
                change_number: 1234
            })
        );

        assert_eq!(ChangeToken::new("opaque").position(), None);
        assert_eq!(ChangeToken::new("1;3;x;notanumber;1").position(), None);
    }

    #[test]
    fn test_feed_ordering() {
        let earlier = ChangeToken::new("1;3;a;100;7");
        let later_same_tick = ChangeToken::new("1;3;a;100;8");
        let later = ChangeToken::new("1;3;a;200;1");

        assert!(later_same_tick.is_after(&earlier));
        assert!(later.is_after(&later_same_tick));
        assert!(!earlier.is_after(&later));
        assert_eq!(earlier.feed_cmp(&earlier), Some(Ordering::Equal));
        assert_eq!(earlier.feed_cmp(&ChangeToken::new("opaque")), None);
    }

    #[test]
    fn test_serde_transparent() {
        let token = ChangeToken::new("1;3;a;100;7");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"1;3;a;100;7\"");
        let back: ChangeToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    proptest! {
        #[test]
        fn prop_bootstrap_ordering_follows_time(
            a in 0i64..4_000_000_000,
            b in 0i64..4_000_000_000,
        ) {
            let ta = Utc.timestamp_opt(a, 0).unwrap();
            let tb = Utc.timestamp_opt(b, 0).unwrap();
            let token_a = ChangeToken::bootstrap(list_id(), ta);
            let token_b = ChangeToken::bootstrap(list_id(), tb);
            prop_assert_eq!(token_a.feed_cmp(&token_b), Some(ta.cmp(&tb)));
        }
    }
}
