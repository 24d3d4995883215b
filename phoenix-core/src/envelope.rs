/*!
The persisted envelope and the expiration descriptor.

The envelope is the unit written to storage under the configured key. Its
JSON field names (`persistedState`, `saveDate`, `migrations`) are a stable
format contract: older snapshots must stay readable so their migration ledger
can be reconciled.
*/

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PhoenixError, Result};

/// Snapshot of store state together with when it was saved and which
/// migrations it has been through.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEnvelope {
    /// The filtered state tree, absent when nothing was persisted
    #[serde(default)]
    pub persisted_state: Option<Value>,

    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub save_date: Option<i64>,

    /// Names of applied migrations, omitted when migrations are not in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrations: Option<Vec<String>>,
}

impl PersistedEnvelope {
    /// Create an envelope stamped with `saved_at`.
    pub fn new(state: Value, saved_at: DateTime<Utc>, migrations: Option<Vec<String>>) -> Self {
        Self {
            persisted_state: Some(state),
            save_date: Some(saved_at.timestamp_millis()),
            migrations,
        }
    }

    /// The save date as a timestamp, if present and representable.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.save_date.and_then(DateTime::from_timestamp_millis)
    }

    /// Whether the envelope is older than `expire_after` at `now`.
    ///
    /// A missing save date counts as `now`, so such envelopes only expire
    /// under a negative duration.
    pub fn is_expired(&self, expire_after: &ExpireAfter, now: DateTime<Utc>) -> bool {
        let saved_at = self.saved_at().unwrap_or(now);
        match expire_after.deadline(saved_at) {
            Some(deadline) => deadline < now,
            None => false,
        }
    }
}

/// Calendar and clock units accepted by [`ExpireAfter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Milliseconds => "milliseconds",
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = PhoenixError;

    /// Accepts shorthand (`ms`, `s`, `m`, `h`, `d`, `w`, `M`, `y`) and singular
    /// or plural long names in any case. `m` is minutes and `M` is months.
    fn from_str(s: &str) -> Result<Self> {
        let unit = match s {
            "ms" => Self::Milliseconds,
            "s" => Self::Seconds,
            "m" => Self::Minutes,
            "h" => Self::Hours,
            "d" => Self::Days,
            "w" => Self::Weeks,
            "M" => Self::Months,
            "y" => Self::Years,
            long => {
                let lower = long.to_ascii_lowercase();
                match lower.strip_suffix('s').unwrap_or(&lower) {
                    "millisecond" => Self::Milliseconds,
                    "second" => Self::Seconds,
                    "minute" => Self::Minutes,
                    "hour" => Self::Hours,
                    "day" => Self::Days,
                    "week" => Self::Weeks,
                    "month" => Self::Months,
                    "year" => Self::Years,
                    _ => {
                        return Err(PhoenixError::validation(format!(
                            "Unknown time unit: {s}"
                        )))
                    }
                }
            }
        };
        Ok(unit)
    }
}

impl Serialize for TimeUnit {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TimeUnit {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How long a persisted snapshot stays valid, e.g. `[1, "days"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, TimeUnit)", into = "(i64, TimeUnit)")]
pub struct ExpireAfter {
    pub amount: i64,
    pub unit: TimeUnit,
}

impl ExpireAfter {
    pub fn new(amount: i64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// The instant `self` after `from`, or `None` on overflow.
    ///
    /// Months and years are calendar arithmetic; the rest are fixed durations.
    pub fn deadline(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let fixed = match self.unit {
            TimeUnit::Milliseconds => Duration::try_milliseconds(self.amount),
            TimeUnit::Seconds => Duration::try_seconds(self.amount),
            TimeUnit::Minutes => Duration::try_minutes(self.amount),
            TimeUnit::Hours => Duration::try_hours(self.amount),
            TimeUnit::Days => Duration::try_days(self.amount),
            TimeUnit::Weeks => Duration::try_weeks(self.amount),
            TimeUnit::Months => return add_months(from, self.amount),
            TimeUnit::Years => return add_months(from, self.amount.checked_mul(12)?),
        };
        from.checked_add_signed(fixed?)
    }
}

fn add_months(from: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let count = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        from.checked_add_months(count)
    } else {
        from.checked_sub_months(count)
    }
}

impl From<(i64, TimeUnit)> for ExpireAfter {
    fn from((amount, unit): (i64, TimeUnit)) -> Self {
        Self { amount, unit }
    }
}

impl From<ExpireAfter> for (i64, TimeUnit) {
    fn from(expire: ExpireAfter) -> Self {
        (expire.amount, expire.unit)
    }
}

impl FromStr for ExpireAfter {
    type Err = PhoenixError;

    /// Parse `"<amount> <unit>"`, e.g. `"7 days"`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(amount), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PhoenixError::validation(format!(
                "Expected '<amount> <unit>', got '{s}'"
            )));
        };
        let amount = amount
            .parse()
            .map_err(|e| PhoenixError::validation(format!("Invalid amount '{amount}': {e}")))?;
        Ok(Self::new(amount, unit.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at_millis(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = PersistedEnvelope::new(
            json!({"todos": []}),
            at_millis(1_500),
            Some(vec!["init".to_string()]),
        );
        let encoded = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            encoded,
            json!({"persistedState": {"todos": []}, "saveDate": 1500, "migrations": ["init"]})
        );
    }

    #[test]
    fn test_migrations_omitted_when_unused() {
        let envelope = PersistedEnvelope::new(json!({}), at_millis(0), None);
        let encoded = serde_json::to_string(&envelope).unwrap();
        assert_eq!(encoded, r#"{"persistedState":{},"saveDate":0}"#);
    }

    #[test]
    fn test_missing_fields_decode_as_absent() {
        let envelope: PersistedEnvelope =
            serde_json::from_str(r#"{"persistedState":{"state":"persistedState"}}"#).unwrap();
        assert_eq!(envelope.persisted_state, Some(json!({"state": "persistedState"})));
        assert!(envelope.save_date.is_none());
        assert!(envelope.migrations.is_none());
    }

    #[test]
    fn test_time_unit_parsing() {
        assert_eq!("seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert_eq!("Hour".parse::<TimeUnit>().unwrap(), TimeUnit::Hours);
        assert_eq!("m".parse::<TimeUnit>().unwrap(), TimeUnit::Minutes);
        assert_eq!("M".parse::<TimeUnit>().unwrap(), TimeUnit::Months);
        assert_eq!("ms".parse::<TimeUnit>().unwrap(), TimeUnit::Milliseconds);
        assert!("fortnights".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn test_expire_after_tuple_form() {
        let expire: ExpireAfter = serde_json::from_str(r#"[1, "seconds"]"#).unwrap();
        assert_eq!(expire, ExpireAfter::new(1, TimeUnit::Seconds));
        assert_eq!(serde_json::to_value(expire).unwrap(), json!([1, "seconds"]));
        assert_eq!("7 days".parse::<ExpireAfter>().unwrap(), ExpireAfter::new(7, TimeUnit::Days));
        assert!("7".parse::<ExpireAfter>().is_err());
    }

    #[test]
    fn test_expiration_is_strict() {
        let envelope = PersistedEnvelope::new(json!({}), at_millis(0), None);
        let one_second = ExpireAfter::new(1, TimeUnit::Seconds);
        assert!(envelope.is_expired(&one_second, at_millis(2_000)));
        assert!(!envelope.is_expired(&one_second, at_millis(1_000)));
        assert!(!envelope.is_expired(&one_second, at_millis(500)));
    }

    #[test]
    fn test_missing_save_date_never_expires() {
        let envelope = PersistedEnvelope {
            persisted_state: Some(json!({})),
            ..PersistedEnvelope::default()
        };
        assert!(!envelope.is_expired(&ExpireAfter::new(1, TimeUnit::Seconds), Utc::now()));
    }

    #[test]
    fn test_calendar_units() {
        let start = DateTime::parse_from_rfc3339("2024-01-31T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let month = ExpireAfter::new(1, TimeUnit::Months).deadline(start).unwrap();
        assert_eq!(month.to_rfc3339(), "2024-02-29T00:00:00+00:00");
        let year = ExpireAfter::new(1, TimeUnit::Years).deadline(start).unwrap();
        assert_eq!(year.to_rfc3339(), "2025-01-31T00:00:00+00:00");
    }
}
