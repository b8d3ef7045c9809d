//! Rate limit rules.

use crate::RateLimitError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a rate limit window.
///
/// Only these durations are supported; each has a short label used in
/// counter keys and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    /// One minute (`1m`).
    OneMinute,
    /// Five minutes (`5m`).
    FiveMinutes,
    /// Fifteen minutes (`15m`).
    FifteenMinutes,
    /// Thirty minutes (`30m`).
    ThirtyMinutes,
    /// One hour (`1h`).
    OneHour,
    /// Six hours (`6h`).
    SixHours,
    /// Twelve hours (`12h`).
    TwelveHours,
    /// One day (`1d`).
    OneDay,
    /// Seven days (`7d`).
    SevenDays,
    /// Thirty days (`30d`).
    ThirtyDays,
}

const MINUTE_MS: i64 = 60 * 1000;

impl Period {
    /// Every supported period, shortest first.
    pub const ALL: [Self; 10] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::SixHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::SevenDays,
        Self::ThirtyDays,
    ];

    /// Returns the short label (e.g. `"1h"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::SixHours => "6h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
        }
    }

    /// Returns the length in milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        let minutes = match self {
            Self::OneMinute => 1,
            Self::FiveMinutes => 5,
            Self::FifteenMinutes => 15,
            Self::ThirtyMinutes => 30,
            Self::OneHour => 60,
            Self::SixHours => 6 * 60,
            Self::TwelveHours => 12 * 60,
            Self::OneDay => 24 * 60,
            Self::SevenDays => 7 * 24 * 60,
            Self::ThirtyDays => 30 * 24 * 60,
        };
        minutes * MINUTE_MS
    }

    /// Returns the length as a duration.
    #[must_use]
    pub fn as_delta(self) -> TimeDelta {
        TimeDelta::milliseconds(self.as_millis())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|period| period.label() == s)
            .ok_or_else(|| RateLimitError::invalid_rule(format!("unknown period `{s}`")))
    }
}

impl TryFrom<String> for Period {
    type Error = RateLimitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.label().to_string()
    }
}

/// A quota on one action.
///
/// # Example
///
/// ```
/// use covenant_ratelimit::{Period, RateLimitRule};
///
/// let rule = RateLimitRule::new("send-magic-link", ["email"], 5, Period::OneHour).unwrap();
/// assert_eq!(rule.limit(), 5);
///
/// assert!(RateLimitRule::new("send-magic-link", ["email"], 0, Period::OneHour).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitRule {
    action: String,
    context: Vec<String>,
    limit: u64,
    period: Period,
}

impl RateLimitRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidRule`] if `limit` is zero, `action` is
    /// empty, or `context` names no keys.
    pub fn new<I, S>(
        action: impl Into<String>,
        context: I,
        limit: u64,
        period: Period,
    ) -> Result<Self, RateLimitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let action = action.into();
        let context: Vec<String> = context.into_iter().map(Into::into).collect();

        if action.is_empty() {
            return Err(RateLimitError::invalid_rule("action must not be empty"));
        }
        if context.is_empty() {
            return Err(RateLimitError::invalid_rule(format!(
                "rule `{action}` must name at least one context key"
            )));
        }
        if limit == 0 {
            return Err(RateLimitError::invalid_rule(format!(
                "rule `{action}` must allow at least one operation"
            )));
        }

        Ok(Self {
            action,
            context,
            limit,
            period,
        })
    }

    /// Returns the protected action.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the context keys, in principal order.
    #[must_use]
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Returns the maximum operations per window.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the window length.
    #[must_use]
    pub const fn period(&self) -> Period {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for period in Period::ALL {
            assert_eq!(period.label().parse::<Period>().unwrap(), period);
        }
        assert!("2h".parse::<Period>().is_err());
    }

    #[test]
    fn test_periods_ascend() {
        let millis: Vec<_> = Period::ALL.iter().map(|p| p.as_millis()).collect();
        assert!(millis.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Period::OneHour.as_millis(), 3_600_000);
        assert_eq!(Period::ThirtyDays.as_delta(), TimeDelta::days(30));
    }

    #[test]
    fn test_period_serde_uses_label() {
        assert_eq!(serde_json::to_string(&Period::FifteenMinutes).unwrap(), "\"15m\"");
        let period: Period = serde_json::from_str("\"7d\"").unwrap();
        assert_eq!(period, Period::SevenDays);
        assert!(serde_json::from_str::<Period>("\"2h\"").is_err());
    }

    #[test]
    fn test_rule_rejects_invalid() {
        assert!(RateLimitRule::new("", ["email"], 1, Period::OneMinute).is_err());
        assert!(RateLimitRule::new("a", Vec::<String>::new(), 1, Period::OneMinute).is_err());
        assert!(RateLimitRule::new("a", ["email"], 0, Period::OneMinute).is_err());
    }

    #[test]
    fn test_rule_accessors() {
        let rule = RateLimitRule::new("login", ["tenant", "email"], 10, Period::FiveMinutes)
            .unwrap();
        assert_eq!(rule.action(), "login");
        assert_eq!(rule.context(), ["tenant", "email"]);
        assert_eq!(rule.limit(), 10);
        assert_eq!(rule.period(), Period::FiveMinutes);
    }
}
