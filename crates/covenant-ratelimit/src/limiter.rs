//! Fixed-window enforcement.
//!
//! Time is cut into windows of one [`Period`] each, aligned to the Unix
//! epoch. Every call increments the counter for
//! `rl#<action>#<principal>#<period>#<window>`; the call fails once that
//! counter passes the rule's limit. The window index is rendered in radix 36
//! to keep keys short.
//!
//! The action and each context value are percent-encoded before they are
//! joined, so no value can forge a `:` or `#` boundary and two different
//! principals or actions never share a counter.

use crate::{
    CounterStore, MemoryCounterStore, RateLimitError, RateLimitRule, RedisCounterStore, StoreError,
};
use chrono::{DateTime, Utc};
use covenant_config::{RateLimitBackend, RateLimitSettings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Values for a rule's context keys.
pub type RateLimitContext = HashMap<String, String>;

const KEY_PREFIX: &str = "rl";
const PRINCIPAL_SEPARATOR: &str = ":";

/// Quota state after one counted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Calls counted in the current window, this one included.
    pub count: u64,
    /// The rule's limit.
    pub limit: u64,
    /// Calls left before the limit is exceeded.
    pub remaining: u64,
    /// When the current window closes.
    pub resets_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Returns `true` if this call pushed the count past the limit.
    #[must_use]
    pub const fn is_exceeded(&self) -> bool {
        self.count > self.limit
    }
}

/// Enforces [`RateLimitRule`]s against a shared [`CounterStore`].
///
/// # Example
///
/// ```
/// use covenant_ratelimit::{Period, RateLimitContext, RateLimitRule, RateLimiter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), covenant_ratelimit::RateLimitError> {
/// let limiter = RateLimiter::in_memory();
/// let rule = RateLimitRule::new("send-magic-link", ["email"], 5, Period::OneHour)?;
///
/// let mut context = RateLimitContext::new();
/// context.insert("email".into(), "ada@example.com".into());
///
/// limiter.enforce(&rule, &context).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Creates a limiter with a fresh [`MemoryCounterStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCounterStore::new()))
    }

    /// Creates a limiter from the `rate_limit` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Store`] if the Redis backend is selected
    /// without a URL or cannot be reached.
    pub async fn from_settings(settings: &RateLimitSettings) -> Result<Self, RateLimitError> {
        let store: Arc<dyn CounterStore> = match settings.backend {
            RateLimitBackend::Memory => Arc::new(MemoryCounterStore::new()),
            RateLimitBackend::Redis => {
                let url = settings.redis_url.as_deref().ok_or_else(|| {
                    StoreError::Backend("rate_limit.redis_url is required for redis".into())
                })?;
                Arc::new(RedisCounterStore::connect(url).await?)
            }
        };
        Ok(Self::new(store))
    }

    /// Counts one call against `rule` and fails if the quota is used up.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] once the count passes the limit,
    /// [`RateLimitError::MissingContext`] if `context` lacks a rule key, and
    /// [`RateLimitError::Store`] if the store fails.
    pub async fn enforce(
        &self,
        rule: &RateLimitRule,
        context: &RateLimitContext,
    ) -> Result<(), RateLimitError> {
        self.enforce_at(rule, context, Utc::now()).await
    }

    /// Like [`enforce`](Self::enforce), at an explicit instant.
    ///
    /// # Errors
    ///
    /// See [`enforce`](Self::enforce).
    pub async fn enforce_at(
        &self,
        rule: &RateLimitRule,
        context: &RateLimitContext,
        now: DateTime<Utc>,
    ) -> Result<(), RateLimitError> {
        let principal = principal(rule, context)?;
        let status = self.count(rule, &principal, now).await?;

        if status.is_exceeded() {
            let retry_after = (status.resets_at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(
                action = rule.action(),
                principal = %principal,
                limit = rule.limit(),
                count = status.count,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "rate limit exceeded"
            );
            return Err(RateLimitError::Exceeded {
                action: rule.action().to_string(),
                principal,
                limit: rule.limit(),
                retry_after,
            });
        }

        Ok(())
    }

    /// Counts one call against `rule` and reports the quota without failing.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::MissingContext`] or [`RateLimitError::Store`].
    pub async fn check(
        &self,
        rule: &RateLimitRule,
        context: &RateLimitContext,
    ) -> Result<RateLimitStatus, RateLimitError> {
        self.check_at(rule, context, Utc::now()).await
    }

    /// Like [`check`](Self::check), at an explicit instant.
    ///
    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub async fn check_at(
        &self,
        rule: &RateLimitRule,
        context: &RateLimitContext,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, RateLimitError> {
        let principal = principal(rule, context)?;
        self.count(rule, &principal, now).await
    }

    async fn count(
        &self,
        rule: &RateLimitRule,
        principal: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus, RateLimitError> {
        let period = rule.period();
        let window = window_index(now.timestamp_millis(), period.as_millis());
        let key = counter_key(rule, principal, window);

        let count = self.store.increment(&key, period.as_delta(), now).await?;
        tracing::debug!(key = %key, count, "rate limit counter incremented");

        let window_end_ms = window.saturating_add(1).saturating_mul(period.as_millis());
        let resets_at = DateTime::from_timestamp_millis(window_end_ms).unwrap_or(now);

        Ok(RateLimitStatus {
            count,
            limit: rule.limit(),
            remaining: rule.limit().saturating_sub(count),
            resets_at,
        })
    }
}

/// Joins the encoded context values for the rule's keys, in rule order.
fn principal(rule: &RateLimitRule, context: &RateLimitContext) -> Result<String, RateLimitError> {
    let values = rule
        .context()
        .iter()
        .map(|key| {
            context
                .get(key)
                .map(|value| urlencoding::encode(value))
                .ok_or_else(|| RateLimitError::MissingContext {
                    action: rule.action().to_string(),
                    key: key.clone(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values.join(PRINCIPAL_SEPARATOR))
}

/// Index of the epoch-aligned window containing `now_ms`.
const fn window_index(now_ms: i64, period_ms: i64) -> i64 {
    now_ms.div_euclid(period_ms)
}

fn counter_key(rule: &RateLimitRule, principal: &str, window: i64) -> String {
    format!(
        "{KEY_PREFIX}#{}#{principal}#{}#{}",
        urlencoding::encode(rule.action()),
        rule.period(),
        to_radix36(window)
    )
}

fn to_radix36(value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut n = value.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    if value < 0 {
        digits.push(b'-');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Period;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn context(pairs: &[(&str, &str)]) -> RateLimitContext {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn magic_link() -> RateLimitRule {
        RateLimitRule::new("send-magic-link", ["email"], 5, Period::OneHour).unwrap()
    }

    #[test]
    fn test_radix36() {
        assert_eq!(to_radix36(0), "0");
        assert_eq!(to_radix36(35), "z");
        assert_eq!(to_radix36(36), "10");
        assert_eq!(to_radix36(-37), "-11");
        assert_eq!(to_radix36(i64::MIN), "-1y2p0ij32e8e8");
    }

    #[test]
    fn test_counter_key_format() {
        let rule = RateLimitRule::new("login", ["tenant", "email"], 3, Period::OneMinute).unwrap();
        let ctx = context(&[("email", "a@b.c"), ("tenant", "acme")]);
        let principal = principal(&rule, &ctx).unwrap();
        assert_eq!(principal, "acme:a%40b.c");

        // 2024-01-01T00:00:00Z is minute 28_401_120 since the epoch.
        let window = window_index(1_704_067_200_000, Period::OneMinute.as_millis());
        assert_eq!(window, 28_401_120);
        assert_eq!(
            counter_key(&rule, &principal, window),
            format!("rl#login#acme:a%40b.c#1m#{}", to_radix36(28_401_120))
        );
    }

    #[test]
    fn test_missing_context_key() {
        let err = principal(&magic_link(), &context(&[("user", "1")])).unwrap_err();
        assert!(matches!(
            err,
            RateLimitError::MissingContext { ref key, .. } if key == "email"
        ));
    }

    #[tokio::test]
    async fn test_magic_link_sixth_call_fails() {
        let limiter = RateLimiter::in_memory();
        let rule = magic_link();
        let ada = context(&[("email", "ada@example.com")]);
        let now = at(1_704_067_200_000);

        for _ in 0..5 {
            limiter.enforce_at(&rule, &ada, now).await.unwrap();
        }
        let err = limiter.enforce_at(&rule, &ada, now).await.unwrap_err();
        match err {
            RateLimitError::Exceeded {
                action,
                principal,
                limit,
                retry_after,
            } => {
                assert_eq!(action, "send-magic-link");
                assert_eq!(principal, "ada%40example.com");
                assert_eq!(limit, 5);
                assert_eq!(retry_after, Duration::from_secs(3600));
            }
            other => panic!("expected Exceeded, got {other:?}"),
        }

        let grace = context(&[("email", "grace@example.com")]);
        limiter.enforce_at(&rule, &grace, now).await.unwrap();
    }

    #[tokio::test]
    async fn test_actions_are_isolated() {
        let limiter = RateLimiter::in_memory();
        let ctx = context(&[("email", "ada@example.com")]);
        let first = RateLimitRule::new("a", ["email"], 1, Period::OneHour).unwrap();
        let second = RateLimitRule::new("b", ["email"], 1, Period::OneHour).unwrap();
        let now = at(0);

        limiter.enforce_at(&first, &ctx, now).await.unwrap();
        limiter.enforce_at(&second, &ctx, now).await.unwrap();
        assert!(limiter.enforce_at(&first, &ctx, now).await.is_err());
    }

    #[tokio::test]
    async fn test_separators_in_values_do_not_collide() {
        let limiter = RateLimiter::in_memory();
        let now = at(0);

        let login = RateLimitRule::new("login", ["tenant", "user"], 1, Period::OneHour).unwrap();
        limiter
            .enforce_at(&login, &context(&[("tenant", "a:b"), ("user", "c")]), now)
            .await
            .unwrap();
        limiter
            .enforce_at(&login, &context(&[("tenant", "a"), ("user", "b:c")]), now)
            .await
            .unwrap();

        let short = RateLimitRule::new("x", ["k"], 1, Period::OneHour).unwrap();
        let long = RateLimitRule::new("x#y", ["k"], 1, Period::OneHour).unwrap();
        limiter
            .enforce_at(&short, &context(&[("k", "y#z")]), now)
            .await
            .unwrap();
        limiter
            .enforce_at(&long, &context(&[("k", "z")]), now)
            .await
            .unwrap();
    }

    #[test]
    fn test_keys_differ_when_values_hold_separators() {
        let rule = RateLimitRule::new("login", ["tenant", "user"], 1, Period::OneMinute).unwrap();
        let first = principal(&rule, &context(&[("tenant", "a:b"), ("user", "c")])).unwrap();
        let second = principal(&rule, &context(&[("tenant", "a"), ("user", "b:c")])).unwrap();
        assert_ne!(first, second);
        assert_eq!(first, "a%3Ab:c");

        let short = RateLimitRule::new("x", ["k"], 1, Period::OneMinute).unwrap();
        let long = RateLimitRule::new("x#y", ["k"], 1, Period::OneMinute).unwrap();
        let short_key = counter_key(&short, &principal(&short, &context(&[("k", "y#z")])).unwrap(), 0);
        let long_key = counter_key(&long, &principal(&long, &context(&[("k", "z")])).unwrap(), 0);
        assert_eq!(short_key, "rl#x#y%23z#1m#0");
        assert_eq!(long_key, "rl#x%23y#z#1m#0");
    }

    #[tokio::test]
    async fn test_next_window_resets() {
        let limiter = RateLimiter::in_memory();
        let rule = RateLimitRule::new("a", ["email"], 2, Period::FiveMinutes).unwrap();
        let ctx = context(&[("email", "x")]);
        let start = at(0);
        let period = Period::FiveMinutes.as_delta();

        limiter.enforce_at(&rule, &ctx, start).await.unwrap();
        limiter.enforce_at(&rule, &ctx, start).await.unwrap();

        let almost = start + period - TimeDelta::milliseconds(1);
        assert!(limiter.enforce_at(&rule, &ctx, almost).await.is_err());

        limiter.enforce_at(&rule, &ctx, start + period).await.unwrap();
    }

    #[tokio::test]
    async fn test_check_reports_status() {
        let limiter = RateLimiter::in_memory();
        let rule = RateLimitRule::new("a", ["email"], 2, Period::OneMinute).unwrap();
        let ctx = context(&[("email", "x")]);
        let now = at(90_000);

        let status = limiter.check_at(&rule, &ctx, now).await.unwrap();
        assert_eq!(status.count, 1);
        assert_eq!(status.remaining, 1);
        assert_eq!(status.resets_at, at(120_000));

        limiter.check_at(&rule, &ctx, now).await.unwrap();
        let status = limiter.check_at(&rule, &ctx, now).await.unwrap();
        assert!(status.is_exceeded());
        assert_eq!(status.remaining, 0);
    }

    #[tokio::test]
    async fn test_from_settings_requires_redis_url() {
        let settings = RateLimitSettings {
            backend: RateLimitBackend::Redis,
            redis_url: None,
        };
        let err = RateLimiter::from_settings(&settings).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Store(StoreError::Backend(_))));

        assert!(RateLimiter::from_settings(&RateLimitSettings::default())
            .await
            .is_ok());
    }

    proptest! {
        #[test]
        fn prop_window_contains_now(now_ms in -1_000_000_000_000_i64..4_000_000_000_000, idx in 0usize..10) {
            let period_ms = Period::ALL[idx].as_millis();
            let window = window_index(now_ms, period_ms);
            prop_assert!(window * period_ms <= now_ms);
            prop_assert!(now_ms < (window + 1) * period_ms);
        }

        #[test]
        fn prop_same_window_iff_same_index(a in 0_i64..10_000_000_000, delta in 0_i64..7_200_000) {
            let period_ms = Period::OneHour.as_millis();
            let b = a + delta;
            let same = window_index(a, period_ms) == window_index(b, period_ms);
            prop_assert_eq!(same, a / period_ms == b / period_ms);
            if delta >= period_ms {
                prop_assert!(!same);
            }
        }

        #[test]
        fn prop_radix36_round_trips(value in any::<i64>()) {
            prop_assert_eq!(i64::from_str_radix(&to_radix36(value), 36).unwrap(), value);
        }

        #[test]
        fn prop_first_n_succeed(limit in 1_u64..20, offset in 0_i64..3_600_000) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let limiter = RateLimiter::in_memory();
                let rule = RateLimitRule::new("p", ["k"], limit, Period::OneHour).unwrap();
                let ctx = context(&[("k", "v")]);
                let now = at(offset);

                for _ in 0..limit {
                    prop_assert!(limiter.enforce_at(&rule, &ctx, now).await.is_ok());
                }
                for _ in 0..3 {
                    let is_exceeded = limiter
                        .enforce_at(&rule, &ctx, now)
                        .await
                        .is_err_and(|e| e.is_exceeded());
                    prop_assert!(is_exceeded);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
