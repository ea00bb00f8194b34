//! Configuration loading and representation.
//!
//! Values come from the environment; unset variables use the defaults below
//! and unparsable ones fall back with a warning. Out-of-range values are
//! clamped to the nearest bound, also with a warning.

use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::Duration;

use crate::query::Pagination;

pub const DEFAULT_INVOICE_DUE_DAYS: i64 = 30;
pub const DEFAULT_CONTRACT_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_BATCH_WINDOW_DAYS: i64 = 28;
pub const DEFAULT_BATCH_INTERVAL_WEEKS: u32 = 4;

pub const INVOICE_DUE_DAYS_RANGE: RangeInclusive<i64> = 0..=3650;
pub const CONTRACT_PAGE_LIMIT_RANGE: RangeInclusive<u32> = 1..=Pagination::MAX_LIMIT;
pub const BATCH_WINDOW_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;
pub const BATCH_INTERVAL_WEEKS_RANGE: RangeInclusive<u32> = 1..=52;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Required when `use_persistent_stores` is set.
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub invoice_due_days: i64,
    pub contract_page_limit: u32,
    pub batch_window_days: i64,
    pub batch_interval_weeks: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            use_persistent_stores: false,
            invoice_due_days: DEFAULT_INVOICE_DUE_DAYS,
            contract_page_limit: DEFAULT_CONTRACT_PAGE_LIMIT,
            batch_window_days: DEFAULT_BATCH_WINDOW_DAYS,
            batch_interval_weeks: DEFAULT_BATCH_INTERVAL_WEEKS,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            use_persistent_stores: parse_or(
                &lookup,
                "USE_PERSISTENT_STORES",
                defaults.use_persistent_stores,
            ),
            invoice_due_days: parse_clamped(
                &lookup,
                "INVOICE_DUE_DAYS",
                defaults.invoice_due_days,
                INVOICE_DUE_DAYS_RANGE,
            ),
            contract_page_limit: parse_clamped(
                &lookup,
                "CONTRACT_PAGE_LIMIT",
                defaults.contract_page_limit,
                CONTRACT_PAGE_LIMIT_RANGE,
            ),
            batch_window_days: parse_clamped(
                &lookup,
                "BATCH_WINDOW_DAYS",
                defaults.batch_window_days,
                BATCH_WINDOW_DAYS_RANGE,
            ),
            batch_interval_weeks: parse_clamped(
                &lookup,
                "BATCH_INTERVAL_WEEKS",
                defaults.batch_interval_weeks,
                BATCH_INTERVAL_WEEKS_RANGE,
            ),
        }
    }

    pub fn invoice_due(&self) -> Duration {
        Duration::days(self.invoice_due_days)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::days(self.batch_window_days)
    }
}

fn parse_clamped<F, T>(lookup: &F, key: &str, default: T, range: RangeInclusive<T>) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + PartialOrd + std::fmt::Debug,
{
    let value = parse_or(lookup, key, default);
    let (min, max) = (*range.start(), *range.end());
    if value < min || value > max {
        let clamped = if value < min { min } else { max };
        tracing::warn!(key, ?value, ?clamped, "configuration value out of range; clamping");
        return clamped;
    }
    value
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, ?default, "invalid configuration value; using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = BillingConfig::from_lookup(lookup(&[]));
        assert_eq!(config, BillingConfig::default());
        assert_eq!(config.invoice_due(), Duration::days(30));
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/care"),
            ("INVOICE_DUE_DAYS", "14"),
            ("CONTRACT_PAGE_LIMIT", "lots"),
            ("BATCH_INTERVAL_WEEKS", "0"),
        ]));

        assert!(config.use_persistent_stores);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/care"));
        assert_eq!(config.invoice_due_days, 14);
        assert_eq!(config.contract_page_limit, DEFAULT_CONTRACT_PAGE_LIMIT);
        assert_eq!(config.batch_interval_weeks, 1);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let config = BillingConfig::from_lookup(lookup(&[
            ("INVOICE_DUE_DAYS", "9223372036854775807"),
            ("CONTRACT_PAGE_LIMIT", "5000"),
            ("BATCH_WINDOW_DAYS", "-3"),
        ]));

        assert_eq!(config.invoice_due_days, 3650);
        assert_eq!(config.invoice_due(), Duration::days(3650));
        assert_eq!(config.contract_page_limit, Pagination::MAX_LIMIT);
        assert_eq!(config.batch_window_days, 1);

        let config = BillingConfig::from_lookup(lookup(&[("INVOICE_DUE_DAYS", "-1")]));
        assert_eq!(config.invoice_due_days, 0);
    }
}
