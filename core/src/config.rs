//! Lifecycle configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// What happens when a domain event cannot be published after commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDelivery {
    /// Log and count the failure; the call still succeeds
    #[default]
    BestEffort,
    /// Fail the call with `EventDelivery` (the state change stays committed)
    Required,
}

impl EventDelivery {
    /// Parse `best_effort` or `required`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Some(Self::BestEffort),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

/// Tunables for the request/distribution lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum number of target facilities in one request group
    pub max_group_facilities: usize,
    /// Length of generated tracking numbers
    pub tracking_number_length: usize,
    /// Attempts at generating an unused tracking number
    pub tracking_number_attempts: u32,
    /// Expiry, in days from today, of inventory rows recreated on restock
    pub restock_expiry_days: i64,
    /// Post-commit event delivery policy
    pub event_delivery: EventDelivery,
    /// Allow distributions with no matching inventory unit
    pub allow_unlinked_distributions: bool,
    /// Default look-ahead for expiring distributions, in days
    pub expiring_window_days: i64,
    /// Default look-back for recent distributions, in days
    pub recent_window_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_group_facilities: 10,
            tracking_number_length: 12,
            tracking_number_attempts: 5,
            restock_expiry_days: 30,
            event_delivery: EventDelivery::BestEffort,
            allow_unlinked_distributions: true,
            expiring_window_days: 7,
            recent_window_days: 7,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from `BLOODBANK_*` environment variables.
    ///
    /// Unset or unparseable variables fall back to [`LifecycleConfig::default`],
    /// as do zero counts and lengths.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_group_facilities: positive(env::var("BLOODBANK_MAX_GROUP_FACILITIES").ok(), defaults.max_group_facilities),
            tracking_number_length: positive(env::var("BLOODBANK_TRACKING_NUMBER_LENGTH").ok(), defaults.tracking_number_length),
            tracking_number_attempts: positive(env::var("BLOODBANK_TRACKING_NUMBER_ATTEMPTS").ok(), defaults.tracking_number_attempts),
            restock_expiry_days: env::var("BLOODBANK_RESTOCK_EXPIRY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.restock_expiry_days),
            event_delivery: env::var("BLOODBANK_EVENT_DELIVERY")
                .ok()
                .and_then(|s| EventDelivery::parse(&s))
                .unwrap_or(defaults.event_delivery),
            allow_unlinked_distributions: env::var("BLOODBANK_ALLOW_UNLINKED_DISTRIBUTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.allow_unlinked_distributions),
            expiring_window_days: env::var("BLOODBANK_EXPIRING_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.expiring_window_days),
            recent_window_days: env::var("BLOODBANK_RECENT_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.recent_window_days),
        }
    }
}

/// Parse a count that must be at least one.
fn positive<T>(raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default,
{
    raw.and_then(|s| s.trim().parse().ok())
        .filter(|n| *n > T::default())
        .unwrap_or(default)
}
