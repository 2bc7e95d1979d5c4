//! Configuration management for the lottery runtime.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{AddrParseError, SocketAddr};

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    /// Draw behaviour
    pub draw: DrawConfig,
    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

/// Draw configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrawConfig {
    /// Fixed RNG seed for reproducible draws (`None` = OS entropy)
    pub rng_seed: Option<u64>,
    /// Tell entrants left on the waiting list after the initial draw
    pub notify_not_selected: bool,
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing filter directive (trace, debug, info, warn, error, or per-target)
    pub log_filter: String,
    /// Start the Prometheus exporter
    pub metrics_enabled: bool,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl LotteryConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            draw: DrawConfig {
                rng_seed: lookup("LOTTERY_RNG_SEED").and_then(|s| s.parse().ok()),
                notify_not_selected: lookup("LOTTERY_NOTIFY_NOT_SELECTED")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            observability: ObservabilityConfig {
                log_filter: lookup("RUST_LOG")
                    .unwrap_or_else(|| "waitlist_lottery=info,lottery_demo=info".to_string()),
                metrics_enabled: lookup("METRICS_ENABLED")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                metrics_host: lookup("METRICS_HOST")
                    .unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: lookup("METRICS_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
            },
        }
    }

    /// Socket address for the metrics exporter
    ///
    /// # Errors
    ///
    /// Returns error if host and port do not form a valid socket address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!(
            "{}:{}",
            self.observability.metrics_host, self.observability.metrics_port
        )
        .parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = LotteryConfig::default();
        assert_eq!(config.draw.rng_seed, None);
        assert!(config.draw.notify_not_selected);
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.observability.metrics_port, 9090);
        assert_eq!(
            config.observability.log_filter,
            "waitlist_lottery=info,lottery_demo=info"
        );
    }

    #[test]
    fn reads_overrides() {
        let config = LotteryConfig::from_lookup(lookup(&[
            ("LOTTERY_RNG_SEED", "42"),
            ("LOTTERY_NOTIFY_NOT_SELECTED", "false"),
            ("METRICS_ENABLED", "true"),
            ("METRICS_HOST", "127.0.0.1"),
            ("METRICS_PORT", "9100"),
        ]));

        assert_eq!(config.draw.rng_seed, Some(42));
        assert!(!config.draw.notify_not_selected);
        assert!(config.observability.metrics_enabled);
        assert_eq!(
            config.metrics_addr().ok(),
            "127.0.0.1:9100".parse::<SocketAddr>().ok()
        );
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = LotteryConfig::from_lookup(lookup(&[
            ("LOTTERY_RNG_SEED", "not-a-number"),
            ("METRICS_PORT", "99999"),
        ]));
        assert_eq!(config.draw.rng_seed, None);
        assert_eq!(config.observability.metrics_port, 9090);
    }
}
