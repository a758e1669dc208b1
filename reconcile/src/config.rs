//! Configuration for the reconciliation service.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::providers::GuardSettings;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Redis configuration (locks, markers, ledger, counters, cart links)
    pub redis: RedisConfig,
    /// Idempotency guard configuration
    pub guard: GuardConfig,
    /// Purchase-attempt ledger configuration
    pub ledger: LedgerConfig,
    /// Invoicing provider client configuration
    pub invoicing: InvoicingConfig,
    /// Issuance system client configuration
    pub issuance: IssuanceConfig,
    /// Notification service configuration
    pub notifications: NotificationConfig,
    /// Side-effect dispatch configuration
    pub effects: EffectsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Expose Prometheus metrics on `/metrics`
    pub metrics_enabled: bool,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Prefix for every key this service writes
    pub key_prefix: String,
}

/// Idempotency guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Processing lock lease in seconds (default: 5 minutes)
    pub lock_ttl_secs: u64,
    /// Processed marker retention in seconds (default: 24 hours)
    pub processed_retention_secs: u64,
    /// Degrade to an in-process guard when Redis is unreachable.
    ///
    /// Only safe for single-instance deployments.
    pub in_memory_fallback: bool,
}

/// Purchase-attempt ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Retention in seconds (default: 7 days)
    pub retention_secs: u64,
}

/// Invoicing provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicingConfig {
    /// Base URL of the provider API
    pub base_url: String,
    /// Bearer token
    pub api_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Issuance system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceConfig {
    /// Base URL of the issuance API
    pub base_url: String,
    /// Bearer token
    pub api_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Locale used when creating purchases
    pub default_locale: String,
    /// Currency used when the invoice carries none
    pub default_currency: String,
}

/// Notification service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Base URL of the notification service
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Side-effect dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectsConfig {
    /// Upper bound for a single side effect, in milliseconds
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str| lookup(key).and_then(|s| s.parse::<u64>().ok());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| s.parse::<bool>().ok())
                .unwrap_or(default)
        };

        Self {
            server: ServerConfig {
                host: string("HOST", "0.0.0.0"),
                port: lookup("PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                metrics_enabled: flag("METRICS_ENABLED", true),
            },
            redis: RedisConfig {
                url: string("REDIS_URL", "redis://localhost:6379"),
                key_prefix: string("REDIS_KEY_PREFIX", "booking"),
            },
            guard: GuardConfig {
                lock_ttl_secs: parsed("GUARD_LOCK_TTL_SECS").unwrap_or(300), // 5 minutes
                processed_retention_secs: parsed("GUARD_PROCESSED_RETENTION_SECS")
                    .unwrap_or(86_400), // 24 hours
                in_memory_fallback: flag("GUARD_IN_MEMORY_FALLBACK", true),
            },
            ledger: LedgerConfig {
                retention_secs: parsed("LEDGER_RETENTION_SECS").unwrap_or(604_800), // 7 days
            },
            invoicing: InvoicingConfig {
                base_url: string("INVOICING_BASE_URL", "http://localhost:8069/api"),
                api_token: lookup("INVOICING_API_TOKEN"),
                timeout_secs: parsed("INVOICING_TIMEOUT_SECS").unwrap_or(10),
            },
            issuance: IssuanceConfig {
                base_url: string("ISSUANCE_BASE_URL", "http://localhost:8090/api"),
                api_token: lookup("ISSUANCE_API_TOKEN"),
                timeout_secs: parsed("ISSUANCE_TIMEOUT_SECS").unwrap_or(30),
                default_locale: string("ISSUANCE_DEFAULT_LOCALE", "en"),
                default_currency: string("ISSUANCE_DEFAULT_CURRENCY", "EUR"),
            },
            notifications: NotificationConfig {
                base_url: string("NOTIFICATIONS_BASE_URL", "http://localhost:8091"),
                timeout_secs: parsed("NOTIFICATIONS_TIMEOUT_SECS").unwrap_or(5),
            },
            effects: EffectsConfig {
                timeout_ms: parsed("EFFECTS_TIMEOUT_MS").unwrap_or(5_000),
            },
        }
    }

    /// Guard durations.
    #[must_use]
    pub const fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            lock_ttl: Duration::from_secs(self.guard.lock_ttl_secs),
            processed_retention: Duration::from_secs(self.guard.processed_retention_secs),
        }
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
