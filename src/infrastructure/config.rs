//! # Service Configuration
//!
//! Layered configuration for the ledger service.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`settlement-ledger.toml` unless overridden)
//! 3. environment variables prefixed `LEDGER__`, sections separated by `__`
//!    (for example `LEDGER__SERVER__PORT=9000`)
//!
//! A `.env` file in the working directory is loaded into the environment
//! first. The rate table is either inline under `[rates]` or read from the
//! TOML file named by `rates.file`.
//!
//! # Examples
//!
//! ```
//! use settlement_ledger::infrastructure::config::AppConfig;
//!
//! let config = AppConfig::from_toml_str(r#"
//!     [ledger]
//!     currency = "EUR"
//!     hold_period_secs = 60
//! "#).unwrap();
//! assert_eq!(config.ledger.currency, "EUR");
//! assert_eq!(config.server.port, 8080);
//! ```

use crate::domain::entities::rate_table::{
    CategoryRate, CommissionTier, CustomRate, RatePair, RateTable,
};
use crate::domain::errors::DomainError;
use crate::domain::services::commission_resolver::ResolverConfig;
use crate::domain::value_objects::{Amount, Currency, PartyId, Timestamp};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "settlement-ledger.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "LEDGER";

/// Default hold period: three days.
const DEFAULT_HOLD_PERIOD_SECS: u64 = 3 * 24 * 60 * 60;

/// Default sweep interval: one minute.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default trailing volume window.
const DEFAULT_VOLUME_WINDOW_DAYS: i64 = 30;

/// Default processor timeout.
const DEFAULT_PROCESSOR_TIMEOUT_MS: u64 = 10_000;

/// Default webhook timeout.
const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 5_000;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The rate file could not be read.
    #[error("failed to read rate file {path}: {source}")]
    RateFile {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The rate file is not valid TOML.
    #[error("failed to parse rate file: {0}")]
    RateParse(#[from] toml::de::Error),

    /// A value is malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The rate table violates a domain invariant.
    #[error("invalid rate table: {0}")]
    Domain(#[from] DomainError),
}

impl ConfigError {
    /// Returns true if the error is a rate table integrity violation.
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Domain(e) if e.is_integrity())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Allow any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_permissive: true,
        }
    }
}

/// Ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Settlement currency code.
    pub currency: String,
    /// Platform operator party id.
    pub platform_party: String,
    /// Platform operator display name.
    pub platform_name: String,
    /// Seconds a credit stays pending.
    pub hold_period_secs: u64,
    /// Seconds between hold sweeps.
    pub sweep_interval_secs: u64,
    /// Trailing window for tier volume.
    pub volume_window_days: i64,
    /// Count the sale being resolved toward its own tier volume.
    pub include_current_sale_in_volume: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            platform_party: "platform".to_string(),
            platform_name: "Platform".to_string(),
            hold_period_secs: DEFAULT_HOLD_PERIOD_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            volume_window_days: DEFAULT_VOLUME_WINDOW_DAYS,
            include_current_sale_in_volume: false,
        }
    }
}

/// Payout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Processor base URL. Without one the simulated processor is used.
    pub processor_url: Option<String>,
    /// Upper bound on one processor call.
    pub processor_timeout_ms: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            processor_url: None,
            processor_timeout_ms: DEFAULT_PROCESSOR_TIMEOUT_MS,
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook receiving every ledger event.
    pub webhook_url: Option<String>,
    /// Webhook timeout.
    pub webhook_timeout_ms: u64,
    /// Write events to the log.
    pub log_events: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            webhook_timeout_ms: DEFAULT_WEBHOOK_TIMEOUT_MS,
            log_events: true,
        }
    }
}

/// One volume tier as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    /// Lower bound, inclusive.
    pub min_volume: String,
    /// Upper bound, exclusive. Absent on the last tier.
    #[serde(default)]
    pub max_volume: Option<String>,
    /// Support pool in basis points.
    pub support_bps: u32,
    /// Platform fee in basis points.
    pub platform_bps: u32,
}

/// One category override as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    /// Product category.
    pub category: String,
    /// Support pool in basis points.
    pub support_bps: u32,
    /// Platform fee in basis points.
    pub platform_bps: u32,
}

/// One negotiated rate as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEntry {
    /// Support structure id.
    pub support_structure: String,
    /// Support pool in basis points.
    pub support_bps: u32,
    /// Platform fee in basis points.
    pub platform_bps: u32,
    /// RFC 3339 start, inclusive.
    pub effective_from: String,
    /// RFC 3339 end, exclusive.
    #[serde(default)]
    pub effective_until: Option<String>,
}

/// Rate table contents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateEntries {
    /// Volume tiers.
    pub tiers: Vec<TierEntry>,
    /// Category overrides.
    pub categories: Vec<CategoryEntry>,
    /// Negotiated rates.
    pub custom: Vec<CustomEntry>,
}

impl RateEntries {
    /// The built-in table: 8%/5% below 10,000 of volume, 10%/4% above.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            tiers: vec![
                TierEntry {
                    min_volume: "0".to_string(),
                    max_volume: Some("10000".to_string()),
                    support_bps: 800,
                    platform_bps: 500,
                },
                TierEntry {
                    min_volume: "10000".to_string(),
                    max_volume: None,
                    support_bps: 1000,
                    platform_bps: 400,
                },
            ],
            categories: Vec::new(),
            custom: Vec::new(),
        }
    }

    /// Validates the entries into a [`RateTable`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` on unparseable values and
    /// `ConfigError::Domain` on integrity violations.
    pub fn to_rate_table(&self) -> Result<RateTable, ConfigError> {
        let tiers = self
            .tiers
            .iter()
            .map(|t| {
                Ok(CommissionTier::new(
                    parse_amount(&t.min_volume)?,
                    t.max_volume.as_deref().map(parse_amount).transpose()?,
                    RatePair::from_bps(t.support_bps, t.platform_bps)?,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let categories = self
            .categories
            .iter()
            .map(|c| {
                Ok(CategoryRate {
                    category: c.category.clone(),
                    rate: RatePair::from_bps(c.support_bps, c.platform_bps)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let custom = self
            .custom
            .iter()
            .map(|c| {
                let rate = CustomRate::new(
                    PartyId::new(c.support_structure.as_str()),
                    RatePair::from_bps(c.support_bps, c.platform_bps)?,
                    parse_timestamp(&c.effective_from)?,
                    c.effective_until.as_deref().map(parse_timestamp).transpose()?,
                )?;
                Ok(rate)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(RateTable::new(tiers, categories, custom)?)
    }
}

/// Rate table source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// TOML file holding the table. Takes precedence over inline entries.
    pub file: Option<PathBuf>,
    /// Inline volume tiers.
    pub tiers: Vec<TierEntry>,
    /// Inline category overrides.
    pub categories: Vec<CategoryEntry>,
    /// Inline negotiated rates.
    pub custom: Vec<CustomEntry>,
}

impl RatesConfig {
    /// Returns the inline entries, falling back to the built-in tiers when
    /// none are given.
    #[must_use]
    pub fn entries(&self) -> RateEntries {
        let tiers = if self.tiers.is_empty() {
            RateEntries::builtin().tiers
        } else {
            self.tiers.clone()
        };
        RateEntries {
            tiers,
            categories: self.categories.clone(),
            custom: self.custom.clone(),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server.
    pub server: ServerConfig,
    /// Ledger.
    pub ledger: LedgerConfig,
    /// Payouts.
    pub payouts: PayoutConfig,
    /// Notifications.
    pub notifications: NotificationConfig,
    /// Commission rates.
    pub rates: RatesConfig,
}

impl AppConfig {
    /// Loads `.env`, then layers defaults, the config file and the
    /// environment.
    ///
    /// With `path` unset, [`DEFAULT_CONFIG_FILE`] is used if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if a source is malformed or an explicit
    /// `path` does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parses configuration from a TOML string, ignoring the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the string is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if host and port do not form an address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bind address: {e}")))
    }

    /// Returns the settlement currency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Domain` if the code is malformed.
    pub fn currency(&self) -> Result<Currency, ConfigError> {
        Ok(Currency::new(&self.ledger.currency)?)
    }

    /// Returns the platform party id.
    #[must_use]
    pub fn platform_party(&self) -> PartyId {
        PartyId::new(self.ledger.platform_party.as_str())
    }

    /// Returns the hold period.
    #[must_use]
    pub fn hold_period(&self) -> Duration {
        Duration::from_secs(self.ledger.hold_period_secs)
    }

    /// Returns the sweep interval.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.ledger.sweep_interval_secs.max(1))
    }

    /// Returns the processor timeout.
    #[must_use]
    pub fn processor_timeout(&self) -> Duration {
        Duration::from_millis(self.payouts.processor_timeout_ms)
    }

    /// Returns the resolver settings.
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new(self.platform_party())
            .with_current_sale_in_volume(self.ledger.include_current_sale_in_volume)
    }

    /// Builds the rate table from the rate file, the inline entries, or the
    /// built-in tiers, in that order of preference.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::RateFile`/`RateParse` if the file cannot be
    /// used, and `ConfigError::Domain` if the table is malformed.
    pub fn rate_table(&self) -> Result<RateTable, ConfigError> {
        if let Some(path) = &self.rates.file {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::RateFile {
                path: path.clone(),
                source,
            })?;
            let entries: RateEntries = toml::from_str(&raw)?;
            return entries.to_rate_table();
        }
        self.rates.entries().to_rate_table()
    }

    /// Checks everything that can be checked without I/O besides the rate
    /// file.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        self.currency()?;
        if self.platform_party().is_blank() {
            return Err(ConfigError::Invalid("ledger.platform_party is blank".to_string()));
        }
        if self.ledger.volume_window_days <= 0 {
            return Err(ConfigError::Invalid(
                "ledger.volume_window_days must be positive".to_string(),
            ));
        }
        if self.payouts.processor_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "payouts.processor_timeout_ms must be positive".to_string(),
            ));
        }
        self.rate_table()?;
        Ok(())
    }
}

fn parse_amount(raw: &str) -> Result<Amount, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("invalid amount {raw:?}")))
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, ConfigError> {
    Timestamp::parse_rfc3339(raw)
        .ok_or_else(|| ConfigError::Invalid(format!("invalid RFC 3339 timestamp {raw:?}")))
}
