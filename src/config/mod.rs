//! Application configuration module
//!
//! Configuration is loaded with the `config` and `dotenvy` crates from, in
//! increasing precedence:
//!
//! 1. a `.env` file, if present
//! 2. a TOML file named by `BABYPLAN_CONFIG_FILE`, if set
//! 3. `BABYPLAN__*` environment variables (`__` separates nested keys)
//!
//! Price id lists accept comma-separated values from the environment, e.g.
//! `BABYPLAN__PAYMENT__MONTHLY_PRICE_IDS=price_a,price_b`.
//!
//! # Example
//!
//! ```no_run
//! use babyplan_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::domain::billing::{CommissionSchedule, StatusMapper, StatusPolicy};

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "BABYPLAN_CONFIG_FILE";

const ENV_PREFIX: &str = "BABYPLAN";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub payment: PaymentConfig,

    /// Status mapping policies
    #[serde(default)]
    pub policy: StatusPolicy,

    /// Retention bonus overrides
    #[serde(default)]
    pub commission: CommissionSchedule,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `BABYPLAN_CONFIG_FILE` names a file that cannot be read or parsed
    /// - Required values are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(
                config::File::with_name(&path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("payment.monthly_price_ids")
                    .with_list_parse_key("payment.annual_price_ids"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.commission
            .validate()
            .map_err(|e| ValidationError::InvalidCommission(e.to_string()))?;
        Ok(())
    }

    /// The status mapper built from the policy and price lists.
    pub fn status_mapper(&self) -> StatusMapper {
        StatusMapper::new(self.policy, self.payment.price_table())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
