//! Environment configuration.
//!
//! Everything the oracle needs is read here once and handed to component
//! constructors as typed settings. Nothing below `main` touches the
//! environment.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use aum_core::persistence::DuplicatePolicy;
use aum_core::positions::MERKL_DEFAULT_BASE_URL;
use aum_core::settings::DEFAULT_CYCLE_TIMEOUT;
use aum_market_data::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use aum_market_data::provider::geckoterminal;
use aum_market_data::RetryPolicy;
use aum_storage_mongo::MongoSettings;
use thiserror::Error;

pub const DEFAULT_COWSWAP_URL: &str = "https://api.cow.fi";
pub const DEFAULT_GECKOTERMINAL_URL: &str = geckoterminal::DEFAULT_BASE_URL;
pub const DEFAULT_MERKL_URL: &str = MERKL_DEFAULT_BASE_URL;

/// Timeout applied to every outbound HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

impl ConfigError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Remote services the oracle talks to.
#[derive(Clone, Debug, PartialEq)]
pub struct Endpoints {
    pub ethereum_rpc: String,
    pub base_rpc: String,
    pub etherlink_rpc: String,
    /// CoW Swap API root; the network path segment is appended per chain.
    pub cowswap: String,
    pub geckoterminal: String,
    pub merkl: String,
    pub request_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageTarget {
    Mongo(MongoSettings),
    /// Keep snapshots in process memory. Nothing survives the run.
    Memory,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OracleSettings {
    /// Monitored account.
    pub account: Address,
    pub endpoints: Endpoints,
    pub storage: StorageTarget,
    pub retry: RetryPolicy,
    pub duplicate_policy: DuplicatePolicy,
    pub cycle_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub oracle: OracleSettings,
    /// Run a cycle on this interval instead of once.
    pub schedule_interval: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let account = vars.parsed::<Address>("AUM_ACCOUNT_ADDRESS")?;

        let endpoints = Endpoints {
            ethereum_rpc: vars.url("AUM_RPC_ETHEREUM", None)?,
            base_rpc: vars.url("AUM_RPC_BASE", None)?,
            etherlink_rpc: vars.url("AUM_RPC_ETHERLINK", None)?,
            cowswap: vars.url("AUM_COWSWAP_URL", Some(DEFAULT_COWSWAP_URL))?,
            geckoterminal: vars.url("AUM_GECKOTERMINAL_URL", Some(DEFAULT_GECKOTERMINAL_URL))?,
            merkl: vars.url("AUM_MERKL_URL", Some(DEFAULT_MERKL_URL))?,
            request_timeout: REQUEST_TIMEOUT,
        };

        let storage = match vars.get("AUM_STORAGE").as_deref() {
            None | Some("mongo") => {
                let uri = vars.required("AUM_MONGO_URI")?;
                if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
                    return Err(ConfigError::invalid(
                        "AUM_MONGO_URI",
                        "must start with mongodb:// or mongodb+srv://",
                    ));
                }
                let mut mongo = MongoSettings::new(&uri);
                if let Some(database) = vars.get("AUM_MONGO_DATABASE") {
                    mongo.database = database;
                }
                if let Some(collection) = vars.get("AUM_MONGO_COLLECTION") {
                    mongo.collection = collection;
                }
                StorageTarget::Mongo(mongo)
            }
            Some("memory") => StorageTarget::Memory,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "AUM_STORAGE",
                    format!("'{}', expected 'mongo' or 'memory'", other),
                ))
            }
        };

        let max_attempts = vars
            .optional::<u32>("AUM_RETRY_MAX_ATTEMPTS")?
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let base_delay = vars
            .optional::<u64>("AUM_RETRY_BASE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BASE_DELAY);

        let duplicate_policy = vars
            .optional::<DuplicatePolicy>("AUM_DUPLICATE_POLICY")?
            .unwrap_or(DuplicatePolicy::Upsert);

        let cycle_timeout = vars
            .positive_secs("AUM_CYCLE_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_CYCLE_TIMEOUT);
        let schedule_interval = vars.positive_secs("AUM_SCHEDULE_INTERVAL_SECS")?;

        Ok(Self {
            oracle: OracleSettings {
                account,
                endpoints,
                storage,
                retry: RetryPolicy::new(max_attempts, base_delay),
                duplicate_policy,
                cycle_timeout,
            },
            schedule_interval,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Missing(name.to_string()))
    }

    fn parsed<T>(&self, name: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required(name)?;
        raw.parse::<T>()
            .map_err(|e| ConfigError::invalid(name, format!("'{}': {}", raw, e)))
    }

    fn optional<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(name) {
            Some(_) => self.parsed(name).map(Some),
            None => Ok(None),
        }
    }

    fn positive_secs(&self, name: &str) -> Result<Option<Duration>, ConfigError> {
        match self.optional::<u64>(name)? {
            Some(0) => Err(ConfigError::invalid(name, "must be greater than zero")),
            other => Ok(other.map(Duration::from_secs)),
        }
    }

    fn url(&self, name: &str, default: Option<&str>) -> Result<String, ConfigError> {
        let value = match (self.get(name), default) {
            (Some(value), _) => value,
            (None, Some(default)) => default.to_string(),
            (None, None) => return Err(ConfigError::Missing(name.to_string())),
        };
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::invalid(name, "must start with http:// or https://"));
        }
        Ok(value.trim_end_matches('/').to_string())
    }
}
