//! The optional TOML configuration, every value has a built-in default.

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Aggregator,
    error::{Result, SconeError},
    event::NormalizeOptions,
    filter::FilterMode,
    publisher::PublishSettings,
    retry::RetryPolicy,
    scone_client::{SconeClient, BASE_URL, COLLECTION_ID},
    time_window::TIMEZONE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// IANA name of the timezone every date is interpreted in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub live: LiveConfig,

    #[serde(default)]
    pub bulk: BulkConfig,

    /// Where selected scones are published to
    #[serde(default)]
    pub publish: Option<PublishConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_collection_id")]
    pub collection_id: String,

    /// Timeout of a single request (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for every following retry (milliseconds)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor_ms: u64,

    /// HTTP statuses worth another attempt
    #[serde(default = "default_retry_statuses")]
    pub statuses: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Ingredients to look for in the scone names
    #[serde(default = "default_ingredients")]
    pub ingredients: Vec<String>,

    #[serde(default)]
    pub mode: FilterMode,

    /// Ignore scones which were already served
    #[serde(default = "default_future_only")]
    pub future_only: bool,

    /// Only look this many days ahead, 0 for the whole month
    #[serde(default)]
    pub days_ahead: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    #[serde(default = "default_bulk_start")]
    pub start: NaiveDate,

    /// Exclusive
    #[serde(default = "default_bulk_end")]
    pub end: NaiveDate,

    #[serde(default = "default_bulk_output")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishTarget {
    #[default]
    Google,
    Ics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub target: PublishTarget,

    /// Path to Google OAuth client credentials JSON file
    #[serde(default = "default_credentials")]
    pub credentials_path: PathBuf,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache")]
    pub token_cache_path: PathBuf,

    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,

    /// File written by the `ics` target
    #[serde(default = "default_ics_path")]
    pub ics_path: PathBuf,

    /// Add a popup reminder five minutes before the bakery opens
    #[serde(default)]
    pub final_call_reminder: bool,
}

fn default_timezone() -> String {
    TIMEZONE.name().to_string()
}

fn default_base_url() -> String {
    BASE_URL.to_string()
}

fn default_collection_id() -> String {
    COLLECTION_ID.to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    7
}

fn default_backoff_factor() -> u64 {
    1000 // 1 second
}

fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 503, 504]
}

fn default_ingredients() -> Vec<String> {
    vec!["raspberry".to_string()]
}

fn default_future_only() -> bool {
    true
}

fn default_bulk_start() -> NaiveDate {
    Aggregator::FLOOR
}

fn default_bulk_end() -> NaiveDate {
    Aggregator::CEILING
}

fn default_bulk_output() -> PathBuf {
    PathBuf::from("scraped_data.json")
}

fn default_credentials() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("calendar_token_cache.json")
}

fn default_calendar_id() -> String {
    "primary".to_string()
}

fn default_ics_path() -> PathBuf {
    PathBuf::from("calendar.ics")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: default_timezone(),
            api: ApiConfig::default(),
            retry: RetryConfig::default(),
            live: LiveConfig::default(),
            bulk: BulkConfig::default(),
            publish: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            collection_id: default_collection_id(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: default_max_retries(),
            backoff_factor_ms: default_backoff_factor(),
            statuses: default_retry_statuses(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            ingredients: default_ingredients(),
            mode: FilterMode::default(),
            future_only: default_future_only(),
            days_ahead: 0,
        }
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        BulkConfig {
            start: default_bulk_start(),
            end: default_bulk_end(),
            output: default_bulk_output(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            target: PublishTarget::default(),
            credentials_path: default_credentials(),
            token_cache_path: default_token_cache(),
            calendar_id: default_calendar_id(),
            ics_path: default_ics_path(),
            final_call_reminder: false,
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| SconeError::io(path, err))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|err| SconeError::Config(err.to_string()))?;
        config.tz()?;
        Ok(config)
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| SconeError::Config(format!("unknown timezone '{}'", self.timezone)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            backoff_factor: Duration::from_millis(self.retry.backoff_factor_ms),
            retry_statuses: self.retry.statuses.clone(),
        }
    }

    pub fn client(&self) -> Result<SconeClient> {
        SconeClient::new(
            self.api.base_url.as_str(),
            self.api.collection_id.as_str(),
            Duration::from_secs(self.api.timeout_secs),
            self.retry_policy(),
        )
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            future_only: self.live.future_only,
            days_ahead: Some(self.live.days_ahead),
        }
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            base_url: self.api.base_url.clone(),
            final_call_reminder: self
                .publish
                .as_ref()
                .is_some_and(|publish| publish.final_call_reminder),
        }
    }
}
