//! QoS configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `#[serde(default)]` functions and `Default` impls
//! 2. **Config file**: TOML file given to [`AppConfig::from_file`] or named by `QOS_CONFIG`
//! 3. **Environment variables**: `QOS__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`LoggingConfig`]: Log level and format
//! - [`MetricsConfig`]: Whether Prometheus metrics are recorded
//! - [`HydratorConfig`]: Background check cadence and concurrency
//! - [`ServiceQosConfig`]: One entry per service with its chain family and thresholds
//!
//! Per-service configuration is read once when the service is built and is
//! immutable afterwards.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [[services]]
//! service_id = "eth"
//! sync_allowance = 5
//!
//! [services.family]
//! type = "evm"
//! chain_id = "0x1"
//!
//! [services.family.archival]
//! contract_address = "0x28C6c06298d514Db089934071355E5743bf21d60"
//! contract_start_block = 12300000
//! ```

use crate::endpoint::CheckKind;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub hydrator: HydratorConfig,

    #[serde(default)]
    pub services: Vec<ServiceQosConfig>,
}

fn default_environment() -> String {
    "development".to_string()
}

/// Log level and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset. Defaults to `info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` or `pretty`. Defaults to `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

/// Metrics recording settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Background check (hydrator) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydratorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between hydrator runs. Defaults to `10`.
    #[serde(default = "default_hydrator_interval")]
    pub run_interval_seconds: u64,

    /// Maximum endpoints checked concurrently per service. Defaults to `100`.
    #[serde(default = "default_max_endpoint_check_workers")]
    pub max_endpoint_check_workers: usize,
}

fn default_hydrator_interval() -> u64 {
    10
}

fn default_max_endpoint_check_workers() -> usize {
    100
}

impl Default for HydratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_interval_seconds: default_hydrator_interval(),
            max_endpoint_check_workers: default_max_endpoint_check_workers(),
        }
    }
}

impl HydratorConfig {
    #[must_use]
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_seconds)
    }
}

/// Configuration of one service's QoS engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceQosConfig {
    pub service_id: String,

    pub family: FamilyConfig,

    /// Blocks an endpoint may lag behind the perceived height.
    /// Defaults to `5`, or `0` for Solana.
    #[serde(default)]
    pub sync_allowance: Option<u64>,

    /// How long an empty or invalid response disqualifies an endpoint.
    /// Defaults to `1800` (30 minutes).
    #[serde(default = "default_sanction_timeout")]
    pub sanction_timeout_seconds: u64,

    #[serde(default)]
    pub check_intervals: CheckIntervals,
}

fn default_sanction_timeout() -> u64 {
    30 * 60
}

/// Default sync allowance for block-height based families.
pub const DEFAULT_SYNC_ALLOWANCE: u64 = 5;

impl ServiceQosConfig {
    /// Creates a service configuration with default thresholds.
    #[must_use]
    pub fn new(service_id: impl Into<String>, family: FamilyConfig) -> Self {
        Self {
            service_id: service_id.into(),
            family,
            sync_allowance: None,
            sanction_timeout_seconds: default_sanction_timeout(),
            check_intervals: CheckIntervals::default(),
        }
    }

    /// Returns the configured sync allowance or the family default.
    #[must_use]
    pub fn effective_sync_allowance(&self) -> u64 {
        self.sync_allowance.unwrap_or(match self.family {
            FamilyConfig::Solana(_) => 0,
            _ => DEFAULT_SYNC_ALLOWANCE,
        })
    }

    #[must_use]
    pub fn sanction_timeout(&self) -> Duration {
        Duration::from_secs(self.sanction_timeout_seconds)
    }

    #[must_use]
    pub fn validator_settings(&self) -> ValidatorSettings {
        ValidatorSettings {
            sync_allowance: self.effective_sync_allowance(),
            sanction_timeout: self.sanction_timeout(),
            intervals: self.check_intervals.clone(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.service_id.trim().is_empty() {
            return Err("Service id must not be empty".to_string());
        }
        if self.sanction_timeout_seconds == 0 {
            return Err(format!(
                "Sanction timeout must be greater than 0 for service {}",
                self.service_id
            ));
        }
        self.check_intervals.validate().map_err(|e| format!("{e} for service {}", self.service_id))?;
        self.family.validate().map_err(|e| format!("{e} for service {}", self.service_id))
    }
}

/// Chain family of a service and its identity expectations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FamilyConfig {
    Evm(EvmFamilyConfig),
    CometBft(CometBftFamilyConfig),
    Cosmos(CosmosFamilyConfig),
    Solana(SolanaFamilyConfig),
}

impl FamilyConfig {
    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Evm(evm) => {
                if evm.chain_id.trim().is_empty() {
                    return Err("EVM chain id must not be empty".to_string());
                }
                if let Some(archival) = &evm.archival {
                    archival.validate()?;
                }
                Ok(())
            }
            Self::CometBft(comet) => {
                if comet.chain_id.trim().is_empty() {
                    return Err("CometBFT chain id must not be empty".to_string());
                }
                Ok(())
            }
            Self::Cosmos(cosmos) => {
                if cosmos.chain_id.trim().is_empty() {
                    return Err("Cosmos chain id must not be empty".to_string());
                }
                if cosmos.supported_apis.is_empty() {
                    return Err("Cosmos service must support at least one API".to_string());
                }
                if cosmos.supported_apis.contains(&ApiKind::JsonRpc) &&
                    cosmos.evm_chain_id.as_deref().is_none_or(|id| id.trim().is_empty())
                {
                    return Err("Cosmos service supporting json_rpc requires evm_chain_id".to_string());
                }
                if cosmos.evm_chain_id.is_some() && !cosmos.supported_apis.contains(&ApiKind::JsonRpc) {
                    return Err(
                        "Cosmos evm_chain_id is only checked when json_rpc is supported".to_string()
                    );
                }
                Ok(())
            }
            Self::Solana(_) => Ok(()),
        }
    }
}

/// EVM service identity and optional archival verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmFamilyConfig {
    /// Expected `eth_chainId` result, e.g. `"0x1"`.
    pub chain_id: String,

    #[serde(default)]
    pub archival: Option<ArchivalCheckConfig>,
}

/// Archival verification settings.
///
/// A random historical block between `contract_start_block` and
/// `perceived - threshold` is chosen; endpoints must report the same balance
/// for `contract_address` at that block as the consensus of their peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivalCheckConfig {
    pub contract_address: String,

    /// First block at which the contract held a balance.
    pub contract_start_block: u64,

    /// Blocks below the perceived height that count as archival. Defaults to `128`.
    #[serde(default = "default_archival_threshold")]
    pub threshold: u64,
}

/// Default archival depth for EVM chains.
pub const DEFAULT_ARCHIVAL_THRESHOLD: u64 = 128;

fn default_archival_threshold() -> u64 {
    DEFAULT_ARCHIVAL_THRESHOLD
}

impl ArchivalCheckConfig {
    #[must_use]
    pub fn new(contract_address: impl Into<String>, contract_start_block: u64) -> Self {
        Self {
            contract_address: contract_address.into(),
            contract_start_block,
            threshold: DEFAULT_ARCHIVAL_THRESHOLD,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if !self.contract_address.starts_with("0x") {
            return Err(format!("Invalid archival contract address: {}", self.contract_address));
        }
        if self.contract_start_block == 0 {
            return Err("Archival contract start block must be greater than 0".to_string());
        }
        if self.threshold == 0 {
            return Err("Archival threshold must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CometBftFamilyConfig {
    /// Expected `node_info.network`, e.g. `"cosmoshub-4"`.
    pub chain_id: String,
}

/// Cosmos SDK service identity and exposed APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CosmosFamilyConfig {
    pub chain_id: String,

    /// Expected `eth_chainId` of the chain's EVM module, if it has one.
    #[serde(default)]
    pub evm_chain_id: Option<String>,

    /// Defaults to `["comet_bft", "rest"]`.
    #[serde(default = "default_supported_apis")]
    pub supported_apis: Vec<ApiKind>,
}

fn default_supported_apis() -> Vec<ApiKind> {
    vec![ApiKind::CometBft, ApiKind::Rest]
}

/// RPC surfaces a Cosmos node may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    CometBft,
    Rest,
    JsonRpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaFamilyConfig {
    /// Informational only; Solana endpoints do not report a chain id.
    #[serde(default = "default_solana_chain_id")]
    pub chain_id: String,
}

fn default_solana_chain_id() -> String {
    "solana".to_string()
}

impl Default for SolanaFamilyConfig {
    fn default() -> Self {
        Self { chain_id: default_solana_chain_id() }
    }
}

/// Re-probe interval of each periodic check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIntervals {
    #[serde(default = "default_health_interval")]
    pub health_seconds: u64,

    #[serde(default = "default_status_interval")]
    pub status_seconds: u64,

    #[serde(default = "default_cosmos_status_interval")]
    pub cosmos_status_seconds: u64,

    #[serde(default = "default_block_number_interval")]
    pub block_number_seconds: u64,

    #[serde(default = "default_chain_id_interval")]
    pub chain_id_seconds: u64,

    #[serde(default = "default_chain_id_interval")]
    pub evm_chain_id_seconds: u64,

    #[serde(default = "default_epoch_info_interval")]
    pub epoch_info_seconds: u64,

    #[serde(default = "default_archival_interval")]
    pub archival_seconds: u64,
}

fn default_health_interval() -> u64 {
    30
}

fn default_status_interval() -> u64 {
    30
}

fn default_cosmos_status_interval() -> u64 {
    10
}

fn default_block_number_interval() -> u64 {
    60
}

fn default_chain_id_interval() -> u64 {
    20 * 60
}

fn default_epoch_info_interval() -> u64 {
    30
}

fn default_archival_interval() -> u64 {
    20 * 60
}

impl Default for CheckIntervals {
    fn default() -> Self {
        Self {
            health_seconds: default_health_interval(),
            status_seconds: default_status_interval(),
            cosmos_status_seconds: default_cosmos_status_interval(),
            block_number_seconds: default_block_number_interval(),
            chain_id_seconds: default_chain_id_interval(),
            evm_chain_id_seconds: default_chain_id_interval(),
            epoch_info_seconds: default_epoch_info_interval(),
            archival_seconds: default_archival_interval(),
        }
    }
}

impl CheckIntervals {
    /// Returns how long a result of `check` stays fresh.
    #[must_use]
    pub fn ttl(&self, check: CheckKind) -> Duration {
        let seconds = match check {
            CheckKind::Health => self.health_seconds,
            CheckKind::Status => self.status_seconds,
            CheckKind::CosmosStatus => self.cosmos_status_seconds,
            CheckKind::BlockNumber => self.block_number_seconds,
            CheckKind::ChainId => self.chain_id_seconds,
            CheckKind::EvmChainId => self.evm_chain_id_seconds,
            CheckKind::EpochInfo => self.epoch_info_seconds,
            CheckKind::Archival => self.archival_seconds,
        };
        Duration::from_secs(seconds)
    }

    fn validate(&self) -> Result<(), String> {
        let all = [
            self.health_seconds,
            self.status_seconds,
            self.cosmos_status_seconds,
            self.block_number_seconds,
            self.chain_id_seconds,
            self.evm_chain_id_seconds,
            self.epoch_info_seconds,
            self.archival_seconds,
        ];
        if all.contains(&0) {
            return Err("Check intervals must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Thresholds shared by every family validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSettings {
    pub sync_allowance: u64,
    pub sanction_timeout: Duration,
    pub intervals: CheckIntervals,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            sync_allowance: DEFAULT_SYNC_ALLOWANCE,
            sanction_timeout: Duration::from_secs(default_sanction_timeout()),
            intervals: CheckIntervals::default(),
        }
    }
}

impl ValidatorSettings {
    #[must_use]
    pub fn with_sync_allowance(mut self, sync_allowance: u64) -> Self {
        self.sync_allowance = sync_allowance;
        self
    }

    #[must_use]
    pub fn with_sanction_timeout(mut self, sanction_timeout: Duration) -> Self {
        self.sanction_timeout = sanction_timeout;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            hydrator: HydratorConfig::default(),
            services: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `QOS__` prefix override configuration
    /// values. Use `__` as a separator for nested fields
    /// (e.g., `QOS__LOGGING__FORMAT=json`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("metrics.enabled", true)?
            .set_default("hydrator.enabled", true)?
            .set_default("hydrator.run_interval_seconds", 10)?
            .set_default("hydrator.max_endpoint_check_workers", 100)?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("QOS").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/qos.toml` with fallback to defaults.
    ///
    /// The path can be overridden with the `QOS_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("QOS_CONFIG").unwrap_or_else(|_| "config/qos.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the configuration of `service_id`, if present.
    #[must_use]
    pub fn service(&self, service_id: &str) -> Option<&ServiceQosConfig> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - At least one service is configured and service ids are unique
    /// - Chain ids are present for families that verify them
    /// - Archival settings are complete when archival checks are enabled
    /// - All intervals and timeouts are greater than zero
    /// - Logging format is either `"json"` or `"pretty"`
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.services.is_empty() {
            return Err("No services configured".to_string());
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.service_id.as_str()) {
                return Err(format!("Duplicate service id: {}", service.service_id));
            }
            service.validate()?;
        }

        if self.hydrator.run_interval_seconds == 0 {
            return Err("Hydrator run interval must be greater than 0".to_string());
        }

        if self.hydrator.max_endpoint_check_workers == 0 {
            return Err("Hydrator max endpoint check workers must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
