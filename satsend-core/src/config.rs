//! Configuration management for satsend.
//!
//! Engine settings live in a TOML file. Every field has a default, so a
//! partial file (or none at all) yields a working mainnet configuration.
//!
//! ```toml
//! [network]
//! name = "testnet"
//! timeout_seconds = 5
//!
//! [[network.broadcast_endpoints]]
//! name = "local-esplora"
//! endpoint = "http://127.0.0.1:3002/tx"
//! shape = "raw_hex"
//!
//! [fees]
//! default_fee_rate = 20.0
//! unconfirmed_fee_rate = 50.0
//! fee_model = "flat"
//!
//! [selection]
//! allow_unconfirmed = true
//! change_threshold_sats = 5000
//! early_stop_margin_sats = 1000
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::broadcast::BroadcastProvider;
use crate::fee_estimation::FeeProvider;
use crate::logging::{self, LogConfig, LogLevel};
use crate::network::{ChainNetwork, NetworkConfig};
use crate::selection::{FeeModel, SelectionConfig, UnconfirmedPolicy};
use crate::types::{FeeRate, CHANGE_THRESHOLD_SATS, DEFAULT_FEE_RATE, EARLY_STOP_MARGIN_SATS, MAX_REASONABLE_FEE_RATE, UNCONFIRMED_MIN_FEE_RATE};
use crate::utxo::{UtxoProvider, ADDRESS_PLACEHOLDER};

/// Main configuration structure for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub fees: FeeSection,

    #[serde(default)]
    pub selection: SelectionSection,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Chain and provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSection {
    #[serde(default)]
    pub name: ChainNetwork,

    /// Per-attempt provider timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Replaces the default UTXO providers when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utxo_endpoints: Option<Vec<UtxoProvider>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_endpoints: Option<Vec<FeeProvider>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_endpoints: Option<Vec<BroadcastProvider>>,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            name: ChainNetwork::default(),
            timeout_seconds: default_timeout(),
            utxo_endpoints: None,
            fee_endpoints: None,
            broadcast_endpoints: None,
        }
    }
}

/// Fee fallbacks and size model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSection {
    /// Fallback rate when no fee provider answers (sat/vB)
    #[serde(default = "default_fee_rate")]
    pub default_fee_rate: f64,

    /// Floor applied when unconfirmed inputs are spent (sat/vB)
    #[serde(default = "default_unconfirmed_fee_rate")]
    pub unconfirmed_fee_rate: f64,

    #[serde(default)]
    pub fee_model: FeeModel,
}

impl Default for FeeSection {
    fn default() -> Self {
        Self {
            default_fee_rate: default_fee_rate(),
            unconfirmed_fee_rate: default_unconfirmed_fee_rate(),
            fee_model: FeeModel::default(),
        }
    }
}

/// Coin selection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSection {
    #[serde(default = "default_true")]
    pub allow_unconfirmed: bool,

    #[serde(default = "default_change_threshold")]
    pub change_threshold_sats: u64,

    #[serde(default = "default_early_stop_margin")]
    pub early_stop_margin_sats: u64,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            allow_unconfirmed: default_true(),
            change_threshold_sats: default_change_threshold(),
            early_stop_margin_sats: default_early_stop_margin(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path, content).map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        logging::log_config(
            LogLevel::Info,
            "Configuration saved",
            Some(json!({
                "path": path.display().to_string(),
                "network": self.network.name.as_str(),
            })),
        );

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.network.timeout_seconds == 0 {
            return Err(anyhow!("Invalid network timeout: must be greater than 0"));
        }

        for (label, rate) in [
            ("default_fee_rate", self.fees.default_fee_rate),
            ("unconfirmed_fee_rate", self.fees.unconfirmed_fee_rate),
        ] {
            if !rate.is_finite() || rate <= 0.0 || rate > MAX_REASONABLE_FEE_RATE {
                anyhow::bail!(
                    "Invalid {}: {} (must be within 0..={} sat/vB)",
                    label,
                    rate,
                    MAX_REASONABLE_FEE_RATE
                );
            }
        }

        if let Some(endpoints) = &self.network.utxo_endpoints {
            validate_endpoints("utxo", endpoints.iter().map(|p| (&p.name, &p.endpoint)))?;
            if let Some(p) = endpoints.iter().find(|p| !p.endpoint.contains(ADDRESS_PLACEHOLDER)) {
                anyhow::bail!(
                    "UTXO endpoint '{}' must contain the {} placeholder",
                    p.name,
                    ADDRESS_PLACEHOLDER
                );
            }
        }
        if let Some(endpoints) = &self.network.fee_endpoints {
            validate_endpoints("fee", endpoints.iter().map(|p| (&p.name, &p.endpoint)))?;
        }
        if let Some(endpoints) = &self.network.broadcast_endpoints {
            validate_endpoints("broadcast", endpoints.iter().map(|p| (&p.name, &p.endpoint)))?;
        }

        Ok(())
    }

    /// Provider sets for the configured chain, with any overrides applied
    pub fn network_config(&self) -> NetworkConfig {
        let mut config = NetworkConfig::new(self.network.name)
            .with_request_timeout(Duration::from_secs(self.network.timeout_seconds));

        if let Some(endpoints) = &self.network.utxo_endpoints {
            config = config.with_utxo_providers(endpoints.clone());
        }
        if let Some(endpoints) = &self.network.fee_endpoints {
            config = config.with_fee_providers(endpoints.clone());
        }
        if let Some(endpoints) = &self.network.broadcast_endpoints {
            config = config.with_broadcast_providers(endpoints.clone());
        }

        config
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            fee_model: self.fees.fee_model,
            unconfirmed_policy: if self.selection.allow_unconfirmed {
                UnconfirmedPolicy::Allow
            } else {
                UnconfirmedPolicy::Exclude
            },
            change_threshold_sats: self.selection.change_threshold_sats,
            early_stop_margin_sats: self.selection.early_stop_margin_sats,
            unconfirmed_min_fee_rate: self.fees.unconfirmed_fee_rate,
        }
    }

    /// Fallback rates for confirmed-only and unconfirmed-allowed flows
    pub fn fallback_fee_rates(&self) -> Result<(FeeRate, FeeRate)> {
        let confirmed = FeeRate::from_sat_per_vb(self.fees.default_fee_rate)
            .ok_or_else(|| anyhow!("Invalid default_fee_rate: {}", self.fees.default_fee_rate))?;
        let unconfirmed = FeeRate::from_sat_per_vb(self.fees.unconfirmed_fee_rate)
            .ok_or_else(|| anyhow!("Invalid unconfirmed_fee_rate: {}", self.fees.unconfirmed_fee_rate))?;
        Ok((confirmed, unconfirmed))
    }
}

fn validate_endpoints<'a>(
    capability: &str,
    endpoints: impl Iterator<Item = (&'a String, &'a String)>,
) -> Result<()> {
    let mut count = 0;
    for (name, url) in endpoints {
        count += 1;
        if name.trim().is_empty() {
            anyhow::bail!("Invalid {} endpoint: name must not be empty", capability);
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("Invalid {} endpoint '{}': URL must be http(s), got {}", capability, name, url);
        }
    }
    if count == 0 {
        anyhow::bail!("Invalid {} endpoints: list must not be empty when set", capability);
    }
    Ok(())
}

/// Default location of the config file (`<config dir>/satsend/config.toml`)
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(base.join("satsend").join("config.toml"))
}

/// Ensure a configuration file exists at the specified path
/// If it doesn't exist, create it with default values
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        let default_config = EngineConfig::default();
        let content = toml::to_string_pretty(&default_config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
            }
        }

        fs::write(path, content)
            .map_err(|e| anyhow!("Failed to write default config file: {}", e))?;

        log::info!("Created default config at {}", path.display());
    }

    Ok(())
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    5
}

fn default_fee_rate() -> f64 {
    DEFAULT_FEE_RATE
}

fn default_unconfirmed_fee_rate() -> f64 {
    UNCONFIRMED_MIN_FEE_RATE
}

fn default_change_threshold() -> u64 {
    CHANGE_THRESHOLD_SATS
}

fn default_early_stop_margin() -> u64 {
    EARLY_STOP_MARGIN_SATS
}
