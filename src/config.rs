//! Trade node configuration.
//!
//! Read from a TOML file (all keys optional), then overridden by `TRADE_*`
//! environment variables:
//!
//! ```toml
//! network = "testnet"
//! tx_fee = 1000
//! nodes_option = "custom"
//! custom_nodes = "node1.example:16111,node2.example:16111"
//!
//! [providers]
//! providers = "http://a.onion/,http://b.onion/"
//! use_localhost = false
//! banned_nodes = ["b"]
//! shuffle = true
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::providers::{NodesOption, ProviderSettings};

/// Deposit fee reserve used when none is configured, in sompi.
pub const DEFAULT_TX_FEE: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub network: Network,
    pub tx_fee: u64,
    pub nodes_option: NodesOption,
    pub custom_nodes: String,
    pub providers: ProviderSettings,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            tx_fee: DEFAULT_TX_FEE,
            nodes_option: NodesOption::default(),
            custom_nodes: String::new(),
            providers: ProviderSettings::default(),
        }
    }
}

impl TradeConfig {
    /// Load `path` if it exists, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_toml(&text).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `TRADE_*` overrides; `lookup` returns a variable's value if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(network) = lookup("TRADE_NETWORK") {
            self.network = network.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(fee) = lookup("TRADE_TX_FEE") {
            self.tx_fee = fee
                .trim()
                .parse()
                .with_context(|| format!("TRADE_TX_FEE is not a sompi amount: {fee}"))?;
        }
        if let Some(providers) = lookup("TRADE_PROVIDERS") {
            self.providers.providers = Some(providers);
        }
        if let Some(flag) = lookup("TRADE_USE_LOCALHOST") {
            self.providers.use_localhost = parse_flag("TRADE_USE_LOCALHOST", &flag)?;
        }
        if let Some(banned) = lookup("TRADE_BANNED_NODES") {
            self.providers.banned_nodes = Some(
                banned
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Some(nodes) = lookup("TRADE_CUSTOM_NODES") {
            self.nodes_option = NodesOption::Custom;
            self.custom_nodes = nodes;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(anyhow!("{key} must be a boolean, got '{other}'")),
    }
}
