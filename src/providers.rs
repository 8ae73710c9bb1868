//! Service-endpoint and node selection.
//!
//! Candidates come from configuration, from localhost mode, or from the
//! built-in defaults; banned nodes are filtered out and the remaining list is
//! walked round-robin. Selection itself is a pure function over the list and
//! the previous index.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::network::Network;

pub const LOCALHOST_PROVIDER: &str = "http://127.0.0.1/";

/// Kaspa mainnet DNS seeders, default P2P port.
pub const DEFAULT_PROVIDERS: &[&str] = &[
    "seeder1.kaspad.net:16111",
    "seeder2.kaspad.net:16111",
    "seeder3.kaspad.net:16111",
    "seeder4.kaspad.net:16111",
    "kaspadns.kaspacalc.net:16111",
    "n-mainnet.kaspa.ws:16111",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Comma-separated endpoint list; overrides the defaults when non-empty.
    pub providers: Option<String>,
    pub use_localhost: bool,
    pub banned_nodes: Option<Vec<String>>,
    /// Shuffle the default list once at startup.
    pub shuffle: bool,
}

/// Next endpoint after `index`, wrapping around; returns the endpoint and the
/// index to pass next time. An empty list yields `""`.
pub fn select_next_provider(providers: &[String], index: usize) -> (String, usize) {
    if providers.is_empty() {
        warn!("no providers available; all candidates filtered or configured list empty");
        return (String::new(), 0);
    }
    let index = if index >= providers.len() { 0 } else { index };
    (providers[index].clone(), index + 1)
}

/// Form a candidate is compared in against the ban list.
pub fn ban_key(node: &str) -> String {
    node.replace("http://", "").replace('/', "").replace(".onion", "")
}

pub fn filter_banned(candidates: Vec<String>, banned: Option<&[String]>) -> Vec<String> {
    match banned {
        None => candidates,
        Some(banned) => candidates
            .into_iter()
            .filter(|c| !banned.contains(&ban_key(c)))
            .collect(),
    }
}

/// Split a comma-separated node list, ignoring all whitespace.
pub fn parse_node_list(list: &str) -> Vec<String> {
    let compact: String = list.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn candidate_providers(settings: &ProviderSettings, defaults: &[String]) -> Vec<String> {
    match settings.providers.as_deref().filter(|p| !p.is_empty()) {
        Some(list) => parse_node_list(list),
        None if settings.use_localhost => vec![LOCALHOST_PROVIDER.to_string()],
        None => defaults.to_vec(),
    }
}

/// Process-scoped provider list built once at startup.
#[derive(Debug, Clone)]
pub struct ProvidersRepository {
    settings: ProviderSettings,
    network: Network,
    defaults: Vec<String>,
    provider_list: Vec<String>,
    base_url: String,
    index: usize,
}

impl ProvidersRepository {
    pub fn new<R: Rng + ?Sized>(settings: ProviderSettings, network: Network, rng: &mut R) -> Self {
        let mut defaults: Vec<String> = DEFAULT_PROVIDERS.iter().map(|s| s.to_string()).collect();
        if settings.shuffle {
            defaults.shuffle(rng);
        }
        let banned = settings.banned_nodes.clone();
        let mut repo = Self {
            settings,
            network,
            defaults,
            provider_list: Vec::new(),
            base_url: String::new(),
            index: 0,
        };
        repo.apply_banned_nodes(banned);
        repo
    }

    pub fn apply_banned_nodes(&mut self, banned_nodes: Option<Vec<String>>) {
        self.settings.banned_nodes = banned_nodes;
        let candidates = candidate_providers(&self.settings, &self.defaults);
        self.provider_list = filter_banned(candidates, self.settings.banned_nodes.as_deref());
        self.select_next_provider_base_url();

        match &self.settings.banned_nodes {
            None => info!(
                base_url = %self.base_url,
                providers = ?self.provider_list,
                "selected provider"
            ),
            Some(banned) => warn!(
                ?banned,
                base_url = %self.base_url,
                providers = ?self.provider_list,
                "banned provider nodes present"
            ),
        }
    }

    pub fn select_next_provider_base_url(&mut self) {
        let (base_url, next) = select_next_provider(&self.provider_list, self.index);
        self.base_url = base_url;
        self.index = next;
        if self.provider_list.len() == 1 && self.network.is_mainnet() {
            warn!("only one provider available");
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn provider_list(&self) -> &[String] {
        &self.provider_list
    }

    pub fn banned_nodes(&self) -> Option<&[String]> {
        self.settings.banned_nodes.as_deref()
    }
}

/// Which nodes the wallet should connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodesOption {
    /// Let peer discovery pick public nodes.
    #[default]
    Public,
    /// Only the user's own nodes.
    Custom,
}

pub fn select_preferred_nodes(option: NodesOption, custom_nodes: &str) -> Vec<String> {
    match option {
        NodesOption::Public => Vec::new(),
        NodesOption::Custom => parse_node_list(custom_nodes),
    }
}
