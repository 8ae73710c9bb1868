use std::fmt;
use std::str::FromStr;

use kaspa_addresses::{Address, Prefix};
use kaspa_trade_sdk::{EscrowError, parse_p2pk_address};
use serde::{Deserialize, Serialize};

/// Network a trade settles on. Peer-supplied addresses must belong to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Simnet,
}

impl Network {
    pub fn prefix(self) -> Prefix {
        match self {
            Network::Mainnet => Prefix::Mainnet,
            Network::Testnet => Prefix::Testnet,
            Network::Devnet => Prefix::Devnet,
            Network::Simnet => Prefix::Simnet,
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == Network::Mainnet
    }

    /// Parse a counterparty address; it must be a P2PK address on this network.
    pub fn parse_address(self, address: &str) -> Result<Address, EscrowError> {
        parse_p2pk_address(address, self.prefix())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Simnet => "simnet",
        };
        f.write_str(name)
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "simnet" => Ok(Network::Simnet),
            other => Err(format!("unknown network '{other}'")),
        }
    }
}
