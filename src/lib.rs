//! Two-party P2P trade protocol over a 2-of-3 arbitrated Kaspa multisig escrow.
//!
//! A buyer (maker) and a seller (taker) lock their security deposits and the
//! traded amount into one escrow output with the deposit transaction, then
//! release it with a co-signed payout transaction once the fiat payment is
//! confirmed. The arbitrator's key is part of the escrow script so a dispute
//! can be settled without either party's cooperation.
//!
//! The protocol is a sequence of small tasks per role and phase
//! ([`task`]), dispatched by [`protocol::TradeManager`]. Transaction
//! construction lives in the `kaspa-trade-sdk` workspace crate.

pub mod config;
pub mod contract;
pub mod error;
pub mod logging;
pub mod message;
pub mod network;
pub mod offer;
pub mod protocol;
pub mod providers;
pub mod task;
pub mod trade;
pub mod wallet;

pub use config::TradeConfig;
pub use contract::{Contract, contract_hash, verify_contract_hash};
pub use error::{ErrorKind, TradeError};
pub use message::{TradeEvent, TradeMessage};
pub use network::Network;
pub use offer::{Offer, OfferDirection};
pub use protocol::{TradeManager, protocol_step};
pub use task::{TaskFailure, TaskRunner, TradeContext, TradeTask};
pub use trade::{ProcessModel, Trade, TradePhase, TradeRole, TradingPeer};
pub use wallet::{AddressContext, AddressEntry, HdWallet, WalletError, WalletService};
