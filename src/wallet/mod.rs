//! Wallet collaborator consumed by the protocol tasks.
//!
//! The wallet owns key material and the address-entry list. Tasks only ask it
//! for entries by context, move entries between contexts and fetch signing
//! keys; every read-modify-write on the entry list happens inside one lock
//! acquisition of the implementation.

mod hd_wallet;

pub use hd_wallet::HdWallet;

use std::fmt;

use async_trait::async_trait;
use kaspa_addresses::Address;
use kaspa_trade_sdk::RawTransactionInput;
use secp256k1::Keypair;
use thiserror::Error;

/// Role an address currently plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressContext {
    Available,
    ReservedForTrade,
    MultiSig,
    TradePayout,
}

impl fmt::Display for AddressContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressContext::Available => "AVAILABLE",
            AddressContext::ReservedForTrade => "RESERVED_FOR_TRADE",
            AddressContext::MultiSig => "MULTI_SIG",
            AddressContext::TradePayout => "TRADE_PAYOUT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    /// Offer the entry is bound to; `None` for available entries.
    pub offer_id: Option<String>,
    pub context: AddressContext,
    pub address: Address,
    pub pubkey: [u8; 32],
    /// Derivation index below the wallet account.
    pub index: u32,
    pub coin_locked_in_multisig: u64,
}

impl AddressEntry {
    pub fn address_string(&self) -> String {
        self.address.to_string()
    }

    pub fn is_trade_entry(&self, offer_id: &str, context: AddressContext) -> bool {
        self.context == context && self.offer_id.as_deref() == Some(offer_id)
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no {context} address entry for offer {offer_id}")]
    EntryNotFound {
        offer_id: String,
        context: AddressContext,
    },
    #[error("no key for {0}")]
    KeyNotFound(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("insufficient funds at {address}: need {needed} sompi, have {available}")]
    InsufficientFunds {
        address: String,
        needed: u64,
        available: u64,
    },
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn address_entry(&self, offer_id: &str, context: AddressContext) -> Option<AddressEntry>;

    /// Entry bound to `(offer_id, context)`, reusing an available entry or
    /// deriving a new one when none exists yet.
    async fn get_or_create_address_entry(
        &self,
        offer_id: &str,
        context: AddressContext,
    ) -> Result<AddressEntry, WalletError>;

    /// A new, unbound address (used for change).
    async fn fresh_address_entry(&self) -> Result<AddressEntry, WalletError>;

    async fn set_coin_locked_in_multisig(&self, offer_id: &str, amount: u64)
    -> Result<(), WalletError>;

    /// Release the `(offer_id, context)` entry back into the available pool.
    async fn swap_trade_entry_to_available(
        &self,
        offer_id: &str,
        context: AddressContext,
    ) -> Result<(), WalletError>;

    /// Signing key of the multisig entry of `offer_id`, which must carry `pubkey`.
    async fn multisig_keypair(&self, offer_id: &str, pubkey: &[u8; 32])
    -> Result<Keypair, WalletError>;

    async fn keypair_for_address(&self, address: &Address) -> Result<Keypair, WalletError>;

    /// Spendable outputs at `address` covering at least `amount`.
    async fn funding_inputs(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<Vec<RawTransactionInput>, WalletError>;
}
