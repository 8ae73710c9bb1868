//! Protocol tasks and the runner executing them.
//!
//! A task is one protocol step. It reads and writes the trade and the process
//! model through a [`TradeContext`] and either completes or fails with a
//! [`TradeError`]; the [`TaskRunner`] stops at the first failure.
//!
//! Tasks compute everything they need before touching the trade, so the
//! in-memory commit at the end of a task is the only mutation.

pub mod buyer;
pub mod common;
pub mod maker;
pub mod runner;
pub mod seller;
pub mod taker;

pub use runner::{TaskFailure, TaskRunner};

use async_trait::async_trait;
use kaspa_addresses::Address;
use kaspa_consensus_core::tx::Transaction;
use kaspa_trade_sdk::{EscrowBuilder, MultiSigEscrow, PayoutAmounts, PayoutParams};

use crate::error::{TradeError, require};
use crate::message::TradeMessage;
use crate::trade::{ProcessModel, Trade};
use crate::wallet::{AddressContext, AddressEntry};

/// Exclusive access to one trade and its working set for the duration of a
/// task.
pub struct TradeContext<'a> {
    pub trade: &'a mut Trade,
    pub model: &'a mut ProcessModel,
}

#[async_trait]
pub trait TradeTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError>;
}

impl TradeContext<'_> {
    /// The inbound message the task list was selected for.
    pub fn message(&self) -> Result<&TradeMessage, TradeError> {
        require(self.model.trade_message.as_ref(), "trade message")
    }

    /// Our `MultiSig` entry for this offer, checked against the multisig key
    /// recorded on the process model.
    pub async fn checked_multisig_entry(&self) -> Result<AddressEntry, TradeError> {
        let offer_id = self.trade.offer_id();
        let entry = self
            .model
            .wallet()
            .address_entry(offer_id, AddressContext::MultiSig)
            .await
            .ok_or_else(|| {
                TradeError::Precondition(format!(
                    "{} address entry for offer {offer_id} must not be null",
                    AddressContext::MultiSig
                ))
            })?;
        let my_pubkey = require(self.model.my_multisig_pubkey, "my multisig pubkey")?;
        if entry.pubkey != my_pubkey {
            return Err(TradeError::Consistency(format!(
                "multisig pubkey {} does not match address entry key {}",
                hex::encode(my_pubkey),
                hex::encode(entry.pubkey)
            )));
        }
        Ok(entry)
    }

    /// 2-of-3 escrow over (buyer, seller, arbitrator) as both peers build it.
    pub fn escrow(&self) -> Result<MultiSigEscrow, TradeError> {
        let mine = require(self.model.my_multisig_pubkey, "my multisig pubkey")?;
        let peer = require(self.trade.trading_peer.multisig_pubkey, "peer multisig pubkey")?;
        let (buyer, seller) = if self.trade.role.is_buyer() {
            (mine, peer)
        } else {
            (peer, mine)
        };
        Ok(EscrowBuilder::new()
            .buyer(buyer)
            .seller(seller)
            .arbitrator(self.trade.arbitrator_pubkey)
            .build()?)
    }

    /// Payout terms both signers must agree on bit for bit.
    pub async fn payout_terms(&self) -> Result<PayoutTerms, TradeError> {
        let trade_amount = self.trade.require_trade_amount()?;
        let offer = &self.trade.offer;
        let amounts = PayoutAmounts::cooperative(
            offer.buyer_security_deposit,
            trade_amount,
            offer.seller_security_deposit,
        )?;

        let my_payout = self
            .model
            .wallet()
            .get_or_create_address_entry(self.trade.offer_id(), AddressContext::TradePayout)
            .await?
            .address;
        let peer_payout = require(
            self.trade.trading_peer.payout_address.as_deref(),
            "peer payout address",
        )?;
        let peer_payout = self.trade.network.parse_address(peer_payout)?;
        let (buyer_payout_address, seller_payout_address) = if self.trade.role.is_buyer() {
            (my_payout, peer_payout)
        } else {
            (peer_payout, my_payout)
        };

        Ok(PayoutTerms {
            escrow: self.escrow()?,
            amounts,
            tx_fee: self.trade.tx_fee,
            buyer_payout_address,
            seller_payout_address,
        })
    }
}

pub struct PayoutTerms {
    pub escrow: MultiSigEscrow,
    pub amounts: PayoutAmounts,
    pub tx_fee: u64,
    pub buyer_payout_address: Address,
    pub seller_payout_address: Address,
}

impl PayoutTerms {
    pub fn params<'a>(&'a self, deposit_tx: &'a Transaction) -> PayoutParams<'a> {
        PayoutParams {
            deposit_tx,
            escrow: &self.escrow,
            amounts: self.amounts,
            tx_fee: self.tx_fee,
            buyer_payout_address: &self.buyer_payout_address,
            seller_payout_address: &self.seller_payout_address,
        }
    }
}
