//! Trade aggregate: negotiated terms, contract commitment, transaction
//! artifacts and the phase marker of one trade.

mod process_model;
mod trading_peer;

pub use process_model::ProcessModel;
pub use trading_peer::TradingPeer;

use kaspa_consensus_core::tx::Transaction;
use tracing::info;
use uuid::Uuid;

use crate::error::{TradeError, require};
use crate::network::Network;
use crate::offer::Offer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeRole {
    BuyerAsMaker,
    SellerAsTaker,
}

impl TradeRole {
    pub fn is_buyer(self) -> bool {
        self == TradeRole::BuyerAsMaker
    }

    pub fn is_maker(self) -> bool {
        self == TradeRole::BuyerAsMaker
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradePhase {
    PendingDeposit,
    DepositPrepared,
    DepositPublished,
    PayoutSigned,
    PayoutPublished,
    Completed,
    /// A task failed; the trade is stalled until a dispute is opened.
    Failed,
    Disputed,
    DisputeResolved,
}

impl TradePhase {
    /// Position on the cooperative path, `None` for the side exits.
    fn ordinal(self) -> Option<u8> {
        match self {
            TradePhase::PendingDeposit => Some(0),
            TradePhase::DepositPrepared => Some(1),
            TradePhase::DepositPublished => Some(2),
            TradePhase::PayoutSigned => Some(3),
            TradePhase::PayoutPublished => Some(4),
            TradePhase::Completed => Some(5),
            TradePhase::Failed | TradePhase::Disputed | TradePhase::DisputeResolved => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TradePhase::Completed | TradePhase::DisputeResolved)
    }

    pub fn can_advance_to(self, next: TradePhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (TradePhase::Failed, TradePhase::Disputed) => true,
            (TradePhase::Failed, _) => false,
            (TradePhase::Disputed, TradePhase::DisputeResolved) => true,
            (TradePhase::Disputed, _) => false,
            (_, TradePhase::Failed | TradePhase::Disputed) => true,
            (_, TradePhase::DisputeResolved) => false,
            (from, to) => match (from.ordinal(), to.ordinal()) {
                (Some(a), Some(b)) => b >= a,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trade {
    pub id: String,
    pub offer: Offer,
    pub role: TradeRole,
    pub network: Network,
    /// Set once the taker has chosen an amount within the offer's range.
    pub trade_amount: Option<u64>,
    pub trade_price: u64,
    /// Fee reserved in the deposit; left behind by the payout as its mining fee.
    pub tx_fee: u64,
    pub arbitrator_pubkey: [u8; 32],
    pub contract_json: Option<String>,
    pub contract_hash: Option<[u8; 32]>,
    pub deposit_tx: Option<Transaction>,
    pub payout_tx: Option<Transaction>,
    pub phase: TradePhase,
    pub error_message: Option<String>,
    pub trading_peer: TradingPeer,
}

impl Trade {
    pub fn new(
        offer: Offer,
        role: TradeRole,
        network: Network,
        trade_price: u64,
        tx_fee: u64,
        arbitrator_pubkey: [u8; 32],
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            offer,
            role,
            network,
            trade_amount: None,
            trade_price,
            tx_fee,
            arbitrator_pubkey,
            contract_json: None,
            contract_hash: None,
            deposit_tx: None,
            payout_tx: None,
            phase: TradePhase::PendingDeposit,
            error_message: None,
            trading_peer: TradingPeer::default(),
        }
    }

    /// Both peers key the trade by the same id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn offer_id(&self) -> &str {
        &self.offer.id
    }

    /// The offer direction must put this side on the role it plays: a buyer
    /// maker needs a buy offer, a seller taker takes one.
    pub fn role_matches_offer(&self) -> bool {
        let maker_is_buyer = self.role.is_maker() == self.role.is_buyer();
        self.offer.is_maker_buyer() == maker_is_buyer
    }

    pub fn require_trade_amount(&self) -> Result<u64, TradeError> {
        require(self.trade_amount, "trade amount")
    }

    pub fn require_contract_json(&self) -> Result<&str, TradeError> {
        require(self.contract_json.as_deref(), "contract json")
    }

    pub fn require_deposit_tx(&self) -> Result<&Transaction, TradeError> {
        require(self.deposit_tx.as_ref(), "deposit tx")
    }

    pub fn advance_to(&mut self, next: TradePhase) -> Result<(), TradeError> {
        if !self.phase.can_advance_to(next) {
            return Err(TradeError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        if self.phase != next {
            info!(trade_id = %self.id, from = ?self.phase, to = ?next, "trade phase changed");
            self.phase = next;
        }
        Ok(())
    }

    /// Hand the trade to arbitration. Allowed from any non-terminal phase,
    /// including a stalled `Failed` trade.
    pub fn open_dispute(&mut self) -> Result<(), TradeError> {
        self.advance_to(TradePhase::Disputed)
    }

    pub fn resolve_dispute(&mut self) -> Result<(), TradeError> {
        self.advance_to(TradePhase::DisputeResolved)
    }
}
