//! Protocol messages exchanged between the two peers and the local triggers
//! that drive a trade. Transport and wire encoding live outside this crate;
//! outbound messages are handed back to the caller.

use kaspa_consensus_core::tx::Transaction;
use kaspa_trade_sdk::{PreparedDepositTx, RawTransactionInput};

#[derive(Debug, Clone)]
pub enum TradeMessage {
    /// Taker -> maker: taker's funding inputs, change and keys.
    PayDepositRequest {
        trade_id: String,
        offer_id: String,
        trade_amount: u64,
        tx_fee: u64,
        raw_transaction_inputs: Vec<RawTransactionInput>,
        change_output_value: u64,
        change_output_address: Option<String>,
        taker_multisig_pubkey: [u8; 32],
        taker_payout_address: String,
    },
    /// Maker -> taker: contract and the maker-signed deposit transaction.
    PublishDepositTxRequest {
        trade_id: String,
        contract_json: String,
        prepared_deposit_tx: PreparedDepositTx,
        maker_multisig_pubkey: [u8; 32],
        maker_payout_address: String,
    },
    /// Taker -> maker: fully signed deposit transaction.
    DepositTxPublished {
        trade_id: String,
        deposit_tx: Transaction,
    },
    /// Buyer -> seller: buyer's payout signature.
    FiatPaymentStarted {
        trade_id: String,
        buyer_signature: Vec<u8>,
        buyer_payout_address: String,
    },
    /// Seller -> buyer: finalized payout transaction.
    PayoutTxPublished {
        trade_id: String,
        payout_tx: Transaction,
    },
}

impl TradeMessage {
    pub fn trade_id(&self) -> &str {
        match self {
            TradeMessage::PayDepositRequest { trade_id, .. }
            | TradeMessage::PublishDepositTxRequest { trade_id, .. }
            | TradeMessage::DepositTxPublished { trade_id, .. }
            | TradeMessage::FiatPaymentStarted { trade_id, .. }
            | TradeMessage::PayoutTxPublished { trade_id, .. } => trade_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TradeMessage::PayDepositRequest { .. } => "PayDepositRequest",
            TradeMessage::PublishDepositTxRequest { .. } => "PublishDepositTxRequest",
            TradeMessage::DepositTxPublished { .. } => "DepositTxPublished",
            TradeMessage::FiatPaymentStarted { .. } => "FiatPaymentStarted",
            TradeMessage::PayoutTxPublished { .. } => "PayoutTxPublished",
        }
    }
}

/// Anything that can move a trade: a peer message or a local trigger.
#[derive(Debug, Clone)]
pub enum TradeEvent {
    Message(TradeMessage),
    /// Taker accepts the offer (trade amount already set on the trade).
    TakeOffer,
    /// Buyer has sent the fiat payment.
    StartFiatPayment,
    /// Seller has received the fiat payment.
    ConfirmFiatReceived,
    /// Payout transaction is confirmed on chain.
    PayoutConfirmed,
    OpenDispute,
    ResolveDispute,
}

impl TradeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TradeEvent::Message(m) => m.name(),
            TradeEvent::TakeOffer => "TakeOffer",
            TradeEvent::StartFiatPayment => "StartFiatPayment",
            TradeEvent::ConfirmFiatReceived => "ConfirmFiatReceived",
            TradeEvent::PayoutConfirmed => "PayoutConfirmed",
            TradeEvent::OpenDispute => "OpenDispute",
            TradeEvent::ResolveDispute => "ResolveDispute",
        }
    }
}

impl From<TradeMessage> for TradeEvent {
    fn from(message: TradeMessage) -> Self {
        TradeEvent::Message(message)
    }
}
