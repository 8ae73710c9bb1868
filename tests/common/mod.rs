//! Two in-process peers sharing one trade.

#![allow(dead_code)]

use std::sync::Arc;

use kaspa_consensus_core::tx::{TransactionId, TransactionOutpoint};
use kaspa_p2p_trade::*;
use kaspa_trade_sdk::generate_keypair;

pub const TX_FEE: u64 = 1_000;
pub const TRADE_AMOUNT: u64 = 50_000;
pub const BUYER_DEPOSIT: u64 = 5_000;
pub const SELLER_DEPOSIT: u64 = 5_000;

pub fn offer(id: &str) -> Offer {
    Offer {
        id: id.to_string(),
        direction: OfferDirection::Buy,
        amount: 50_000,
        min_amount: 10_000,
        price: 4_200,
        currency_code: "EUR".into(),
        payment_method: "SEPA".into(),
        buyer_security_deposit: BUYER_DEPOSIT,
        seller_security_deposit: SELLER_DEPOSIT,
        maker_fee: 100,
        taker_fee: 300,
    }
}

pub struct Peers {
    pub maker: Arc<TradeManager>,
    pub taker: Arc<TradeManager>,
    pub buyer_wallet: Arc<HdWallet>,
    pub seller_wallet: Arc<HdWallet>,
    pub trade_id: String,
    pub offer_id: String,
}

pub fn wallets() -> (Arc<HdWallet>, Arc<HdWallet>) {
    (
        Arc::new(HdWallet::from_seed(&[0x11; 64], Network::Testnet).unwrap()),
        Arc::new(HdWallet::from_seed(&[0x22; 64], Network::Testnet).unwrap()),
    )
}

/// Put one spendable output on the offer's reserved address.
pub async fn fund(wallet: &HdWallet, offer_id: &str, tag: u8, value: u64) {
    let entry = wallet
        .get_or_create_address_entry(offer_id, AddressContext::ReservedForTrade)
        .await
        .unwrap();
    let outpoint = TransactionOutpoint::new(TransactionId::from_bytes([tag; 32]), 0);
    wallet.add_utxo(&entry.address, outpoint, value).await;
}

/// Register one trade on both managers. The buyer and seller reserved
/// addresses are funded with some excess so both sides get change.
pub async fn open_trade(
    maker: Arc<TradeManager>,
    taker: Arc<TradeManager>,
    buyer_wallet: Arc<HdWallet>,
    seller_wallet: Arc<HdWallet>,
    offer_id: &str,
    trade_amount: Option<u64>,
) -> Peers {
    let tag = offer_id.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    fund(&buyer_wallet, offer_id, tag, BUYER_DEPOSIT + 2_500).await;
    fund(&seller_wallet, offer_id, tag ^ 0x80, 100_000).await;

    let (_, arbitrator_pk) = generate_keypair();
    let offer = offer(offer_id);
    let buyer_trade = Trade::new(
        offer.clone(),
        TradeRole::BuyerAsMaker,
        Network::Testnet,
        offer.price,
        TX_FEE,
        arbitrator_pk,
    );
    let trade_id = buyer_trade.id.clone();
    let mut seller_trade = Trade::new(
        offer.clone(),
        TradeRole::SellerAsTaker,
        Network::Testnet,
        offer.price,
        TX_FEE,
        arbitrator_pk,
    )
    .with_id(trade_id.clone());
    seller_trade.trade_amount = trade_amount;

    maker
        .add_trade(buyer_trade, ProcessModel::new(buyer_wallet.clone()))
        .await
        .unwrap();
    taker
        .add_trade(seller_trade, ProcessModel::new(seller_wallet.clone()))
        .await
        .unwrap();

    Peers {
        maker,
        taker,
        buyer_wallet,
        seller_wallet,
        trade_id,
        offer_id: offer_id.to_string(),
    }
}

pub async fn setup() -> Peers {
    let (buyer_wallet, seller_wallet) = wallets();
    open_trade(
        Arc::new(TradeManager::new()),
        Arc::new(TradeManager::new()),
        buyer_wallet,
        seller_wallet,
        "offer-1",
        Some(TRADE_AMOUNT),
    )
    .await
}

impl Peers {
    /// TakeOffer through DepositTxPublished.
    pub async fn run_deposit_phase(&self) -> Result<(), TradeError> {
        let to_maker = self.taker.handle(&self.trade_id, TradeEvent::TakeOffer).await?;
        let to_taker = self.maker.handle_messages(to_maker).await?;
        let to_maker = self.taker.handle_messages(to_taker).await?;
        self.maker.handle_messages(to_maker).await?;
        Ok(())
    }

    /// StartFiatPayment through PayoutTxPublished.
    pub async fn run_payout_phase(&self) -> Result<(), TradeError> {
        let to_taker = self
            .maker
            .handle(&self.trade_id, TradeEvent::StartFiatPayment)
            .await?;
        self.taker.handle_messages(to_taker).await?;
        let to_maker = self
            .taker
            .handle(&self.trade_id, TradeEvent::ConfirmFiatReceived)
            .await?;
        self.maker.handle_messages(to_maker).await?;
        Ok(())
    }

    pub async fn run_to_completion(&self) -> Result<(), TradeError> {
        self.run_deposit_phase().await?;
        self.run_payout_phase().await?;
        self.confirm_payout().await
    }

    pub async fn confirm_payout(&self) -> Result<(), TradeError> {
        self.maker
            .handle(&self.trade_id, TradeEvent::PayoutConfirmed)
            .await?;
        self.taker
            .handle(&self.trade_id, TradeEvent::PayoutConfirmed)
            .await?;
        Ok(())
    }

    pub async fn buyer_trade(&self) -> Trade {
        self.maker.trade(&self.trade_id).await.unwrap()
    }

    pub async fn seller_trade(&self) -> Trade {
        self.taker.trade(&self.trade_id).await.unwrap()
    }
}
