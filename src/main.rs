//! Trade demo
//!
//! Runs one complete buyer-as-maker / seller-as-taker trade in process: two
//! HD wallets, two trade managers, messages relayed directly between them.
//! Nothing is broadcast.
//!
//! ```bash
//! cargo run --bin trade-demo -- trade.toml
//! RUST_LOG=kaspa_p2p_trade=debug cargo run --bin trade-demo
//! ```

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use kaspa_consensus_core::tx::{TransactionId, TransactionOutpoint};
use kaspa_p2p_trade::logging::init_logging;
use kaspa_p2p_trade::providers::{ProvidersRepository, select_preferred_nodes};
use kaspa_p2p_trade::{
    AddressContext, HdWallet, Offer, OfferDirection, ProcessModel, Trade, TradeConfig, TradeEvent,
    TradeManager, TradePhase, TradeRole, WalletService,
};
use kaspa_trade_sdk::generate_keypair;
use tracing::info;

const BUYER_SEED: [u8; 64] = [0x11; 64];
const SELLER_SEED: [u8; 64] = [0x22; 64];

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "trade.toml".to_string());
    let verbose = std::env::var("TRADE_VERBOSE").is_ok();
    init_logging(verbose, &["kaspa_p2p_trade", "kaspa_trade_sdk", "trade_demo"]);

    let config = TradeConfig::load(&config_path)?;
    let network = config.network;
    let providers =
        ProvidersRepository::new(config.providers.clone(), network, &mut rand::thread_rng());
    let preferred = select_preferred_nodes(config.nodes_option, &config.custom_nodes);
    info!(%network, provider = providers.base_url(), ?preferred, "configuration loaded");

    let buyer_wallet = Arc::new(HdWallet::from_seed(&BUYER_SEED, network)?);
    let seller_wallet = Arc::new(HdWallet::from_seed(&SELLER_SEED, network)?);
    let (_, arbitrator_pk) = generate_keypair();

    let offer = Offer {
        id: "demo-offer".to_string(),
        direction: OfferDirection::Buy,
        amount: 50_000_000,
        min_amount: 10_000_000,
        price: 12,
        currency_code: "EUR".to_string(),
        payment_method: "SEPA".to_string(),
        buyer_security_deposit: 5_000_000,
        seller_security_deposit: 5_000_000,
        maker_fee: 50_000,
        taker_fee: 150_000,
    };
    let trade_amount = 40_000_000;

    fund(&buyer_wallet, &offer.id, 0x01, 7_500_000).await?;
    fund(&seller_wallet, &offer.id, 0x02, 60_000_000).await?;

    let maker = TradeManager::new();
    let taker = TradeManager::new();

    let buyer_trade = Trade::new(
        offer.clone(),
        TradeRole::BuyerAsMaker,
        network,
        offer.price,
        config.tx_fee,
        arbitrator_pk,
    );
    let trade_id = buyer_trade.id.clone();
    let mut seller_trade = Trade::new(
        offer.clone(),
        TradeRole::SellerAsTaker,
        network,
        offer.price,
        config.tx_fee,
        arbitrator_pk,
    )
    .with_id(trade_id.clone());
    seller_trade.trade_amount = Some(trade_amount);

    maker
        .add_trade(buyer_trade, ProcessModel::new(buyer_wallet.clone()))
        .await?;
    taker
        .add_trade(seller_trade, ProcessModel::new(seller_wallet.clone()))
        .await?;

    println!("Trade {trade_id}");
    println!("================");

    let to_maker = taker.handle(&trade_id, TradeEvent::TakeOffer).await?;
    let to_taker = maker.handle_messages(to_maker).await?;
    let to_maker = taker.handle_messages(to_taker).await?;
    maker.handle_messages(to_maker).await?;

    let deposit = maker
        .trade(&trade_id)
        .await?
        .deposit_tx
        .context("deposit tx missing after deposit phase")?;
    println!("deposit tx   {}", deposit.id());
    for (i, output) in deposit.outputs.iter().enumerate() {
        println!("  output {i}: {} sompi", output.value);
    }

    let to_taker = maker.handle(&trade_id, TradeEvent::StartFiatPayment).await?;
    taker.handle_messages(to_taker).await?;
    let to_maker = taker.handle(&trade_id, TradeEvent::ConfirmFiatReceived).await?;
    maker.handle_messages(to_maker).await?;

    let payout = taker
        .trade(&trade_id)
        .await?
        .payout_tx
        .context("payout tx missing after payout phase")?;
    println!("payout tx    {}", payout.id());
    for (i, output) in payout.outputs.iter().enumerate() {
        println!("  output {i}: {} sompi", output.value);
    }

    maker.handle(&trade_id, TradeEvent::PayoutConfirmed).await?;
    taker.handle(&trade_id, TradeEvent::PayoutConfirmed).await?;

    for (name, manager, wallet) in [
        ("buyer", &maker, &buyer_wallet),
        ("seller", &taker, &seller_wallet),
    ] {
        let trade = manager.trade(&trade_id).await?;
        if trade.phase != TradePhase::Completed {
            bail!("{name} trade ended in {:?}", trade.phase);
        }
        println!("{name:<6} phase {:?}", trade.phase);
        for entry in wallet.address_entries().await {
            println!("  #{} {:<16} {}", entry.index, entry.context.to_string(), entry.address);
        }
    }
    Ok(())
}

/// Give the trade's reserved address one spendable output.
async fn fund(wallet: &HdWallet, offer_id: &str, tag: u8, value: u64) -> Result<()> {
    let entry = wallet
        .get_or_create_address_entry(offer_id, AddressContext::ReservedForTrade)
        .await?;
    let outpoint = TransactionOutpoint::new(TransactionId::from_bytes([tag; 32]), 0);
    wallet.add_utxo(&entry.address, outpoint, value).await;
    info!(address = %entry.address, value, "funded reserved address");
    Ok(())
}
