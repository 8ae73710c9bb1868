//! Buyer-as-maker side of the deposit phase.

use async_trait::async_trait;
use kaspa_trade_sdk::amounts::sum_values;
use kaspa_trade_sdk::{
    MakerDepositParams, maker_creates_and_signs_deposit_tx, multisig_output_amount,
    verify_deposit_signatures,
};
use tracing::{debug, info};

use super::{TradeContext, TradeTask};
use crate::contract::{Contract, contract_hash};
use crate::error::{TradeError, require};
use crate::message::TradeMessage;
use crate::trade::{TradeRole, TradingPeer};
use crate::wallet::AddressContext;

/// Take the taker's amount, funding inputs, change and keys from its
/// `PayDepositRequest`.
pub struct MakerProcessesPayDepositRequest;

#[async_trait]
impl TradeTask for MakerProcessesPayDepositRequest {
    fn name(&self) -> &'static str {
        "MakerProcessesPayDepositRequest"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let TradeMessage::PayDepositRequest {
            offer_id,
            trade_amount,
            tx_fee,
            raw_transaction_inputs,
            change_output_value,
            change_output_address,
            taker_multisig_pubkey,
            taker_payout_address,
            ..
        } = ctx.message()?
        else {
            return Err(TradeError::Precondition("expected PayDepositRequest".into()));
        };

        if offer_id != ctx.trade.offer_id() {
            return Err(TradeError::Consistency(format!(
                "request for offer {offer_id} sent to trade of offer {}",
                ctx.trade.offer_id()
            )));
        }
        if !ctx.trade.offer.is_valid_trade_amount(*trade_amount) {
            return Err(TradeError::Consistency(format!(
                "trade amount {trade_amount} outside offer range {}..={}",
                ctx.trade.offer.min_amount, ctx.trade.offer.amount
            )));
        }
        if *tx_fee != ctx.trade.tx_fee {
            return Err(TradeError::Consistency(format!(
                "taker tx fee {tx_fee} differs from ours {}",
                ctx.trade.tx_fee
            )));
        }
        if raw_transaction_inputs.is_empty() {
            return Err(TradeError::Precondition("taker raw inputs must not be empty".into()));
        }
        let network = ctx.trade.network;
        if *change_output_value > 0 {
            let addr = require(change_output_address.as_deref(), "taker change address")?;
            network.parse_address(addr)?;
        }
        network.parse_address(taker_payout_address)?;

        let trade_amount = *trade_amount;
        let peer = TradingPeer {
            multisig_pubkey: Some(*taker_multisig_pubkey),
            raw_transaction_inputs: Some(raw_transaction_inputs.clone()),
            change_output_value: *change_output_value,
            change_output_address: change_output_address.clone(),
            payout_address: Some(taker_payout_address.clone()),
            ..Default::default()
        };

        ctx.trade.trade_amount = Some(trade_amount);
        ctx.trade.trading_peer = peer;
        Ok(())
    }
}

/// Serialize the agreed terms and commit to their hash.
pub struct MakerCreatesContract;

#[async_trait]
impl TradeTask for MakerCreatesContract {
    fn name(&self) -> &'static str {
        "MakerCreatesContract"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let trade_amount = trade.require_trade_amount()?;
        let peer_pubkey = require(trade.trading_peer.multisig_pubkey, "taker multisig pubkey")?;
        let peer_payout =
            require(trade.trading_peer.payout_address.clone(), "taker payout address")?;

        let wallet = ctx.model.wallet();
        let multisig = wallet
            .get_or_create_address_entry(trade.offer_id(), AddressContext::MultiSig)
            .await?;
        let payout = wallet
            .get_or_create_address_entry(trade.offer_id(), AddressContext::TradePayout)
            .await?;

        let contract = Contract {
            offer: trade.offer.clone(),
            trade_id: trade.id.clone(),
            trade_amount,
            trade_price: trade.trade_price,
            tx_fee: trade.tx_fee,
            is_buyer_maker_and_seller_taker: trade.role == TradeRole::BuyerAsMaker,
            buyer_multisig_pubkey: hex::encode(multisig.pubkey),
            seller_multisig_pubkey: hex::encode(peer_pubkey),
            arbitrator_pubkey: hex::encode(trade.arbitrator_pubkey),
            buyer_payout_address: payout.address_string(),
            seller_payout_address: peer_payout,
        };
        let json = contract.to_json()?;
        let hash = contract_hash(&json);
        debug!(trade_id = %trade.id, contract = %json, "contract created");

        ctx.trade.contract_json = Some(json);
        ctx.trade.contract_hash = Some(hash);
        ctx.model.my_multisig_pubkey = Some(multisig.pubkey);
        Ok(())
    }
}

/// Build the deposit transaction from both input sets and sign the maker's
/// inputs. The maker funds the buyer security deposit; the taker funds fee,
/// seller deposit and trade amount.
pub struct BuyerAsMakerCreatesAndSignsDepositTx;

#[async_trait]
impl TradeTask for BuyerAsMakerCreatesAndSignsDepositTx {
    fn name(&self) -> &'static str {
        "BuyerAsMakerCreatesAndSignsDepositTx"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let trade_amount = trade.require_trade_amount()?;
        let contract_hash = contract_hash(trade.require_contract_json()?);
        if trade.contract_hash.is_some_and(|h| h != contract_hash) {
            return Err(TradeError::Consistency(
                "stored contract hash does not match the contract".into(),
            ));
        }

        let offer = &trade.offer;
        let maker_input_amount = offer.buyer_security_deposit;
        let multisig_entry = ctx.checked_multisig_entry().await?;
        let multisig_amount = multisig_output_amount(
            maker_input_amount,
            trade.tx_fee,
            offer.seller_security_deposit,
            trade_amount,
        )?;

        let peer = &trade.trading_peer;
        let taker_inputs = require(peer.raw_transaction_inputs.as_deref(), "taker raw inputs")?;
        let taker_change_address = peer
            .change_output_address
            .as_deref()
            .filter(|_| peer.change_output_value > 0)
            .map(|a| trade.network.parse_address(a))
            .transpose()?;

        let wallet = ctx.model.wallet();
        let reserved = wallet
            .get_or_create_address_entry(trade.offer_id(), AddressContext::ReservedForTrade)
            .await?;
        let maker_inputs = wallet.funding_inputs(&reserved.address, maker_input_amount).await?;
        let maker_keypair = wallet.keypair_for_address(&reserved.address).await?;
        let change = wallet.fresh_address_entry().await?;

        let escrow = ctx.escrow()?;
        if escrow.buyer_pk != multisig_entry.pubkey {
            return Err(TradeError::Consistency(
                "buyer key in escrow script differs from our multisig entry".into(),
            ));
        }

        let params = MakerDepositParams {
            maker_is_buyer: true,
            contract_hash,
            maker_input_amount,
            multisig_amount,
            maker_inputs: &maker_inputs,
            maker_change_address: &change.address,
            taker_inputs,
            taker_change_value: peer.change_output_value,
            taker_change_address: taker_change_address.as_ref(),
            escrow: &escrow,
        };
        let prepared = maker_creates_and_signs_deposit_tx(&params, &maker_keypair)?;
        let maker_total = sum_values(maker_inputs.iter().map(|i| i.value), "maker inputs")?;
        let maker_change = maker_total.saturating_sub(maker_input_amount);

        wallet
            .set_coin_locked_in_multisig(trade.offer_id(), maker_input_amount)
            .await?;
        info!(
            trade_id = %trade.id,
            deposit_tx_id = %prepared.transaction.id(),
            multisig_amount,
            "deposit tx prepared"
        );

        ctx.model.raw_transaction_inputs = Some(maker_inputs);
        ctx.model.change_output_value = maker_change;
        ctx.model.change_output_address = (maker_change > 0).then_some(change.address);
        ctx.model.prepared_deposit_tx = Some(prepared);
        Ok(())
    }
}

pub struct MakerSendsPublishDepositTxRequest;

#[async_trait]
impl TradeTask for MakerSendsPublishDepositTxRequest {
    fn name(&self) -> &'static str {
        "MakerSendsPublishDepositTxRequest"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let contract_json = ctx.trade.require_contract_json()?.to_string();
        let prepared = require(ctx.model.prepared_deposit_tx.clone(), "prepared deposit tx")?;
        let pubkey = require(ctx.model.my_multisig_pubkey, "my multisig pubkey")?;
        let payout = ctx
            .model
            .wallet()
            .get_or_create_address_entry(ctx.trade.offer_id(), AddressContext::TradePayout)
            .await?;

        let message = TradeMessage::PublishDepositTxRequest {
            trade_id: ctx.trade.id.clone(),
            contract_json,
            prepared_deposit_tx: prepared,
            maker_multisig_pubkey: pubkey,
            maker_payout_address: payout.address_string(),
        };
        ctx.model.send(message);
        Ok(())
    }
}

/// Accept the taker's fully signed deposit: same transaction we prepared,
/// every input signed.
pub struct MakerProcessesDepositTxPublished;

#[async_trait]
impl TradeTask for MakerProcessesDepositTxPublished {
    fn name(&self) -> &'static str {
        "MakerProcessesDepositTxPublished"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let TradeMessage::DepositTxPublished { deposit_tx, .. } = ctx.message()? else {
            return Err(TradeError::Precondition("expected DepositTxPublished".into()));
        };
        let prepared = require(ctx.model.prepared_deposit_tx.as_ref(), "prepared deposit tx")?;
        if deposit_tx.id() != prepared.transaction.id() {
            return Err(TradeError::Consistency(format!(
                "published deposit {} differs from prepared deposit {}",
                deposit_tx.id(),
                prepared.transaction.id()
            )));
        }
        verify_deposit_signatures(deposit_tx, &prepared.spent_inputs)?;

        let deposit_tx = deposit_tx.clone();
        ctx.trade.deposit_tx = Some(deposit_tx);
        Ok(())
    }
}
