//! Seller-as-taker side of the deposit phase.

use async_trait::async_trait;
use kaspa_trade_sdk::amounts::sum_values;
use kaspa_trade_sdk::{
    EscrowError, TakerDepositExpectations, multisig_output_amount, taker_signs_deposit_tx,
    verify_maker_deposit_tx,
};
use tracing::info;

use super::{TradeContext, TradeTask};
use crate::contract::{Contract, contract_hash, verify_contract_hash};
use crate::error::{TradeError, require};
use crate::message::TradeMessage;
use crate::wallet::AddressContext;

/// Reserve the taker's share of the deposit: fee, seller security deposit and
/// trade amount, funded from the trade's reserved address.
pub struct TakerCreatesDepositTxInputs;

#[async_trait]
impl TradeTask for TakerCreatesDepositTxInputs {
    fn name(&self) -> &'static str {
        "TakerCreatesDepositTxInputs"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let trade_amount = trade.require_trade_amount()?;
        if !trade.offer.is_valid_trade_amount(trade_amount) {
            return Err(TradeError::Precondition(format!(
                "trade amount {trade_amount} outside offer range {}..={}",
                trade.offer.min_amount, trade.offer.amount
            )));
        }
        let taker_input_amount = trade
            .tx_fee
            .checked_add(trade.offer.seller_security_deposit)
            .and_then(|v| v.checked_add(trade_amount))
            .ok_or(EscrowError::AmountOverflow("taker input amount"))?;

        let wallet = ctx.model.wallet();
        let reserved = wallet
            .get_or_create_address_entry(trade.offer_id(), AddressContext::ReservedForTrade)
            .await?;
        let inputs = wallet.funding_inputs(&reserved.address, taker_input_amount).await?;
        let total = sum_values(inputs.iter().map(|i| i.value), "taker inputs")?;
        let change = total
            .checked_sub(taker_input_amount)
            .ok_or(EscrowError::NegativeAmount("taker change"))?;
        let change_address = if change > 0 {
            Some(wallet.fresh_address_entry().await?.address)
        } else {
            None
        };
        let multisig = wallet
            .get_or_create_address_entry(trade.offer_id(), AddressContext::MultiSig)
            .await?;

        ctx.model.raw_transaction_inputs = Some(inputs);
        ctx.model.change_output_value = change;
        ctx.model.change_output_address = change_address;
        ctx.model.my_multisig_pubkey = Some(multisig.pubkey);
        Ok(())
    }
}

pub struct TakerSendsPayDepositRequest;

#[async_trait]
impl TradeTask for TakerSendsPayDepositRequest {
    fn name(&self) -> &'static str {
        "TakerSendsPayDepositRequest"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let model = &*ctx.model;
        let inputs = require(model.raw_transaction_inputs.clone(), "taker raw inputs")?;
        let pubkey = require(model.my_multisig_pubkey, "my multisig pubkey")?;
        let payout = model
            .wallet()
            .get_or_create_address_entry(trade.offer_id(), AddressContext::TradePayout)
            .await?;

        let message = TradeMessage::PayDepositRequest {
            trade_id: trade.id.clone(),
            offer_id: trade.offer_id().to_string(),
            trade_amount: trade.require_trade_amount()?,
            tx_fee: trade.tx_fee,
            raw_transaction_inputs: inputs,
            change_output_value: model.change_output_value,
            change_output_address: model.change_output_address.as_ref().map(|a| a.to_string()),
            taker_multisig_pubkey: pubkey,
            taker_payout_address: payout.address_string(),
        };
        ctx.model.send(message);
        Ok(())
    }
}

/// Take the maker's contract, key and prepared deposit from its
/// `PublishDepositTxRequest`.
pub struct TakerProcessesPublishDepositTxRequest;

#[async_trait]
impl TradeTask for TakerProcessesPublishDepositTxRequest {
    fn name(&self) -> &'static str {
        "TakerProcessesPublishDepositTxRequest"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let TradeMessage::PublishDepositTxRequest {
            contract_json,
            prepared_deposit_tx,
            maker_multisig_pubkey,
            maker_payout_address,
            ..
        } = ctx.message()?
        else {
            return Err(TradeError::Precondition("expected PublishDepositTxRequest".into()));
        };
        ctx.trade.network.parse_address(maker_payout_address)?;

        let contract_json = contract_json.clone();
        let prepared = prepared_deposit_tx.clone();
        let maker_pubkey = *maker_multisig_pubkey;
        let maker_payout = maker_payout_address.clone();

        let peer = &mut ctx.trade.trading_peer;
        peer.contract_json = Some(contract_json);
        peer.multisig_pubkey = Some(maker_pubkey);
        peer.payout_address = Some(maker_payout);
        ctx.model.prepared_deposit_tx = Some(prepared);
        Ok(())
    }
}

/// Recompute the maker's contract hash, compare it with the deposit payload
/// and check the contract states the terms we agreed to.
pub struct TakerVerifiesContractHash;

#[async_trait]
impl TradeTask for TakerVerifiesContractHash {
    fn name(&self) -> &'static str {
        "TakerVerifiesContractHash"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let json = require(trade.trading_peer.contract_json.as_deref(), "maker contract json")?;
        let prepared = require(ctx.model.prepared_deposit_tx.as_ref(), "prepared deposit tx")?;
        verify_contract_hash(json, &prepared.transaction.payload)?;

        let contract = Contract::from_json(json)?;
        let my_pubkey = require(ctx.model.my_multisig_pubkey, "my multisig pubkey")?;
        let maker_pubkey = require(trade.trading_peer.multisig_pubkey, "maker multisig pubkey")?;
        let my_payout = ctx
            .model
            .wallet()
            .get_or_create_address_entry(trade.offer_id(), AddressContext::TradePayout)
            .await?;

        let mismatches: Vec<&str> = [
            (contract.trade_id == trade.id, "trade id"),
            (contract.offer == trade.offer, "offer"),
            (Some(contract.trade_amount) == trade.trade_amount, "trade amount"),
            (contract.trade_price == trade.trade_price, "trade price"),
            (contract.tx_fee == trade.tx_fee, "tx fee"),
            (contract.is_buyer_maker_and_seller_taker, "roles"),
            (contract.seller_multisig_pubkey == hex::encode(my_pubkey), "seller multisig pubkey"),
            (contract.buyer_multisig_pubkey == hex::encode(maker_pubkey), "buyer multisig pubkey"),
            (
                contract.arbitrator_pubkey == hex::encode(trade.arbitrator_pubkey),
                "arbitrator pubkey",
            ),
            (contract.seller_payout_address == my_payout.address_string(), "seller payout address"),
            (
                trade.trading_peer.payout_address.as_deref()
                    == Some(contract.buyer_payout_address.as_str()),
                "buyer payout address",
            ),
        ]
        .into_iter()
        .filter_map(|(ok, field)| (!ok).then_some(field))
        .collect();
        if !mismatches.is_empty() {
            return Err(TradeError::Consistency(format!(
                "contract disagrees on {}",
                mismatches.join(", ")
            )));
        }

        let hash = contract_hash(json);
        let json = json.to_string();
        ctx.trade.contract_json = Some(json);
        ctx.trade.contract_hash = Some(hash);
        Ok(())
    }
}

/// Verify the maker's deposit against our own inputs and the agreed amounts,
/// then sign our inputs. The deposit counts as published once fully signed.
pub struct SellerAsTakerSignsDepositTx;

#[async_trait]
impl TradeTask for SellerAsTakerSignsDepositTx {
    fn name(&self) -> &'static str {
        "SellerAsTakerSignsDepositTx"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let trade = &*ctx.trade;
        let trade_amount = trade.require_trade_amount()?;
        let contract_hash = require(trade.contract_hash, "contract hash")?;
        let prepared = require(ctx.model.prepared_deposit_tx.as_ref(), "prepared deposit tx")?;
        let taker_inputs =
            require(ctx.model.raw_transaction_inputs.as_deref(), "taker raw inputs")?;
        ctx.checked_multisig_entry().await?;

        let offer = &trade.offer;
        let multisig_amount = multisig_output_amount(
            offer.buyer_security_deposit,
            trade.tx_fee,
            offer.seller_security_deposit,
            trade_amount,
        )?;
        let escrow = ctx.escrow()?;
        let expected = TakerDepositExpectations {
            contract_hash,
            multisig_amount,
            taker_inputs,
            taker_change_value: ctx.model.change_output_value,
            taker_change_address: ctx.model.change_output_address.as_ref(),
            escrow: &escrow,
        };
        verify_maker_deposit_tx(prepared, &expected)?;

        let wallet = ctx.model.wallet();
        let reserved = wallet
            .address_entry(trade.offer_id(), AddressContext::ReservedForTrade)
            .await
            .ok_or_else(|| {
                TradeError::Precondition(format!(
                    "{} address entry must not be null",
                    AddressContext::ReservedForTrade
                ))
            })?;
        let keypair = wallet.keypair_for_address(&reserved.address).await?;
        let signed = taker_signs_deposit_tx(prepared, taker_inputs, &keypair)?;

        // our own share: everything above the maker's input
        let taker_contribution = multisig_amount
            .checked_sub(offer.buyer_security_deposit)
            .ok_or(EscrowError::NegativeAmount("taker contribution"))?;
        wallet
            .set_coin_locked_in_multisig(trade.offer_id(), taker_contribution)
            .await?;
        info!(
            trade_id = %trade.id,
            deposit_tx_id = %signed.id(),
            multisig_amount,
            taker_contribution,
            "deposit tx signed"
        );

        ctx.trade.deposit_tx = Some(signed);
        Ok(())
    }
}

pub struct TakerSendsDepositTxPublished;

#[async_trait]
impl TradeTask for TakerSendsDepositTxPublished {
    fn name(&self) -> &'static str {
        "TakerSendsDepositTxPublished"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let deposit_tx = ctx.trade.require_deposit_tx()?.clone();
        let message = TradeMessage::DepositTxPublished {
            trade_id: ctx.trade.id.clone(),
            deposit_tx,
        };
        ctx.model.send(message);
        Ok(())
    }
}
