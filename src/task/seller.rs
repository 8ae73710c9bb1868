//! Seller side of the payout phase.

use async_trait::async_trait;
use kaspa_trade_sdk::seller_signs_and_finalizes_payout_tx;
use tracing::info;

use super::{TradeContext, TradeTask};
use crate::contract::verify_contract_hash;
use crate::error::{TradeError, require};
use crate::message::TradeMessage;
use crate::wallet::AddressContext;

/// Store the buyer's payout signature and payout address.
pub struct SellerProcessesFiatPaymentStarted;

#[async_trait]
impl TradeTask for SellerProcessesFiatPaymentStarted {
    fn name(&self) -> &'static str {
        "SellerProcessesFiatPaymentStarted"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let TradeMessage::FiatPaymentStarted {
            buyer_signature,
            buyer_payout_address,
            ..
        } = ctx.message()?
        else {
            return Err(TradeError::Precondition("expected FiatPaymentStarted".into()));
        };
        if buyer_signature.len() != 65 {
            return Err(TradeError::Consistency(format!(
                "buyer signature must be 65 bytes, got {}",
                buyer_signature.len()
            )));
        }
        let peer = &ctx.trade.trading_peer;
        if peer
            .payout_address
            .as_deref()
            .is_some_and(|known| known != buyer_payout_address)
        {
            return Err(TradeError::Consistency(format!(
                "buyer payout address changed to {buyer_payout_address}"
            )));
        }
        ctx.trade.network.parse_address(buyer_payout_address)?;

        let signature = buyer_signature.clone();
        let payout_address = buyer_payout_address.clone();
        ctx.trade.trading_peer.signature = Some(signature);
        ctx.trade.trading_peer.payout_address = Some(payout_address);
        Ok(())
    }
}

/// Check the contract still hashes to the deposit payload before co-signing
/// anything that spends the deposit.
pub struct SellerVerifiesContractHash;

#[async_trait]
impl TradeTask for SellerVerifiesContractHash {
    fn name(&self) -> &'static str {
        "SellerVerifiesContractHash"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let json = ctx.trade.require_contract_json()?;
        let deposit_tx = ctx.trade.require_deposit_tx()?;
        verify_contract_hash(json, &deposit_tx.payload)
    }
}

/// Verify the buyer's signature, co-sign with our multisig key and record
/// the finalized payout. The multisig entry goes back to the available pool.
pub struct SellerSignAndFinalizePayoutTx;

#[async_trait]
impl TradeTask for SellerSignAndFinalizePayoutTx {
    fn name(&self) -> &'static str {
        "SellerSignAndFinalizePayoutTx"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let buyer_signature = require(
            ctx.trade.trading_peer.signature.as_deref(),
            "buyer payout signature",
        )?;
        let deposit_tx = ctx.trade.require_deposit_tx()?;
        let multisig = ctx.checked_multisig_entry().await?;
        let terms = ctx.payout_terms().await?;

        let wallet = ctx.model.wallet();
        let keypair = wallet
            .multisig_keypair(ctx.trade.offer_id(), &multisig.pubkey)
            .await?;
        let payout_tx = seller_signs_and_finalizes_payout_tx(
            &terms.params(deposit_tx),
            buyer_signature,
            &keypair,
        )?;
        info!(trade_id = %ctx.trade.id, payout_tx_id = %payout_tx.id(), "payout tx finalized");

        wallet
            .swap_trade_entry_to_available(ctx.trade.offer_id(), AddressContext::MultiSig)
            .await?;
        ctx.trade.payout_tx = Some(payout_tx);
        Ok(())
    }
}

pub struct SellerSendsPayoutTxPublished;

#[async_trait]
impl TradeTask for SellerSendsPayoutTxPublished {
    fn name(&self) -> &'static str {
        "SellerSendsPayoutTxPublished"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let payout_tx = require(ctx.trade.payout_tx.clone(), "payout tx")?;
        let message = TradeMessage::PayoutTxPublished {
            trade_id: ctx.trade.id.clone(),
            payout_tx,
        };
        ctx.model.send(message);
        Ok(())
    }
}
