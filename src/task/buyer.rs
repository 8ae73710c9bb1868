//! Buyer side of the payout phase.

use async_trait::async_trait;
use kaspa_trade_sdk::{buyer_signs_payout_tx, verify_payout_tx};
use tracing::info;

use super::{TradeContext, TradeTask};
use crate::error::{TradeError, require};
use crate::message::TradeMessage;
use crate::wallet::AddressContext;

/// Sign the cooperative payout with the key of our multisig entry.
pub struct BuyerSignsPayoutTx;

#[async_trait]
impl TradeTask for BuyerSignsPayoutTx {
    fn name(&self) -> &'static str {
        "BuyerSignsPayoutTx"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let deposit_tx = ctx.trade.require_deposit_tx()?;
        let multisig = ctx.checked_multisig_entry().await?;
        let terms = ctx.payout_terms().await?;
        let keypair = ctx
            .model
            .wallet()
            .multisig_keypair(ctx.trade.offer_id(), &multisig.pubkey)
            .await?;
        let signature = buyer_signs_payout_tx(&terms.params(deposit_tx), &keypair)?;

        ctx.model.payout_tx_signature = Some(signature);
        Ok(())
    }
}

pub struct BuyerSendsFiatPaymentStarted;

#[async_trait]
impl TradeTask for BuyerSendsFiatPaymentStarted {
    fn name(&self) -> &'static str {
        "BuyerSendsFiatPaymentStarted"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let signature = require(ctx.model.payout_tx_signature.clone(), "payout tx signature")?;
        let payout = ctx
            .model
            .wallet()
            .get_or_create_address_entry(ctx.trade.offer_id(), AddressContext::TradePayout)
            .await?;

        let message = TradeMessage::FiatPaymentStarted {
            trade_id: ctx.trade.id.clone(),
            buyer_signature: signature,
            buyer_payout_address: payout.address_string(),
        };
        ctx.model.send(message);
        Ok(())
    }
}

/// Accept the seller's payout if it is exactly the payout we signed.
pub struct BuyerProcessesPayoutTxPublished;

#[async_trait]
impl TradeTask for BuyerProcessesPayoutTxPublished {
    fn name(&self) -> &'static str {
        "BuyerProcessesPayoutTxPublished"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let TradeMessage::PayoutTxPublished { payout_tx, .. } = ctx.message()? else {
            return Err(TradeError::Precondition("expected PayoutTxPublished".into()));
        };
        let deposit_tx = ctx.trade.require_deposit_tx()?;
        let terms = ctx.payout_terms().await?;
        verify_payout_tx(payout_tx, &terms.params(deposit_tx))?;
        info!(trade_id = %ctx.trade.id, payout_tx_id = %payout_tx.id(), "payout tx received");

        let payout_tx = payout_tx.clone();
        ctx.trade.payout_tx = Some(payout_tx);
        Ok(())
    }
}
