use async_trait::async_trait;

use super::{TradeContext, TradeTask};
use crate::error::TradeError;
use crate::wallet::AddressContext;

/// Release every address entry still bound to the trade once the payout is
/// confirmed. Entries already released are skipped by the wallet.
pub struct SwapTradeEntriesToAvailable;

#[async_trait]
impl TradeTask for SwapTradeEntriesToAvailable {
    fn name(&self) -> &'static str {
        "SwapTradeEntriesToAvailable"
    }

    async fn run(&self, ctx: &mut TradeContext<'_>) -> Result<(), TradeError> {
        let wallet = ctx.model.wallet();
        for context in [
            AddressContext::MultiSig,
            AddressContext::ReservedForTrade,
            AddressContext::TradePayout,
        ] {
            wallet
                .swap_trade_entry_to_available(ctx.trade.offer_id(), context)
                .await?;
        }
        Ok(())
    }
}
