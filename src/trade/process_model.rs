use std::sync::Arc;

use kaspa_addresses::Address;
use kaspa_trade_sdk::{PreparedDepositTx, RawTransactionInput};

use crate::message::TradeMessage;
use crate::wallet::WalletService;

/// Per-trade working set shared by the tasks of one protocol: our own
/// funding data, intermediate transactions, the message being processed and
/// the messages queued for the peer.
#[derive(Clone)]
pub struct ProcessModel {
    wallet: Arc<dyn WalletService>,
    /// Inbound message the current task list was selected for.
    pub trade_message: Option<TradeMessage>,
    pub my_multisig_pubkey: Option<[u8; 32]>,
    pub raw_transaction_inputs: Option<Vec<RawTransactionInput>>,
    pub change_output_value: u64,
    pub change_output_address: Option<Address>,
    pub prepared_deposit_tx: Option<PreparedDepositTx>,
    pub payout_tx_signature: Option<Vec<u8>>,
    outbound: Vec<TradeMessage>,
}

impl ProcessModel {
    pub fn new(wallet: Arc<dyn WalletService>) -> Self {
        Self {
            wallet,
            trade_message: None,
            my_multisig_pubkey: None,
            raw_transaction_inputs: None,
            change_output_value: 0,
            change_output_address: None,
            prepared_deposit_tx: None,
            payout_tx_signature: None,
            outbound: Vec::new(),
        }
    }

    pub fn wallet(&self) -> Arc<dyn WalletService> {
        Arc::clone(&self.wallet)
    }

    pub fn send(&mut self, message: TradeMessage) {
        self.outbound.push(message);
    }

    pub fn outbound(&self) -> &[TradeMessage] {
        &self.outbound
    }

    pub fn take_outbound(&mut self) -> Vec<TradeMessage> {
        std::mem::take(&mut self.outbound)
    }
}
