use kaspa_trade_sdk::RawTransactionInput;

/// What we know about the counterparty, filled in from its messages.
/// Addresses are kept as received and parsed against the trade network
/// when used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradingPeer {
    pub multisig_pubkey: Option<[u8; 32]>,
    pub raw_transaction_inputs: Option<Vec<RawTransactionInput>>,
    pub change_output_value: u64,
    pub change_output_address: Option<String>,
    /// Peer's signature over the payout transaction.
    pub signature: Option<Vec<u8>>,
    pub payout_address: Option<String>,
    pub contract_json: Option<String>,
}
