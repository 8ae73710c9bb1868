//! Payout transaction: escrow output -> buyer payout + seller payout.
//!
//! ```text
//! input:   deposit:0 (P2SH 2-of-3), sig script <buyer_sig> <seller_sig> <redeem>
//! outputs: [0] buyer payout  = buyer deposit + trade amount
//!          [1] seller payout = seller deposit
//! ```
//!
//! The buyer signs first and hands its signature to the seller, who verifies
//! it, adds its own and finalizes. The arbitrator key stays unused on this path.

use kaspa_addresses::Address;
use kaspa_consensus_core::{
    constants::TX_VERSION,
    tx::{Transaction, TransactionInput, TransactionOutpoint, TransactionOutput, UtxoEntry},
};
use kaspa_txscript::pay_to_address_script;
use secp256k1::Keypair;
use tracing::debug;

use crate::amounts::{PayoutAmounts, check_payout_covers_deposit};
use crate::deposit::{MULTISIG_OUTPUT_INDEX, multisig_output};
use crate::error::EscrowError;
use crate::escrow::MultiSigEscrow;
use crate::helpers::{schnorr_sign_input, utxo_entry, verify_schnorr_input, x_only_pubkey};
use crate::script::build_multisig_sig_script;

/// `OpCheckMultiSig` over three keys.
const MULTISIG_SIG_OP_COUNT: u8 = 3;

/// Inputs shared by both payout signers; both must pass identical values to
/// arrive at the same signature hash.
#[derive(Debug)]
pub struct PayoutParams<'a> {
    pub deposit_tx: &'a Transaction,
    pub escrow: &'a MultiSigEscrow,
    pub amounts: PayoutAmounts,
    pub tx_fee: u64,
    pub buyer_payout_address: &'a Address,
    pub seller_payout_address: &'a Address,
}

/// Build the unsigned payout transaction and the UTXO entry of the escrow
/// output it spends.
pub fn build_payout_tx(params: &PayoutParams<'_>) -> Result<(Transaction, UtxoEntry), EscrowError> {
    let ms = multisig_output(params.deposit_tx)?;
    if ms.script_public_key != params.escrow.p2sh_spk {
        return Err(EscrowError::Verification(
            "deposit multisig output is not locked to this escrow".into(),
        ));
    }
    if params.amounts.buyer == 0 || params.amounts.seller == 0 {
        return Err(EscrowError::InvalidConfig(
            "payout amounts must both be > 0".into(),
        ));
    }
    check_payout_covers_deposit(ms.value, &params.amounts, params.tx_fee)?;

    let input = TransactionInput::new(
        TransactionOutpoint::new(params.deposit_tx.id(), MULTISIG_OUTPUT_INDEX),
        vec![],
        0,
        MULTISIG_SIG_OP_COUNT,
    );
    let outputs = vec![
        TransactionOutput::new(
            params.amounts.buyer,
            pay_to_address_script(params.buyer_payout_address),
        ),
        TransactionOutput::new(
            params.amounts.seller,
            pay_to_address_script(params.seller_payout_address),
        ),
    ];
    let tx = Transaction::new(TX_VERSION, vec![input], outputs, 0, Default::default(), 0, vec![]);
    let entry = utxo_entry(ms.value, params.escrow.p2sh_spk.clone());
    Ok((tx, entry))
}

/// Buyer side: sign the payout with the buyer's multisig key.
/// Returns the 65-byte signature handed to the seller.
pub fn buyer_signs_payout_tx(
    params: &PayoutParams<'_>,
    buyer_keypair: &Keypair,
) -> Result<Vec<u8>, EscrowError> {
    if x_only_pubkey(buyer_keypair) != params.escrow.buyer_pk {
        return Err(EscrowError::Signing(
            "buyer key does not match the buyer key in the escrow script".into(),
        ));
    }
    let (tx, entry) = build_payout_tx(params)?;
    let sig = schnorr_sign_input(&tx, &[entry], buyer_keypair, 0)?;
    debug!(payout_tx_id = %tx.id(), "payout tx signed by buyer");
    Ok(sig)
}

/// Seller side: verify the buyer's signature, co-sign and return the fully
/// signed payout transaction.
pub fn seller_signs_and_finalizes_payout_tx(
    params: &PayoutParams<'_>,
    buyer_signature: &[u8],
    seller_keypair: &Keypair,
) -> Result<Transaction, EscrowError> {
    if x_only_pubkey(seller_keypair) != params.escrow.seller_pk {
        return Err(EscrowError::Signing(
            "seller key does not match the seller key in the escrow script".into(),
        ));
    }
    let (mut tx, entry) = build_payout_tx(params)?;
    let entries = [entry];

    verify_schnorr_input(&tx, &entries, 0, buyer_signature, &params.escrow.buyer_pk)?;
    let seller_signature = schnorr_sign_input(&tx, &entries, seller_keypair, 0)?;

    tx.inputs[0].signature_script = build_multisig_sig_script(
        &[buyer_signature.to_vec(), seller_signature],
        &params.escrow.redeem_script,
    )?;

    debug!(payout_tx_id = %tx.id(), "payout tx finalized by seller");
    Ok(tx)
}

/// Check a published payout transaction against the payout both sides agreed
/// on. Signature scripts are not part of the transaction id, so an id match
/// means identical inputs, outputs and amounts.
pub fn verify_payout_tx(tx: &Transaction, params: &PayoutParams<'_>) -> Result<(), EscrowError> {
    let (expected, _) = build_payout_tx(params)?;
    if tx.id() != expected.id() {
        return Err(EscrowError::Verification(format!(
            "payout tx {} differs from the agreed payout {}",
            tx.id(),
            expected.id()
        )));
    }
    Ok(())
}
