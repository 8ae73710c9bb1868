//! Deposit transaction: both peers' funding inputs -> 2-of-3 escrow output.
//!
//! Layout, reconstructed identically by both peers:
//!
//! ```text
//! inputs:  buyer-side inputs..., seller-side inputs...
//! outputs: [0] P2SH(2 <buyer> <seller> <arbitrator> 3 OpCheckMultiSig)
//!          [1] buyer change   (only if > 0)
//!          [2] seller change  (only if > 0)
//! payload: sha256(contract json)
//! ```
//!
//! The maker assembles and signs its own inputs; the taker verifies the
//! result against what it sent and then signs its inputs.

use kaspa_addresses::Address;
use kaspa_consensus_core::{
    constants::TX_VERSION,
    tx::{
        ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput,
        UtxoEntry,
    },
};
use kaspa_txscript::{
    opcodes::codes::{OpCheckSig, OpData32, OpData65},
    pay_to_address_script,
};
use secp256k1::Keypair;
use tracing::debug;

use crate::amounts::sum_values;
use crate::error::EscrowError;
use crate::escrow::MultiSigEscrow;
use crate::helpers::{
    p2pk_spk, schnorr_sign_input, utxo_entry, verify_schnorr_input, x_only_pubkey,
};
use crate::script::build_p2pk_sig_script;

/// Index of the escrow output in the deposit transaction.
pub const MULTISIG_OUTPUT_INDEX: u32 = 0;

const P2PK_SIG_OP_COUNT: u8 = 1;

/// One funding input as transmitted between peers: the outpoint being spent
/// plus the value and script of that output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransactionInput {
    pub outpoint: TransactionOutpoint,
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl RawTransactionInput {
    pub fn new(
        outpoint: TransactionOutpoint,
        value: u64,
        script_public_key: ScriptPublicKey,
    ) -> Self {
        Self {
            outpoint,
            value,
            script_public_key,
        }
    }

    pub fn utxo_entry(&self) -> UtxoEntry {
        utxo_entry(self.value, self.script_public_key.clone())
    }

    fn unsigned_input(&self) -> TransactionInput {
        TransactionInput::new(
            TransactionOutpoint::new(self.outpoint.transaction_id, self.outpoint.index),
            vec![],
            0,
            P2PK_SIG_OP_COUNT,
        )
    }
}

/// Deposit transaction plus the inputs it spends, in transaction order.
#[derive(Debug, Clone)]
pub struct PreparedDepositTx {
    pub transaction: Transaction,
    pub spent_inputs: Vec<RawTransactionInput>,
    pub maker_inputs: Vec<RawTransactionInput>,
}

impl PreparedDepositTx {
    pub fn utxo_entries(&self) -> Vec<UtxoEntry> {
        self.spent_inputs.iter().map(RawTransactionInput::utxo_entry).collect()
    }

    pub fn multisig_output(&self) -> Result<&TransactionOutput, EscrowError> {
        multisig_output(&self.transaction)
    }
}

pub fn multisig_output(tx: &Transaction) -> Result<&TransactionOutput, EscrowError> {
    tx.outputs
        .get(MULTISIG_OUTPUT_INDEX as usize)
        .ok_or_else(|| EscrowError::Verification("deposit tx has no multisig output".into()))
}

/// Everything the maker needs to build the deposit transaction.
#[derive(Debug)]
pub struct MakerDepositParams<'a> {
    pub maker_is_buyer: bool,
    pub contract_hash: [u8; 32],
    pub maker_input_amount: u64,
    pub multisig_amount: u64,
    pub maker_inputs: &'a [RawTransactionInput],
    pub maker_change_address: &'a Address,
    pub taker_inputs: &'a [RawTransactionInput],
    pub taker_change_value: u64,
    pub taker_change_address: Option<&'a Address>,
    pub escrow: &'a MultiSigEscrow,
}

/// Maker side: combine both input sets into the deposit transaction and sign
/// the maker's own inputs with `maker_keypair`.
///
/// Fails when the amounts do not balance exactly:
/// `sum(inputs) - sum(change outputs) == multisig_amount`.
pub fn maker_creates_and_signs_deposit_tx(
    params: &MakerDepositParams<'_>,
    maker_keypair: &Keypair,
) -> Result<PreparedDepositTx, EscrowError> {
    if params.maker_inputs.is_empty() {
        return Err(EscrowError::InvalidConfig("maker inputs must not be empty".into()));
    }
    if params.taker_inputs.is_empty() {
        return Err(EscrowError::InvalidConfig("taker inputs must not be empty".into()));
    }

    let maker_spk = p2pk_spk(&x_only_pubkey(maker_keypair));
    if let Some(foreign) = params
        .maker_inputs
        .iter()
        .find(|i| i.script_public_key != maker_spk)
    {
        return Err(EscrowError::Verification(format!(
            "maker input {}:{} is not spendable by the maker key",
            foreign.outpoint.transaction_id, foreign.outpoint.index
        )));
    }

    let maker_total = sum_values(params.maker_inputs.iter().map(|i| i.value), "maker inputs")?;
    let maker_change = maker_total.checked_sub(params.maker_input_amount).ok_or(
        EscrowError::InsufficientFunds {
            needed: params.maker_input_amount,
            available: maker_total,
        },
    )?;

    let taker_total = sum_values(params.taker_inputs.iter().map(|i| i.value), "taker inputs")?;
    let taker_contribution = taker_total
        .checked_sub(params.taker_change_value)
        .ok_or(EscrowError::NegativeAmount("taker inputs minus taker change"))?;
    let expected_taker_contribution = params
        .multisig_amount
        .checked_sub(params.maker_input_amount)
        .ok_or(EscrowError::NegativeAmount("multisig amount minus maker input"))?;
    if taker_contribution != expected_taker_contribution {
        return Err(EscrowError::AmountMismatch {
            context: "taker contribution",
            expected: expected_taker_contribution,
            actual: taker_contribution,
        });
    }

    let taker_change_spk = match (params.taker_change_value, params.taker_change_address) {
        (0, _) => None,
        (_, Some(addr)) => Some(pay_to_address_script(addr)),
        (_, None) => {
            return Err(EscrowError::InvalidConfig(
                "taker declared change but no change address".into(),
            ));
        }
    };
    let maker_change_spk = pay_to_address_script(params.maker_change_address);

    let (buyer_inputs, seller_inputs) = if params.maker_is_buyer {
        (params.maker_inputs, params.taker_inputs)
    } else {
        (params.taker_inputs, params.maker_inputs)
    };
    let spent_inputs: Vec<RawTransactionInput> =
        buyer_inputs.iter().chain(seller_inputs).cloned().collect();

    let maker_change_output = (maker_change > 0).then(|| (maker_change, maker_change_spk));
    let taker_change_output = taker_change_spk.map(|spk| (params.taker_change_value, spk));
    let (buyer_change, seller_change) = if params.maker_is_buyer {
        (maker_change_output, taker_change_output)
    } else {
        (taker_change_output, maker_change_output)
    };

    let mut outputs = vec![TransactionOutput::new(
        params.multisig_amount,
        params.escrow.p2sh_spk.clone(),
    )];
    outputs.extend(
        [buyer_change, seller_change]
            .into_iter()
            .flatten()
            .map(|(value, spk)| TransactionOutput::new(value, spk)),
    );

    let total_in = maker_total
        .checked_add(taker_total)
        .ok_or(EscrowError::AmountOverflow("deposit inputs"))?;
    let total_change = sum_values(outputs.iter().skip(1).map(|o| o.value), "change outputs")?;
    let locked = total_in
        .checked_sub(total_change)
        .ok_or(EscrowError::NegativeAmount("inputs minus change outputs"))?;
    if locked != params.multisig_amount {
        return Err(EscrowError::AmountMismatch {
            context: "inputs minus change outputs",
            expected: params.multisig_amount,
            actual: locked,
        });
    }

    let inputs = spent_inputs.iter().map(RawTransactionInput::unsigned_input).collect();
    let mut tx = Transaction::new(
        TX_VERSION,
        inputs,
        outputs,
        0,
        Default::default(),
        0,
        params.contract_hash.to_vec(),
    );

    let entries: Vec<UtxoEntry> =
        spent_inputs.iter().map(RawTransactionInput::utxo_entry).collect();
    let maker_range = if params.maker_is_buyer {
        0..params.maker_inputs.len()
    } else {
        params.taker_inputs.len()..spent_inputs.len()
    };
    for i in maker_range {
        let sig = schnorr_sign_input(&tx, &entries, maker_keypair, i)?;
        tx.inputs[i].signature_script = build_p2pk_sig_script(&sig)?;
    }

    debug!(
        tx_id = %tx.id(),
        multisig_amount = params.multisig_amount,
        maker_change,
        taker_change = params.taker_change_value,
        "deposit tx created and signed by maker"
    );

    Ok(PreparedDepositTx {
        transaction: tx,
        spent_inputs,
        maker_inputs: params.maker_inputs.to_vec(),
    })
}

/// What the taker sent and expects to find in the maker's deposit transaction.
#[derive(Debug)]
pub struct TakerDepositExpectations<'a> {
    pub contract_hash: [u8; 32],
    pub multisig_amount: u64,
    pub taker_inputs: &'a [RawTransactionInput],
    pub taker_change_value: u64,
    pub taker_change_address: Option<&'a Address>,
    pub escrow: &'a MultiSigEscrow,
}

/// Taker side: check the maker's deposit transaction against the taker's own
/// view of the trade before any taker input is signed.
pub fn verify_maker_deposit_tx(
    prepared: &PreparedDepositTx,
    expected: &TakerDepositExpectations<'_>,
) -> Result<(), EscrowError> {
    let tx = &prepared.transaction;
    if tx.payload.as_slice() != expected.contract_hash.as_slice() {
        return Err(EscrowError::Verification(
            "deposit payload does not match the contract hash".into(),
        ));
    }

    let ms = prepared.multisig_output()?;
    if ms.script_public_key != expected.escrow.p2sh_spk {
        return Err(EscrowError::Verification(
            "multisig output is not locked to the agreed 2-of-3 script".into(),
        ));
    }
    if ms.value != expected.multisig_amount {
        return Err(EscrowError::AmountMismatch {
            context: "deposit multisig output",
            expected: expected.multisig_amount,
            actual: ms.value,
        });
    }

    if tx.inputs.len() != prepared.spent_inputs.len() {
        return Err(EscrowError::Verification(format!(
            "deposit tx has {} inputs but {} spent inputs were declared",
            tx.inputs.len(),
            prepared.spent_inputs.len()
        )));
    }
    for (input, raw) in tx.inputs.iter().zip(&prepared.spent_inputs) {
        if input.previous_outpoint != raw.outpoint {
            return Err(EscrowError::Verification(
                "deposit inputs do not match the declared spent inputs".into(),
            ));
        }
    }
    for own in expected.taker_inputs {
        if !prepared.spent_inputs.contains(own) {
            return Err(EscrowError::Verification(format!(
                "taker input {}:{} missing from deposit tx",
                own.outpoint.transaction_id, own.outpoint.index
            )));
        }
    }

    if expected.taker_change_value > 0 {
        let addr = expected.taker_change_address.ok_or_else(|| {
            EscrowError::InvalidConfig("taker change declared without address".into())
        })?;
        let spk = pay_to_address_script(addr);
        let found = tx
            .outputs
            .iter()
            .skip(1)
            .any(|o| o.script_public_key == spk && o.value == expected.taker_change_value);
        if !found {
            return Err(EscrowError::Verification(
                "taker change output missing or altered".into(),
            ));
        }
    }

    let total_in = sum_values(prepared.spent_inputs.iter().map(|i| i.value), "deposit inputs")?;
    let total_out = sum_values(tx.outputs.iter().map(|o| o.value), "deposit outputs")?;
    if total_in != total_out {
        return Err(EscrowError::AmountMismatch {
            context: "deposit inputs vs outputs",
            expected: total_in,
            actual: total_out,
        });
    }
    Ok(())
}

/// Taker side: sign the taker's own inputs of an already verified deposit
/// transaction and check every input ends up with a valid signature.
pub fn taker_signs_deposit_tx(
    prepared: &PreparedDepositTx,
    taker_inputs: &[RawTransactionInput],
    taker_keypair: &Keypair,
) -> Result<Transaction, EscrowError> {
    let mut tx = prepared.transaction.clone();
    let entries = prepared.utxo_entries();
    let taker_spk = p2pk_spk(&x_only_pubkey(taker_keypair));

    for (i, raw) in prepared.spent_inputs.iter().enumerate() {
        if taker_inputs.contains(raw) {
            if raw.script_public_key != taker_spk {
                return Err(EscrowError::Verification(format!(
                    "taker input {i} is not spendable by the taker key"
                )));
            }
            let sig = schnorr_sign_input(&tx, &entries, taker_keypair, i)?;
            tx.inputs[i].signature_script = build_p2pk_sig_script(&sig)?;
        }
    }

    verify_deposit_signatures(&tx, &prepared.spent_inputs)?;
    Ok(tx)
}

/// Check that every input of the deposit carries a valid P2PK signature.
pub fn verify_deposit_signatures(
    tx: &Transaction,
    spent_inputs: &[RawTransactionInput],
) -> Result<(), EscrowError> {
    let entries: Vec<UtxoEntry> =
        spent_inputs.iter().map(RawTransactionInput::utxo_entry).collect();
    for (i, (input, raw)) in tx.inputs.iter().zip(spent_inputs).enumerate() {
        let pubkey = p2pk_pubkey(&raw.script_public_key).ok_or_else(|| {
            EscrowError::Verification(format!("deposit input {i} is not a P2PK output"))
        })?;
        let script = &input.signature_script;
        if script.len() != 66 || script[0] != OpData65 {
            return Err(EscrowError::Verification(format!(
                "deposit input {i} is not signed"
            )));
        }
        verify_schnorr_input(tx, &entries, i, &script[1..], &pubkey)?;
    }
    Ok(())
}

/// Extract the x-only key from a `<OpData32 pubkey> OpCheckSig` script.
pub fn p2pk_pubkey(spk: &ScriptPublicKey) -> Option<[u8; 32]> {
    let script = spk.script();
    if script.len() != 34 || script[0] != OpData32 || script[33] != OpCheckSig {
        return None;
    }
    script[1..33].try_into().ok()
}
