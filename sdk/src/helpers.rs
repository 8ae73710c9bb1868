use kaspa_addresses::{Address, Prefix, Version};
use kaspa_consensus_core::{
    hashing::{
        sighash::{SigHashReusedValuesUnsync, calc_schnorr_signature_hash},
        sighash_type::SIG_HASH_ALL,
    },
    tx::{MutableTransaction, ScriptPublicKey, Transaction, UtxoEntry},
};
use kaspa_txscript::pay_to_address_script;
use rand::thread_rng;
use secp256k1::{Keypair, XOnlyPublicKey, schnorr};

use crate::error::EscrowError;

/// Generate a new Schnorr keypair. Returns the keypair and its 32-byte x-only public key.
pub fn generate_keypair() -> (Keypair, [u8; 32]) {
    let kp = Keypair::new(secp256k1::SECP256K1, &mut thread_rng());
    let pk = x_only_pubkey(&kp);
    (kp, pk)
}

pub fn x_only_pubkey(keypair: &Keypair) -> [u8; 32] {
    keypair.x_only_public_key().0.serialize()
}

/// `<pubkey> OpCheckSig` locking script. The address prefix does not enter
/// the script, so the same script serves every network.
pub fn p2pk_spk(pubkey: &[u8; 32]) -> ScriptPublicKey {
    let addr = Address::new(Prefix::Testnet, Version::PubKey, pubkey.as_slice());
    pay_to_address_script(&addr)
}

pub fn p2pk_address(prefix: Prefix, pubkey: &[u8; 32]) -> Address {
    Address::new(prefix, Version::PubKey, pubkey.as_slice())
}

/// Parse a counterparty-supplied address and require a P2PK address on `prefix`.
pub fn parse_p2pk_address(address: &str, prefix: Prefix) -> Result<Address, EscrowError> {
    let invalid = |reason: String| EscrowError::InvalidAddress {
        address: address.to_string(),
        reason,
    };
    let parsed = Address::try_from(address).map_err(|e| invalid(format!("{e}")))?;
    if parsed.prefix != prefix {
        return Err(invalid(format!(
            "expected network prefix {:?}, got {:?}",
            prefix, parsed.prefix
        )));
    }
    if parsed.version != Version::PubKey {
        return Err(invalid(format!(
            "expected a P2PK address, got version {:?}",
            parsed.version
        )));
    }
    Ok(parsed)
}

/// UTXO entry for sighash purposes. DAA score and coinbase flag do not enter
/// the Schnorr signature hash.
pub fn utxo_entry(value: u64, spk: ScriptPublicKey) -> UtxoEntry {
    UtxoEntry::new(value, spk, 0, false, None)
}

/// Schnorr signature hash (`SIG_HASH_ALL`) of one input.
pub fn signature_message(
    tx: &Transaction,
    utxo_entries: &[UtxoEntry],
    input_index: usize,
) -> Result<secp256k1::Message, EscrowError> {
    if input_index >= tx.inputs.len() {
        return Err(EscrowError::InvalidConfig(format!(
            "input_index {input_index} out of bounds for {} inputs",
            tx.inputs.len()
        )));
    }
    if utxo_entries.len() != tx.inputs.len() {
        return Err(EscrowError::InvalidConfig(format!(
            "{} UTXO entries supplied for {} inputs",
            utxo_entries.len(),
            tx.inputs.len()
        )));
    }
    let reused_values = SigHashReusedValuesUnsync::new();
    let mtx = MutableTransaction::with_entries(tx.clone(), utxo_entries.to_vec());
    let sig_hash = calc_schnorr_signature_hash(
        &mtx.as_verifiable(),
        input_index,
        SIG_HASH_ALL,
        &reused_values,
    );
    Ok(secp256k1::Message::from_digest(sig_hash.as_bytes()))
}

/// Sign a specific transaction input with a Schnorr keypair.
/// Returns the 65-byte signature (64-byte sig + SIG_HASH_ALL byte).
pub fn schnorr_sign_input(
    tx: &Transaction,
    utxo_entries: &[UtxoEntry],
    keypair: &Keypair,
    input_index: usize,
) -> Result<Vec<u8>, EscrowError> {
    let msg = signature_message(tx, utxo_entries, input_index)?;
    let sig = keypair.sign_schnorr(msg);
    let mut signature = Vec::with_capacity(65);
    signature.extend_from_slice(sig.as_ref().as_slice());
    signature.push(SIG_HASH_ALL.to_u8());
    Ok(signature)
}

/// Verify a 65-byte Schnorr signature over one input against `pubkey`.
pub fn verify_schnorr_input(
    tx: &Transaction,
    utxo_entries: &[UtxoEntry],
    input_index: usize,
    signature: &[u8],
    pubkey: &[u8; 32],
) -> Result<(), EscrowError> {
    if signature.len() != 65 {
        return Err(EscrowError::Verification(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    if signature[64] != SIG_HASH_ALL.to_u8() {
        return Err(EscrowError::Verification(format!(
            "unexpected sighash type {:#04x}",
            signature[64]
        )));
    }
    let sig = schnorr::Signature::from_slice(&signature[..64])
        .map_err(|e| EscrowError::Verification(format!("malformed signature: {e}")))?;
    let xonly = XOnlyPublicKey::from_slice(pubkey)
        .map_err(|e| EscrowError::Verification(format!("malformed pubkey: {e}")))?;
    let msg = signature_message(tx, utxo_entries, input_index)?;
    secp256k1::SECP256K1
        .verify_schnorr(&sig, &msg, &xonly)
        .map_err(|e| EscrowError::Verification(format!("input {input_index}: {e}")))
}
