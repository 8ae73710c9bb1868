use kaspa_txscript::{
    opcodes::codes::OpData65, script_builder::ScriptBuilder, standard::multisig_redeem_script,
};

use super::error::EscrowError;

/// Number of signatures required to spend the escrow.
pub const REQUIRED_SIGNATURES: usize = 2;

/// 2-of-3 arbitrated: any 2 of buyer/seller/arbitrator.
///
/// Key order is fixed (buyer, seller, arbitrator) so both peers derive the
/// same script and the same P2SH address.
///
/// ```text
/// 2 <buyer> <seller> <arbitrator> 3 OpCheckMultiSig
/// ```
pub fn build_arbitrated_script(
    buyer_pk: &[u8; 32],
    seller_pk: &[u8; 32],
    arbitrator_pk: &[u8; 32],
) -> Result<Vec<u8>, EscrowError> {
    multisig_redeem_script(
        [*buyer_pk, *seller_pk, *arbitrator_pk].iter(),
        REQUIRED_SIGNATURES,
    )
    .map_err(|e| EscrowError::ScriptBuild(format!("{e:?}")))
}

/// Build a P2PK signature script from a 65-byte Schnorr signature.
/// Format: `<OpData65><signature>`
pub fn build_p2pk_sig_script(signature: &[u8]) -> Result<Vec<u8>, EscrowError> {
    if signature.len() != 65 {
        return Err(EscrowError::Verification(format!(
            "signature must be 65 bytes (64-byte schnorr + sighash type), got {}",
            signature.len()
        )));
    }
    let mut script = Vec::with_capacity(1 + signature.len());
    script.push(OpData65);
    script.extend_from_slice(signature);
    Ok(script)
}

/// Signature script for the cooperative multisig spend.
///
/// Signatures must follow the key order of the redeem script:
/// `<buyer_sig> <seller_sig> <redeem_script>`.
pub fn build_multisig_sig_script(
    signatures: &[Vec<u8>],
    redeem_script: &[u8],
) -> Result<Vec<u8>, EscrowError> {
    if signatures.len() != REQUIRED_SIGNATURES {
        return Err(EscrowError::InvalidConfig(format!(
            "multisig spend needs {REQUIRED_SIGNATURES} signatures, got {}",
            signatures.len()
        )));
    }
    let mut script = Vec::new();
    for sig in signatures {
        script.extend_from_slice(&build_p2pk_sig_script(sig)?);
    }
    let tail = ScriptBuilder::new().add_data(redeem_script)?.drain();
    script.extend_from_slice(&tail);
    Ok(script)
}
