use kaspa_consensus_core::tx::ScriptPublicKey;
use kaspa_txscript::pay_to_script_hash_script;

use crate::error::EscrowError;
use crate::script;

/// Resolved 2-of-3 escrow: the three keys plus the derived scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiSigEscrow {
    pub buyer_pk: [u8; 32],
    pub seller_pk: [u8; 32],
    pub arbitrator_pk: [u8; 32],
    pub redeem_script: Vec<u8>,
    pub p2sh_spk: ScriptPublicKey,
}

/// Builder for the trade escrow.
#[derive(Debug, Default)]
pub struct EscrowBuilder {
    buyer_pk: Option<[u8; 32]>,
    seller_pk: Option<[u8; 32]>,
    arbitrator_pk: Option<[u8; 32]>,
}

impl EscrowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buyer(mut self, pk: [u8; 32]) -> Self {
        self.buyer_pk = Some(pk);
        self
    }

    pub fn seller(mut self, pk: [u8; 32]) -> Self {
        self.seller_pk = Some(pk);
        self
    }

    pub fn arbitrator(mut self, pk: [u8; 32]) -> Self {
        self.arbitrator_pk = Some(pk);
        self
    }

    pub fn build(self) -> Result<MultiSigEscrow, EscrowError> {
        let buyer_pk = self
            .buyer_pk
            .ok_or_else(|| EscrowError::InvalidConfig("buyer pubkey required".into()))?;
        let seller_pk = self
            .seller_pk
            .ok_or_else(|| EscrowError::InvalidConfig("seller pubkey required".into()))?;
        let arbitrator_pk = self
            .arbitrator_pk
            .ok_or_else(|| EscrowError::InvalidConfig("arbitrator pubkey required".into()))?;

        if buyer_pk == seller_pk || buyer_pk == arbitrator_pk || seller_pk == arbitrator_pk {
            return Err(EscrowError::InvalidConfig(
                "buyer, seller and arbitrator pubkeys must be distinct".into(),
            ));
        }

        let redeem_script = script::build_arbitrated_script(&buyer_pk, &seller_pk, &arbitrator_pk)?;
        let p2sh_spk = pay_to_script_hash_script(&redeem_script);

        Ok(MultiSigEscrow {
            buyer_pk,
            seller_pk,
            arbitrator_pk,
            redeem_script,
            p2sh_spk,
        })
    }
}
