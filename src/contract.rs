//! Contract commitment.
//!
//! Both peers bind their signatures to one contract text: the maker
//! serializes the agreed terms to JSON and embeds `sha256(json)` as the
//! deposit payload; the taker and later the seller recompute the hash before
//! they co-sign anything.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::TradeError;
use crate::offer::Offer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub offer: Offer,
    pub trade_id: String,
    pub trade_amount: u64,
    pub trade_price: u64,
    pub tx_fee: u64,
    pub is_buyer_maker_and_seller_taker: bool,
    pub buyer_multisig_pubkey: String,
    pub seller_multisig_pubkey: String,
    pub arbitrator_pubkey: String,
    pub buyer_payout_address: String,
    pub seller_payout_address: String,
}

impl Contract {
    /// Canonical JSON. Field order is the struct order, so equal contracts
    /// always serialize to identical bytes.
    pub fn to_json(&self) -> Result<String, TradeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, TradeError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn contract_hash(contract_json: &str) -> [u8; 32] {
    Sha256::digest(contract_json.as_bytes()).into()
}

/// Recompute the hash of `contract_json` and compare it with the committed one.
pub fn verify_contract_hash(contract_json: &str, committed: &[u8]) -> Result<(), TradeError> {
    let actual = contract_hash(contract_json);
    if actual.as_slice() != committed {
        return Err(TradeError::Consistency(format!(
            "contract hash mismatch: committed {}, recomputed {}",
            hex::encode(committed),
            hex::encode(actual)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::OfferDirection;

    fn contract() -> Contract {
        Contract {
            offer: Offer {
                id: "offer-1".into(),
                direction: OfferDirection::Buy,
                amount: 50_000,
                min_amount: 10_000,
                price: 4_200,
                currency_code: "EUR".into(),
                payment_method: "SEPA".into(),
                buyer_security_deposit: 5_000,
                seller_security_deposit: 5_000,
                maker_fee: 100,
                taker_fee: 300,
            },
            trade_id: "trade-1".into(),
            trade_amount: 50_000,
            trade_price: 4_200,
            tx_fee: 1_000,
            is_buyer_maker_and_seller_taker: true,
            buyer_multisig_pubkey: "aa".repeat(32),
            seller_multisig_pubkey: "bb".repeat(32),
            arbitrator_pubkey: "cc".repeat(32),
            buyer_payout_address: "kaspatest:buyer".into(),
            seller_payout_address: "kaspatest:seller".into(),
        }
    }

    #[test]
    fn reserialized_contract_hashes_identically() {
        let json = contract().to_json().unwrap();
        let again = Contract::from_json(&json).unwrap().to_json().unwrap();
        assert_eq!(json, again);
        assert_eq!(contract_hash(&json), contract_hash(&again));
    }

    #[test]
    fn any_single_byte_change_changes_the_hash() {
        let json = contract().to_json().unwrap();
        let original = contract_hash(&json);
        let bytes = json.as_bytes();
        for i in (0..bytes.len()).step_by(7) {
            let mut mutated = bytes.to_vec();
            mutated[i] ^= 0x01;
            let mutated = String::from_utf8_lossy(&mutated).into_owned();
            assert_ne!(contract_hash(&mutated), original, "byte {i}");
        }
    }

    #[test]
    fn verify_detects_mismatch() {
        let json = contract().to_json().unwrap();
        let hash = contract_hash(&json);
        assert!(verify_contract_hash(&json, &hash).is_ok());

        let mut other = contract();
        other.trade_amount += 1;
        let err = verify_contract_hash(&other.to_json().unwrap(), &hash).unwrap_err();
        assert!(err.to_string().contains("contract hash mismatch"));
    }
}
