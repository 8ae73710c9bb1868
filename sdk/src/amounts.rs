//! Escrow amount formulas shared by both peers.
//!
//! The deposit locks `maker_input + tx_fee + seller_deposit + trade_amount`
//! into the multisig output. The payout releases `buyer_deposit + trade_amount`
//! to the buyer and `seller_deposit` to the seller; the `tx_fee` reserved in
//! the deposit is what the payout transaction leaves behind as its fee.

use crate::error::EscrowError;

/// Value locked into the 2-of-3 output of the deposit transaction.
pub fn multisig_output_amount(
    maker_input_amount: u64,
    tx_fee: u64,
    seller_security_deposit: u64,
    trade_amount: u64,
) -> Result<u64, EscrowError> {
    maker_input_amount
        .checked_add(tx_fee)
        .and_then(|v| v.checked_add(seller_security_deposit))
        .and_then(|v| v.checked_add(trade_amount))
        .ok_or(EscrowError::AmountOverflow("multisig output amount"))
}

/// The two outputs of the payout transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutAmounts {
    pub buyer: u64,
    pub seller: u64,
}

impl PayoutAmounts {
    /// Cooperative-path payout: buyer gets its deposit back plus the traded
    /// amount, seller gets its deposit back.
    pub fn cooperative(
        buyer_security_deposit: u64,
        trade_amount: u64,
        seller_security_deposit: u64,
    ) -> Result<Self, EscrowError> {
        let buyer = buyer_security_deposit
            .checked_add(trade_amount)
            .ok_or(EscrowError::AmountOverflow("buyer payout amount"))?;
        Ok(Self {
            buyer,
            seller: seller_security_deposit,
        })
    }

    pub fn total(&self) -> Result<u64, EscrowError> {
        self.buyer
            .checked_add(self.seller)
            .ok_or(EscrowError::AmountOverflow("payout total"))
    }
}

/// Cross-check the payout against the locked multisig value.
///
/// Fails unless `buyer + seller + tx_fee == multisig_value`, i.e. the payout
/// neither creates value nor leaves more than the reserved fee behind.
pub fn check_payout_covers_deposit(
    multisig_value: u64,
    payout: &PayoutAmounts,
    tx_fee: u64,
) -> Result<(), EscrowError> {
    let spent = payout
        .total()?
        .checked_add(tx_fee)
        .ok_or(EscrowError::AmountOverflow("payout total plus fee"))?;
    if spent != multisig_value {
        return Err(EscrowError::AmountMismatch {
            context: "payout outputs plus fee vs multisig output",
            expected: multisig_value,
            actual: spent,
        });
    }
    Ok(())
}

pub fn sum_values<I>(values: I, context: &'static str) -> Result<u64, EscrowError>
where
    I: IntoIterator<Item = u64>,
{
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v))
        .ok_or(EscrowError::AmountOverflow(context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multisig_amount_is_the_sum_of_its_parts() {
        assert_eq!(
            multisig_output_amount(100_000, 1_000, 5_000, 50_000).unwrap(),
            156_000
        );
    }

    #[test]
    fn multisig_amount_overflow_is_an_error() {
        let err = multisig_output_amount(u64::MAX, 1, 0, 0).unwrap_err();
        assert!(matches!(err, EscrowError::AmountOverflow(_)));
    }

    #[test]
    fn cooperative_payout_split() {
        let p = PayoutAmounts::cooperative(5_000, 50_000, 5_000).unwrap();
        assert_eq!(p.buyer, 55_000);
        assert_eq!(p.seller, 5_000);
        assert_eq!(p.total().unwrap(), 60_000);
    }

    #[test]
    fn payout_matching_deposit_passes() {
        // maker input == buyer deposit, as in the buyer-as-maker flow
        let ms = multisig_output_amount(5_000, 1_000, 5_000, 50_000).unwrap();
        let p = PayoutAmounts::cooperative(5_000, 50_000, 5_000).unwrap();
        assert!(check_payout_covers_deposit(ms, &p, 1_000).is_ok());
    }

    #[test]
    fn payout_against_oversized_deposit_is_flagged() {
        let ms = multisig_output_amount(100_000, 1_000, 5_000, 50_000).unwrap();
        let p = PayoutAmounts::cooperative(5_000, 50_000, 5_000).unwrap();
        let err = check_payout_covers_deposit(ms, &p, 1_000).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::AmountMismatch {
                expected: 156_000,
                actual: 61_000,
                ..
            }
        ));
    }

    #[test]
    fn sum_values_detects_overflow() {
        assert!(sum_values([u64::MAX, 1], "inputs").is_err());
        assert_eq!(sum_values([1, 2, 3], "inputs").unwrap(), 6);
    }
}
