//! Escrow transaction construction for two-party trades on Kaspa.
//!
//! A trade locks both parties' collateral plus the traded amount into a
//! 2-of-3 multisig output (buyer, seller, arbitrator) with the deposit
//! transaction, and releases it with the payout transaction.

pub mod amounts;
pub mod deposit;
pub mod error;
pub mod escrow;
pub mod helpers;
pub mod payout;
pub mod script;

pub use amounts::{PayoutAmounts, check_payout_covers_deposit, multisig_output_amount};
pub use deposit::{
    MULTISIG_OUTPUT_INDEX, MakerDepositParams, PreparedDepositTx, RawTransactionInput,
    TakerDepositExpectations, maker_creates_and_signs_deposit_tx, taker_signs_deposit_tx,
    verify_deposit_signatures, verify_maker_deposit_tx,
};
pub use error::EscrowError;
pub use escrow::{EscrowBuilder, MultiSigEscrow};
pub use helpers::{
    generate_keypair, p2pk_address, p2pk_spk, parse_p2pk_address, schnorr_sign_input,
    verify_schnorr_input, x_only_pubkey,
};
pub use payout::{
    PayoutParams, buyer_signs_payout_tx, build_payout_tx, seller_signs_and_finalizes_payout_tx,
    verify_payout_tx,
};
