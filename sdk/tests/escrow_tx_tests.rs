//! Deposit and payout transactions built end to end over in-memory inputs.

use kaspa_addresses::{Address, Prefix};
use kaspa_consensus_core::hashing::sighash::SigHashReusedValuesUnsync;
use kaspa_consensus_core::tx::{
    PopulatedTransaction, Transaction, TransactionId, TransactionOutpoint, UtxoEntry,
};
use kaspa_trade_sdk::amounts::sum_values;
use kaspa_trade_sdk::script::build_multisig_sig_script;
use kaspa_trade_sdk::*;
use kaspa_txscript::{EngineCtx, TxScriptEngine, caches::Cache};
use secp256k1::Keypair;

struct Parties {
    buyer: Keypair,
    seller: Keypair,
    buyer_pk: [u8; 32],
    seller_pk: [u8; 32],
    escrow: MultiSigEscrow,
    buyer_address: Address,
    seller_address: Address,
}

fn parties() -> Parties {
    let (buyer, buyer_pk) = generate_keypair();
    let (seller, seller_pk) = generate_keypair();
    let (_, arbitrator_pk) = generate_keypair();
    let escrow = EscrowBuilder::new()
        .buyer(buyer_pk)
        .seller(seller_pk)
        .arbitrator(arbitrator_pk)
        .build()
        .unwrap();
    Parties {
        buyer,
        seller,
        buyer_pk,
        seller_pk,
        escrow,
        buyer_address: p2pk_address(Prefix::Testnet, &buyer_pk),
        seller_address: p2pk_address(Prefix::Testnet, &seller_pk),
    }
}

fn inputs(pk: &[u8; 32], tag: u8, values: &[u64]) -> Vec<RawTransactionInput> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            RawTransactionInput::new(
                TransactionOutpoint::new(TransactionId::from_bytes([tag; 32]), i as u32),
                *value,
                p2pk_spk(pk),
            )
        })
        .collect()
}

struct Deposit {
    prepared: PreparedDepositTx,
    taker_inputs: Vec<RawTransactionInput>,
    multisig_amount: u64,
    taker_change: u64,
}

/// Buyer as maker funds `maker_input + maker_extra`, seller as taker funds
/// `fee + seller_deposit + trade_amount + taker_extra`.
fn build_deposit(
    p: &Parties,
    (maker_input, fee, seller_deposit, trade_amount): (u64, u64, u64, u64),
    maker_extra: u64,
    taker_extra: u64,
) -> Result<Deposit, EscrowError> {
    let multisig_amount = multisig_output_amount(maker_input, fee, seller_deposit, trade_amount)?;
    let maker_inputs = inputs(&p.buyer_pk, 0x0b, &[maker_input + maker_extra]);
    let taker_funding = fee + seller_deposit + trade_amount + taker_extra;
    // split the taker side over two outputs
    let taker_inputs = inputs(
        &p.seller_pk,
        0x05,
        &[taker_funding / 2, taker_funding - taker_funding / 2],
    );
    let prepared = maker_creates_and_signs_deposit_tx(
        &MakerDepositParams {
            maker_is_buyer: true,
            contract_hash: [0xc7; 32],
            maker_input_amount: maker_input,
            multisig_amount,
            maker_inputs: &maker_inputs,
            maker_change_address: &p.buyer_address,
            taker_inputs: &taker_inputs,
            taker_change_value: taker_extra,
            taker_change_address: Some(&p.seller_address),
            escrow: &p.escrow,
        },
        &p.buyer,
    )?;
    Ok(Deposit {
        prepared,
        taker_inputs,
        multisig_amount,
        taker_change: taker_extra,
    })
}

fn expectations<'a>(p: &'a Parties, d: &'a Deposit) -> TakerDepositExpectations<'a> {
    TakerDepositExpectations {
        contract_hash: [0xc7; 32],
        multisig_amount: d.multisig_amount,
        taker_inputs: &d.taker_inputs,
        taker_change_value: d.taker_change,
        taker_change_address: Some(&p.seller_address),
        escrow: &p.escrow,
    }
}

fn signed_deposit(p: &Parties, d: &Deposit) -> Transaction {
    verify_maker_deposit_tx(&d.prepared, &expectations(p, d)).unwrap();
    taker_signs_deposit_tx(&d.prepared, &d.taker_inputs, &p.seller).unwrap()
}

fn payout_params<'a>(
    p: &'a Parties,
    deposit_tx: &'a Transaction,
    buyer_deposit: u64,
    trade_amount: u64,
    seller_deposit: u64,
    fee: u64,
) -> PayoutParams<'a> {
    PayoutParams {
        deposit_tx,
        escrow: &p.escrow,
        amounts: PayoutAmounts::cooperative(buyer_deposit, trade_amount, seller_deposit).unwrap(),
        tx_fee: fee,
        buyer_payout_address: &p.buyer_address,
        seller_payout_address: &p.seller_address,
    }
}

/// Run one input of `tx` through the script engine.
fn verify_script(
    tx: &Transaction,
    entries: &[UtxoEntry],
    input_index: usize,
) -> Result<(), String> {
    let sig_cache = Cache::new(10_000);
    let reused_values = SigHashReusedValuesUnsync::new();
    let ctx = EngineCtx::new(&sig_cache).with_reused(&reused_values);
    let populated = PopulatedTransaction::new(tx, entries.to_vec());
    let mut vm = TxScriptEngine::from_transaction_input(
        &populated,
        &populated.tx.inputs[input_index],
        input_index,
        &entries[input_index],
        ctx,
        Default::default(),
    );
    vm.execute().map_err(|e| format!("{:?}", e))
}

// ---------------------------------------------------------------------------
// Deposit balance
// ---------------------------------------------------------------------------

mod deposit_balance {
    use super::*;

    const CASES: &[((u64, u64, u64, u64), u64, u64)] = &[
        ((5_000, 1_000, 5_000, 50_000), 0, 0),
        ((5_000, 1_000, 5_000, 50_000), 2_500, 7_000),
        ((100_000, 1_000, 5_000, 50_000), 1, 0),
        ((1, 0, 1, 1), 0, 3),
        ((1_500_000_000, 20_000, 1_500_000_000, 10_000_000_000), 123, 456),
    ];

    #[test]
    fn multisig_output_holds_the_locked_sum() {
        let p = parties();
        for &(amounts, maker_extra, taker_extra) in CASES {
            let d = build_deposit(&p, amounts, maker_extra, taker_extra).unwrap();
            let (maker_input, fee, seller_deposit, trade_amount) = amounts;
            let ms = d.prepared.multisig_output().unwrap();
            assert_eq!(ms.value, maker_input + fee + seller_deposit + trade_amount);
            assert_eq!(ms.script_public_key, p.escrow.p2sh_spk);
        }
    }

    #[test]
    fn inputs_equal_outputs() {
        let p = parties();
        for &(amounts, maker_extra, taker_extra) in CASES {
            let d = build_deposit(&p, amounts, maker_extra, taker_extra).unwrap();
            let total_in =
                sum_values(d.prepared.spent_inputs.iter().map(|i| i.value), "in").unwrap();
            let total_out =
                sum_values(d.prepared.transaction.outputs.iter().map(|o| o.value), "out").unwrap();
            assert_eq!(total_in, total_out, "case {amounts:?}");
        }
    }

    #[test]
    fn change_outputs_only_when_positive() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        assert_eq!(d.prepared.transaction.outputs.len(), 1);

        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 2_500, 7_000).unwrap();
        let outputs = &d.prepared.transaction.outputs;
        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[1].value, 2_500);
        assert_eq!(outputs[2].value, 7_000);
    }

    #[test]
    fn buyer_inputs_come_first_and_payload_is_the_contract_hash() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let tx = &d.prepared.transaction;
        assert_eq!(tx.inputs.len(), 3);
        assert_eq!(d.prepared.spent_inputs[0].script_public_key, p2pk_spk(&p.buyer_pk));
        assert_eq!(tx.payload, vec![0xc7; 32]);
    }

    #[test]
    fn underfunded_maker_is_rejected() {
        let p = parties();
        let maker_inputs = inputs(&p.buyer_pk, 0x0b, &[4_999]);
        let taker_inputs = inputs(&p.seller_pk, 0x05, &[56_000]);
        let err = maker_creates_and_signs_deposit_tx(
            &MakerDepositParams {
                maker_is_buyer: true,
                contract_hash: [0; 32],
                maker_input_amount: 5_000,
                multisig_amount: 61_000,
                maker_inputs: &maker_inputs,
                maker_change_address: &p.buyer_address,
                taker_inputs: &taker_inputs,
                taker_change_value: 0,
                taker_change_address: None,
                escrow: &p.escrow,
            },
            &p.buyer,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InsufficientFunds {
                needed: 5_000,
                available: 4_999
            }
        ));
    }

    #[test]
    fn short_taker_contribution_is_rejected() {
        let p = parties();
        let maker_inputs = inputs(&p.buyer_pk, 0x0b, &[5_000]);
        let taker_inputs = inputs(&p.seller_pk, 0x05, &[55_999]);
        let err = maker_creates_and_signs_deposit_tx(
            &MakerDepositParams {
                maker_is_buyer: true,
                contract_hash: [0; 32],
                maker_input_amount: 5_000,
                multisig_amount: 61_000,
                maker_inputs: &maker_inputs,
                maker_change_address: &p.buyer_address,
                taker_inputs: &taker_inputs,
                taker_change_value: 0,
                taker_change_address: None,
                escrow: &p.escrow,
            },
            &p.buyer,
        )
        .unwrap_err();
        assert!(matches!(err, EscrowError::AmountMismatch { .. }));
    }

    #[test]
    fn maker_input_not_spendable_by_maker_key_is_rejected() {
        let p = parties();
        let foreign = inputs(&p.seller_pk, 0x0b, &[5_000]);
        let taker_inputs = inputs(&p.seller_pk, 0x05, &[56_000]);
        let err = maker_creates_and_signs_deposit_tx(
            &MakerDepositParams {
                maker_is_buyer: true,
                contract_hash: [0; 32],
                maker_input_amount: 5_000,
                multisig_amount: 61_000,
                maker_inputs: &foreign,
                maker_change_address: &p.buyer_address,
                taker_inputs: &taker_inputs,
                taker_change_value: 0,
                taker_change_address: None,
                escrow: &p.escrow,
            },
            &p.buyer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not spendable by the maker key"));
    }
}

// ---------------------------------------------------------------------------
// Taker verification and signing
// ---------------------------------------------------------------------------

mod taker_side {
    use super::*;

    #[test]
    fn honest_deposit_verifies_and_signs() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 2_500, 7_000).unwrap();
        let tx = signed_deposit(&p, &d);
        verify_deposit_signatures(&tx, &d.prepared.spent_inputs).unwrap();
        // signature scripts are outside the id
        assert_eq!(tx.id(), d.prepared.transaction.id());
    }

    #[test]
    fn maker_only_signature_is_incomplete() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let err =
            verify_deposit_signatures(&d.prepared.transaction, &d.prepared.spent_inputs)
                .unwrap_err();
        assert!(err.to_string().contains("not signed"));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let p = parties();
        let mut d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        d.prepared.transaction.payload = vec![0u8; 32];
        let err = verify_maker_deposit_tx(&d.prepared, &expectations(&p, &d)).unwrap_err();
        assert!(err.to_string().contains("contract hash"));
    }

    #[test]
    fn tampered_multisig_amount_is_rejected() {
        let p = parties();
        let mut d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        d.prepared.transaction.outputs[0].value -= 1_000;
        let err = verify_maker_deposit_tx(&d.prepared, &expectations(&p, &d)).unwrap_err();
        assert!(matches!(
            err,
            EscrowError::AmountMismatch {
                expected: 61_000,
                actual: 60_000,
                ..
            }
        ));
    }

    #[test]
    fn dropped_taker_change_is_rejected() {
        let p = parties();
        let mut d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 2_500, 7_000).unwrap();
        d.prepared.transaction.outputs.pop();
        let err = verify_maker_deposit_tx(&d.prepared, &expectations(&p, &d)).unwrap_err();
        assert!(err.to_string().contains("taker change"));
    }

    #[test]
    fn missing_taker_input_is_rejected() {
        let p = parties();
        let mut d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        d.taker_inputs.extend(inputs(&p.seller_pk, 0x99, &[1]));
        let err = verify_maker_deposit_tx(&d.prepared, &expectations(&p, &d)).unwrap_err();
        assert!(err.to_string().contains("missing from deposit tx"));
    }

    #[test]
    fn taker_cannot_sign_with_a_foreign_key() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let (stranger, _) = generate_keypair();
        let err = taker_signs_deposit_tx(&d.prepared, &d.taker_inputs, &stranger).unwrap_err();
        assert!(err.to_string().contains("not spendable by the taker key"));
    }
}

// ---------------------------------------------------------------------------
// Payout
// ---------------------------------------------------------------------------

mod payout {
    use super::*;

    #[test]
    fn cooperative_payout_releases_the_escrow() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);

        let buyer_sig = buyer_signs_payout_tx(&params, &p.buyer).unwrap();
        assert_eq!(buyer_sig.len(), 65);
        let payout = seller_signs_and_finalizes_payout_tx(&params, &buyer_sig, &p.seller).unwrap();

        assert_eq!(payout.inputs.len(), 1);
        assert_eq!(payout.inputs[0].previous_outpoint.transaction_id, deposit_tx.id());
        assert_eq!(payout.inputs[0].previous_outpoint.index, MULTISIG_OUTPUT_INDEX);
        assert_eq!(payout.outputs[0].value, 55_000);
        assert_eq!(payout.outputs[1].value, 5_000);
        let released = payout.outputs[0].value + payout.outputs[1].value;
        assert_eq!(released + 1_000, d.multisig_amount);

        verify_payout_tx(&payout, &params).unwrap();
    }

    #[test]
    fn forged_buyer_signature_is_rejected() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);

        let (tx, entry) = build_payout_tx(&params).unwrap();
        let (stranger, _) = generate_keypair();
        let forged = schnorr_sign_input(&tx, &[entry], &stranger, 0).unwrap();
        assert!(seller_signs_and_finalizes_payout_tx(&params, &forged, &p.seller).is_err());
    }

    #[test]
    fn buyer_signature_over_other_outputs_is_rejected() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let buyer_view = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);
        let buyer_sig = buyer_signs_payout_tx(&buyer_view, &p.buyer).unwrap();

        let elsewhere = p2pk_address(Prefix::Testnet, &generate_keypair().1);
        let seller_view = PayoutParams {
            buyer_payout_address: &elsewhere,
            ..payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000)
        };
        assert!(seller_signs_and_finalizes_payout_tx(&seller_view, &buyer_sig, &p.seller).is_err());
    }

    #[test]
    fn signers_must_hold_their_escrow_keys() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);
        assert!(matches!(
            buyer_signs_payout_tx(&params, &p.seller),
            Err(EscrowError::Signing(_))
        ));
    }

    #[test]
    fn payout_that_does_not_match_the_deposit_is_rejected() {
        // 100k maker input locks 156k; the cooperative split only covers 61k
        let p = parties();
        let d = build_deposit(&p, (100_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);
        let err = build_payout_tx(&params).unwrap_err();
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
    fn published_payout_with_other_outputs_fails_verification() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let agreed = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);
        let swapped = PayoutParams {
            buyer_payout_address: &p.seller_address,
            seller_payout_address: &p.buyer_address,
            ..payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000)
        };
        let (other, _) = build_payout_tx(&swapped).unwrap();
        assert!(verify_payout_tx(&other, &agreed).is_err());
    }
}

// ---------------------------------------------------------------------------
// Script engine
// ---------------------------------------------------------------------------

mod script_engine {
    use super::*;

    #[test]
    fn every_deposit_input_executes() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 2_500, 7_000).unwrap();
        let tx = signed_deposit(&p, &d);
        let entries = d.prepared.utxo_entries();
        assert_eq!(tx.inputs.len(), 3);
        for i in 0..tx.inputs.len() {
            verify_script(&tx, &entries, i).unwrap_or_else(|e| panic!("input {i}: {e}"));
        }
    }

    #[test]
    fn taker_input_fails_before_the_taker_signs() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let tx = &d.prepared.transaction;
        let entries = d.prepared.utxo_entries();
        verify_script(tx, &entries, 0).unwrap();
        assert!(verify_script(tx, &entries, 1).is_err());
        assert!(verify_script(tx, &entries, 2).is_err());
    }

    #[test]
    fn finalized_payout_spends_the_escrow() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);
        let buyer_sig = buyer_signs_payout_tx(&params, &p.buyer).unwrap();
        let payout = seller_signs_and_finalizes_payout_tx(&params, &buyer_sig, &p.seller).unwrap();

        let ms = &deposit_tx.outputs[MULTISIG_OUTPUT_INDEX as usize];
        let entry = UtxoEntry::new(ms.value, ms.script_public_key.clone(), 0, false, None);
        verify_script(&payout, &[entry], 0).unwrap();
    }

    #[test]
    fn payout_signatures_out_of_key_order_fail() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);

        let (mut tx, entry) = build_payout_tx(&params).unwrap();
        let entries = [entry];
        let buyer_sig = schnorr_sign_input(&tx, &entries, &p.buyer, 0).unwrap();
        let seller_sig = schnorr_sign_input(&tx, &entries, &p.seller, 0).unwrap();

        tx.inputs[0].signature_script = build_multisig_sig_script(
            &[seller_sig.clone(), buyer_sig.clone()],
            &p.escrow.redeem_script,
        )
        .unwrap();
        assert!(verify_script(&tx, &entries, 0).is_err());

        tx.inputs[0].signature_script =
            build_multisig_sig_script(&[buyer_sig, seller_sig], &p.escrow.redeem_script).unwrap();
        verify_script(&tx, &entries, 0).unwrap();
    }

    #[test]
    fn payout_redeemed_with_a_foreign_script_fails() {
        let p = parties();
        let d = build_deposit(&p, (5_000, 1_000, 5_000, 50_000), 0, 0).unwrap();
        let deposit_tx = signed_deposit(&p, &d);
        let params = payout_params(&p, &deposit_tx, 5_000, 50_000, 5_000, 1_000);

        let (mut tx, entry) = build_payout_tx(&params).unwrap();
        let entries = [entry];
        let buyer_sig = schnorr_sign_input(&tx, &entries, &p.buyer, 0).unwrap();
        let seller_sig = schnorr_sign_input(&tx, &entries, &p.seller, 0).unwrap();

        // same buyer and seller, another arbitrator: the script hash no longer matches
        let other = EscrowBuilder::new()
            .buyer(p.buyer_pk)
            .seller(p.seller_pk)
            .arbitrator(generate_keypair().1)
            .build()
            .unwrap();
        tx.inputs[0].signature_script =
            build_multisig_sig_script(&[buyer_sig, seller_sig], &other.redeem_script).unwrap();
        assert!(verify_script(&tx, &entries, 0).is_err());
    }
}
