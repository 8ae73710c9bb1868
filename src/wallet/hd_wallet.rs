use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use kaspa_addresses::Address;
use kaspa_bip32::{DerivationPath, ExtendedPrivateKey, SecretKey};
use kaspa_consensus_core::tx::TransactionOutpoint;
use kaspa_trade_sdk::{RawTransactionInput, p2pk_address, x_only_pubkey};
use kaspa_txscript::pay_to_address_script;
use secp256k1::Keypair;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{AddressContext, AddressEntry, WalletError, WalletService};
use crate::network::Network;

/// BIP44 coin type used by Kaspa wallets.
const KASPA_COIN_TYPE: u32 = 111111;

#[derive(Default)]
struct WalletState {
    entries: Vec<AddressEntry>,
    next_index: u32,
    utxos: HashMap<String, Vec<RawTransactionInput>>,
    /// Indices of released multisig entries; their funds left with the payout.
    reusable: HashSet<u32>,
}

/// In-memory HD wallet: keys are derived on demand from the master key at
/// `m/44'/111111'/{account}'/0/{index}`, so a key is found again from the
/// entry's index alone.
pub struct HdWallet {
    master: ExtendedPrivateKey<SecretKey>,
    network: Network,
    account: u32,
    state: Mutex<WalletState>,
}

impl HdWallet {
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self, WalletError> {
        let master = ExtendedPrivateKey::<SecretKey>::new(seed)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        Ok(Self::with_master(master, network))
    }

    fn with_master(master: ExtendedPrivateKey<SecretKey>, network: Network) -> Self {
        Self {
            master,
            network,
            account: 0,
            state: Mutex::new(WalletState::default()),
        }
    }

    fn derive_keypair(&self, index: u32) -> Result<Keypair, WalletError> {
        let path_str = format!("m/44'/{KASPA_COIN_TYPE}'/{}'/0/{index}", self.account);
        let path = path_str
            .parse::<DerivationPath>()
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        let key = self
            .master
            .clone()
            .derive_path(&path)
            .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
        Ok(Keypair::from_secret_key(secp256k1::SECP256K1, key.private_key()))
    }

    fn derive_entry(
        &self,
        state: &mut WalletState,
        offer_id: Option<&str>,
        context: AddressContext,
    ) -> Result<AddressEntry, WalletError> {
        let index = state.next_index;
        let keypair = self.derive_keypair(index)?;
        let pubkey = x_only_pubkey(&keypair);
        let entry = AddressEntry {
            offer_id: offer_id.map(str::to_string),
            context,
            address: p2pk_address(self.network.prefix(), &pubkey),
            pubkey,
            index,
            coin_locked_in_multisig: 0,
        };
        state.next_index += 1;
        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// Register a spendable output at `address` (wallet sync is external).
    pub async fn add_utxo(&self, address: &Address, outpoint: TransactionOutpoint, value: u64) {
        let input = RawTransactionInput::new(outpoint, value, pay_to_address_script(address));
        let mut state = self.state.lock().await;
        state
            .utxos
            .entry(address.to_string())
            .or_default()
            .push(input);
    }

    /// Every entry derived so far, bound or released.
    pub async fn address_entries(&self) -> Vec<AddressEntry> {
        self.state.lock().await.entries.clone()
    }
}

#[async_trait]
impl WalletService for HdWallet {
    async fn address_entry(&self, offer_id: &str, context: AddressContext) -> Option<AddressEntry> {
        let state = self.state.lock().await;
        state
            .entries
            .iter()
            .find(|e| e.is_trade_entry(offer_id, context))
            .cloned()
    }

    async fn get_or_create_address_entry(
        &self,
        offer_id: &str,
        context: AddressContext,
    ) -> Result<AddressEntry, WalletError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .entries
            .iter()
            .find(|e| e.is_trade_entry(offer_id, context))
        {
            return Ok(existing.clone());
        }

        let reusable = state.entries.iter().position(|e| {
            e.context == AddressContext::Available
                && e.offer_id.is_none()
                && state.reusable.contains(&e.index)
                && !state.utxos.contains_key(&e.address_string())
        });
        if let Some(pos) = reusable {
            let index = state.entries[pos].index;
            state.reusable.remove(&index);
            let entry = &mut state.entries[pos];
            entry.offer_id = Some(offer_id.to_string());
            entry.context = context;
            debug!(offer_id, %context, address = %entry.address, "reusing available address entry");
            return Ok(entry.clone());
        }

        let entry = self.derive_entry(&mut state, Some(offer_id), context)?;
        debug!(offer_id, %context, address = %entry.address, "created address entry");
        Ok(entry)
    }

    async fn fresh_address_entry(&self) -> Result<AddressEntry, WalletError> {
        let mut state = self.state.lock().await;
        self.derive_entry(&mut state, None, AddressContext::Available)
    }

    async fn set_coin_locked_in_multisig(
        &self,
        offer_id: &str,
        amount: u64,
    ) -> Result<(), WalletError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.is_trade_entry(offer_id, AddressContext::MultiSig))
            .ok_or_else(|| WalletError::EntryNotFound {
                offer_id: offer_id.to_string(),
                context: AddressContext::MultiSig,
            })?;
        entry.coin_locked_in_multisig = amount;
        Ok(())
    }

    async fn swap_trade_entry_to_available(
        &self,
        offer_id: &str,
        context: AddressContext,
    ) -> Result<(), WalletError> {
        let mut state = self.state.lock().await;
        let released = match state
            .entries
            .iter_mut()
            .find(|e| e.is_trade_entry(offer_id, context))
        {
            Some(entry) => {
                entry.context = AddressContext::Available;
                entry.offer_id = None;
                entry.coin_locked_in_multisig = 0;
                debug!(offer_id, %context, address = %entry.address, "swapped entry to available");
                Some(entry.index)
            }
            None => {
                warn!(offer_id, %context, "no trade entry to swap to available");
                None
            }
        };
        if let (Some(index), AddressContext::MultiSig) = (released, context) {
            state.reusable.insert(index);
        }
        Ok(())
    }

    async fn multisig_keypair(
        &self,
        offer_id: &str,
        pubkey: &[u8; 32],
    ) -> Result<Keypair, WalletError> {
        let index = {
            let state = self.state.lock().await;
            state
                .entries
                .iter()
                .find(|e| {
                    e.is_trade_entry(offer_id, AddressContext::MultiSig) && e.pubkey == *pubkey
                })
                .map(|e| e.index)
                .ok_or_else(|| {
                    WalletError::KeyNotFound(format!(
                        "multisig pubkey {} of offer {offer_id}",
                        hex::encode(pubkey)
                    ))
                })?
        };
        let keypair = self.derive_keypair(index)?;
        if x_only_pubkey(&keypair) != *pubkey {
            return Err(WalletError::KeyNotFound(format!(
                "derived key at index {index} does not match {}",
                hex::encode(pubkey)
            )));
        }
        Ok(keypair)
    }

    async fn keypair_for_address(&self, address: &Address) -> Result<Keypair, WalletError> {
        let index = {
            let state = self.state.lock().await;
            state
                .entries
                .iter()
                .find(|e| e.address == *address)
                .map(|e| e.index)
                .ok_or_else(|| WalletError::KeyNotFound(address.to_string()))?
        };
        self.derive_keypair(index)
    }

    async fn funding_inputs(
        &self,
        address: &Address,
        amount: u64,
    ) -> Result<Vec<RawTransactionInput>, WalletError> {
        let state = self.state.lock().await;
        let available = state
            .utxos
            .get(&address.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut selected = Vec::new();
        let mut total: u64 = 0;
        for utxo in available {
            if total >= amount {
                break;
            }
            total = total.saturating_add(utxo.value);
            selected.push(utxo.clone());
        }
        if total < amount || selected.is_empty() {
            return Err(WalletError::InsufficientFunds {
                address: address.to_string(),
                needed: amount,
                available: total,
            });
        }
        Ok(selected)
    }
}
