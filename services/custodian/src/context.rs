//! Custodian — shared state for every task
//!
//! Built once at startup and handed to each task behind an `Arc`. Owns the
//! keys, the ledger clients, the store, the derived contract programs and
//! the wake-up signals.

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use tracing::info;

use persistence::Store;
use programs::ContractSet;
use types::account::Address;

use crate::config::CustodianConfig;
use crate::error::CustodianResult;
use crate::ledger::{MainLedgerClient, SideLedgerClient};
use crate::signal::Signals;

pub struct Custodian {
    pub config: CustodianConfig,
    pub store: Arc<Store>,
    pub main: Arc<dyn MainLedgerClient>,
    pub side: Arc<dyn SideLedgerClient>,
    /// Signs main-ledger payments out of the custodian account.
    pub main_key: SigningKey,
    /// Satisfies the side-ledger signature checker on settlements.
    pub side_key: SigningKey,
    pub account: Address,
    pub contracts: ContractSet,
    pub signals: Signals,
}

impl Custodian {
    pub fn new(
        config: CustodianConfig,
        store: Arc<Store>,
        main: Arc<dyn MainLedgerClient>,
        side: Arc<dyn SideLedgerClient>,
        main_key: SigningKey,
        side_key: SigningKey,
    ) -> CustodianResult<Self> {
        config.validate()?;
        let account = Address::from_verifying_key(&main_key.verifying_key());
        let contracts = ContractSet::new(side_key.verifying_key().to_bytes())?;
        store.ensure_custodian(account.public_key())?;

        info!(
            account = %account,
            export_seed = %hex::encode(contracts.export_stage1_seed),
            "Custodian initialized"
        );

        Ok(Self {
            config,
            store,
            main,
            side,
            main_key,
            side_key,
            account,
            contracts,
            signals: Signals::default(),
        })
    }

    /// Key of this custodian's row in the store.
    pub fn seed(&self) -> &[u8] {
        self.account.public_key()
    }

    pub fn network(&self) -> &str {
        &self.config.network_passphrase
    }
}

impl std::fmt::Debug for Custodian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Custodian")
            .field("account", &self.account)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
