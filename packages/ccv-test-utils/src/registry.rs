//! A staking registry with queued validator changes.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use ibc_ccv_types::expected_keepers::RegistryKeeper;
use tendermint_proto::v0_38::abci::ValidatorUpdate;

#[derive(Default)]
struct RegistryState {
    pending: HashMap<String, Vec<ValidatorUpdate>>,
    unbonded: Vec<(String, Vec<ValidatorUpdate>)>,
}

/// Hands out queued validator changes once and records every unbonding
pub struct MockRegistry {
    state: Mutex<RegistryState>,
    next_validators_hash: Vec<u8>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            next_validators_hash: vec![0xab; 32],
        }
    }
}

impl MockRegistry {
    /// Creates a registry without pending changes
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues changes for the next `get_validator_set_changes(chain_id)`
    pub fn queue_changes(&self, chain_id: &str, updates: Vec<ValidatorUpdate>) {
        self.state()
            .pending
            .entry(chain_id.to_string())
            .or_default()
            .extend(updates);
    }

    /// Every `unbond_validators` call so far, in order
    #[must_use]
    pub fn unbonded(&self) -> Vec<(String, Vec<ValidatorUpdate>)> {
        self.state().unbonded.clone()
    }
}

impl RegistryKeeper for MockRegistry {
    fn get_validator_set_changes(&self, chain_id: &str) -> Vec<ValidatorUpdate> {
        self.state().pending.remove(chain_id).unwrap_or_default()
    }

    fn unbond_validators(&self, chain_id: &str, updates: &[ValidatorUpdate]) {
        self.state()
            .unbonded
            .push((chain_id.to_string(), updates.to_vec()));
    }

    fn next_validators_hash(&self) -> Vec<u8> {
        self.next_validators_hash.clone()
    }
}
