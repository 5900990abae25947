//! Parent genesis import and export.

use cosmwasm_std::{Storage, Timestamp};
use ibc_ccv_types::{
    genesis::{ChildClient, ChildState, ParentGenesisState, UnbondingChanges},
    get_channel_status, set_channel_status, CcvError, Status, ValidatorSetChangePacketData,
};

use crate::keeper::Keeper;

impl Keeper {
    /// Initializes the parent module from genesis.
    ///
    /// Every channel is recorded with its status. Channels that completed the
    /// handshake (`Validating` or `Invalid`) are also mapped from their chain.
    /// # Errors
    /// Returns an error if the genesis is invalid
    /// # Panics
    /// Panics if the port cannot be bound, since the chain cannot run without it
    pub fn init_genesis(
        &self,
        storage: &mut dyn Storage,
        genesis: &ParentGenesisState,
    ) -> Result<(), CcvError> {
        genesis.validate()?;

        self.set_port(storage, &genesis.port_id);
        if !self.is_bound(&genesis.port_id) {
            if let Err(err) = self.bind_port(&genesis.port_id) {
                panic!("could not claim port capability for {}: {err}", genesis.port_id);
            }
        }

        for child in &genesis.child_states {
            self.set_channel_to_chain(storage, &child.channel_id, &child.chain_id);
            if matches!(child.status, Status::Validating | Status::Invalid) {
                self.set_chain_to_channel(storage, &child.chain_id, &child.channel_id);
            }
            set_channel_status(storage, &child.channel_id, child.status);
        }
        for child_client in &genesis.child_clients {
            self.set_child_client(storage, &child_client.chain_id, &child_client.client_id);
        }
        for pending in &genesis.pending_clients {
            self.set_pending_client(
                storage,
                Timestamp::from_nanos(pending.spawn_time),
                &pending.chain_id,
                &pending.client_state,
            );
        }
        for changes in &genesis.unbonding_changes {
            let data = ValidatorSetChangePacketData::from_bytes(&changes.data)?;
            self.set_unbonding_changes(storage, &changes.chain_id, changes.sequence, &data);
        }

        tracing::info!(
            children = genesis.child_states.len(),
            clients = genesis.child_clients.len(),
            pending_clients = genesis.pending_clients.len(),
            unbonding_changes = genesis.unbonding_changes.len(),
            "restored parent state from genesis"
        );
        Ok(())
    }

    /// Exports the parent module state, children in channel ID order.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn export_genesis(&self, storage: &dyn Storage) -> Result<ParentGenesisState, CcvError> {
        let mut channels = Vec::new();
        self.iterate_channel_to_chain(storage, |channel_id, chain_id| {
            channels.push((channel_id, chain_id));
            false
        })?;
        let child_states = channels
            .into_iter()
            .map(|(channel_id, chain_id)| {
                Ok(ChildState {
                    status: get_channel_status(storage, &channel_id)?,
                    chain_id,
                    channel_id,
                })
            })
            .collect::<Result<Vec<_>, CcvError>>()?;

        let mut child_clients = Vec::new();
        self.iterate_child_clients(storage, |chain_id, client_id| {
            child_clients.push(ChildClient {
                chain_id,
                client_id,
            });
            false
        })?;

        let mut unbonding_changes = Vec::new();
        self.iterate_unbonding_changes(storage, |chain_id, sequence, changes| {
            unbonding_changes.push(UnbondingChanges {
                chain_id,
                sequence,
                data: changes.get_bytes(),
            });
            false
        })?;

        Ok(ParentGenesisState {
            port_id: self.get_port(storage)?,
            child_states,
            child_clients,
            pending_clients: self.get_all_pending_clients(storage)?,
            unbonding_changes,
        })
    }
}
