//! Child genesis import and export.

use cosmwasm_std::Storage;
use ibc_ccv_types::{
    client,
    genesis::{ChildGenesisState, UnbondingSequence},
    set_channel_status, CcvError, Status,
};

use crate::keeper::Keeper;

impl Keeper {
    /// Initializes the child module from genesis.
    ///
    /// A new chain creates the parent light client and records it together
    /// with the parent chain ID. A restarting chain restores the parent
    /// channel as `Validating` and its unbonding queue verbatim.
    /// # Errors
    /// Returns an error if the genesis is invalid or the parent client cannot
    /// be created
    /// # Panics
    /// Panics if the port cannot be bound, since the chain cannot run without it
    pub fn init_genesis(
        &self,
        storage: &mut dyn Storage,
        genesis: &ChildGenesisState,
    ) -> Result<(), CcvError> {
        genesis.validate()?;

        self.set_port(storage, &genesis.port_id);
        if !self.is_bound(&genesis.port_id) {
            if let Err(err) = self.bind_port(&genesis.port_id) {
                panic!("could not claim port capability for {}: {err}", genesis.port_id);
            }
        }

        if genesis.new_chain {
            let (Some(client_state), Some(consensus_state)) = (
                genesis.parent_client_state.as_ref(),
                genesis.parent_consensus_state.as_ref(),
            ) else {
                return Err(CcvError::InvalidGenesis(
                    "new chain genesis without parent client".to_string(),
                ));
            };
            let client_id = self.client_keeper.create_client(
                client::pack_client_state(client_state),
                client::pack_consensus_state(consensus_state),
            )?;
            self.set_parent_client(storage, &client_id);
            self.set_parent_chain(storage, &client_state.chain_id);
            tracing::info!(
                %client_id,
                parent_chain_id = %client_state.chain_id,
                "created parent client from genesis"
            );
            return Ok(());
        }

        self.set_parent_chain(storage, &genesis.parent_chain_id);
        self.set_parent_channel(storage, &genesis.parent_channel_id);
        set_channel_status(storage, &genesis.parent_channel_id, Status::Validating);
        for unbonding_sequence in &genesis.unbonding_sequences {
            self.set_unbonding_time(
                storage,
                unbonding_sequence.sequence,
                unbonding_sequence.unbonding_time,
            );
            self.set_unbonding_packet(
                storage,
                unbonding_sequence.sequence,
                &unbonding_sequence.unbonding_packet,
            );
        }
        tracing::info!(
            parent_chain_id = %genesis.parent_chain_id,
            parent_channel_id = %genesis.parent_channel_id,
            unbonding_sequences = genesis.unbonding_sequences.len(),
            "restored child state from genesis"
        );
        Ok(())
    }

    /// Exports the child module state.
    ///
    /// Once the parent channel exists the export is a restart genesis,
    /// otherwise it carries the parent client and its latest consensus state.
    /// # Errors
    /// Returns an error if neither a parent channel nor a parent client is
    /// recorded, or a stored entry is malformed
    pub fn export_genesis(&self, storage: &dyn Storage) -> Result<ChildGenesisState, CcvError> {
        let port_id = self.get_port(storage)?;

        if let Some(parent_channel_id) = self.get_parent_channel(storage)? {
            let mut times = Vec::new();
            self.iterate_unbonding_time(storage, |sequence, unbonding_time| {
                times.push((sequence, unbonding_time));
                false
            })?;
            let unbonding_sequences = times
                .into_iter()
                .map(|(sequence, unbonding_time)| {
                    let unbonding_packet =
                        self.get_unbonding_packet(storage, sequence)?.ok_or_else(|| {
                            CcvError::CorruptStore(format!(
                                "no packet stored for unbonding sequence {sequence}"
                            ))
                        })?;
                    Ok(UnbondingSequence {
                        sequence,
                        unbonding_time,
                        unbonding_packet,
                    })
                })
                .collect::<Result<Vec<_>, CcvError>>()?;

            return Ok(ChildGenesisState::restart(
                port_id,
                self.get_parent_chain(storage)?.unwrap_or_default(),
                parent_channel_id,
                unbonding_sequences,
            ));
        }

        let client_id = self.get_parent_client(storage)?.ok_or_else(|| {
            CcvError::InvalidGenesis("neither parent channel nor parent client is set".to_string())
        })?;
        let client_state = self
            .client_keeper
            .get_client_state(&client_id)
            .ok_or_else(|| CcvError::ClientNotFound(format!("client not found for client ID: {client_id}")))
            .and_then(|any| client::unpack_client_state(&any))?;
        let latest_height = client_state.latest_height.clone().unwrap_or_default();
        let consensus_state = self
            .client_keeper
            .get_client_consensus_state(&client_id, &latest_height)
            .ok_or_else(|| {
                CcvError::ClientNotFound(format!(
                    "consensus state of {client_id} not found at {}-{}",
                    latest_height.revision_number, latest_height.revision_height
                ))
            })
            .and_then(|any| client::unpack_consensus_state(&any))?;

        let mut genesis = ChildGenesisState::new_chain(port_id, client_state, consensus_state);
        if let Some(parent_chain_id) = self.get_parent_chain(storage)? {
            genesis.parent_chain_id = parent_chain_id;
        }
        Ok(genesis)
    }
}
