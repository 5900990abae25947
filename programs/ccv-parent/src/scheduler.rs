//! Provisioning of child chain light clients, immediately or at spawn time.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{client, keys, proposal::CreateChildChainProposal, store, CcvError};
use ibc_proto::ibc::lightclients::tendermint::v1::ClientState as TmClientState;
use prost::Message;

use crate::keeper::Keeper;

impl Keeper {
    /// Provisions the child chain of an accepted proposal.
    ///
    /// The client is created right away when the block time is past the spawn
    /// time, otherwise it is scheduled under `(spawn_time, chain_id)`.
    /// # Errors
    /// Returns [`CcvError::InvalidProposal`] if the client state is missing or
    /// not a tendermint client state, [`CcvError::InvalidChildChain`] if the
    /// chain already has a client or a scheduled one, or the error of
    /// [`Keeper::create_child_client`]
    pub fn create_child_chain_proposal(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        proposal: &CreateChildChainProposal,
    ) -> Result<(), CcvError> {
        let client_state = proposal
            .client_state
            .as_ref()
            .ok_or_else(|| CcvError::InvalidProposal("client state cannot be nil".to_string()))
            .and_then(client::unpack_client_state)?;

        let chain_id = proposal.chain_id.as_str();
        if let Some(client_id) = self.get_child_client(storage, chain_id)? {
            return Err(CcvError::InvalidChildChain(format!(
                "child chain {chain_id} already has client {client_id}"
            )));
        }
        if let Some(spawn_time) = self.get_pending_spawn_time(storage, chain_id)? {
            return Err(CcvError::InvalidChildChain(format!(
                "child chain {chain_id} is already scheduled to spawn at {spawn_time}"
            )));
        }

        if env.block.time > proposal.spawn_time {
            self.create_child_client(storage, env, &proposal.chain_id, client_state)?;
            return Ok(());
        }

        self.set_pending_client(storage, proposal.spawn_time, &proposal.chain_id, &client_state);
        tracing::info!(
            chain_id = %proposal.chain_id,
            spawn_time = proposal.spawn_time.nanos(),
            "scheduled child client"
        );
        Ok(())
    }

    /// Creates every pending client whose spawn time has passed.
    ///
    /// Entries are visited earliest spawn time first and the scan stops at the
    /// first one that is not due. A due entry is removed even when its client
    /// cannot be created.
    /// # Errors
    /// Returns an error if a stored key is malformed
    pub fn iterate_pending_clients(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
    ) -> Result<(), CcvError> {
        let mut due = Vec::new();
        for (key, value) in store::range_prefix(storage, &keys::pending_client_prefix()) {
            let (spawn_time, chain_id) = keys::parse_pending_client_key(&key)?;
            if env.block.time <= spawn_time {
                break;
            }
            due.push((spawn_time, chain_id, value));
        }

        for (spawn_time, chain_id, value) in due {
            self.delete_pending_client(storage, spawn_time, &chain_id);
            let created = TmClientState::decode(value.as_slice())
                .map_err(CcvError::from)
                .and_then(|client_state| {
                    self.create_child_client(storage, env, &chain_id, client_state)
                });
            if let Err(err) = created {
                tracing::error!(
                    %chain_id,
                    spawn_time = spawn_time.nanos(),
                    error = %err,
                    "failed to create scheduled child client, dropping it"
                );
            }
        }
        Ok(())
    }

    /// Creates the light client of `chain_id` and records it.
    ///
    /// The initial consensus state carries a sentinel root, the current block
    /// time and the registry's next validators hash.
    /// # Errors
    /// Returns [`CcvError::InvalidClientState`] if the client state tracks
    /// another chain, [`CcvError::InvalidChildChain`] if the chain already has
    /// a client, or the client service's error
    pub fn create_child_client(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
        client_state: TmClientState,
    ) -> Result<String, CcvError> {
        if client_state.chain_id != chain_id {
            return Err(CcvError::InvalidClientState(format!(
                "client state chain id {} does not match child chain id {chain_id}",
                client_state.chain_id
            )));
        }
        if let Some(client_id) = self.get_child_client(storage, chain_id)? {
            return Err(CcvError::InvalidChildChain(format!(
                "child chain {chain_id} already has client {client_id}"
            )));
        }

        let consensus_state = client::sentinel_consensus_state(
            env.block.time,
            self.registry_keeper.next_validators_hash(),
        );
        let client_id = self.client_keeper.create_client(
            client::pack_client_state(&client_state),
            client::pack_consensus_state(&consensus_state),
        )?;
        self.set_child_client(storage, chain_id, &client_id);

        tracing::info!(chain_id, %client_id, "created child client");
        Ok(client_id)
    }
}
