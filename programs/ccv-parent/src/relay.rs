//! Packet emission and the acknowledgement/timeout handling of the parent keeper.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{
    config::period_end, get_channel_status, set_channel_status, CcvError, Status,
    ValidatorSetChangePacketData,
};
use ibc_proto::ibc::core::channel::v1::Packet;
use tendermint_proto::v0_38::abci::ValidatorUpdate;

use crate::keeper::Keeper;

impl Keeper {
    /// Sends `validator_updates` to the child chain `chain_id`.
    ///
    /// The packet times out `time_delay` after the current block time. The
    /// updates are kept under `(chain_id, sequence)` until acknowledged.
    /// # Errors
    /// Returns [`CcvError::ChannelNotFound`] if the chain has no CCV channel,
    /// [`CcvError::SequenceSendNotFound`] if the transport has no send sequence
    /// for it, [`CcvError::InvalidPacketData`] for an empty update list, or the
    /// transport's error
    pub fn send_packet(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
        validator_updates: Vec<ValidatorUpdate>,
    ) -> Result<(), CcvError> {
        let channel_id = self.get_chain_to_channel(storage, chain_id)?.ok_or_else(|| {
            CcvError::ChannelNotFound(format!("channel not found for chain ID: {chain_id}"))
        })?;
        let port_id = self.get_port(storage)?;
        let channel = self
            .channel_keeper
            .get_channel(&port_id, &channel_id)
            .ok_or_else(|| {
                CcvError::ChannelNotFound(format!(
                    "channel not found for channel ID: {channel_id}"
                ))
            })?;
        let sequence = self
            .channel_keeper
            .get_next_sequence_send(&port_id, &channel_id)
            .ok_or_else(|| {
                CcvError::SequenceSendNotFound(format!(
                    "source port: {port_id}, source channel: {channel_id}"
                ))
            })?;

        let data = ValidatorSetChangePacketData::new(validator_updates);
        data.validate_basic()?;

        let chan_cap = self.channel_capability(&port_id, &channel_id)?;
        let counterparty = channel.counterparty.unwrap_or_default();
        let timeout_timestamp = period_end(env.block.time, self.params.time_delay_secs)?;
        let packet = Packet {
            sequence,
            source_port: port_id,
            source_channel: channel_id.clone(),
            destination_port: counterparty.port_id,
            destination_channel: counterparty.channel_id,
            data: data.get_bytes(),
            timeout_timestamp,
            ..Default::default()
        };
        self.channel_keeper.send_packet(&chan_cap, packet)?;

        self.set_unbonding_changes(storage, chain_id, sequence, &data);
        tracing::info!(
            chain_id,
            %channel_id,
            sequence,
            updates = data.validator_updates.len(),
            timeout_timestamp,
            "sent validator set change packet"
        );
        Ok(())
    }

    /// Releases the stake behind an acknowledged packet.
    ///
    /// Only the changes recorded when the packet was sent are unbonded
    /// through the registry. An acknowledgement without a record releases
    /// nothing.
    /// # Errors
    /// Returns [`CcvError::InvalidChildChain`] if the source channel is not a
    /// CCV channel, or an error for corrupt stored changes
    pub fn on_acknowledgement_packet(
        &self,
        storage: &mut dyn Storage,
        packet: &Packet,
        data: &ValidatorSetChangePacketData,
    ) -> Result<(), CcvError> {
        let chain_id = self
            .get_channel_to_chain(storage, &packet.source_channel)?
            .ok_or_else(|| {
                CcvError::InvalidChildChain(format!(
                    "chain ID doesn't exist for channel ID: {}",
                    packet.source_channel
                ))
            })?;

        let Some(changes) = self.get_unbonding_changes(storage, &chain_id, packet.sequence)? else {
            tracing::warn!(
                %chain_id,
                sequence = packet.sequence,
                "no unbonding changes recorded for acknowledged packet"
            );
            return Ok(());
        };
        if changes != *data {
            tracing::warn!(
                %chain_id,
                sequence = packet.sequence,
                "acknowledged packet data differs from the recorded changes"
            );
        }
        self.registry_keeper
            .unbond_validators(&chain_id, &changes.validator_updates);
        self.delete_unbonding_changes(storage, &chain_id, packet.sequence);

        tracing::info!(
            %chain_id,
            sequence = packet.sequence,
            updates = changes.validator_updates.len(),
            "unbonded acknowledged validator changes"
        );
        Ok(())
    }

    /// Marks the channel of a timed out packet `Invalid`.
    /// # Errors
    /// Never fails
    pub fn on_timeout_packet(
        &self,
        storage: &mut dyn Storage,
        packet: &Packet,
    ) -> Result<(), CcvError> {
        set_channel_status(storage, &packet.source_channel, Status::Invalid);
        tracing::warn!(
            channel_id = %packet.source_channel,
            sequence = packet.sequence,
            "CCV packet timed out, channel is now invalid"
        );
        Ok(())
    }

    /// Sends the registry's pending changes for `chain_id`, if any.
    ///
    /// A failed send is logged and does not affect other child chains.
    /// Returns whether the per-block iteration over child chains should stop,
    /// which it currently never does.
    pub fn end_block_callback(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        chain_id: &str,
    ) -> bool {
        let changes = self.registry_keeper.get_validator_set_changes(chain_id);
        if changes.is_empty() {
            return false;
        }
        let updates = changes.len();
        if let Err(err) = self.send_packet(storage, env, chain_id, changes) {
            tracing::error!(
                chain_id,
                updates,
                error = %err,
                "failed to send validator set change packet"
            );
        }
        false
    }

    /// End-of-block hook: streams pending changes to every child chain with a
    /// usable channel, then activates the due pending clients.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn end_block(&self, storage: &mut dyn Storage, env: &Env) -> Result<(), CcvError> {
        let mut chains = Vec::new();
        self.iterate_child_chains(storage, |chain_id, channel_id| {
            chains.push((chain_id, channel_id));
            false
        })?;

        for (chain_id, channel_id) in chains {
            if get_channel_status(storage, &channel_id)? == Status::Invalid {
                tracing::debug!(%chain_id, %channel_id, "skipping invalid CCV channel");
                continue;
            }
            if self.end_block_callback(storage, env, &chain_id) {
                break;
            }
        }

        self.iterate_pending_clients(storage, env)
    }
}
