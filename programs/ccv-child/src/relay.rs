//! Packet handling and the end-of-block unbonding scan of the child keeper.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{
    config::period_end, get_channel_status, host, packet, set_channel_status, CcvError, Status,
    ValidatorSetChangePacketData,
};
use ibc_proto::ibc::core::channel::v1::Packet;
use tendermint_proto::v0_38::abci::ValidatorUpdate;

use crate::keeper::Keeper;

impl Keeper {
    /// Handles a validator-set change packet from the parent.
    ///
    /// The first packet establishes its destination channel as the parent
    /// channel. The changes replace any changes that were not yet handed to the
    /// consensus engine, and the packet is queued until
    /// `block time + unbonding period`, when it is acknowledged.
    /// # Errors
    /// Returns [`CcvError::InvalidChannel`] for a packet on any channel other
    /// than the parent channel and [`CcvError::InvalidStatus`] for a channel
    /// that was invalidated
    pub fn on_recv_packet(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &Packet,
        data: &ValidatorSetChangePacketData,
    ) -> Result<(), CcvError> {
        let channel_id = packet.destination_channel.as_str();
        if get_channel_status(storage, channel_id)? == Status::Invalid {
            return Err(CcvError::InvalidStatus(format!(
                "CCV channel {channel_id} is invalid"
            )));
        }
        let unbonding_time = period_end(env.block.time, self.params.unbonding_period_secs)?;
        match self.get_parent_channel(storage)? {
            Some(parent_channel) if parent_channel != channel_id => {
                return Err(CcvError::InvalidChannel(format!(
                    "packet received on channel {channel_id}, parent channel is {parent_channel}"
                )));
            }
            Some(_) => {}
            None => {
                self.set_parent_channel(storage, channel_id);
                tracing::info!(channel_id, "parent channel established");
            }
        }

        self.set_pending_changes(storage, data);

        self.set_unbonding_time(storage, packet.sequence, unbonding_time);
        self.set_unbonding_packet(storage, packet.sequence, packet);

        set_channel_status(storage, channel_id, Status::Validating);

        tracing::info!(
            channel_id,
            sequence = packet.sequence,
            updates = data.validator_updates.len(),
            unbonding_time,
            "received validator set change packet"
        );
        Ok(())
    }

    /// Acknowledges every received packet whose unbonding period elapsed.
    ///
    /// Entries are visited in ascending sequence order and the scan stops at
    /// the first packet that is not mature yet.
    /// # Errors
    /// Returns [`CcvError::ChannelNotFound`] before the parent channel is
    /// established and [`CcvError::ChannelCapabilityNotFound`] if the module
    /// does not own the parent channel
    pub fn unbond_mature_packets(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
    ) -> Result<(), CcvError> {
        let channel_id = self.get_parent_channel(storage)?.ok_or_else(|| {
            CcvError::ChannelNotFound("parent channel is not established".to_string())
        })?;

        let now = env.block.time.nanos();
        let mut mature = Vec::new();
        self.iterate_unbonding_time(storage, |sequence, unbonding_time| {
            if unbonding_time <= now {
                mature.push(sequence);
                false
            } else {
                true
            }
        })?;
        if mature.is_empty() {
            return Ok(());
        }

        let port_id = self.get_port(storage)?;
        let cap_name = host::channel_capability_path(&port_id, &channel_id);
        let chan_cap = self.scoped_keeper.get_capability(&cap_name).ok_or_else(|| {
            CcvError::ChannelCapabilityNotFound(format!(
                "could not retrieve channel capability at: {cap_name}"
            ))
        })?;

        let ack = packet::success_acknowledgement();
        for sequence in mature {
            let unbonding_packet = self.get_unbonding_packet(storage, sequence)?.ok_or_else(|| {
                CcvError::CorruptStore(format!("no packet stored for unbonding sequence {sequence}"))
            })?;
            self.channel_keeper
                .write_acknowledgement(&chan_cap, &unbonding_packet, &ack)?;
            self.delete_unbonding_time(storage, sequence);
            self.delete_unbonding_packet(storage, sequence);
            tracing::info!(%channel_id, sequence, "acknowledged matured packet");
        }
        Ok(())
    }

    /// End-of-block hook: acknowledges matured packets once the parent channel
    /// exists, then drains the pending changes for the consensus engine.
    /// # Errors
    /// Returns the error of [`Keeper::unbond_mature_packets`] or a decoding
    /// error for corrupt pending changes
    pub fn end_block(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
    ) -> Result<Vec<ValidatorUpdate>, CcvError> {
        if self.get_parent_channel(storage)?.is_some() {
            self.unbond_mature_packets(storage, env)?;
        }

        let Some(changes) = self.get_pending_changes(storage)? else {
            return Ok(Vec::new());
        };
        self.delete_pending_changes(storage);
        tracing::debug!(
            updates = changes.validator_updates.len(),
            "flushing validator updates"
        );
        Ok(changes.validator_updates)
    }
}
