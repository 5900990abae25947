//! Channel handshake and packet callbacks of the child module.
//!
//! The child initiates the CCV channel, so only `INIT` and `ACK` are accepted
//! during the handshake. Packets are acknowledged asynchronously once their
//! unbonding period has elapsed.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{
    expected_keepers::Capability, host, packet, set_channel_status, CcvError, Status,
    ValidatorSetChangePacketData, PARENT_PORT_ID, VERSION,
};
use ibc_proto::ibc::core::channel::v1::{Acknowledgement, Counterparty, Order, Packet};

use crate::keeper::Keeper;

/// The child CCV module as seen by the transport
#[allow(clippy::module_name_repetitions)]
pub struct ChildModule {
    keeper: Keeper,
}

impl ChildModule {
    /// Wraps a keeper
    #[must_use]
    pub const fn new(keeper: Keeper) -> Self {
        Self { keeper }
    }

    /// The wrapped keeper
    #[must_use]
    pub const fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    /// Starts the handshake towards the parent chain.
    /// # Errors
    /// Returns an error if a parent channel is already established, the
    /// channel parameters are not the CCV ones or the counterparty is not the
    /// parent chain recorded at genesis
    #[allow(clippy::too_many_arguments)]
    pub fn on_chan_open_init(
        &self,
        storage: &mut dyn Storage,
        order: Order,
        _connection_hops: &[String],
        port_id: &str,
        channel_id: &str,
        channel_cap: &Capability,
        counterparty: &Counterparty,
        version: &str,
    ) -> Result<(), CcvError> {
        if let Some(parent_channel) = self.keeper.get_parent_channel(storage)? {
            return Err(CcvError::DuplicateChannel(format!(
                "parent channel {parent_channel} already established"
            )));
        }
        if order != Order::Ordered {
            return Err(CcvError::InvalidChannelOrdering {
                expected: Order::Ordered.as_str_name().to_string(),
                actual: order.as_str_name().to_string(),
            });
        }
        let bound_port = self.keeper.get_port(storage)?;
        if port_id != bound_port {
            return Err(CcvError::InvalidPort {
                expected: bound_port,
                actual: port_id.to_string(),
            });
        }
        if version != VERSION {
            return Err(CcvError::InvalidVersion {
                expected: VERSION.to_string(),
                actual: version.to_string(),
            });
        }
        if counterparty.port_id != PARENT_PORT_ID {
            return Err(CcvError::InvalidPort {
                expected: PARENT_PORT_ID.to_string(),
                actual: counterparty.port_id.clone(),
            });
        }

        self.keeper
            .claim_capability(channel_cap, &host::channel_capability_path(port_id, channel_id))?;
        set_channel_status(storage, channel_id, Status::Initializing);

        self.keeper.verify_parent_chain(storage, channel_id)?;
        tracing::info!(port_id, channel_id, "CCV channel handshake initialized");
        Ok(())
    }

    /// The parent never initiates the handshake.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    #[allow(clippy::too_many_arguments)]
    pub fn on_chan_open_try(
        &self,
        _storage: &mut dyn Storage,
        _order: Order,
        _connection_hops: &[String],
        _port_id: &str,
        _channel_id: &str,
        _channel_cap: &Capability,
        _counterparty: &Counterparty,
        _version: &str,
        _counterparty_version: &str,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "channel handshake must be initiated by child chain".to_string(),
        ))
    }

    /// Completes the child side of the handshake.
    /// # Errors
    /// Returns an error if a parent channel is already established or the
    /// parent answered with another version
    pub fn on_chan_open_ack(
        &self,
        storage: &mut dyn Storage,
        _port_id: &str,
        channel_id: &str,
        counterparty_version: &str,
    ) -> Result<(), CcvError> {
        if let Some(parent_channel) = self.keeper.get_parent_channel(storage)? {
            return Err(CcvError::DuplicateChannel(format!(
                "parent channel {parent_channel} already established"
            )));
        }
        if counterparty_version != VERSION {
            return Err(CcvError::InvalidVersion {
                expected: VERSION.to_string(),
                actual: counterparty_version.to_string(),
            });
        }
        tracing::info!(channel_id, "CCV channel handshake acknowledged");
        Ok(())
    }

    /// The child never confirms a handshake.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    pub fn on_chan_open_confirm(
        &self,
        _storage: &mut dyn Storage,
        _port_id: &str,
        _channel_id: &str,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "channel handshake must be initiated by child chain".to_string(),
        ))
    }

    /// Lets users close stray channels on the child port, never the parent
    /// channel.
    /// # Errors
    /// Returns [`CcvError::InvalidChannelFlow`] before the parent channel is
    /// established or for the parent channel itself
    pub fn on_chan_close_init(
        &self,
        storage: &mut dyn Storage,
        _port_id: &str,
        channel_id: &str,
    ) -> Result<(), CcvError> {
        match self.keeper.get_parent_channel(storage)? {
            Some(parent_channel) if parent_channel != channel_id => Ok(()),
            _ => Err(CcvError::InvalidChannelFlow(
                "parent channel cannot be closed, and no channel can close before it is established"
                    .to_string(),
            )),
        }
    }

    /// Nothing to clean up.
    /// # Errors
    /// Never fails
    pub fn on_chan_close_confirm(
        &self,
        _storage: &mut dyn Storage,
        _port_id: &str,
        _channel_id: &str,
    ) -> Result<(), CcvError> {
        Ok(())
    }

    /// Handles a packet from the parent.
    ///
    /// Returns `None` when the packet was accepted; its acknowledgement is
    /// written at maturity. A rejected packet yields an error
    /// acknowledgement right away.
    pub fn on_recv_packet(
        &self,
        storage: &mut dyn Storage,
        env: &Env,
        packet: &Packet,
    ) -> Option<Acknowledgement> {
        let result = ValidatorSetChangePacketData::from_bytes(&packet.data)
            .and_then(|data| data.validate_basic().map(|()| data))
            .and_then(|data| self.keeper.on_recv_packet(storage, env, packet, &data));

        match result {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(
                    channel_id = %packet.destination_channel,
                    sequence = packet.sequence,
                    error = %err,
                    "rejected validator set change packet"
                );
                Some(packet::error_acknowledgement(&err))
            }
        }
    }

    /// The child never sends packets.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    pub fn on_acknowledgement_packet(
        &self,
        _storage: &mut dyn Storage,
        _packet: &Packet,
        _acknowledgement: &[u8],
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "child chain does not send packets".to_string(),
        ))
    }

    /// The child never sends packets.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    pub fn on_timeout_packet(
        &self,
        _storage: &mut dyn Storage,
        _packet: &Packet,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "child chain does not send packets".to_string(),
        ))
    }
}
