//! Channel handshake and packet callbacks of the parent module.
//!
//! The child initiates the CCV channel, so the parent answers `TRY` and
//! `CONFIRM` only. The parent sends packets and never receives them.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{
    client, expected_keepers::Capability, host, packet, set_channel_status, CcvError, Status,
    ValidatorSetChangePacketData, CHILD_PORT_ID, VERSION,
};
use ibc_proto::ibc::core::channel::v1::{
    acknowledgement::Response, Acknowledgement, Counterparty, Order, Packet,
};

use crate::keeper::Keeper;

/// The parent CCV module as seen by the transport
#[allow(clippy::module_name_repetitions)]
pub struct ParentModule {
    keeper: Keeper,
}

impl ParentModule {
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

    /// The parent never initiates the handshake.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    #[allow(clippy::too_many_arguments)]
    pub fn on_chan_open_init(
        &self,
        _storage: &mut dyn Storage,
        _order: Order,
        _connection_hops: &[String],
        _port_id: &str,
        _channel_id: &str,
        _channel_cap: &Capability,
        _counterparty: &Counterparty,
        _version: &str,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "channel handshake must be initiated by child chain".to_string(),
        ))
    }

    /// Answers the handshake of a child chain this parent provisioned.
    ///
    /// The connection must be built on the client created for the child chain
    /// and the chain must not have a CCV channel yet.
    /// # Errors
    /// Returns an error if the channel parameters are not the CCV ones, the
    /// connection is not the single hop to a provisioned child chain or that
    /// chain already has a channel
    #[allow(clippy::too_many_arguments)]
    pub fn on_chan_open_try(
        &self,
        storage: &mut dyn Storage,
        order: Order,
        connection_hops: &[String],
        port_id: &str,
        channel_id: &str,
        channel_cap: &Capability,
        counterparty: &Counterparty,
        version: &str,
        counterparty_version: &str,
    ) -> Result<(), CcvError> {
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
        for v in [version, counterparty_version] {
            if v != VERSION {
                return Err(CcvError::InvalidVersion {
                    expected: VERSION.to_string(),
                    actual: v.to_string(),
                });
            }
        }
        if counterparty.port_id != CHILD_PORT_ID {
            return Err(CcvError::InvalidPort {
                expected: CHILD_PORT_ID.to_string(),
                actual: counterparty.port_id.clone(),
            });
        }

        let [connection_id] = connection_hops else {
            return Err(CcvError::TooManyConnectionHops(format!(
                "must have direct connection to child chain, got {} hops",
                connection_hops.len()
            )));
        };
        let connection = self
            .keeper
            .connection_keeper
            .get_connection(connection_id)
            .ok_or_else(|| {
                CcvError::ConnectionNotFound(format!(
                    "connection not found for connection ID: {connection_id}"
                ))
            })?;
        let client_state = self
            .keeper
            .client_keeper
            .get_client_state(&connection.client_id)
            .ok_or_else(|| {
                CcvError::ClientNotFound(format!(
                    "client not found for client ID: {}",
                    connection.client_id
                ))
            })?;
        let chain_id = client::unpack_client_state(&client_state)?.chain_id;

        match self.keeper.get_child_client(storage, &chain_id)? {
            Some(client_id) if client_id == connection.client_id => {}
            Some(client_id) => {
                return Err(CcvError::InvalidChildChain(format!(
                    "channel must be built on top of client {client_id} of child chain {chain_id}, got {}",
                    connection.client_id
                )));
            }
            None => {
                return Err(CcvError::InvalidChildChain(format!(
                    "child chain {chain_id} was not provisioned by this parent"
                )));
            }
        }
        if let Some(existing) = self.keeper.get_chain_to_channel(storage, &chain_id)? {
            return Err(CcvError::DuplicateChannel(format!(
                "child chain {chain_id} already has CCV channel {existing}"
            )));
        }
        if let Some(pending) = self
            .keeper
            .get_handshaking_channel(storage, &chain_id, channel_id)?
        {
            return Err(CcvError::DuplicateChannel(format!(
                "child chain {chain_id} is already opening CCV channel {pending}"
            )));
        }

        self.keeper
            .claim_capability(channel_cap, &host::channel_capability_path(port_id, channel_id))?;
        self.keeper.set_channel_to_chain(storage, channel_id, &chain_id);
        set_channel_status(storage, channel_id, Status::Initializing);

        tracing::info!(%chain_id, channel_id, "CCV channel handshake accepted");
        Ok(())
    }

    /// The parent never receives `ACK`.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    pub fn on_chan_open_ack(
        &self,
        _storage: &mut dyn Storage,
        _port_id: &str,
        _channel_id: &str,
        _counterparty_version: &str,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "channel handshake must be initiated by child chain".to_string(),
        ))
    }

    /// Completes the handshake and starts validating the child chain.
    /// # Errors
    /// Returns the error of [`Keeper::verify_child_chain`], or
    /// [`CcvError::DuplicateChannel`] if the chain already has a CCV channel
    pub fn on_chan_open_confirm(
        &self,
        storage: &mut dyn Storage,
        _port_id: &str,
        channel_id: &str,
    ) -> Result<(), CcvError> {
        self.keeper.verify_child_chain(storage, channel_id)?;

        let chain_id = self
            .keeper
            .get_channel_to_chain(storage, channel_id)?
            .ok_or_else(|| {
                CcvError::InvalidChildChain(format!(
                    "chain ID doesn't exist for channel ID: {channel_id}"
                ))
            })?;
        if let Some(existing) = self.keeper.get_chain_to_channel(storage, &chain_id)? {
            return Err(CcvError::DuplicateChannel(format!(
                "child chain {chain_id} already has CCV channel {existing}"
            )));
        }
        self.keeper.set_chain_to_channel(storage, &chain_id, channel_id);
        set_channel_status(storage, channel_id, Status::Validating);

        tracing::info!(%chain_id, channel_id, "CCV channel established");
        Ok(())
    }

    /// CCV channels cannot be closed by users.
    /// # Errors
    /// Always returns [`CcvError::InvalidChannelFlow`]
    pub fn on_chan_close_init(
        &self,
        _storage: &mut dyn Storage,
        _port_id: &str,
        _channel_id: &str,
    ) -> Result<(), CcvError> {
        Err(CcvError::InvalidChannelFlow(
            "CCV channel may not be closed".to_string(),
        ))
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

    /// The parent never receives packets; every packet gets an error
    /// acknowledgement.
    #[must_use]
    pub fn on_recv_packet(
        &self,
        _storage: &mut dyn Storage,
        _env: &Env,
        packet: &Packet,
    ) -> Acknowledgement {
        tracing::warn!(
            channel_id = %packet.destination_channel,
            sequence = packet.sequence,
            "parent chain received a packet"
        );
        packet::error_acknowledgement(&CcvError::InvalidChannelFlow(
            "parent chain does not receive packets".to_string(),
        ))
    }

    /// Handles the child's acknowledgement of a sent packet.
    ///
    /// A result acknowledgement releases the stake behind the packet. An error
    /// acknowledgement means the child rejected the changes, and the channel
    /// is marked `Invalid`.
    /// # Errors
    /// Returns an error if the packet data or the acknowledgement do not
    /// decode, or the error of [`Keeper::on_acknowledgement_packet`]
    pub fn on_acknowledgement_packet(
        &self,
        storage: &mut dyn Storage,
        packet: &Packet,
        acknowledgement: &[u8],
    ) -> Result<(), CcvError> {
        let data = ValidatorSetChangePacketData::from_bytes(&packet.data)?;
        let ack = packet::decode_acknowledgement(acknowledgement)?;

        match ack.response {
            Some(Response::Result(_)) => {
                self.keeper.on_acknowledgement_packet(storage, packet, &data)
            }
            Some(Response::Error(reason)) => {
                set_channel_status(storage, &packet.source_channel, Status::Invalid);
                tracing::error!(
                    channel_id = %packet.source_channel,
                    sequence = packet.sequence,
                    %reason,
                    "child chain rejected validator set change packet, channel is now invalid"
                );
                Ok(())
            }
            None => Err(CcvError::InvalidAcknowledgement(
                "acknowledgement has no response".to_string(),
            )),
        }
    }

    /// Handles a packet that timed out.
    /// # Errors
    /// Returns the error of [`Keeper::on_timeout_packet`]
    pub fn on_timeout_packet(
        &self,
        storage: &mut dyn Storage,
        packet: &Packet,
    ) -> Result<(), CcvError> {
        self.keeper.on_timeout_packet(storage, packet)
    }
}
