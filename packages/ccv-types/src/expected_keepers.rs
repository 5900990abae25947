//! Interfaces of the host services the CCV keepers are wired to.
//!
//! Each service owns its own state, so every method takes `&self`. The host
//! binds concrete adapters when it assembles the keepers.

use ibc_proto::{
    google::protobuf::Any,
    ibc::core::{
        channel::v1::{Acknowledgement, Channel, Packet},
        client::v1::Height,
        connection::v1::ConnectionEnd,
    },
};
use tendermint_proto::v0_38::abci::ValidatorUpdate;

use crate::CcvError;

/// An object-capability handed out by the capability service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability {
    /// Globally unique capability index
    pub index: u64,
}

/// Channel handshake state and packet flow
pub trait ChannelKeeper: Send + Sync {
    /// Returns the channel end stored for `port_id`/`channel_id`
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<Channel>;

    /// Returns the sequence the next packet sent on the channel will carry
    fn get_next_sequence_send(&self, port_id: &str, channel_id: &str) -> Option<u64>;

    /// Sends a packet, authorized by the channel capability.
    /// # Errors
    /// Returns an error if the transport rejects the packet
    fn send_packet(&self, channel_cap: &Capability, packet: Packet) -> Result<(), CcvError>;

    /// Writes the acknowledgement of a received packet.
    /// # Errors
    /// Returns an error if the transport rejects the acknowledgement
    fn write_acknowledgement(
        &self,
        channel_cap: &Capability,
        packet: &Packet,
        ack: &Acknowledgement,
    ) -> Result<(), CcvError>;

    /// Starts closing the channel.
    /// # Errors
    /// Returns an error if the transport refuses to close the channel
    fn chan_close_init(
        &self,
        port_id: &str,
        channel_id: &str,
        channel_cap: &Capability,
    ) -> Result<(), CcvError>;
}

/// Port allocation
pub trait PortKeeper: Send + Sync {
    /// Binds the port and returns its capability
    fn bind_port(&self, port_id: &str) -> Capability;
}

/// Connection ends
pub trait ConnectionKeeper: Send + Sync {
    /// Returns the connection end stored for `connection_id`
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd>;
}

/// Light clients
pub trait ClientKeeper: Send + Sync {
    /// Creates a light client and returns its identifier.
    /// # Errors
    /// Returns an error if the client or consensus state is rejected
    fn create_client(&self, client_state: Any, consensus_state: Any) -> Result<String, CcvError>;

    /// Returns the client state of `client_id`
    fn get_client_state(&self, client_id: &str) -> Option<Any>;

    /// Returns the consensus state of `client_id` at `height`
    fn get_client_consensus_state(&self, client_id: &str, height: &Height) -> Option<Any>;
}

/// Named capability ownership scoped to the CCV module
pub trait ScopedKeeper: Send + Sync {
    /// Returns the capability owned under `name`
    fn get_capability(&self, name: &str) -> Option<Capability>;

    /// Takes ownership of `cap` under `name`.
    /// # Errors
    /// Returns an error if the module already owns a capability under `name`
    fn claim_capability(&self, cap: &Capability, name: &str) -> Result<(), CcvError>;

    /// Checks that `cap` is the capability owned under `name`
    fn authenticate_capability(&self, cap: &Capability, name: &str) -> bool;
}

/// The parent chain's staking registry
pub trait RegistryKeeper: Send + Sync {
    /// Returns and clears the validator changes accumulated for `chain_id`
    fn get_validator_set_changes(&self, chain_id: &str) -> Vec<ValidatorUpdate>;

    /// Releases the stake of the acknowledged `updates`
    fn unbond_validators(&self, chain_id: &str, updates: &[ValidatorUpdate]);

    /// Hash of the validator set that signs the next parent block, which is
    /// the set a newly provisioned child chain starts with
    fn next_validators_hash(&self) -> Vec<u8>;
}
