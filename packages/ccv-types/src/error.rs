//! Defines the [`CcvError`] type.

use thiserror::Error;

/// Errors returned by the cross-chain validation keepers and their collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub enum CcvError {
    /// The channel is not in the handshake state the operation requires
    #[error("invalid channel status: {0}")]
    InvalidStatus(String),

    /// No channel end is stored for the port and channel
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    /// No connection end is stored for the connection identifier
    #[error("connection not found: {0}")]
    ConnectionNotFound(String),

    /// No light client is stored for the client identifier
    #[error("client not found: {0}")]
    ClientNotFound(String),

    /// The channel is routed over more or fewer than one connection
    #[error("too many connection hops: {0}")]
    TooManyConnectionHops(String),

    /// The light client is not a tendermint client
    #[error("invalid client type: expected {expected}, got {actual}")]
    InvalidClientType {
        /// The client type URL required by CCV
        expected: String,
        /// The client type URL that was found
        actual: String,
    },

    /// The counterparty of a child channel is not the expected parent chain
    #[error("invalid parent chain: {0}")]
    InvalidParentChain(String),

    /// The counterparty of a parent channel is not the expected child chain
    #[error("invalid child chain: {0}")]
    InvalidChildChain(String),

    /// The channel is built on a client other than the genesis parent client
    #[error("invalid parent client: {0}")]
    InvalidParentClient(String),

    /// The packet payload is malformed or carries no validator updates
    #[error("invalid packet data: {0}")]
    InvalidPacketData(String),

    /// The module does not own the capability of the channel
    #[error("channel capability not found: {0}")]
    ChannelCapabilityNotFound(String),

    /// The transport has no send sequence for the channel
    #[error("next send sequence not found: {0}")]
    SequenceSendNotFound(String),

    /// The genesis state is malformed or mixes the new-chain and restart shapes
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    /// The channel ordering is not `ORDERED`
    #[error("invalid channel ordering: expected {expected}, got {actual}")]
    InvalidChannelOrdering {
        /// The ordering required by CCV
        expected: String,
        /// The ordering that was requested
        actual: String,
    },

    /// The port is not the one bound by this module
    #[error("invalid port: expected {expected}, got {actual}")]
    InvalidPort {
        /// The expected port identifier
        expected: String,
        /// The port identifier that was given
        actual: String,
    },

    /// The channel version is not the CCV version
    #[error("invalid version: expected {expected}, got {actual}")]
    InvalidVersion {
        /// The CCV version
        expected: String,
        /// The version that was given
        actual: String,
    },

    /// The handshake step may not be executed on this side of the protocol
    #[error("invalid channel flow: {0}")]
    InvalidChannelFlow(String),

    /// The packet arrived on a channel other than the established CCV channel
    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    /// A CCV channel already exists for the chain
    #[error("duplicate channel: {0}")]
    DuplicateChannel(String),

    /// The light client state is malformed
    #[error("invalid client state: {0}")]
    InvalidClientState(String),

    /// The governance proposal failed basic validation
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),

    /// The acknowledgement could not be interpreted
    #[error("invalid acknowledgement: {0}")]
    InvalidAcknowledgement(String),

    /// A stored value does not have the expected layout
    #[error("corrupt store entry: {0}")]
    CorruptStore(String),

    /// The configuration could not be loaded or is invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A collaborator service rejected the request
    #[error("{service} error: {reason}")]
    Collaborator {
        /// The collaborator that failed
        service: &'static str,
        /// The failure reported by the collaborator
        reason: String,
    },

    /// Prost decoding error
    #[error("prost decoding error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// Prost encoding error
    #[error("prost encoding error: {0}")]
    Encode(#[from] prost::EncodeError),
}
