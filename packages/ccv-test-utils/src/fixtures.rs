//! Fixtures shared by the keeper tests.

use cosmwasm_std::Timestamp;
use ibc_ccv_types::{client, ValidatorSetChangePacketData, CHILD_PORT_ID, PARENT_PORT_ID, VERSION};
use ibc_proto::ibc::{
    core::{
        channel::v1::{Channel, Counterparty, Order, Packet, State},
        client::v1::Height,
        commitment::v1::MerkleRoot,
        connection::v1::ConnectionEnd,
    },
    lightclients::tendermint::v1::{
        ClientState as TmClientState, ConsensusState as TmConsensusState,
    },
};
use sha2::{Digest, Sha256};
use tendermint_proto::{
    google::protobuf::Duration,
    v0_38::{
        abci::ValidatorUpdate,
        crypto::{public_key::Sum, PublicKey},
    },
};

/// Two weeks
pub const TRUSTING_PERIOD_SECS: i64 = 14 * 24 * 60 * 60;
/// Three weeks
pub const UNBONDING_PERIOD_SECS: i64 = 21 * 24 * 60 * 60;

/// A validator update whose ed25519 key is derived from `seed`
#[must_use]
pub fn validator_update(seed: &str, power: i64) -> ValidatorUpdate {
    ValidatorUpdate {
        pub_key: Some(PublicKey {
            sum: Some(Sum::Ed25519(Sha256::digest(seed.as_bytes()).to_vec())),
        }),
        power,
    }
}

/// A tendermint client state for `chain_id` at height 1-10
#[must_use]
pub fn tm_client_state(chain_id: &str) -> TmClientState {
    TmClientState {
        chain_id: chain_id.to_string(),
        trusting_period: Some(Duration {
            seconds: TRUSTING_PERIOD_SECS,
            nanos: 0,
        }),
        unbonding_period: Some(Duration {
            seconds: UNBONDING_PERIOD_SECS,
            nanos: 0,
        }),
        latest_height: Some(Height {
            revision_number: 1,
            revision_height: 10,
        }),
        ..Default::default()
    }
}

/// A tendermint consensus state at `time`
#[must_use]
pub fn tm_consensus_state(time: Timestamp) -> TmConsensusState {
    TmConsensusState {
        timestamp: Some(client::to_proto_timestamp(time)),
        root: Some(MerkleRoot {
            hash: Sha256::digest(b"app_hash").to_vec(),
        }),
        next_validators_hash: Sha256::digest(b"validators").to_vec(),
    }
}

/// An ordered CCV channel end routed over `connection_hops`
#[must_use]
pub fn ccv_channel(
    state: State,
    counterparty_port: &str,
    counterparty_channel: &str,
    connection_hops: &[&str],
) -> Channel {
    Channel {
        state: state.into(),
        ordering: Order::Ordered.into(),
        counterparty: Some(Counterparty {
            port_id: counterparty_port.to_string(),
            channel_id: counterparty_channel.to_string(),
        }),
        connection_hops: connection_hops.iter().map(ToString::to_string).collect(),
        version: VERSION.to_string(),
        ..Default::default()
    }
}

/// A connection end built on `client_id`
#[must_use]
pub fn connection_end(client_id: &str) -> ConnectionEnd {
    ConnectionEnd {
        client_id: client_id.to_string(),
        ..Default::default()
    }
}

/// A packet carrying `data` from the parent port to the child port
#[must_use]
pub fn ccv_packet(
    sequence: u64,
    source_channel: &str,
    destination_channel: &str,
    data: &ValidatorSetChangePacketData,
) -> Packet {
    Packet {
        sequence,
        source_port: PARENT_PORT_ID.to_string(),
        source_channel: source_channel.to_string(),
        destination_port: CHILD_PORT_ID.to_string(),
        destination_channel: destination_channel.to_string(),
        data: data.get_bytes(),
        timeout_timestamp: u64::MAX,
        ..Default::default()
    }
}
