//! Tendermint light client states as seen by the CCV keepers.

use cosmwasm_std::Timestamp;
use ibc_proto::{
    google::protobuf::Any,
    ibc::{
        core::commitment::v1::MerkleRoot,
        lightclients::tendermint::v1::{
            ClientState as TmClientState, ConsensusState as TmConsensusState,
        },
    },
};
use prost::Message;
use tendermint_proto::google::protobuf::{Duration, Timestamp as ProtoTimestamp};

use crate::{host, CcvError};

/// Type URL of a packed tendermint client state
pub const TENDERMINT_CLIENT_STATE_TYPE_URL: &str = "/ibc.lightclients.tendermint.v1.ClientState";
/// Type URL of a packed tendermint consensus state
pub const TENDERMINT_CONSENSUS_STATE_TYPE_URL: &str =
    "/ibc.lightclients.tendermint.v1.ConsensusState";
/// Commitment root placed in consensus states created before the first header is known
pub const SENTINEL_ROOT: &[u8] = b"sentinel_root";

/// Unpacks a tendermint client state.
/// # Errors
/// Returns [`CcvError::InvalidClientType`] for any other client type and a
/// decoding error for a malformed value
pub fn unpack_client_state(any: &Any) -> Result<TmClientState, CcvError> {
    if any.type_url != TENDERMINT_CLIENT_STATE_TYPE_URL {
        return Err(CcvError::InvalidClientType {
            expected: TENDERMINT_CLIENT_STATE_TYPE_URL.to_string(),
            actual: any.type_url.clone(),
        });
    }
    Ok(TmClientState::decode(any.value.as_slice())?)
}

/// Unpacks a tendermint consensus state.
/// # Errors
/// Returns an error for any other consensus state type or a malformed value
pub fn unpack_consensus_state(any: &Any) -> Result<TmConsensusState, CcvError> {
    if any.type_url != TENDERMINT_CONSENSUS_STATE_TYPE_URL {
        return Err(CcvError::InvalidClientType {
            expected: TENDERMINT_CONSENSUS_STATE_TYPE_URL.to_string(),
            actual: any.type_url.clone(),
        });
    }
    Ok(TmConsensusState::decode(any.value.as_slice())?)
}

/// Packs a tendermint client state
#[must_use]
pub fn pack_client_state(client_state: &TmClientState) -> Any {
    Any {
        type_url: TENDERMINT_CLIENT_STATE_TYPE_URL.to_string(),
        value: client_state.encode_to_vec(),
    }
}

/// Packs a tendermint consensus state
#[must_use]
pub fn pack_consensus_state(consensus_state: &TmConsensusState) -> Any {
    Any {
        type_url: TENDERMINT_CONSENSUS_STATE_TYPE_URL.to_string(),
        value: consensus_state.encode_to_vec(),
    }
}

/// The consensus state a freshly provisioned client starts from: sentinel
/// root, the current block time and the validator set expected to sign next.
#[must_use]
pub fn sentinel_consensus_state(
    block_time: Timestamp,
    next_validators_hash: Vec<u8>,
) -> TmConsensusState {
    TmConsensusState {
        timestamp: Some(to_proto_timestamp(block_time)),
        root: Some(MerkleRoot {
            hash: SENTINEL_ROOT.to_vec(),
        }),
        next_validators_hash,
    }
}

/// Converts a block time into a protobuf timestamp
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
pub fn to_proto_timestamp(time: Timestamp) -> ProtoTimestamp {
    ProtoTimestamp {
        seconds: time.seconds() as i64,
        nanos: time.subsec_nanos() as i32,
    }
}

const fn is_positive(duration: Option<&Duration>) -> bool {
    match duration {
        Some(d) => d.seconds > 0 || (d.seconds == 0 && d.nanos > 0),
        None => false,
    }
}

/// Checks the fields a CCV genesis or proposal relies on.
/// # Errors
/// Returns [`CcvError::InvalidClientState`] for a blank chain ID, a zero
/// latest height or non-positive trusting and unbonding periods
pub fn validate_client_state(client_state: &TmClientState) -> Result<(), CcvError> {
    host::validate_chain_id(&client_state.chain_id).map_err(CcvError::InvalidClientState)?;
    if client_state
        .latest_height
        .as_ref()
        .map_or(true, |h| h.revision_number == 0 && h.revision_height == 0)
    {
        return Err(CcvError::InvalidClientState(
            "latest height cannot be zero".to_string(),
        ));
    }
    if !is_positive(client_state.trusting_period.as_ref()) {
        return Err(CcvError::InvalidClientState(
            "trusting period must be positive".to_string(),
        ));
    }
    if !is_positive(client_state.unbonding_period.as_ref()) {
        return Err(CcvError::InvalidClientState(
            "unbonding period must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Checks that a consensus state is usable as the trusted starting point.
/// # Errors
/// Returns [`CcvError::InvalidClientState`] for a zero timestamp, an empty
/// root or an empty next validators hash
pub fn validate_consensus_state(consensus_state: &TmConsensusState) -> Result<(), CcvError> {
    if consensus_state
        .timestamp
        .as_ref()
        .map_or(true, |t| t.seconds <= 0 && t.nanos <= 0)
    {
        return Err(CcvError::InvalidClientState(
            "consensus state timestamp cannot be zero".to_string(),
        ));
    }
    if consensus_state
        .root
        .as_ref()
        .map_or(true, |r| r.hash.is_empty())
    {
        return Err(CcvError::InvalidClientState(
            "consensus state root cannot be empty".to_string(),
        ));
    }
    if consensus_state.next_validators_hash.is_empty() {
        return Err(CcvError::InvalidClientState(
            "next validators hash cannot be empty".to_string(),
        ));
    }
    Ok(())
}
