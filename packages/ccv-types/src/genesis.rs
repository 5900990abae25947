//! Genesis shapes of the child and parent CCV modules.

use std::collections::HashSet;

use ibc_proto::ibc::{
    core::channel::v1::Packet,
    lightclients::tendermint::v1::{
        ClientState as TmClientState, ConsensusState as TmConsensusState,
    },
};
use serde::{Deserialize, Serialize};

use crate::{client, host, packet::ValidatorSetChangePacketData, CcvError, Status};

/// One in-flight unbonding obligation of the child chain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnbondingSequence {
    /// Sequence of the received packet
    pub sequence: u64,
    /// Unix time in nanoseconds at which the packet matures
    pub unbonding_time: u64,
    /// The received packet, needed to write its acknowledgement
    pub unbonding_packet: Packet,
}

impl UnbondingSequence {
    /// Validates one unbonding entry.
    /// # Errors
    /// Returns an error if the sequence disagrees with the packet, the
    /// unbonding time is zero or the packet is malformed
    pub fn validate(&self) -> Result<(), CcvError> {
        if self.sequence != self.unbonding_packet.sequence {
            return Err(CcvError::InvalidGenesis(format!(
                "unbonding sequence {} does not match packet sequence {}",
                self.sequence, self.unbonding_packet.sequence
            )));
        }
        if self.unbonding_time == 0 {
            return Err(CcvError::InvalidGenesis(format!(
                "unbonding time of sequence {} cannot be zero",
                self.sequence
            )));
        }
        host::validate_packet(&self.unbonding_packet)
            .map_err(|e| CcvError::InvalidGenesis(e.to_string()))
    }
}

/// Genesis of the child module.
///
/// A new chain carries the parent's client and consensus state and nothing
/// else; the channel is opened by the handshake later. A restarting chain
/// carries the established channel and its unbonding queue instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildGenesisState {
    /// The port the child module binds
    pub port_id: String,
    /// Chain ID of the parent chain
    #[serde(default)]
    pub parent_chain_id: String,
    /// The established parent channel, empty for a new chain
    #[serde(default)]
    pub parent_channel_id: String,
    /// Whether this genesis starts a new chain or restarts a running one
    pub new_chain: bool,
    /// Client state of the parent light client to create, new chain only
    #[serde(default)]
    pub parent_client_state: Option<TmClientState>,
    /// Initial trusted consensus state of the parent, new chain only
    #[serde(default)]
    pub parent_consensus_state: Option<TmConsensusState>,
    /// The unbonding queue, restart only
    #[serde(default)]
    pub unbonding_sequences: Vec<UnbondingSequence>,
}

impl ChildGenesisState {
    /// Genesis of a chain that has not yet connected to its parent
    #[must_use]
    pub fn new_chain(
        port_id: impl Into<String>,
        parent_client_state: TmClientState,
        parent_consensus_state: TmConsensusState,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            parent_chain_id: parent_client_state.chain_id.clone(),
            parent_channel_id: String::new(),
            new_chain: true,
            parent_client_state: Some(parent_client_state),
            parent_consensus_state: Some(parent_consensus_state),
            unbonding_sequences: Vec::new(),
        }
    }

    /// Genesis of a chain restarting with an established parent channel
    #[must_use]
    pub fn restart(
        port_id: impl Into<String>,
        parent_chain_id: impl Into<String>,
        parent_channel_id: impl Into<String>,
        unbonding_sequences: Vec<UnbondingSequence>,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            parent_chain_id: parent_chain_id.into(),
            parent_channel_id: parent_channel_id.into(),
            new_chain: false,
            parent_client_state: None,
            parent_consensus_state: None,
            unbonding_sequences,
        }
    }

    /// Validates the genesis and rejects any mix of the two shapes.
    /// # Errors
    /// Returns [`CcvError::InvalidGenesis`] describing the first violation
    pub fn validate(&self) -> Result<(), CcvError> {
        host::validate_port_id(&self.port_id).map_err(CcvError::InvalidGenesis)?;

        if self.new_chain {
            let client_state = self.parent_client_state.as_ref().ok_or_else(|| {
                CcvError::InvalidGenesis("parent client state cannot be empty for a new chain".to_string())
            })?;
            client::validate_client_state(client_state)
                .map_err(|e| CcvError::InvalidGenesis(e.to_string()))?;

            let consensus_state = self.parent_consensus_state.as_ref().ok_or_else(|| {
                CcvError::InvalidGenesis(
                    "parent consensus state cannot be empty for a new chain".to_string(),
                )
            })?;
            client::validate_consensus_state(consensus_state)
                .map_err(|e| CcvError::InvalidGenesis(e.to_string()))?;

            if !self.parent_channel_id.is_empty() {
                return Err(CcvError::InvalidGenesis(
                    "parent channel must be empty for a new chain".to_string(),
                ));
            }
            if !self.unbonding_sequences.is_empty() {
                return Err(CcvError::InvalidGenesis(
                    "unbonding sequences must be empty for a new chain".to_string(),
                ));
            }
            if !self.parent_chain_id.is_empty() && self.parent_chain_id != client_state.chain_id {
                return Err(CcvError::InvalidGenesis(format!(
                    "parent chain {} does not match client state chain {}",
                    self.parent_chain_id, client_state.chain_id
                )));
            }
            return Ok(());
        }

        if self.parent_client_state.is_some() || self.parent_consensus_state.is_some() {
            return Err(CcvError::InvalidGenesis(
                "parent client and consensus state must be empty for a restarting chain".to_string(),
            ));
        }
        host::validate_channel_id(&self.parent_channel_id).map_err(CcvError::InvalidGenesis)?;
        host::validate_chain_id(&self.parent_chain_id).map_err(CcvError::InvalidGenesis)?;

        let mut seen = HashSet::new();
        for unbonding_sequence in &self.unbonding_sequences {
            unbonding_sequence.validate()?;
            if !seen.insert(unbonding_sequence.sequence) {
                return Err(CcvError::InvalidGenesis(format!(
                    "duplicate unbonding sequence {}",
                    unbonding_sequence.sequence
                )));
            }
        }
        Ok(())
    }
}

/// A child chain tracked by the parent and the state of its channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildState {
    /// Chain ID of the child
    pub chain_id: String,
    /// The CCV channel to the child
    pub channel_id: String,
    /// Status of that channel
    pub status: Status,
}

/// A light client the parent created for a child chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildClient {
    /// Chain ID of the child
    pub chain_id: String,
    /// Identifier of the light client tracking the child
    pub client_id: String,
}

/// A child light client scheduled for creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingClient {
    /// Chain ID of the child
    pub chain_id: String,
    /// Unix time in nanoseconds after which the client is created
    pub spawn_time: u64,
    /// Client state to create the client from
    pub client_state: TmClientState,
}

/// Validator changes sent to a child and not yet acknowledged
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondingChanges {
    /// Chain ID of the child
    pub chain_id: String,
    /// Sequence of the packet that carried the changes
    pub sequence: u64,
    /// Encoded [`ValidatorSetChangePacketData`] that was sent
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

/// Genesis of the parent module
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentGenesisState {
    /// The port the parent module binds
    pub port_id: String,
    /// Every child chain with an opened CCV channel
    #[serde(default)]
    pub child_states: Vec<ChildState>,
    /// Light clients created for child chains
    #[serde(default)]
    pub child_clients: Vec<ChildClient>,
    /// Child clients still waiting for their spawn time
    #[serde(default)]
    pub pending_clients: Vec<PendingClient>,
    /// Changes awaiting acknowledgement
    #[serde(default)]
    pub unbonding_changes: Vec<UnbondingChanges>,
}

impl ParentGenesisState {
    /// Creates a parent genesis tracking `child_states`
    #[must_use]
    pub fn new(port_id: impl Into<String>, child_states: Vec<ChildState>) -> Self {
        Self {
            port_id: port_id.into(),
            child_states,
            child_clients: Vec::new(),
            pending_clients: Vec::new(),
            unbonding_changes: Vec::new(),
        }
    }

    /// Validates identifiers and rejects duplicate chains or channels.
    /// # Errors
    /// Returns [`CcvError::InvalidGenesis`] describing the first violation
    pub fn validate(&self) -> Result<(), CcvError> {
        host::validate_port_id(&self.port_id).map_err(CcvError::InvalidGenesis)?;

        let mut chains = HashSet::new();
        let mut channels = HashSet::new();
        for child in &self.child_states {
            host::validate_chain_id(&child.chain_id).map_err(CcvError::InvalidGenesis)?;
            host::validate_channel_id(&child.channel_id).map_err(CcvError::InvalidGenesis)?;
            if !chains.insert(child.chain_id.as_str()) {
                return Err(CcvError::InvalidGenesis(format!(
                    "duplicate child chain {}",
                    child.chain_id
                )));
            }
            if !channels.insert(child.channel_id.as_str()) {
                return Err(CcvError::InvalidGenesis(format!(
                    "duplicate child channel {}",
                    child.channel_id
                )));
            }
        }

        let mut clients = HashSet::new();
        for child_client in &self.child_clients {
            host::validate_chain_id(&child_client.chain_id).map_err(CcvError::InvalidGenesis)?;
            host::validate_client_id(&child_client.client_id).map_err(CcvError::InvalidGenesis)?;
            if !clients.insert(child_client.chain_id.as_str()) {
                return Err(CcvError::InvalidGenesis(format!(
                    "duplicate client for child chain {}",
                    child_client.chain_id
                )));
            }
        }

        for pending in &self.pending_clients {
            host::validate_chain_id(&pending.chain_id).map_err(CcvError::InvalidGenesis)?;
            if pending.spawn_time == 0 {
                return Err(CcvError::InvalidGenesis(format!(
                    "spawn time of pending client {} cannot be zero",
                    pending.chain_id
                )));
            }
            if pending.client_state.chain_id != pending.chain_id {
                return Err(CcvError::InvalidGenesis(format!(
                    "pending client {} carries a client state for chain {}",
                    pending.chain_id, pending.client_state.chain_id
                )));
            }
        }

        for changes in &self.unbonding_changes {
            host::validate_chain_id(&changes.chain_id).map_err(CcvError::InvalidGenesis)?;
            if changes.sequence == 0 {
                return Err(CcvError::InvalidGenesis(format!(
                    "unbonding changes of {} have a zero sequence",
                    changes.chain_id
                )));
            }
            ValidatorSetChangePacketData::from_bytes(&changes.data)
                .and_then(|data| data.validate_basic())
                .map_err(|e| CcvError::InvalidGenesis(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ibc_proto::ibc::core::{client::v1::Height, commitment::v1::MerkleRoot};
    use rstest::rstest;
    use tendermint_proto::google::protobuf::{Duration, Timestamp};
    use tendermint_proto::v0_38::{
        abci::ValidatorUpdate,
        crypto::{public_key::Sum, PublicKey},
    };

    use super::*;

    fn client_state() -> TmClientState {
        TmClientState {
            chain_id: "parent-1".to_string(),
            trusting_period: Some(Duration {
                seconds: 1_209_600,
                nanos: 0,
            }),
            unbonding_period: Some(Duration {
                seconds: 1_814_400,
                nanos: 0,
            }),
            latest_height: Some(Height {
                revision_number: 0,
                revision_height: 5,
            }),
            ..Default::default()
        }
    }

    fn consensus_state() -> TmConsensusState {
        TmConsensusState {
            timestamp: Some(Timestamp {
                seconds: 1_700_000_000,
                nanos: 0,
            }),
            root: Some(MerkleRoot {
                hash: b"apphash".to_vec(),
            }),
            next_validators_hash: vec![1; 32],
        }
    }

    fn packet(sequence: u64) -> Packet {
        Packet {
            sequence,
            source_port: "parent".to_string(),
            source_channel: "channel-0".to_string(),
            destination_port: "child".to_string(),
            destination_channel: "channel-1".to_string(),
            data: vec![1],
            timeout_timestamp: 10,
            ..Default::default()
        }
    }

    fn unbonding(sequence: u64, unbonding_time: u64, packet_sequence: u64) -> UnbondingSequence {
        UnbondingSequence {
            sequence,
            unbonding_time,
            unbonding_packet: packet(packet_sequence),
        }
    }

    #[test]
    fn new_chain_genesis() {
        let valid = ChildGenesisState::new_chain("child", client_state(), consensus_state());
        assert!(valid.validate().is_ok());

        let mut no_client = valid.clone();
        no_client.parent_client_state = None;
        assert!(no_client.validate().is_err());

        let mut bad_client = valid.clone();
        bad_client.parent_client_state = Some(TmClientState {
            chain_id: "badClientState".to_string(),
            ..Default::default()
        });
        bad_client.parent_chain_id = String::new();
        assert!(bad_client.validate().is_err());

        let mut no_consensus = valid.clone();
        no_consensus.parent_consensus_state = None;
        assert!(no_consensus.validate().is_err());

        let mut timestamp_only = valid.clone();
        timestamp_only.parent_consensus_state = Some(TmConsensusState {
            timestamp: consensus_state().timestamp,
            ..Default::default()
        });
        assert!(timestamp_only.validate().is_err());

        let mut with_channel = valid.clone();
        with_channel.parent_channel_id = "channel-0".to_string();
        assert!(with_channel.validate().is_err());

        let mut with_sequences = valid.clone();
        with_sequences.unbonding_sequences = vec![unbonding(1, 100, 1)];
        assert!(with_sequences.validate().is_err());

        let mut mismatched_chain = valid;
        mismatched_chain.parent_chain_id = "other".to_string();
        assert!(mismatched_chain.validate().is_err());
    }

    #[rstest]
    #[case::no_sequences(vec![], true)]
    #[case::valid_sequences(vec![unbonding(1, 100, 1), unbonding(3, 200, 3)], true)]
    #[case::sequence_mismatch(vec![unbonding(1, 100, 2)], false)]
    #[case::zero_time(vec![unbonding(1, 0, 1)], false)]
    #[case::zero_packet_sequence(vec![unbonding(0, 100, 0)], false)]
    #[case::duplicate(vec![unbonding(1, 100, 1), unbonding(1, 200, 1)], false)]
    fn restart_genesis(#[case] sequences: Vec<UnbondingSequence>, #[case] valid: bool) {
        let gs = ChildGenesisState::restart("child", "parent-1", "channel-0", sequences);
        assert_eq!(gs.validate().is_ok(), valid);
    }

    #[test]
    fn restart_genesis_rejects_new_chain_fields() {
        let blank_channel = ChildGenesisState::restart("child", "parent-1", "", vec![]);
        assert!(blank_channel.validate().is_err());

        let mut with_client = ChildGenesisState::restart("child", "parent-1", "channel-0", vec![]);
        with_client.parent_client_state = Some(client_state());
        assert!(with_client.validate().is_err());

        let mut with_consensus = ChildGenesisState::restart("child", "parent-1", "channel-0", vec![]);
        with_consensus.parent_consensus_state = Some(consensus_state());
        assert!(with_consensus.validate().is_err());
    }

    fn child(chain_id: &str, channel_id: &str, status: Status) -> ChildState {
        ChildState {
            chain_id: chain_id.to_string(),
            channel_id: channel_id.to_string(),
            status,
        }
    }

    #[rstest]
    #[case::initializing(vec![child("chainid-1", "channelid", Status::Initializing)], true)]
    #[case::validating(vec![child("chainid-1", "channelid", Status::Validating)], true)]
    #[case::multiple(vec![
        child("chainid-1", "channelid", Status::Validating),
        child("chainid-2", "channelid2", Status::Initializing),
        child("chainid-3", "channelid3", Status::Uninitialized),
        child("chainid-4", "channelid4", Status::Invalid),
    ], true)]
    #[case::invalid_chain_id(vec![child("invalidid{}", "channelid", Status::Validating)], false)]
    #[case::invalid_channel_id(vec![child("chainid", "invalidchannel{}", Status::Validating)], false)]
    #[case::duplicate_chain(vec![
        child("chainid-1", "channelid", Status::Validating),
        child("chainid-1", "channelid2", Status::Validating),
    ], false)]
    #[case::duplicate_channel(vec![
        child("chainid-1", "channelid", Status::Validating),
        child("chainid-2", "channelid", Status::Validating),
    ], false)]
    fn parent_genesis(#[case] child_states: Vec<ChildState>, #[case] valid: bool) {
        let gs = ParentGenesisState::new("parent", child_states);
        assert_eq!(gs.validate().is_ok(), valid);
    }

    #[test]
    fn parent_genesis_unbonding_changes() {
        let update = ValidatorUpdate {
            pub_key: Some(PublicKey {
                sum: Some(Sum::Ed25519(vec![3; 32])),
            }),
            power: 30,
        };
        let mut gs = ParentGenesisState::new("parent", vec![]);
        gs.unbonding_changes = vec![UnbondingChanges {
            chain_id: "child-1".to_string(),
            sequence: 1,
            data: ValidatorSetChangePacketData::new(vec![update]).get_bytes(),
        }];
        assert!(gs.validate().is_ok());

        gs.unbonding_changes[0].data = ValidatorSetChangePacketData::default().get_bytes();
        assert!(gs.validate().is_err());
    }

    #[test]
    fn parent_genesis_pending_clients() {
        let mut gs = ParentGenesisState::new("parent", vec![]);
        gs.pending_clients = vec![PendingClient {
            chain_id: "parent-1".to_string(),
            spawn_time: 1,
            client_state: client_state(),
        }];
        assert!(gs.validate().is_ok());

        gs.pending_clients[0].spawn_time = 0;
        assert!(gs.validate().is_err());

        gs.pending_clients[0].spawn_time = 1;
        gs.pending_clients[0].chain_id = "child-2".to_string();
        assert!(gs.validate().is_err());
    }

    #[test]
    fn genesis_json_round_trips() {
        let gs = ChildGenesisState::restart(
            "child",
            "parent-1",
            "channel-0",
            vec![unbonding(1, 100, 1)],
        );
        let json = serde_json::to_string(&gs).unwrap();
        assert_eq!(serde_json::from_str::<ChildGenesisState>(&json).unwrap(), gs);
    }
}
