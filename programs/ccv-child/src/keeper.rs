//! The child keeper: store accessors, port plumbing and parent authentication.

use std::sync::Arc;

use cosmwasm_std::Storage;
use ibc_ccv_types::{
    client,
    config::ChildParams,
    expected_keepers::{
        Capability, ChannelKeeper, ClientKeeper, ConnectionKeeper, PortKeeper, ScopedKeeper,
    },
    get_channel_status, host, keys, store, CcvError, Status, ValidatorSetChangePacketData,
};
use ibc_proto::ibc::core::channel::v1::Packet;
use prost::Message;

/// Keeper of the child CCV module
#[allow(clippy::module_name_repetitions)]
pub struct Keeper {
    pub(crate) params: ChildParams,
    pub(crate) channel_keeper: Arc<dyn ChannelKeeper>,
    pub(crate) port_keeper: Arc<dyn PortKeeper>,
    pub(crate) connection_keeper: Arc<dyn ConnectionKeeper>,
    pub(crate) client_keeper: Arc<dyn ClientKeeper>,
    pub(crate) scoped_keeper: Arc<dyn ScopedKeeper>,
}

impl Keeper {
    /// Creates a child keeper wired to the host services
    #[must_use]
    pub fn new(
        params: ChildParams,
        channel_keeper: Arc<dyn ChannelKeeper>,
        port_keeper: Arc<dyn PortKeeper>,
        connection_keeper: Arc<dyn ConnectionKeeper>,
        client_keeper: Arc<dyn ClientKeeper>,
        scoped_keeper: Arc<dyn ScopedKeeper>,
    ) -> Self {
        Self {
            params,
            channel_keeper,
            port_keeper,
            connection_keeper,
            client_keeper,
            scoped_keeper,
        }
    }

    /// The parameters the keeper was created with
    #[must_use]
    pub const fn params(&self) -> &ChildParams {
        &self.params
    }

    /// Starts closing a channel owned by the module.
    /// # Errors
    /// Returns [`CcvError::ChannelCapabilityNotFound`] if the module does not
    /// own the channel, or the transport's error
    pub fn chan_close_init(&self, port_id: &str, channel_id: &str) -> Result<(), CcvError> {
        let cap_name = host::channel_capability_path(port_id, channel_id);
        let chan_cap = self.scoped_keeper.get_capability(&cap_name).ok_or_else(|| {
            CcvError::ChannelCapabilityNotFound(format!(
                "could not retrieve channel capability at: {cap_name}"
            ))
        })?;
        self.channel_keeper
            .chan_close_init(port_id, channel_id, &chan_cap)
    }

    /// Whether the module already owns the port
    #[must_use]
    pub fn is_bound(&self, port_id: &str) -> bool {
        self.scoped_keeper
            .get_capability(&host::port_path(port_id))
            .is_some()
    }

    /// Binds the port and claims its capability.
    /// # Errors
    /// Returns an error if the port capability cannot be claimed
    pub fn bind_port(&self, port_id: &str) -> Result<(), CcvError> {
        let cap = self.port_keeper.bind_port(port_id);
        self.claim_capability(&cap, &host::port_path(port_id))
    }

    /// The bound port, falling back to the configured one before genesis
    /// # Errors
    /// Returns an error if the stored port is not UTF-8
    pub fn get_port(&self, storage: &dyn Storage) -> Result<String, CcvError> {
        Ok(store::get_string(storage, keys::PORT_KEY)?
            .unwrap_or_else(|| self.params.port_id.clone()))
    }

    /// Records the bound port
    pub fn set_port(&self, storage: &mut dyn Storage, port_id: &str) {
        store::set_string(storage, keys::PORT_KEY, port_id);
    }

    /// Checks that `cap` is owned under `name`
    #[must_use]
    pub fn authenticate_capability(&self, cap: &Capability, name: &str) -> bool {
        self.scoped_keeper.authenticate_capability(cap, name)
    }

    /// Takes ownership of a capability handed over by the transport.
    /// # Errors
    /// Returns the capability service's error
    pub fn claim_capability(&self, cap: &Capability, name: &str) -> Result<(), CcvError> {
        self.scoped_keeper.claim_capability(cap, name)
    }

    /// Records the chain ID of the parent chain
    pub fn set_parent_chain(&self, storage: &mut dyn Storage, chain_id: &str) {
        store::set_string(storage, keys::PARENT_CHAIN_KEY, chain_id);
    }

    /// The chain ID of the parent chain
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_parent_chain(&self, storage: &dyn Storage) -> Result<Option<String>, CcvError> {
        store::get_string(storage, keys::PARENT_CHAIN_KEY)
    }

    /// Records the parent light client created at genesis
    pub fn set_parent_client(&self, storage: &mut dyn Storage, client_id: &str) {
        store::set_string(storage, keys::PARENT_CLIENT_KEY, client_id);
    }

    /// The parent light client created at genesis
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_parent_client(&self, storage: &dyn Storage) -> Result<Option<String>, CcvError> {
        store::get_string(storage, keys::PARENT_CLIENT_KEY)
    }

    /// Records the established CCV channel to the parent
    pub fn set_parent_channel(&self, storage: &mut dyn Storage, channel_id: &str) {
        store::set_string(storage, keys::PARENT_CHANNEL_KEY, channel_id);
    }

    /// The established CCV channel to the parent
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_parent_channel(&self, storage: &dyn Storage) -> Result<Option<String>, CcvError> {
        store::get_string(storage, keys::PARENT_CHANNEL_KEY)
    }

    /// Replaces the changes waiting to be handed to the consensus engine
    pub fn set_pending_changes(
        &self,
        storage: &mut dyn Storage,
        changes: &ValidatorSetChangePacketData,
    ) {
        store::set_proto(storage, keys::PENDING_CHANGES_KEY, changes);
    }

    /// The changes waiting to be handed to the consensus engine
    /// # Errors
    /// Returns an error if the stored changes do not decode
    pub fn get_pending_changes(
        &self,
        storage: &dyn Storage,
    ) -> Result<Option<ValidatorSetChangePacketData>, CcvError> {
        store::get_proto(storage, keys::PENDING_CHANGES_KEY)
    }

    /// Drops the pending changes once handed to the consensus engine
    pub fn delete_pending_changes(&self, storage: &mut dyn Storage) {
        storage.remove(keys::PENDING_CHANGES_KEY);
    }

    /// Records when the packet with `sequence` matures, in Unix nanoseconds
    pub fn set_unbonding_time(
        &self,
        storage: &mut dyn Storage,
        sequence: u64,
        unbonding_time: u64,
    ) {
        store::set_u64(storage, &keys::unbonding_time_key(sequence), unbonding_time);
    }

    /// When the packet with `sequence` matures, in Unix nanoseconds
    /// # Errors
    /// Returns an error if the stored time is malformed
    pub fn get_unbonding_time(
        &self,
        storage: &dyn Storage,
        sequence: u64,
    ) -> Result<Option<u64>, CcvError> {
        store::get_u64(storage, &keys::unbonding_time_key(sequence))
    }

    /// Removes the unbonding time of `sequence`
    pub fn delete_unbonding_time(&self, storage: &mut dyn Storage, sequence: u64) {
        storage.remove(&keys::unbonding_time_key(sequence));
    }

    /// Walks `(sequence, unbonding_time)` in ascending sequence order until
    /// `cb` returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_unbonding_time(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(u64, u64) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, keys::UNBONDING_TIME_PREFIX) {
            let sequence = keys::parse_sequence_key(keys::UNBONDING_TIME_PREFIX, &key)?;
            let unbonding_time = keys::decode_u64(&value)?;
            if cb(sequence, unbonding_time) {
                break;
            }
        }
        Ok(())
    }

    /// Stores the packet received with `sequence`
    pub fn set_unbonding_packet(&self, storage: &mut dyn Storage, sequence: u64, packet: &Packet) {
        store::set_proto(storage, &keys::unbonding_packet_key(sequence), packet);
    }

    /// The packet received with `sequence`
    /// # Errors
    /// Returns an error if the stored packet does not decode
    pub fn get_unbonding_packet(
        &self,
        storage: &dyn Storage,
        sequence: u64,
    ) -> Result<Option<Packet>, CcvError> {
        store::get_proto(storage, &keys::unbonding_packet_key(sequence))
    }

    /// Removes the packet received with `sequence`
    pub fn delete_unbonding_packet(&self, storage: &mut dyn Storage, sequence: u64) {
        storage.remove(&keys::unbonding_packet_key(sequence));
    }

    /// Walks `(sequence, packet)` in ascending sequence order until `cb`
    /// returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_unbonding_packet(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(u64, Packet) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, keys::UNBONDING_PACKET_PREFIX) {
            let sequence = keys::parse_sequence_key(keys::UNBONDING_PACKET_PREFIX, &key)?;
            let packet = Packet::decode(value.as_slice())?;
            if cb(sequence, packet) {
                break;
            }
        }
        Ok(())
    }

    /// Verifies that the chain on the other end of a handshaking channel is
    /// the parent chain recorded at genesis.
    ///
    /// The channel must be `Initializing` and routed over a single connection
    /// whose tendermint client tracks the parent chain ID. When the parent
    /// client is recorded, the connection must be built on it.
    /// # Errors
    /// Returns the error of the first failing check
    pub fn verify_parent_chain(
        &self,
        storage: &dyn Storage,
        channel_id: &str,
    ) -> Result<(), CcvError> {
        let status = get_channel_status(storage, channel_id)?;
        if status != Status::Initializing {
            return Err(CcvError::InvalidStatus(format!(
                "CCV channel status must be in Initializing state, got {status}"
            )));
        }

        let port_id = self.get_port(storage)?;
        let channel = self
            .channel_keeper
            .get_channel(&port_id, channel_id)
            .ok_or_else(|| {
                CcvError::ChannelNotFound(format!("channel not found for channel ID: {channel_id}"))
            })?;
        let [connection_id] = channel.connection_hops.as_slice() else {
            return Err(CcvError::TooManyConnectionHops(format!(
                "must have direct connection to parent chain, got {} hops",
                channel.connection_hops.len()
            )));
        };

        let connection = self
            .connection_keeper
            .get_connection(connection_id)
            .ok_or_else(|| {
                CcvError::ConnectionNotFound(format!(
                    "connection not found for connection ID: {connection_id}"
                ))
            })?;

        if let Some(expected_client_id) = self.get_parent_client(storage)? {
            if expected_client_id != connection.client_id {
                return Err(CcvError::InvalidParentClient(format!(
                    "invalid client: {}, channel must be built on top of client: {expected_client_id}",
                    connection.client_id
                )));
            }
        }

        let client_state = self
            .client_keeper
            .get_client_state(&connection.client_id)
            .ok_or_else(|| {
                CcvError::ClientNotFound(format!(
                    "client not found for client ID: {}",
                    connection.client_id
                ))
            })?;
        let tm_client_state = client::unpack_client_state(&client_state)?;

        let parent_chain = self.get_parent_chain(storage)?.ok_or_else(|| {
            CcvError::InvalidParentChain("parent chain ID is not set".to_string())
        })?;
        if tm_client_state.chain_id != parent_chain {
            return Err(CcvError::InvalidParentChain(format!(
                "parent chain has unexpected chain id. Expected {parent_chain}, got {}",
                tm_client_state.chain_id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cosmwasm_std::testing::MockStorage;
    use ibc_ccv_test_utils::fixtures;
    use ibc_ccv_types::set_channel_status;
    use ibc_proto::ibc::core::channel::v1::State;
    use rstest::rstest;

    use super::*;
    use crate::test::helpers::{setup, TestChild, PARENT_CHAIN_ID};

    #[test]
    fn parent_identifiers() {
        let TestChild { keeper, .. } = setup();
        let mut storage = MockStorage::new();

        assert_eq!(keeper.get_parent_chain(&storage).unwrap(), None);
        assert_eq!(keeper.get_parent_channel(&storage).unwrap(), None);
        assert_eq!(keeper.get_port(&storage).unwrap(), "child");

        keeper.set_parent_chain(&mut storage, "parent-1");
        keeper.set_parent_client(&mut storage, "07-tendermint-0");
        keeper.set_parent_channel(&mut storage, "channel-0");
        keeper.set_port(&mut storage, "consumer");

        assert_eq!(
            keeper.get_parent_chain(&storage).unwrap().as_deref(),
            Some("parent-1")
        );
        assert_eq!(
            keeper.get_parent_client(&storage).unwrap().as_deref(),
            Some("07-tendermint-0")
        );
        assert_eq!(
            keeper.get_parent_channel(&storage).unwrap().as_deref(),
            Some("channel-0")
        );
        assert_eq!(keeper.get_port(&storage).unwrap(), "consumer");
    }

    #[test]
    fn pending_changes_are_overwritten() {
        let TestChild { keeper, .. } = setup();
        let mut storage = MockStorage::new();

        let first = ValidatorSetChangePacketData::new(vec![fixtures::validator_update("a", 10)]);
        let second = ValidatorSetChangePacketData::new(vec![fixtures::validator_update("b", 20)]);
        keeper.set_pending_changes(&mut storage, &first);
        keeper.set_pending_changes(&mut storage, &second);

        assert_eq!(keeper.get_pending_changes(&storage).unwrap(), Some(second));
        keeper.delete_pending_changes(&mut storage);
        assert_eq!(keeper.get_pending_changes(&storage).unwrap(), None);
    }

    #[test]
    fn unbonding_queue_iterates_in_sequence_order() {
        let TestChild { keeper, .. } = setup();
        let mut storage = MockStorage::new();

        for (sequence, time) in [(300_u64, 30_u64), (2, 20), (1, 10)] {
            keeper.set_unbonding_time(&mut storage, sequence, time);
        }

        let mut seen = Vec::new();
        keeper
            .iterate_unbonding_time(&storage, |seq, time| {
                seen.push((seq, time));
                false
            })
            .unwrap();
        assert_eq!(seen, vec![(1, 10), (2, 20), (300, 30)]);

        let mut first = Vec::new();
        keeper
            .iterate_unbonding_time(&storage, |seq, _| {
                first.push(seq);
                true
            })
            .unwrap();
        assert_eq!(first, vec![1]);

        keeper.delete_unbonding_time(&mut storage, 2);
        assert_eq!(keeper.get_unbonding_time(&storage, 2).unwrap(), None);
        assert_eq!(keeper.get_unbonding_time(&storage, 300).unwrap(), Some(30));
    }

    #[test]
    fn unbonding_packets_round_trip() {
        let TestChild { keeper, .. } = setup();
        let mut storage = MockStorage::new();
        let data = ValidatorSetChangePacketData::new(vec![fixtures::validator_update("a", 10)]);
        let packet = fixtures::ccv_packet(4, "channel-9", "channel-0", &data);

        keeper.set_unbonding_packet(&mut storage, 4, &packet);
        assert_eq!(
            keeper.get_unbonding_packet(&storage, 4).unwrap(),
            Some(packet.clone())
        );

        let mut seen = Vec::new();
        keeper
            .iterate_unbonding_packet(&storage, |seq, p| {
                seen.push((seq, p));
                false
            })
            .unwrap();
        assert_eq!(seen, vec![(4, packet)]);

        keeper.delete_unbonding_packet(&mut storage, 4);
        assert_eq!(keeper.get_unbonding_packet(&storage, 4).unwrap(), None);
    }

    #[test]
    fn verify_parent_chain_accepts_the_parent() {
        let TestChild { keeper, host, .. } = setup();
        let mut storage = MockStorage::new();
        keeper.set_parent_chain(&mut storage, PARENT_CHAIN_ID);
        host.set_channel(
            "child",
            "channel-0",
            fixtures::ccv_channel(State::Init, "parent", "", &["connection-0"]),
        );
        host.set_connection("connection-0", fixtures::connection_end("07-tendermint-0"));
        host.set_client_state(
            "07-tendermint-0",
            client::pack_client_state(&fixtures::tm_client_state(PARENT_CHAIN_ID)),
        );

        set_channel_status(&mut storage, "channel-0", Status::Initializing);
        assert!(keeper.verify_parent_chain(&storage, "channel-0").is_ok());

        keeper.set_parent_client(&mut storage, "07-tendermint-0");
        assert!(keeper.verify_parent_chain(&storage, "channel-0").is_ok());
    }

    #[rstest]
    #[case::not_initializing("uninitialized")]
    #[case::channel_not_found("missing-channel")]
    #[case::no_hops("no-hops")]
    #[case::two_hops("two-hops")]
    #[case::connection_not_found("missing-connection")]
    #[case::other_client("other-client")]
    #[case::client_not_found("missing-client")]
    #[case::not_tendermint("solomachine")]
    #[case::impostor_chain("impostor")]
    fn verify_parent_chain_rejects(#[case] scenario: &str) {
        let TestChild { keeper, host, .. } = setup();
        let mut storage = MockStorage::new();
        keeper.set_parent_chain(&mut storage, PARENT_CHAIN_ID);
        keeper.set_parent_client(&mut storage, "07-tendermint-0");

        let hops: &[&str] = match scenario {
            "no-hops" => &[],
            "two-hops" => &["connection-0", "connection-1"],
            _ => &["connection-0"],
        };
        if scenario != "missing-channel" {
            host.set_channel(
                "child",
                "channel-0",
                fixtures::ccv_channel(State::Init, "parent", "", hops),
            );
        }
        let client_id = if scenario == "other-client" {
            "07-tendermint-5"
        } else {
            "07-tendermint-0"
        };
        if scenario != "missing-connection" {
            host.set_connection("connection-0", fixtures::connection_end(client_id));
        }
        let chain_id = if scenario == "impostor" {
            "impostor-1"
        } else {
            PARENT_CHAIN_ID
        };
        let mut client_state = client::pack_client_state(&fixtures::tm_client_state(chain_id));
        if scenario == "solomachine" {
            client_state.type_url = "/ibc.lightclients.solomachine.v3.ClientState".to_string();
        }
        if scenario != "missing-client" {
            host.set_client_state(client_id, client_state);
        }
        if scenario != "uninitialized" {
            set_channel_status(&mut storage, "channel-0", Status::Initializing);
        }

        let err = keeper.verify_parent_chain(&storage, "channel-0").unwrap_err();
        let matched = match scenario {
            "uninitialized" => matches!(err, CcvError::InvalidStatus(_)),
            "missing-channel" => matches!(err, CcvError::ChannelNotFound(_)),
            "no-hops" | "two-hops" => matches!(err, CcvError::TooManyConnectionHops(_)),
            "missing-connection" => matches!(err, CcvError::ConnectionNotFound(_)),
            "other-client" => matches!(err, CcvError::InvalidParentClient(_)),
            "missing-client" => matches!(err, CcvError::ClientNotFound(_)),
            "solomachine" => matches!(err, CcvError::InvalidClientType { .. }),
            "impostor" => matches!(err, CcvError::InvalidParentChain(_)),
            _ => false,
        };
        assert!(matched, "{scenario}: unexpected error {err}");
    }

    #[test]
    fn close_init_requires_capability() {
        let TestChild { keeper, host, .. } = setup();

        assert!(matches!(
            keeper.chan_close_init("child", "channel-3"),
            Err(CcvError::ChannelCapabilityNotFound(_))
        ));

        host.grant_channel_capability("child", "channel-3");
        keeper.chan_close_init("child", "channel-3").unwrap();
        assert_eq!(
            host.closed_channels(),
            vec![("child".to_string(), "channel-3".to_string())]
        );
    }

    #[test]
    fn bind_port_claims_the_port_capability() {
        let TestChild { keeper, host, .. } = setup();
        assert!(!keeper.is_bound("child"));

        keeper.bind_port("child").unwrap();
        assert!(keeper.is_bound("child"));
        assert_eq!(host.bound_ports(), vec!["child".to_string()]);
        assert!(keeper.bind_port("child").is_err());
    }
}
