//! The parent keeper: store accessors, port plumbing and child authentication.

use std::sync::Arc;

use cosmwasm_std::{Storage, Timestamp};
use ibc_ccv_types::{
    client,
    config::ParentParams,
    expected_keepers::{
        Capability, ChannelKeeper, ClientKeeper, ConnectionKeeper, PortKeeper, RegistryKeeper,
        ScopedKeeper,
    },
    genesis::PendingClient,
    get_channel_status, host, keys, store, CcvError, Status, ValidatorSetChangePacketData,
};
use ibc_proto::ibc::lightclients::tendermint::v1::ClientState as TmClientState;
use prost::Message;

/// Keeper of the parent CCV module
#[allow(clippy::module_name_repetitions)]
pub struct Keeper {
    pub(crate) params: ParentParams,
    pub(crate) channel_keeper: Arc<dyn ChannelKeeper>,
    pub(crate) port_keeper: Arc<dyn PortKeeper>,
    pub(crate) connection_keeper: Arc<dyn ConnectionKeeper>,
    pub(crate) client_keeper: Arc<dyn ClientKeeper>,
    pub(crate) scoped_keeper: Arc<dyn ScopedKeeper>,
    pub(crate) registry_keeper: Arc<dyn RegistryKeeper>,
}

impl Keeper {
    /// Creates a parent keeper wired to the host services and the staking registry
    #[must_use]
    pub fn new(
        params: ParentParams,
        channel_keeper: Arc<dyn ChannelKeeper>,
        port_keeper: Arc<dyn PortKeeper>,
        connection_keeper: Arc<dyn ConnectionKeeper>,
        client_keeper: Arc<dyn ClientKeeper>,
        scoped_keeper: Arc<dyn ScopedKeeper>,
        registry_keeper: Arc<dyn RegistryKeeper>,
    ) -> Self {
        Self {
            params,
            channel_keeper,
            port_keeper,
            connection_keeper,
            client_keeper,
            scoped_keeper,
            registry_keeper,
        }
    }

    /// The parameters the keeper was created with
    #[must_use]
    pub const fn params(&self) -> &ParentParams {
        &self.params
    }

    /// Starts closing a channel owned by the module.
    /// # Errors
    /// Returns [`CcvError::ChannelCapabilityNotFound`] if the module does not
    /// own the channel, or the transport's error
    pub fn chan_close_init(&self, port_id: &str, channel_id: &str) -> Result<(), CcvError> {
        let chan_cap = self.channel_capability(port_id, channel_id)?;
        self.channel_keeper
            .chan_close_init(port_id, channel_id, &chan_cap)
    }

    pub(crate) fn channel_capability(
        &self,
        port_id: &str,
        channel_id: &str,
    ) -> Result<Capability, CcvError> {
        let cap_name = host::channel_capability_path(port_id, channel_id);
        self.scoped_keeper.get_capability(&cap_name).ok_or_else(|| {
            CcvError::ChannelCapabilityNotFound(format!(
                "could not retrieve channel capability at: {cap_name}"
            ))
        })
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

    /// Records the CCV channel of a child chain
    pub fn set_chain_to_channel(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
        channel_id: &str,
    ) {
        store::set_string(storage, &keys::chain_to_channel_key(chain_id), channel_id);
    }

    /// The CCV channel of a child chain
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_chain_to_channel(
        &self,
        storage: &dyn Storage,
        chain_id: &str,
    ) -> Result<Option<String>, CcvError> {
        store::get_string(storage, &keys::chain_to_channel_key(chain_id))
    }

    /// Forgets the CCV channel of a child chain
    pub fn delete_chain_to_channel(&self, storage: &mut dyn Storage, chain_id: &str) {
        storage.remove(&keys::chain_to_channel_key(chain_id));
    }

    /// Records the child chain on the other end of a channel
    pub fn set_channel_to_chain(
        &self,
        storage: &mut dyn Storage,
        channel_id: &str,
        chain_id: &str,
    ) {
        store::set_string(storage, &keys::channel_to_chain_key(channel_id), chain_id);
    }

    /// The child chain on the other end of a channel
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_channel_to_chain(
        &self,
        storage: &dyn Storage,
        channel_id: &str,
    ) -> Result<Option<String>, CcvError> {
        store::get_string(storage, &keys::channel_to_chain_key(channel_id))
    }

    /// Forgets the child chain of a channel
    pub fn delete_channel_to_chain(&self, storage: &mut dyn Storage, channel_id: &str) {
        storage.remove(&keys::channel_to_chain_key(channel_id));
    }

    /// Walks `(chain_id, channel_id)` of every established child chain in
    /// chain ID order until `cb` returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_child_chains(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(String, String) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, &keys::chain_to_channel_prefix()) {
            let chain_id = keys::parse_string_key(keys::CHAIN_TO_CHANNEL_PREFIX, &key)?;
            let channel_id =
                String::from_utf8(value).map_err(|e| CcvError::CorruptStore(e.to_string()))?;
            if cb(chain_id, channel_id) {
                break;
            }
        }
        Ok(())
    }

    /// Walks `(channel_id, chain_id)` of every channel that got past
    /// `OPEN_TRY`, in channel ID order, until `cb` returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_channel_to_chain(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(String, String) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, &keys::channel_to_chain_prefix()) {
            let channel_id = keys::parse_string_key(keys::CHANNEL_TO_CHAIN_PREFIX, &key)?;
            let chain_id =
                String::from_utf8(value).map_err(|e| CcvError::CorruptStore(e.to_string()))?;
            if cb(channel_id, chain_id) {
                break;
            }
        }
        Ok(())
    }

    /// Records the light client created for a child chain
    pub fn set_child_client(&self, storage: &mut dyn Storage, chain_id: &str, client_id: &str) {
        store::set_string(storage, &keys::chain_to_client_key(chain_id), client_id);
    }

    /// The light client created for a child chain
    /// # Errors
    /// Returns an error if the stored value is not UTF-8
    pub fn get_child_client(
        &self,
        storage: &dyn Storage,
        chain_id: &str,
    ) -> Result<Option<String>, CcvError> {
        store::get_string(storage, &keys::chain_to_client_key(chain_id))
    }

    /// Walks `(chain_id, client_id)` of every provisioned child chain until
    /// `cb` returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_child_clients(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(String, String) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, &keys::chain_to_client_prefix()) {
            let chain_id = keys::parse_string_key(keys::CHAIN_TO_CLIENT_PREFIX, &key)?;
            let client_id =
                String::from_utf8(value).map_err(|e| CcvError::CorruptStore(e.to_string()))?;
            if cb(chain_id, client_id) {
                break;
            }
        }
        Ok(())
    }

    /// Records the changes carried by the packet `sequence` sent to `chain_id`
    pub fn set_unbonding_changes(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
        sequence: u64,
        changes: &ValidatorSetChangePacketData,
    ) {
        store::set_proto(
            storage,
            &keys::unbonding_changes_key(chain_id, sequence),
            changes,
        );
    }

    /// The changes carried by the packet `sequence` sent to `chain_id`
    /// # Errors
    /// Returns an error if the stored changes do not decode
    pub fn get_unbonding_changes(
        &self,
        storage: &dyn Storage,
        chain_id: &str,
        sequence: u64,
    ) -> Result<Option<ValidatorSetChangePacketData>, CcvError> {
        store::get_proto(storage, &keys::unbonding_changes_key(chain_id, sequence))
    }

    /// Drops the changes once acknowledged
    pub fn delete_unbonding_changes(
        &self,
        storage: &mut dyn Storage,
        chain_id: &str,
        sequence: u64,
    ) {
        storage.remove(&keys::unbonding_changes_key(chain_id, sequence));
    }

    /// Walks every unacknowledged `(chain_id, sequence, changes)` in key order
    /// until `cb` returns `true`.
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn iterate_unbonding_changes(
        &self,
        storage: &dyn Storage,
        mut cb: impl FnMut(String, u64, ValidatorSetChangePacketData) -> bool,
    ) -> Result<(), CcvError> {
        for (key, value) in store::range_prefix(storage, &keys::unbonding_changes_prefix()) {
            let (chain_id, sequence) = keys::parse_unbonding_changes_key(&key)?;
            let changes = ValidatorSetChangePacketData::from_bytes(&value)?;
            if cb(chain_id, sequence, changes) {
                break;
            }
        }
        Ok(())
    }

    /// Schedules the client of `chain_id` to be created after `spawn_time`
    pub fn set_pending_client(
        &self,
        storage: &mut dyn Storage,
        spawn_time: Timestamp,
        chain_id: &str,
        client_state: &TmClientState,
    ) {
        store::set_proto(
            storage,
            &keys::pending_client_key(spawn_time, chain_id),
            client_state,
        );
    }

    /// The client state scheduled for `chain_id` at `spawn_time`
    /// # Errors
    /// Returns an error if the stored client state does not decode
    pub fn get_pending_client(
        &self,
        storage: &dyn Storage,
        spawn_time: Timestamp,
        chain_id: &str,
    ) -> Result<Option<TmClientState>, CcvError> {
        store::get_proto(storage, &keys::pending_client_key(spawn_time, chain_id))
    }

    /// Removes a scheduled client
    pub fn delete_pending_client(
        &self,
        storage: &mut dyn Storage,
        spawn_time: Timestamp,
        chain_id: &str,
    ) {
        storage.remove(&keys::pending_client_key(spawn_time, chain_id));
    }

    /// Every scheduled client, earliest spawn time first
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn get_all_pending_clients(
        &self,
        storage: &dyn Storage,
    ) -> Result<Vec<PendingClient>, CcvError> {
        store::range_prefix(storage, &keys::pending_client_prefix())
            .map(|(key, value)| {
                let (spawn_time, chain_id) = keys::parse_pending_client_key(&key)?;
                Ok(PendingClient {
                    chain_id,
                    spawn_time: spawn_time.nanos(),
                    client_state: TmClientState::decode(value.as_slice())?,
                })
            })
            .collect()
    }

    /// The spawn time `chain_id` is scheduled at, if it is pending
    /// # Errors
    /// Returns an error if a stored key is malformed
    pub fn get_pending_spawn_time(
        &self,
        storage: &dyn Storage,
        chain_id: &str,
    ) -> Result<Option<Timestamp>, CcvError> {
        for (key, _) in store::range_prefix(storage, &keys::pending_client_prefix()) {
            let (spawn_time, pending_chain_id) = keys::parse_pending_client_key(&key)?;
            if pending_chain_id == chain_id {
                return Ok(Some(spawn_time));
            }
        }
        Ok(None)
    }

    /// A channel of `chain_id` other than `channel_id` that is still in the
    /// handshake
    /// # Errors
    /// Returns an error if a stored entry is malformed
    pub fn get_handshaking_channel(
        &self,
        storage: &dyn Storage,
        chain_id: &str,
        channel_id: &str,
    ) -> Result<Option<String>, CcvError> {
        let mut candidates = Vec::new();
        self.iterate_channel_to_chain(storage, |channel, chain| {
            if chain == chain_id && channel != channel_id {
                candidates.push(channel);
            }
            false
        })?;
        for channel in candidates {
            if get_channel_status(storage, &channel)? == Status::Initializing {
                return Ok(Some(channel));
            }
        }
        Ok(None)
    }

    /// Verifies that the chain on the other end of a handshaking channel is
    /// the child chain the channel was opened for.
    ///
    /// The channel must be `Initializing` and routed over a single connection
    /// whose tendermint client tracks the chain ID recorded for the channel
    /// during `OPEN_TRY`.
    /// # Errors
    /// Returns the error of the first failing check
    pub fn verify_child_chain(
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
                "must have direct connection to child chain, got {} hops",
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

        let expected_chain = self.get_channel_to_chain(storage, channel_id)?.ok_or_else(|| {
            CcvError::InvalidChildChain(format!(
                "chain ID doesn't exist for channel ID: {channel_id}"
            ))
        })?;
        if tm_client_state.chain_id != expected_chain {
            return Err(CcvError::InvalidChildChain(format!(
                "child chain has unexpected chain id. Expected {expected_chain}, got {}",
                tm_client_state.chain_id
            )));
        }

        Ok(())
    }
}
