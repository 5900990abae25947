//! An in-memory IBC host implementing every transport service the keepers use.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use ibc_ccv_types::{
    client,
    expected_keepers::{
        Capability, ChannelKeeper, ClientKeeper, ConnectionKeeper, PortKeeper, ScopedKeeper,
    },
    host, CcvError,
};
use ibc_proto::{
    google::protobuf::Any,
    ibc::core::{
        channel::v1::{Acknowledgement, Channel, Packet},
        client::v1::Height,
        connection::v1::ConnectionEnd,
    },
};

#[derive(Default)]
struct HostState {
    channels: HashMap<(String, String), Channel>,
    next_sequence_send: HashMap<(String, String), u64>,
    connections: HashMap<String, ConnectionEnd>,
    client_states: BTreeMap<String, Any>,
    consensus_states: HashMap<(String, u64, u64), Any>,
    capabilities: HashMap<String, Capability>,
    next_capability: u64,
    next_client: u64,
    bound_ports: Vec<String>,
    sent_packets: Vec<Packet>,
    acknowledgements: Vec<(Packet, Acknowledgement)>,
    closed_channels: Vec<(String, String)>,
    create_client_error: Option<String>,
}

impl HostState {
    fn new_capability(&mut self) -> Capability {
        self.next_capability += 1;
        Capability {
            index: self.next_capability,
        }
    }
}

/// Records everything the keepers hand to the transport and serves the
/// channel, connection and client ends a test installs.
#[derive(Default)]
pub struct MockIbcHost {
    state: Mutex<HostState>,
}

impl MockIbcHost {
    /// Creates an empty host
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Installs a channel end; the next send sequence starts at 1
    pub fn set_channel(&self, port_id: &str, channel_id: &str, channel: Channel) {
        let mut state = self.state();
        let key = (port_id.to_string(), channel_id.to_string());
        state.next_sequence_send.entry(key.clone()).or_insert(1);
        state.channels.insert(key, channel);
    }

    /// Overrides the next send sequence of a channel
    pub fn set_next_sequence_send(&self, port_id: &str, channel_id: &str, sequence: u64) {
        self.state()
            .next_sequence_send
            .insert((port_id.to_string(), channel_id.to_string()), sequence);
    }

    /// Removes the send sequence of a channel
    pub fn clear_next_sequence_send(&self, port_id: &str, channel_id: &str) {
        self.state()
            .next_sequence_send
            .remove(&(port_id.to_string(), channel_id.to_string()));
    }

    /// Installs a connection end
    pub fn set_connection(&self, connection_id: &str, connection: ConnectionEnd) {
        self.state()
            .connections
            .insert(connection_id.to_string(), connection);
    }

    /// Installs a client state under an explicit client identifier
    pub fn set_client_state(&self, client_id: &str, client_state: Any) {
        self.state()
            .client_states
            .insert(client_id.to_string(), client_state);
    }

    /// Makes every subsequent `create_client` call fail with `reason`
    pub fn fail_create_client(&self, reason: &str) {
        self.state().create_client_error = Some(reason.to_string());
    }

    /// Creates the capability the transport hands to the module when a
    /// channel handshake begins; the module still has to claim it
    pub fn new_channel_capability(&self) -> Capability {
        self.state().new_capability()
    }

    /// Creates a channel capability and assigns it to the module directly
    pub fn grant_channel_capability(&self, port_id: &str, channel_id: &str) -> Capability {
        let mut state = self.state();
        let cap = state.new_capability();
        state
            .capabilities
            .insert(host::channel_capability_path(port_id, channel_id), cap);
        cap
    }

    /// Every packet sent so far, in order
    #[must_use]
    pub fn sent_packets(&self) -> Vec<Packet> {
        self.state().sent_packets.clone()
    }

    /// Every acknowledgement written so far, in order
    #[must_use]
    pub fn acknowledgements(&self) -> Vec<(Packet, Acknowledgement)> {
        self.state().acknowledgements.clone()
    }

    /// Every `(port, channel)` whose closing was initiated
    #[must_use]
    pub fn closed_channels(&self) -> Vec<(String, String)> {
        self.state().closed_channels.clone()
    }

    /// Ports bound so far
    #[must_use]
    pub fn bound_ports(&self) -> Vec<String> {
        self.state().bound_ports.clone()
    }

    /// Identifiers of every client, created or installed
    #[must_use]
    pub fn client_ids(&self) -> Vec<String> {
        self.state().client_states.keys().cloned().collect()
    }
}

impl ChannelKeeper for MockIbcHost {
    fn get_channel(&self, port_id: &str, channel_id: &str) -> Option<Channel> {
        self.state()
            .channels
            .get(&(port_id.to_string(), channel_id.to_string()))
            .cloned()
    }

    fn get_next_sequence_send(&self, port_id: &str, channel_id: &str) -> Option<u64> {
        self.state()
            .next_sequence_send
            .get(&(port_id.to_string(), channel_id.to_string()))
            .copied()
    }

    fn send_packet(&self, channel_cap: &Capability, packet: Packet) -> Result<(), CcvError> {
        let mut state = self.state();
        let name = host::channel_capability_path(&packet.source_port, &packet.source_channel);
        if state.capabilities.get(&name) != Some(channel_cap) {
            return Err(CcvError::Collaborator {
                service: "channel",
                reason: format!("capability not authenticated for {name}"),
            });
        }
        let key = (packet.source_port.clone(), packet.source_channel.clone());
        let next = state.next_sequence_send.get(&key).copied().ok_or_else(|| {
            CcvError::Collaborator {
                service: "channel",
                reason: format!("no send sequence for {}/{}", key.0, key.1),
            }
        })?;
        if packet.sequence != next {
            return Err(CcvError::Collaborator {
                service: "channel",
                reason: format!("packet sequence {} != next send sequence {next}", packet.sequence),
            });
        }
        state.next_sequence_send.insert(key, next + 1);
        state.sent_packets.push(packet);
        Ok(())
    }

    fn write_acknowledgement(
        &self,
        channel_cap: &Capability,
        packet: &Packet,
        ack: &Acknowledgement,
    ) -> Result<(), CcvError> {
        let mut state = self.state();
        let name =
            host::channel_capability_path(&packet.destination_port, &packet.destination_channel);
        if state.capabilities.get(&name) != Some(channel_cap) {
            return Err(CcvError::Collaborator {
                service: "channel",
                reason: format!("capability not authenticated for {name}"),
            });
        }
        state.acknowledgements.push((packet.clone(), ack.clone()));
        Ok(())
    }

    fn chan_close_init(
        &self,
        port_id: &str,
        channel_id: &str,
        _channel_cap: &Capability,
    ) -> Result<(), CcvError> {
        self.state()
            .closed_channels
            .push((port_id.to_string(), channel_id.to_string()));
        Ok(())
    }
}

impl PortKeeper for MockIbcHost {
    fn bind_port(&self, port_id: &str) -> Capability {
        let mut state = self.state();
        state.bound_ports.push(port_id.to_string());
        state.new_capability()
    }
}

impl ConnectionKeeper for MockIbcHost {
    fn get_connection(&self, connection_id: &str) -> Option<ConnectionEnd> {
        self.state().connections.get(connection_id).cloned()
    }
}

impl ClientKeeper for MockIbcHost {
    fn create_client(&self, client_state: Any, consensus_state: Any) -> Result<String, CcvError> {
        let mut state = self.state();
        if let Some(reason) = state.create_client_error.clone() {
            return Err(CcvError::Collaborator {
                service: "client",
                reason,
            });
        }
        let height = client::unpack_client_state(&client_state)
            .ok()
            .and_then(|cs| cs.latest_height)
            .unwrap_or_default();
        let client_id = format!("07-tendermint-{}", state.next_client);
        state.next_client += 1;
        state.consensus_states.insert(
            (
                client_id.clone(),
                height.revision_number,
                height.revision_height,
            ),
            consensus_state,
        );
        state.client_states.insert(client_id.clone(), client_state);
        Ok(client_id)
    }

    fn get_client_state(&self, client_id: &str) -> Option<Any> {
        self.state().client_states.get(client_id).cloned()
    }

    fn get_client_consensus_state(&self, client_id: &str, height: &Height) -> Option<Any> {
        self.state()
            .consensus_states
            .get(&(
                client_id.to_string(),
                height.revision_number,
                height.revision_height,
            ))
            .cloned()
    }
}

impl ScopedKeeper for MockIbcHost {
    fn get_capability(&self, name: &str) -> Option<Capability> {
        self.state().capabilities.get(name).copied()
    }

    fn claim_capability(&self, cap: &Capability, name: &str) -> Result<(), CcvError> {
        let mut state = self.state();
        if state.capabilities.contains_key(name) {
            return Err(CcvError::Collaborator {
                service: "capability",
                reason: format!("capability {name} already claimed"),
            });
        }
        state.capabilities.insert(name.to_string(), *cap);
        Ok(())
    }

    fn authenticate_capability(&self, cap: &Capability, name: &str) -> bool {
        self.state().capabilities.get(name) == Some(cap)
    }
}
