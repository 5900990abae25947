//! End-to-end scenarios between a parent and a child chain, each running on
//! its own store and mock host.

use std::sync::Arc;

use cosmwasm_std::{
    testing::{mock_env, MockStorage},
    Env, Timestamp,
};
use ibc_ccv_child::ChildModule;
use ibc_ccv_parent::{handle_create_child_chain_proposal, ParentModule};
use ibc_ccv_test_utils::{fixtures, MockIbcHost, MockRegistry};
use ibc_ccv_types::{
    client,
    config::{ChildParams, ParentParams},
    genesis::ChildGenesisState,
    get_channel_status,
    proposal::CreateChildChainProposal,
    set_channel_status, Status, VERSION,
};
use ibc_proto::ibc::core::channel::v1::{Counterparty, Order, State};
use prost::Message;
use rstest::rstest;

const PARENT_CHAIN_ID: &str = "parent-1";
const CHILD_CHAIN_ID: &str = "child-1";
const PARENT_CHANNEL: &str = "channel-1";
const CHILD_CHANNEL: &str = "channel-0";
const CONNECTION_ID: &str = "connection-0";
const WEEK: u64 = 7 * 24 * 60 * 60;
const HOUR: u64 = 60 * 60;

fn env_at(time: Timestamp) -> Env {
    let mut env = mock_env();
    env.block.time = time;
    env
}

struct Parent {
    module: ParentModule,
    host: Arc<MockIbcHost>,
    registry: Arc<MockRegistry>,
    storage: MockStorage,
}

struct Child {
    module: ChildModule,
    host: Arc<MockIbcHost>,
    storage: MockStorage,
}

fn parent() -> Parent {
    ibc_ccv_test_utils::init_tracing();
    let host = Arc::new(MockIbcHost::new());
    let registry = Arc::new(MockRegistry::new());
    let keeper = ibc_ccv_parent::Keeper::new(
        ParentParams::default(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        registry.clone(),
    );
    Parent {
        module: ParentModule::new(keeper),
        host,
        registry,
        storage: MockStorage::new(),
    }
}

fn child() -> Child {
    let host = Arc::new(MockIbcHost::new());
    let keeper = ibc_ccv_child::Keeper::new(
        ChildParams::default(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
    );
    Child {
        module: ChildModule::new(keeper),
        host,
        storage: MockStorage::new(),
    }
}

fn create_child_chain(chain_id: &str, spawn_time: Timestamp) -> CreateChildChainProposal {
    CreateChildChainProposal {
        title: format!("Create {chain_id}"),
        description: "Launch a new child chain".to_string(),
        chain_id: chain_id.to_string(),
        client_state: Some(client::pack_client_state(&fixtures::tm_client_state(
            chain_id,
        ))),
        genesis_hash: b"child genesis".to_vec(),
        spawn_time,
    }
}

/// Provisions the child chain on the parent, starts the child from genesis
/// and runs the four handshake steps across both hosts.
fn connect(start: Timestamp) -> (Parent, Child) {
    let mut parent = parent();
    let mut child = child();

    handle_create_child_chain_proposal(
        parent.module.keeper(),
        &mut parent.storage,
        &env_at(start),
        &create_child_chain(CHILD_CHAIN_ID, start.minus_seconds(1)),
    )
    .unwrap();
    let child_client = parent
        .module
        .keeper()
        .get_child_client(&parent.storage, CHILD_CHAIN_ID)
        .unwrap()
        .unwrap();

    child
        .module
        .keeper()
        .init_genesis(
            &mut child.storage,
            &ChildGenesisState::new_chain(
                "child",
                fixtures::tm_client_state(PARENT_CHAIN_ID),
                fixtures::tm_consensus_state(start),
            ),
        )
        .unwrap();
    let parent_client = child
        .module
        .keeper()
        .get_parent_client(&child.storage)
        .unwrap()
        .unwrap();

    child.host.set_channel(
        "child",
        CHILD_CHANNEL,
        fixtures::ccv_channel(State::Init, "parent", "", &[CONNECTION_ID]),
    );
    child
        .host
        .set_connection(CONNECTION_ID, fixtures::connection_end(&parent_client));
    let child_cap = child.host.new_channel_capability();
    child
        .module
        .on_chan_open_init(
            &mut child.storage,
            Order::Ordered,
            &[CONNECTION_ID.to_string()],
            "child",
            CHILD_CHANNEL,
            &child_cap,
            &Counterparty {
                port_id: "parent".to_string(),
                channel_id: String::new(),
            },
            VERSION,
        )
        .unwrap();

    parent.host.set_channel(
        "parent",
        PARENT_CHANNEL,
        fixtures::ccv_channel(State::Tryopen, "child", CHILD_CHANNEL, &[CONNECTION_ID]),
    );
    parent
        .host
        .set_connection(CONNECTION_ID, fixtures::connection_end(&child_client));
    let parent_cap = parent.host.new_channel_capability();
    parent
        .module
        .on_chan_open_try(
            &mut parent.storage,
            Order::Ordered,
            &[CONNECTION_ID.to_string()],
            "parent",
            PARENT_CHANNEL,
            &parent_cap,
            &Counterparty {
                port_id: "child".to_string(),
                channel_id: CHILD_CHANNEL.to_string(),
            },
            VERSION,
            VERSION,
        )
        .unwrap();

    child
        .module
        .on_chan_open_ack(&mut child.storage, "child", CHILD_CHANNEL, VERSION)
        .unwrap();
    parent
        .module
        .on_chan_open_confirm(&mut parent.storage, "parent", PARENT_CHANNEL)
        .unwrap();

    (parent, child)
}

#[test]
fn full_relay_cycle() {
    let t = Timestamp::from_seconds(1_700_000_000);
    let (mut parent, mut child) = connect(t);
    let update = fixtures::validator_update("pubkey-a", 30);

    parent.registry.queue_changes(CHILD_CHAIN_ID, vec![update.clone()]);
    parent
        .module
        .keeper()
        .end_block(&mut parent.storage, &env_at(t))
        .unwrap();
    let packet = parent.host.sent_packets().remove(0);
    assert_eq!(packet.sequence, 1);
    assert!(parent
        .module
        .keeper()
        .get_unbonding_changes(&parent.storage, CHILD_CHAIN_ID, 1)
        .unwrap()
        .is_some());

    assert_eq!(
        child
            .module
            .on_recv_packet(&mut child.storage, &env_at(t), &packet),
        None
    );
    assert_eq!(
        child
            .module
            .keeper()
            .get_unbonding_time(&child.storage, 1)
            .unwrap(),
        Some(t.plus_seconds(4 * WEEK).nanos())
    );
    assert_eq!(
        child
            .module
            .keeper()
            .end_block(&mut child.storage, &env_at(t))
            .unwrap(),
        vec![update.clone()]
    );

    child
        .module
        .keeper()
        .unbond_mature_packets(&mut child.storage, &env_at(t.plus_seconds(4 * WEEK - 1)))
        .unwrap();
    assert!(child.host.acknowledgements().is_empty());
    assert!(child
        .module
        .keeper()
        .get_unbonding_time(&child.storage, 1)
        .unwrap()
        .is_some());

    child
        .module
        .keeper()
        .unbond_mature_packets(&mut child.storage, &env_at(t.plus_seconds(4 * WEEK + 1)))
        .unwrap();
    let (acked_packet, ack) = child.host.acknowledgements().remove(0);
    assert_eq!(acked_packet, packet);
    assert_eq!(
        child
            .module
            .keeper()
            .get_unbonding_time(&child.storage, 1)
            .unwrap(),
        None
    );

    parent
        .module
        .on_acknowledgement_packet(&mut parent.storage, &acked_packet, &ack.encode_to_vec())
        .unwrap();
    assert_eq!(
        parent.registry.unbonded(),
        vec![(CHILD_CHAIN_ID.to_string(), vec![update])]
    );
    assert_eq!(
        parent
            .module
            .keeper()
            .get_unbonding_changes(&parent.storage, CHILD_CHAIN_ID, 1)
            .unwrap(),
        None
    );
    assert_eq!(
        get_channel_status(&parent.storage, PARENT_CHANNEL).unwrap(),
        Status::Validating
    );
}

#[test]
fn rejected_packet_invalidates_the_parent_channel() {
    let t = Timestamp::from_seconds(1_700_000_000);
    let (mut parent, mut child) = connect(t);
    parent
        .registry
        .queue_changes(CHILD_CHAIN_ID, vec![fixtures::validator_update("a", 1)]);
    parent
        .module
        .keeper()
        .end_block(&mut parent.storage, &env_at(t))
        .unwrap();
    let packet = parent.host.sent_packets().remove(0);

    set_channel_status(&mut child.storage, CHILD_CHANNEL, Status::Invalid);
    let ack = child
        .module
        .on_recv_packet(&mut child.storage, &env_at(t), &packet)
        .expect("error acknowledgement");

    parent
        .module
        .on_acknowledgement_packet(&mut parent.storage, &packet, &ack.encode_to_vec())
        .unwrap();
    assert_eq!(
        get_channel_status(&parent.storage, PARENT_CHANNEL).unwrap(),
        Status::Invalid
    );
    assert!(parent.registry.unbonded().is_empty());
}

#[rstest]
#[case::uninitialized(None)]
#[case::initializing(Some(Status::Initializing))]
#[case::validating(Some(Status::Validating))]
#[case::invalid(Some(Status::Invalid))]
fn timeout_invalidates_channel_7(#[case] prior: Option<Status>) {
    let mut parent = parent();
    if let Some(status) = prior {
        set_channel_status(&mut parent.storage, "channel-7", status);
    }
    let data = ibc_ccv_types::ValidatorSetChangePacketData::new(vec![
        fixtures::validator_update("a", 1),
    ]);
    let packet = fixtures::ccv_packet(1, "channel-7", CHILD_CHANNEL, &data);

    parent
        .module
        .on_timeout_packet(&mut parent.storage, &packet)
        .unwrap();
    assert_eq!(
        get_channel_status(&parent.storage, "channel-7").unwrap(),
        Status::Invalid
    );
}

#[test]
fn deferred_provisioning() {
    let mut parent = parent();
    let now = Timestamp::from_seconds(1_700_000_000);

    handle_create_child_chain_proposal(
        parent.module.keeper(),
        &mut parent.storage,
        &env_at(now),
        &create_child_chain(CHILD_CHAIN_ID, now.plus_seconds(HOUR)),
    )
    .unwrap();
    assert!(parent.host.client_ids().is_empty());
    assert_eq!(
        parent
            .module
            .keeper()
            .get_all_pending_clients(&parent.storage)
            .unwrap()
            .len(),
        1
    );

    let later = env_at(now.plus_seconds(2 * HOUR));
    parent
        .module
        .keeper()
        .iterate_pending_clients(&mut parent.storage, &later)
        .unwrap();
    assert_eq!(parent.host.client_ids(), vec!["07-tendermint-0".to_string()]);
    assert!(parent
        .module
        .keeper()
        .get_all_pending_clients(&parent.storage)
        .unwrap()
        .is_empty());
    assert_eq!(
        parent
            .module
            .keeper()
            .get_child_client(&parent.storage, CHILD_CHAIN_ID)
            .unwrap()
            .as_deref(),
        Some("07-tendermint-0")
    );

    parent
        .module
        .keeper()
        .iterate_pending_clients(&mut parent.storage, &later)
        .unwrap();
    assert_eq!(parent.host.client_ids().len(), 1);
}
