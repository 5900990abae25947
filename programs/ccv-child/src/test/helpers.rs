use std::sync::Arc;

use cosmwasm_std::{testing::mock_env, Env, Storage, Timestamp};
use ibc_ccv_test_utils::{fixtures, MockIbcHost};
use ibc_ccv_types::{config::ChildParams, genesis::ChildGenesisState, VERSION};
use ibc_proto::ibc::core::channel::v1::{Counterparty, Order, State};

use crate::{keeper::Keeper, module::ChildModule};

pub const PARENT_CHAIN_ID: &str = "parent-1";
pub const PARENT_CHANNEL: &str = "channel-0";
pub const PARENT_SIDE_CHANNEL: &str = "channel-9";
pub const CONNECTION_ID: &str = "connection-0";

pub struct TestChild {
    pub keeper: Keeper,
    pub host: Arc<MockIbcHost>,
}

pub fn setup() -> TestChild {
    setup_with(ChildParams::default())
}

pub fn setup_with(params: ChildParams) -> TestChild {
    ibc_ccv_test_utils::init_tracing();
    let host = Arc::new(MockIbcHost::new());
    let keeper = Keeper::new(
        params,
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
    );
    TestChild { keeper, host }
}

pub fn env_at(time: Timestamp) -> Env {
    let mut env = mock_env();
    env.block.time = time;
    env
}

pub fn new_chain_genesis() -> ChildGenesisState {
    ChildGenesisState::new_chain(
        "child",
        fixtures::tm_client_state(PARENT_CHAIN_ID),
        fixtures::tm_consensus_state(Timestamp::from_seconds(1_600_000_000)),
    )
}

/// Runs the new-chain genesis and installs an `INIT` channel whose
/// connection is built on the parent client genesis created.
pub fn genesis_and_channel(storage: &mut dyn Storage, child: &TestChild) -> String {
    child
        .keeper
        .init_genesis(storage, &new_chain_genesis())
        .unwrap();
    let client_id = child
        .keeper
        .get_parent_client(storage)
        .unwrap()
        .unwrap();
    child.host.set_channel(
        "child",
        PARENT_CHANNEL,
        fixtures::ccv_channel(State::Init, "parent", "", &[CONNECTION_ID]),
    );
    child
        .host
        .set_connection(CONNECTION_ID, fixtures::connection_end(&client_id));
    client_id
}

/// Completes the child side of the handshake and returns the module.
pub fn open_module(storage: &mut dyn Storage, child: TestChild) -> (ChildModule, Arc<MockIbcHost>) {
    genesis_and_channel(storage, &child);
    let host = child.host.clone();
    let module = ChildModule::new(child.keeper);
    let cap = host.new_channel_capability();
    module
        .on_chan_open_init(
            storage,
            Order::Ordered,
            &[CONNECTION_ID.to_string()],
            "child",
            PARENT_CHANNEL,
            &cap,
            &parent_counterparty(""),
            VERSION,
        )
        .unwrap();
    module
        .on_chan_open_ack(storage, "child", PARENT_CHANNEL, VERSION)
        .unwrap();
    (module, host)
}

pub fn parent_counterparty(channel_id: &str) -> Counterparty {
    Counterparty {
        port_id: "parent".to_string(),
        channel_id: channel_id.to_string(),
    }
}
