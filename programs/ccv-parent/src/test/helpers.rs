use std::sync::Arc;

use cosmwasm_std::{testing::mock_env, Env, Storage, Timestamp};
use ibc_ccv_test_utils::{fixtures, MockIbcHost, MockRegistry};
use ibc_ccv_types::{
    client, config::ParentParams, proposal::CreateChildChainProposal, VERSION,
};
use ibc_proto::ibc::core::channel::v1::{Counterparty, Order, State};

use crate::{keeper::Keeper, module::ParentModule};

pub const CHILD_CHAIN_ID: &str = "child-1";
pub const PARENT_CHANNEL: &str = "channel-1";
pub const CHILD_SIDE_CHANNEL: &str = "channel-0";
pub const CONNECTION_ID: &str = "connection-0";

pub struct TestParent {
    pub keeper: Keeper,
    pub host: Arc<MockIbcHost>,
    pub registry: Arc<MockRegistry>,
}

pub fn setup() -> TestParent {
    setup_with(ParentParams::default())
}

pub fn setup_with(params: ParentParams) -> TestParent {
    ibc_ccv_test_utils::init_tracing();
    let host = Arc::new(MockIbcHost::new());
    let registry = Arc::new(MockRegistry::new());
    let keeper = Keeper::new(
        params,
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        host.clone(),
        registry.clone(),
    );
    TestParent {
        keeper,
        host,
        registry,
    }
}

pub fn env_at(time: Timestamp) -> Env {
    let mut env = mock_env();
    env.block.time = time;
    env
}

pub fn proposal(chain_id: &str, spawn_time: Timestamp) -> CreateChildChainProposal {
    CreateChildChainProposal {
        title: format!("Create {chain_id}"),
        description: format!("Provision the {chain_id} chain"),
        chain_id: chain_id.to_string(),
        client_state: Some(client::pack_client_state(&fixtures::tm_client_state(
            chain_id,
        ))),
        genesis_hash: b"genesis".to_vec(),
        spawn_time,
    }
}

/// Creates the client of `CHILD_CHAIN_ID` and returns its identifier.
pub fn provision_child(storage: &mut dyn Storage, test: &TestParent, env: &Env) -> String {
    test.keeper
        .create_child_client(
            storage,
            env,
            CHILD_CHAIN_ID,
            fixtures::tm_client_state(CHILD_CHAIN_ID),
        )
        .unwrap()
}

pub fn child_counterparty() -> Counterparty {
    Counterparty {
        port_id: "child".to_string(),
        channel_id: CHILD_SIDE_CHANNEL.to_string(),
    }
}

/// Provisions `CHILD_CHAIN_ID` and runs the parent side of the handshake.
pub fn open_channel(
    storage: &mut dyn Storage,
    test: TestParent,
) -> (ParentModule, Arc<MockIbcHost>, Arc<MockRegistry>) {
    let client_id = provision_child(
        storage,
        &test,
        &env_at(Timestamp::from_seconds(1_600_000_000)),
    );
    test.host.set_channel(
        "parent",
        PARENT_CHANNEL,
        fixtures::ccv_channel(State::Tryopen, "child", CHILD_SIDE_CHANNEL, &[CONNECTION_ID]),
    );
    test.host
        .set_connection(CONNECTION_ID, fixtures::connection_end(&client_id));

    let TestParent {
        keeper,
        host,
        registry,
    } = test;
    let module = ParentModule::new(keeper);
    let cap = host.new_channel_capability();
    module
        .on_chan_open_try(
            storage,
            Order::Ordered,
            &[CONNECTION_ID.to_string()],
            "parent",
            PARENT_CHANNEL,
            &cap,
            &child_counterparty(),
            VERSION,
            VERSION,
        )
        .unwrap();
    module
        .on_chan_open_confirm(storage, "parent", PARENT_CHANNEL)
        .unwrap();
    (module, host, registry)
}
