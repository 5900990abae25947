//! The governance proposal that provisions a new child chain.

use cosmwasm_std::Timestamp;
use ibc_proto::google::protobuf::Any;

use crate::{client, CcvError};

/// Route of proposals handled by the parent module
pub const PROPOSAL_ROUTE: &str = "parent";
/// Type of [`CreateChildChainProposal`]
pub const PROPOSAL_TYPE_CREATE_CHILD_CHAIN: &str = "CreateChildChain";

/// Schedules the light client of a new child chain to be created at `spawn_time`.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateChildChainProposal {
    /// Proposal title
    pub title: String,
    /// Proposal description
    pub description: String,
    /// Chain ID of the new child chain
    pub chain_id: String,
    /// Packed tendermint client state the child client is created from
    pub client_state: Option<Any>,
    /// Hash of the child chain's genesis file
    pub genesis_hash: Vec<u8>,
    /// Time after which the child client is created
    pub spawn_time: Timestamp,
}

impl CreateChildChainProposal {
    /// Routes the proposal to the parent module
    #[must_use]
    pub const fn proposal_route(&self) -> &'static str {
        PROPOSAL_ROUTE
    }

    /// The proposal type
    #[must_use]
    pub const fn proposal_type(&self) -> &'static str {
        PROPOSAL_TYPE_CREATE_CHILD_CHAIN
    }

    /// Stateless checks run when the proposal is submitted.
    /// # Errors
    /// Returns [`CcvError::InvalidProposal`] for a blank title, description or
    /// chain ID, a missing or undecodable client state, a client state for
    /// another chain, an empty genesis hash or a zero spawn time
    pub fn validate_basic(&self) -> Result<(), CcvError> {
        if self.title.trim().is_empty() {
            return Err(CcvError::InvalidProposal("proposal title cannot be blank".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(CcvError::InvalidProposal(
                "proposal description cannot be blank".to_string(),
            ));
        }
        if self.chain_id.trim().is_empty() {
            return Err(CcvError::InvalidProposal(
                "child chain id must not be blank".to_string(),
            ));
        }
        let client_state = self
            .client_state
            .as_ref()
            .ok_or_else(|| CcvError::InvalidProposal("client state cannot be nil".to_string()))?;
        let client_state = client::unpack_client_state(client_state)
            .map_err(|e| CcvError::InvalidProposal(format!("cannot unpack client state: {e}")))?;
        if client_state.chain_id != self.chain_id {
            return Err(CcvError::InvalidProposal(format!(
                "client state chain id {} does not match proposal chain id {}",
                client_state.chain_id, self.chain_id
            )));
        }
        if self.genesis_hash.is_empty() {
            return Err(CcvError::InvalidProposal(
                "genesis hash cannot be empty".to_string(),
            ));
        }
        if self.spawn_time.nanos() == 0 {
            return Err(CcvError::InvalidProposal(
                "spawn time cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}
