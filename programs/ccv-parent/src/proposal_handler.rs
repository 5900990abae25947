//! Governance entry point of the parent module.

use cosmwasm_std::{Env, Storage};
use ibc_ccv_types::{
    proposal::{CreateChildChainProposal, PROPOSAL_ROUTE},
    CcvError,
};

use crate::keeper::Keeper;

/// Validates an accepted "create child chain" proposal and hands it to the
/// scheduler.
/// # Errors
/// Returns [`CcvError::InvalidProposal`] for a proposal routed elsewhere or
/// failing basic validation, or the scheduler's error
pub fn handle_create_child_chain_proposal(
    keeper: &Keeper,
    storage: &mut dyn Storage,
    env: &Env,
    proposal: &CreateChildChainProposal,
) -> Result<(), CcvError> {
    if proposal.proposal_route() != PROPOSAL_ROUTE {
        return Err(CcvError::InvalidProposal(format!(
            "unrecognized proposal route {}",
            proposal.proposal_route()
        )));
    }
    proposal.validate_basic()?;

    tracing::info!(
        chain_id = %proposal.chain_id,
        title = %proposal.title,
        "handling create child chain proposal"
    );
    keeper.create_child_chain_proposal(storage, env, proposal)
}
