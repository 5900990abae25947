//! The validator-set change packet payload and CCV acknowledgements.

use ibc_proto::ibc::core::channel::v1::{acknowledgement::Response, Acknowledgement};
use prost::Message;
use tendermint_proto::v0_38::abci::ValidatorUpdate;

use crate::CcvError;

/// Payload of the acknowledgement the child writes once a packet's unbonding period elapsed
pub const SUCCESS_ACK_RESULT: &[u8] = &[1];

/// One batch of validator power updates streamed from the parent to a child chain.
#[derive(Clone, PartialEq, Message)]
pub struct ValidatorSetChangePacketData {
    /// The updates in the order the parent's registry reported them
    #[prost(message, repeated, tag = "1")]
    pub validator_updates: Vec<ValidatorUpdate>,
}

impl ValidatorSetChangePacketData {
    /// Creates the payload for the given updates
    #[must_use]
    pub const fn new(validator_updates: Vec<ValidatorUpdate>) -> Self {
        Self { validator_updates }
    }

    /// Checks that the payload carries at least one update.
    /// # Errors
    /// Returns [`CcvError::InvalidPacketData`] for an empty update list
    pub fn validate_basic(&self) -> Result<(), CcvError> {
        if self.validator_updates.is_empty() {
            return Err(CcvError::InvalidPacketData(
                "validator updates cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The canonical wire encoding carried as packet data
    #[must_use]
    pub fn get_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes a packet payload.
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding
    pub fn from_bytes(bz: &[u8]) -> Result<Self, CcvError> {
        Ok(Self::decode(bz)?)
    }
}

/// The acknowledgement written for a matured packet
#[must_use]
pub fn success_acknowledgement() -> Acknowledgement {
    Acknowledgement {
        response: Some(Response::Result(SUCCESS_ACK_RESULT.to_vec())),
    }
}

/// An error acknowledgement carrying the failure reason
#[must_use]
pub fn error_acknowledgement(err: &CcvError) -> Acknowledgement {
    Acknowledgement {
        response: Some(Response::Error(err.to_string())),
    }
}

/// Decodes acknowledgement bytes delivered by the transport.
/// # Errors
/// Returns an error if the bytes are not an acknowledgement or carry no response
pub fn decode_acknowledgement(bz: &[u8]) -> Result<Acknowledgement, CcvError> {
    let ack = Acknowledgement::decode(bz)?;
    if ack.response.is_none() {
        return Err(CcvError::InvalidAcknowledgement(
            "acknowledgement has no response".to_string(),
        ));
    }
    Ok(ack)
}
