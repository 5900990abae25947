//! ICS-24 host identifiers and paths, and structural packet checks.

use ibc_proto::ibc::core::channel::v1::Packet;

use crate::CcvError;

/// Characters allowed in ICS-24 identifiers besides ASCII alphanumerics
const VALID_ID_SPECIAL_CHARS: &str = "._+-#[]<>";

fn validate_identifier(kind: &str, id: &str, min: usize, max: usize) -> Result<(), String> {
    if id.trim().is_empty() {
        return Err(format!("{kind} identifier cannot be blank"));
    }
    if id.contains('/') {
        return Err(format!("{kind} identifier {id} cannot contain separator '/'"));
    }
    if id.len() < min || id.len() > max {
        return Err(format!(
            "{kind} identifier {id} has invalid length {}, must be between {min}-{max} characters",
            id.len()
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || VALID_ID_SPECIAL_CHARS.contains(c))
    {
        return Err(format!(
            "{kind} identifier {id} must contain only alphanumeric or the following characters: {VALID_ID_SPECIAL_CHARS}"
        ));
    }
    Ok(())
}

/// Validates a port identifier.
/// # Errors
/// Returns an error if the identifier is not a valid ICS-24 port identifier
pub fn validate_port_id(port_id: &str) -> Result<(), String> {
    validate_identifier("port", port_id, 2, 128)
}

/// Validates a channel identifier.
/// # Errors
/// Returns an error if the identifier is not a valid ICS-24 channel identifier
pub fn validate_channel_id(channel_id: &str) -> Result<(), String> {
    validate_identifier("channel", channel_id, 8, 64)
}

/// Validates a client identifier.
/// # Errors
/// Returns an error if the identifier is not a valid ICS-24 client identifier
pub fn validate_client_id(client_id: &str) -> Result<(), String> {
    validate_identifier("client", client_id, 9, 64)
}

/// Validates a chain identifier.
/// # Errors
/// Returns an error if the identifier is not a valid chain identifier
pub fn validate_chain_id(chain_id: &str) -> Result<(), String> {
    validate_identifier("chain", chain_id, 1, 64)
}

/// The capability path of a port
#[must_use]
pub fn port_path(port_id: &str) -> String {
    format!("ports/{port_id}")
}

/// The capability path of a channel
#[must_use]
pub fn channel_capability_path(port_id: &str, channel_id: &str) -> String {
    format!("capabilities/ports/{port_id}/channels/{channel_id}")
}

/// Performs the structural checks of a channel packet.
/// # Errors
/// Returns an error if the sequence is zero, an identifier is invalid, the
/// payload is empty, or the packet carries no timeout
pub fn validate_packet(packet: &Packet) -> Result<(), CcvError> {
    if packet.sequence == 0 {
        return Err(CcvError::InvalidPacketData(
            "packet sequence cannot be 0".to_string(),
        ));
    }
    validate_port_id(&packet.source_port).map_err(CcvError::InvalidPacketData)?;
    validate_channel_id(&packet.source_channel).map_err(CcvError::InvalidPacketData)?;
    validate_port_id(&packet.destination_port).map_err(CcvError::InvalidPacketData)?;
    validate_channel_id(&packet.destination_channel).map_err(CcvError::InvalidPacketData)?;

    let timeout_height_zero = packet
        .timeout_height
        .as_ref()
        .map_or(true, |h| h.revision_number == 0 && h.revision_height == 0);
    if timeout_height_zero && packet.timeout_timestamp == 0 {
        return Err(CcvError::InvalidPacketData(
            "packet timeout height and packet timeout timestamp cannot both be 0".to_string(),
        ));
    }
    if packet.data.is_empty() {
        return Err(CcvError::InvalidPacketData(
            "packet data bytes cannot be empty".to_string(),
        ));
    }
    Ok(())
}
