//! Typed builders for the CCV store keys.
//!
//! Numeric key components (packet sequences and timestamps) are encoded as
//! fixed-width big-endian integers so that the store's ascending byte order
//! equals ascending numeric (and therefore chronological) order. The
//! time-indexed scanners rely on this to stop at the first immature entry.

use cosmwasm_std::Timestamp;

use crate::CcvError;

/// Separator between the components of composite keys
pub const KEY_SEPARATOR: u8 = b'/';

/// Singleton key holding the bound port identifier
pub const PORT_KEY: &[u8] = b"port";
/// Child singleton key holding the parent chain identifier
pub const PARENT_CHAIN_KEY: &[u8] = b"parentchain";
/// Child singleton key holding the parent light client identifier
pub const PARENT_CLIENT_KEY: &[u8] = b"parentclient";
/// Child singleton key holding the established parent channel identifier
pub const PARENT_CHANNEL_KEY: &[u8] = b"parentchannel";
/// Child singleton key holding the validator changes not yet flushed to consensus
pub const PENDING_CHANGES_KEY: &[u8] = b"pendingchanges";

/// Child prefix for received packets awaiting their unbonding period
pub const UNBONDING_PACKET_PREFIX: &[u8] = b"unbondingpacket";
/// Child prefix for the unbonding maturity time of received packets
pub const UNBONDING_TIME_PREFIX: &[u8] = b"unbondingtime";

/// Parent prefix mapping a child chain ID to its CCV channel
pub const CHAIN_TO_CHANNEL_PREFIX: &[u8] = b"chaintochannel";
/// Parent prefix mapping a CCV channel to its child chain ID
pub const CHANNEL_TO_CHAIN_PREFIX: &[u8] = b"channeltochain";
/// Parent prefix mapping a child chain ID to the light client created for it
pub const CHAIN_TO_CLIENT_PREFIX: &[u8] = b"chaintoclient";
/// Parent prefix for validator changes sent but not yet acknowledged
pub const UNBONDING_CHANGES_PREFIX: &[u8] = b"unbondingchanges";
/// Parent prefix for light clients scheduled for a future spawn time
pub const PENDING_CLIENT_PREFIX: &[u8] = b"pendingclient";

/// Shared prefix for the channel status register
pub const CHANNEL_STATUS_PREFIX: &[u8] = b"channelstatus";

fn with_separator(prefix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1);
    key.extend_from_slice(prefix);
    key.push(KEY_SEPARATOR);
    key
}

fn string_key(prefix: &[u8], id: &str) -> Vec<u8> {
    let mut key = with_separator(prefix);
    key.extend_from_slice(id.as_bytes());
    key
}

fn sequence_key(prefix: &[u8], sequence: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

/// `unbondingpacket<sequence:8 BE>`
#[must_use]
pub fn unbonding_packet_key(sequence: u64) -> Vec<u8> {
    sequence_key(UNBONDING_PACKET_PREFIX, sequence)
}

/// `unbondingtime<sequence:8 BE>`
#[must_use]
pub fn unbonding_time_key(sequence: u64) -> Vec<u8> {
    sequence_key(UNBONDING_TIME_PREFIX, sequence)
}

/// `chaintochannel/<chainID>`
#[must_use]
pub fn chain_to_channel_key(chain_id: &str) -> Vec<u8> {
    string_key(CHAIN_TO_CHANNEL_PREFIX, chain_id)
}

/// The prefix under which every `chaintochannel/<chainID>` entry lives
#[must_use]
pub fn chain_to_channel_prefix() -> Vec<u8> {
    with_separator(CHAIN_TO_CHANNEL_PREFIX)
}

/// `channeltochain/<channelID>`
#[must_use]
pub fn channel_to_chain_key(channel_id: &str) -> Vec<u8> {
    string_key(CHANNEL_TO_CHAIN_PREFIX, channel_id)
}

/// The prefix under which every `channeltochain/<channelID>` entry lives
#[must_use]
pub fn channel_to_chain_prefix() -> Vec<u8> {
    with_separator(CHANNEL_TO_CHAIN_PREFIX)
}

/// `chaintoclient/<chainID>`
#[must_use]
pub fn chain_to_client_key(chain_id: &str) -> Vec<u8> {
    string_key(CHAIN_TO_CLIENT_PREFIX, chain_id)
}

/// The prefix under which every `chaintoclient/<chainID>` entry lives
#[must_use]
pub fn chain_to_client_prefix() -> Vec<u8> {
    with_separator(CHAIN_TO_CLIENT_PREFIX)
}

/// `channelstatus/<channelID>`
#[must_use]
pub fn channel_status_key(channel_id: &str) -> Vec<u8> {
    string_key(CHANNEL_STATUS_PREFIX, channel_id)
}

/// `unbondingchanges/<chainID>/<sequence:8 BE>`
#[must_use]
pub fn unbonding_changes_key(chain_id: &str, sequence: u64) -> Vec<u8> {
    let mut key = string_key(UNBONDING_CHANGES_PREFIX, chain_id);
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

/// The prefix under which every `unbondingchanges/...` entry lives
#[must_use]
pub fn unbonding_changes_prefix() -> Vec<u8> {
    with_separator(UNBONDING_CHANGES_PREFIX)
}

/// `pendingclient/<spawnTime:8 BE>/<chainID>`
///
/// The spawn time is the first component, so ascending key order is
/// chronological with ties broken by chain ID.
#[must_use]
pub fn pending_client_key(spawn_time: Timestamp, chain_id: &str) -> Vec<u8> {
    let mut key = with_separator(PENDING_CLIENT_PREFIX);
    key.extend_from_slice(&spawn_time.nanos().to_be_bytes());
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(chain_id.as_bytes());
    key
}

/// The prefix under which every `pendingclient/...` entry lives
#[must_use]
pub fn pending_client_prefix() -> Vec<u8> {
    with_separator(PENDING_CLIENT_PREFIX)
}

/// Decodes a big-endian `u64` stored as a key component or value.
/// # Errors
/// Returns an error if the slice is not exactly eight bytes
pub fn decode_u64(bz: &[u8]) -> Result<u64, CcvError> {
    let bytes: [u8; 8] = bz
        .try_into()
        .map_err(|_| CcvError::CorruptStore(format!("expected 8 bytes, got {}", bz.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Extracts the sequence from an `unbondingpacket`/`unbondingtime` key.
/// # Errors
/// Returns an error if the key does not start with `prefix` followed by eight bytes
pub fn parse_sequence_key(prefix: &[u8], key: &[u8]) -> Result<u64, CcvError> {
    let rest = key
        .strip_prefix(prefix)
        .ok_or_else(|| CcvError::CorruptStore("key outside of the expected prefix".to_string()))?;
    decode_u64(rest)
}

/// Extracts the identifier from a `<prefix>/<id>` key.
/// # Errors
/// Returns an error if the key is outside the prefix or the identifier is not UTF-8
pub fn parse_string_key(prefix: &[u8], key: &[u8]) -> Result<String, CcvError> {
    let rest = key
        .strip_prefix(with_separator(prefix).as_slice())
        .ok_or_else(|| CcvError::CorruptStore("key outside of the expected prefix".to_string()))?;
    String::from_utf8(rest.to_vec()).map_err(|e| CcvError::CorruptStore(e.to_string()))
}

/// Extracts `(spawn_time, chain_id)` from a pending client key.
/// # Errors
/// Returns an error if the key does not have the pending client layout
pub fn parse_pending_client_key(key: &[u8]) -> Result<(Timestamp, String), CcvError> {
    let rest = key
        .strip_prefix(pending_client_prefix().as_slice())
        .ok_or_else(|| CcvError::CorruptStore("key outside of the pending client prefix".to_string()))?;
    if rest.len() < 9 || rest[8] != KEY_SEPARATOR {
        return Err(CcvError::CorruptStore(
            "pending client key is not <time>/<chainID>".to_string(),
        ));
    }
    let spawn_time = Timestamp::from_nanos(decode_u64(&rest[..8])?);
    let chain_id =
        String::from_utf8(rest[9..].to_vec()).map_err(|e| CcvError::CorruptStore(e.to_string()))?;
    Ok((spawn_time, chain_id))
}

/// Extracts `(chain_id, sequence)` from an unbonding changes key.
/// # Errors
/// Returns an error if the key does not have the unbonding changes layout
pub fn parse_unbonding_changes_key(key: &[u8]) -> Result<(String, u64), CcvError> {
    let rest = key
        .strip_prefix(unbonding_changes_prefix().as_slice())
        .ok_or_else(|| CcvError::CorruptStore("key outside of the unbonding changes prefix".to_string()))?;
    if rest.len() < 9 || rest[rest.len() - 9] != KEY_SEPARATOR {
        return Err(CcvError::CorruptStore(
            "unbonding changes key is not <chainID>/<sequence>".to_string(),
        ));
    }
    let (chain_id, sequence) = rest.split_at(rest.len() - 9);
    let chain_id =
        String::from_utf8(chain_id.to_vec()).map_err(|e| CcvError::CorruptStore(e.to_string()))?;
    Ok((chain_id, decode_u64(&sequence[1..])?))
}
