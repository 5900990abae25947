//! The per-channel CCV status register shared by the parent and child keepers.

use cosmwasm_std::Storage;
use serde::{Deserialize, Serialize};

use crate::{keys, CcvError};

/// The trust state of one CCV channel.
///
/// A channel starts `Uninitialized`, becomes `Initializing` when the handshake
/// begins, `Validating` once validator-set changes flow over it and `Invalid`
/// after a packet timeout. `Invalid` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Status {
    /// No handshake has been observed for the channel
    #[default]
    Uninitialized = 0,
    /// The channel handshake is in progress
    Initializing = 1,
    /// Validator-set changes are being exchanged on the channel
    Validating = 2,
    /// The channel timed out and can no longer be trusted
    Invalid = 3,
}

impl Status {
    /// The single-byte code stored under the channel status key
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = CcvError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Initializing),
            2 => Ok(Self::Validating),
            3 => Ok(Self::Invalid),
            other => Err(CcvError::CorruptStore(format!(
                "unknown channel status code {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::Initializing => write!(f, "INITIALIZING"),
            Self::Validating => write!(f, "VALIDATING"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Stores the status of a CCV channel.
pub fn set_channel_status(storage: &mut dyn Storage, channel_id: &str, status: Status) {
    storage.set(&keys::channel_status_key(channel_id), &[status.code()]);
}

/// Reads the status of a CCV channel, `Uninitialized` when none is stored.
/// # Errors
/// Returns an error if the stored value is not a single known status code
pub fn get_channel_status(storage: &dyn Storage, channel_id: &str) -> Result<Status, CcvError> {
    match storage.get(&keys::channel_status_key(channel_id)) {
        None => Ok(Status::Uninitialized),
        Some(bz) => match bz.as_slice() {
            [code] => Status::try_from(*code),
            _ => Err(CcvError::CorruptStore(format!(
                "channel status for {channel_id} is {} bytes long",
                bz.len()
            ))),
        },
    }
}
