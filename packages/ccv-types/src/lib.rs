#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![warn(clippy::nursery, clippy::pedantic)]

//! Shared vocabulary of the cross-chain validation protocol

pub mod client;
pub mod config;
pub mod error;
pub mod expected_keepers;
pub mod genesis;
pub mod host;
pub mod keys;
pub mod packet;
pub mod proposal;
pub mod status;
pub mod store;

pub use error::CcvError;
pub use packet::ValidatorSetChangePacketData;
pub use status::{get_channel_status, set_channel_status, Status};

/// Channel version negotiated by both ends of a CCV channel
pub const VERSION: &str = "1";
/// Default port bound by the child module
pub const CHILD_PORT_ID: &str = "child";
/// Default port bound by the parent module
pub const PARENT_PORT_ID: &str = "parent";
