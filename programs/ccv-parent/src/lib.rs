#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![warn(clippy::nursery, clippy::pedantic)]

pub mod genesis;
pub mod keeper;
pub mod module;
pub mod proposal_handler;
pub mod relay;
pub mod scheduler;

#[cfg(test)]
mod test;

pub use keeper::Keeper;
pub use module::ParentModule;
pub use proposal_handler::handle_create_child_chain_proposal;
