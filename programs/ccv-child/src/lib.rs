#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![warn(clippy::nursery, clippy::pedantic)]

pub mod genesis;
pub mod keeper;
pub mod module;
pub mod relay;

#[cfg(test)]
mod test;

pub use keeper::Keeper;
pub use module::ChildModule;
