// Copyright (c) 2024 DCHAIN LABS
//! Consensus driver of a node.
//!
//! One thread owns the whole [`ConsensusState`]: it drains the message, ack,
//! block and command queues, orders messages in per height process lists,
//! closes minutes and heights, collects directory block signatures and
//! writes finished blocks. A second thread asks peers for missing slots.
//! Other components talk to it through the `ConsensusController` returned by
//! [`start_consensus_worker`].
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod commands;
mod controller;
mod manager;
mod worker;

pub mod dbstate;
pub mod holding;
pub mod mmr;
pub mod process_list;
pub mod replay;
pub mod state;

pub use state::{create_genesis_block, ConsensusState, ConsensusStatus};
pub use worker::start_consensus_worker;

#[cfg(test)]
mod tests;
