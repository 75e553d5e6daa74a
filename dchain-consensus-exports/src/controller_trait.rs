// Copyright (c) 2024 DCHAIN LABS
use dchain_channel::SendOutcome;
use dchain_hash::Hash;
use dchain_models::Message;

use crate::{error::ConsensusError, AckStatus};

/// Interface other components use to feed and query the consensus driver.
///
/// Heights are read from a shared status published after every driver pass.
/// Status queries go through the driver command queue and wait at most
/// `query_timeout` for the answer.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ConsensusController: Send + Sync {
    /// Highest height whose block is saved to the database.
    fn get_highest_saved_blk(&self) -> u32;

    /// Highest height this node heard of, from process lists or peers.
    fn get_highest_known_block(&self) -> u32;

    /// Height the leaders are currently building.
    fn get_leader_height(&self) -> u32;

    /// Status of a message, by message hash.
    fn get_ack_status(&self, hash: Hash) -> Result<AckStatus, ConsensusError>;

    /// Status of the commit paying for an entry.
    fn get_entry_commit_ack_by_entry_hash(
        &self,
        entry_hash: Hash,
    ) -> Result<AckStatus, ConsensusError>;

    /// Hands a message received from the network to the driver.
    /// Acks and blocks go to their own queues.
    fn register_message(&self, message: Message) -> SendOutcome;

    /// Returns a boxed clone of self.
    /// Useful to allow cloning `Box<dyn ConsensusController>`.
    fn clone_box(&self) -> Box<dyn ConsensusController>;
}

/// Allow cloning `Box<dyn ConsensusController>`
/// Uses `ConsensusController::clone_box` internally
impl Clone for Box<dyn ConsensusController> {
    fn clone(&self) -> Box<dyn ConsensusController> {
        self.clone_box()
    }
}

/// Consensus manager used to stop the consensus thread
pub trait ConsensusManager {
    /// Stop the consensus thread
    /// Note that we do not take self by value to consume it
    /// because it is not allowed to move out of `Box<dyn ConsensusManager>`
    /// This will improve if the `unsized_fn_params` feature stabilizes enough to be safely usable.
    fn stop(&mut self);
}
