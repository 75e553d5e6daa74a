// Copyright (c) 2024 DCHAIN LABS
use dchain_consensus_exports::{error::ConsensusError, AckStatus};
use dchain_hash::Hash;
use dchain_models::Message;

use super::ConsensusState;

impl ConsensusState {
    /// Where the message `hash` stands: in a process list, rejected, held,
    /// or written to the database.
    pub fn get_ack_status(&self, hash: &Hash) -> Result<AckStatus, ConsensusError> {
        if let Some(pl) = self
            .process_lists
            .iter()
            .find(|pl| pl.message_index.contains_key(hash))
        {
            return Ok(if self.dbstates.is_saved(pl.db_height) {
                AckStatus::DBlockConfirmed
            } else {
                AckStatus::Ack
            });
        }
        if self.invalid.peek(hash).is_some() {
            return Ok(AckStatus::Invalid);
        }
        if self.holding.contains(hash) || self.acks.contains_key(hash) {
            return Ok(AckStatus::NotConfirmed);
        }
        if self.channels.database.fetch_included_in(hash)?.is_some() {
            return Ok(AckStatus::DBlockConfirmed);
        }
        Ok(AckStatus::Unknown)
    }

    /// Status of the commit paying for `entry_hash`.
    pub fn get_entry_commit_ack(&self, entry_hash: &Hash) -> Result<AckStatus, ConsensusError> {
        if let Some(commit) = self.commits.get(entry_hash) {
            return self.get_ack_status(&commit.msg_hash());
        }
        if let Some(commit_hash) = self
            .process_lists
            .iter()
            .find_map(|pl| pl.commits_by_entry.get(entry_hash))
        {
            return self.get_ack_status(commit_hash);
        }
        let held = self.holding.find(|message| {
            matches!(message, Message::CommitChain(_) | Message::CommitEntry(_))
                && message.entry_hash().as_ref() == Some(entry_hash)
        });
        if held.is_some() {
            return Ok(AckStatus::NotConfirmed);
        }
        if self.channels.database.fetch_included_in(entry_hash)?.is_some() {
            return Ok(AckStatus::DBlockConfirmed);
        }
        Ok(AckStatus::Unknown)
    }
}
