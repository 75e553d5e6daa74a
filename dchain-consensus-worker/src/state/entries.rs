// Copyright (c) 2024 DCHAIN LABS
//! Commits pay for entries, reveals publish them. A reveal is only valid
//! once its commit was processed, and a chain must exist (or be created by
//! the commit) before entries go in it.
use dchain_db_exports::Bucket;
use dchain_hash::Hash;
use dchain_models::{
    config::{CHAIN_CREATION_CREDITS, MAX_ENTRY_SIZE},
    messages::RevealEntry,
    ChainId, Message,
};
use tracing::{debug, warn};

use super::{ConsensusState, Validity};
use crate::replay::REVEAL_REPLAY;

/// Credits paid by a commit for the entry itself.
fn entry_credits(commit: &Message) -> Option<u8> {
    match commit {
        Message::CommitChain(commit) => Some(commit.credits.saturating_sub(CHAIN_CREATION_CREDITS)),
        Message::CommitEntry(commit) => Some(commit.credits),
        _ => None,
    }
}

/// Total credits paid by a commit.
fn total_credits(commit: &Message) -> u8 {
    match commit {
        Message::CommitChain(commit) => commit.credits,
        Message::CommitEntry(commit) => commit.credits,
        _ => 0,
    }
}

impl ConsensusState {
    /// true if the entry was already written
    fn entry_in_database(&self, entry_hash: &Hash) -> bool {
        match self.channels.database.does_key_exist(Bucket::Entry, entry_hash) {
            Ok(exists) => exists,
            Err(err) => {
                warn!("could not look up entry {}: {}", entry_hash, err);
                false
            }
        }
    }

    /// true if the entry was revealed recently or written
    fn already_revealed(&self, entry_hash: &Hash) -> bool {
        !self.replay.lock().is_hash_unique(REVEAL_REPLAY, entry_hash)
            || self.entry_in_database(entry_hash)
    }

    /// True if `chain_id` has a saved entry block or is created by a
    /// processed reveal not applied yet.
    pub(crate) fn chain_exists(&self, chain_id: &ChainId) -> bool {
        self.chain_heads.contains_key(chain_id)
            || self
                .process_lists
                .iter()
                .filter(|pl| pl.db_height > self.processed_height)
                .any(|pl| pl.new_chains.contains(chain_id))
    }

    /// Checks a commit: well formed, not already revealed, paying more than
    /// a pending commit for the same entry, and covered by the balance.
    pub(crate) fn validate_commit(&mut self, message: &Message) -> Validity {
        let (entry_hash, credits, address, checked) = match message {
            Message::CommitChain(commit) => {
                (commit.entry_hash, commit.credits, commit.address(), commit.check())
            }
            Message::CommitEntry(commit) => {
                (commit.entry_hash, commit.credits, commit.address(), commit.check())
            }
            _ => return Validity::Invalid,
        };
        if let Err(err) = checked {
            debug!("malformed commit for entry {}: {}", entry_hash, err);
            return Validity::Invalid;
        }
        if self.already_revealed(&entry_hash) {
            return Validity::Invalid;
        }
        if let Some(existing) = self.commits.get(&entry_hash) {
            if total_credits(existing) >= credits {
                return Validity::Invalid;
            }
        }
        if self.effective_ec_balance(&address) < credits as i64 {
            return Validity::Hold;
        }
        Validity::Valid
    }

    /// Checks a reveal against its processed commit.
    pub(crate) fn validate_reveal(&mut self, reveal: &RevealEntry) -> Validity {
        let entry = &reveal.entry;
        let entry_hash = reveal.entry_hash();
        if entry.payload_size() > MAX_ENTRY_SIZE || self.already_revealed(&entry_hash) {
            return Validity::Invalid;
        }
        let Some(commit) = self.commits.get(&entry_hash) else {
            return Validity::Hold;
        };
        if entry_credits(commit).map_or(true, |paid| paid < entry.credits_required()) {
            return Validity::Invalid;
        }
        match commit {
            Message::CommitChain(commit) => {
                if commit.chain_id != entry.chain_id
                    || entry.chain_id != ChainId::from_ext_ids(&entry.ext_ids)
                    || self.chain_exists(&entry.chain_id)
                {
                    return Validity::Invalid;
                }
            }
            _ => {
                if !self.chain_exists(&entry.chain_id) {
                    return Validity::Hold;
                }
            }
        }
        Validity::Valid
    }

    /// Debits the payer and records the commit, releasing its reveal.
    pub(crate) fn process_commit(&mut self, db_height: u32, message: &Message) {
        let (entry_hash, address, credits) = match message {
            Message::CommitChain(commit) => (commit.entry_hash, commit.address(), commit.credits),
            Message::CommitEntry(commit) => (commit.entry_hash, commit.address(), commit.credits),
            _ => return,
        };
        if let Some(pl) = self.process_lists.get_mut(db_height) {
            *pl.ec_debits.entry(address).or_insert(0) += credits as u64;
        }
        let replace = self
            .commits
            .get(&entry_hash)
            .map_or(true, |existing| total_credits(existing) < credits);
        if replace {
            self.commits.insert(entry_hash, message.clone());
        }
        let released = self.holding.release(&entry_hash);
        self.released.extend(released);
    }

    /// Consumes the commit of a revealed entry.
    pub(crate) fn process_reveal(&mut self, db_height: u32, reveal: &RevealEntry) {
        let entry_hash = reveal.entry_hash();
        let commit = self.commits.remove(&entry_hash);
        self.replay
            .lock()
            .set_hash_now(REVEAL_REPLAY, &entry_hash, self.now());
        if let Some(Message::CommitChain(commit)) = commit {
            if let Some(pl) = self.process_lists.get_mut(db_height) {
                pl.new_chains.insert(commit.chain_id);
            }
        }
    }
}
