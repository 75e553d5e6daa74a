// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use serde::{Deserialize, Serialize};

use crate::identity::{ChainId, EcAddress};
use crate::serialization::{CanonicalSerializer, Serializer};

/// Entry-credit block line.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ECEntry {
    /// end of a minute
    MinuteNumber(u8),
    /// paid chain creation
    CommitChain {
        /// commit message hash
        commit_hash: Hash,
        /// new chain
        chain_id: ChainId,
        /// first entry
        entry_hash: Hash,
        /// payer
        address: EcAddress,
        /// credits paid
        credits: u8,
    },
    /// paid entry
    CommitEntry {
        /// commit message hash
        commit_hash: Hash,
        /// entry
        entry_hash: Hash,
        /// payer
        address: EcAddress,
        /// credits paid
        credits: u8,
    },
}

impl ECEntry {
    /// entry hash paid for by a commit line
    pub fn entry_hash(&self) -> Option<&Hash> {
        match self {
            ECEntry::CommitChain { entry_hash, .. } | ECEntry::CommitEntry { entry_hash, .. } => {
                Some(entry_hash)
            }
            ECEntry::MinuteNumber(_) => None,
        }
    }

    /// commit message hash of a commit line
    pub fn commit_hash(&self) -> Option<&Hash> {
        match self {
            ECEntry::CommitChain { commit_hash, .. }
            | ECEntry::CommitEntry { commit_hash, .. } => Some(commit_hash),
            ECEntry::MinuteNumber(_) => None,
        }
    }
}

impl Serializer<ECEntry> for CanonicalSerializer {
    fn serialize(&self, value: &ECEntry, buffer: &mut Vec<u8>) {
        match value {
            ECEntry::MinuteNumber(minute) => {
                self.serialize(&0u8, buffer);
                self.serialize(minute, buffer);
            }
            ECEntry::CommitChain {
                commit_hash,
                chain_id,
                entry_hash,
                address,
                credits,
            } => {
                self.serialize(&1u8, buffer);
                self.serialize(commit_hash, buffer);
                self.serialize(chain_id, buffer);
                self.serialize(entry_hash, buffer);
                self.serialize(&address.0, buffer);
                self.serialize(credits, buffer);
            }
            ECEntry::CommitEntry {
                commit_hash,
                entry_hash,
                address,
                credits,
            } => {
                self.serialize(&2u8, buffer);
                self.serialize(commit_hash, buffer);
                self.serialize(entry_hash, buffer);
                self.serialize(&address.0, buffer);
                self.serialize(credits, buffer);
            }
        }
    }
}

/// Entry-credit block of a height.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct EntryCreditBlock {
    /// height
    pub db_height: u32,
    /// header hash of the previous entry-credit block
    pub prev_header_hash: Hash,
    /// lines
    pub entries: Vec<ECEntry>,
}

impl EntryCreditBlock {
    /// empty block
    pub fn new(db_height: u32) -> Self {
        EntryCreditBlock {
            db_height,
            ..Default::default()
        }
    }

    /// hash of the header fields
    pub fn header_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.db_height, &mut buffer);
        CanonicalSerializer.serialize(&self.prev_header_hash, &mut buffer);
        CanonicalSerializer.serialize(&self.body_hash(), &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// hash of the lines
    pub fn body_hash(&self) -> Hash {
        CanonicalSerializer.hash(&self.entries)
    }

    /// key merkle root
    pub fn keymr(&self) -> Hash {
        Hash::chain(&self.header_hash(), &self.body_hash())
    }

    /// Appends the marker closing `minute`.
    pub fn add_minute_marker(&mut self, minute: u8) {
        self.entries.push(ECEntry::MinuteNumber(minute));
    }
}
