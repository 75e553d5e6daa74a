// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use serde::{Deserialize, Serialize};

use crate::config::BYTES_PER_CREDIT;
use crate::identity::ChainId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// User data written to a chain.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Entry {
    /// destination chain
    pub chain_id: ChainId,
    /// external ids
    pub ext_ids: Vec<Vec<u8>>,
    /// payload
    pub content: Vec<u8>,
}

impl Entry {
    /// entry hash
    pub fn hash(&self) -> Hash {
        CanonicalSerializer.hash(self)
    }

    /// bytes paid for
    pub fn payload_size(&self) -> usize {
        self.ext_ids.iter().map(|id| id.len()).sum::<usize>() + self.content.len()
    }

    /// Credits needed to write this entry (at least one).
    pub fn credits_required(&self) -> u8 {
        let size = self.payload_size();
        let credits = size.div_ceil(BYTES_PER_CREDIT).max(1);
        u8::try_from(credits).unwrap_or(u8::MAX)
    }
}

impl Serializer<Entry> for CanonicalSerializer {
    fn serialize(&self, value: &Entry, buffer: &mut Vec<u8>) {
        self.serialize(&value.chain_id, buffer);
        self.serialize(&(value.ext_ids.len() as u64), buffer);
        for ext_id in &value.ext_ids {
            self.serialize(ext_id.as_slice(), buffer);
        }
        self.serialize(value.content.as_slice(), buffer);
    }
}

/// Entry block line.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EBEntry {
    /// revealed entry
    Entry(Hash),
    /// end of a minute
    Minute(u8),
}

impl Serializer<EBEntry> for CanonicalSerializer {
    fn serialize(&self, value: &EBEntry, buffer: &mut Vec<u8>) {
        match value {
            EBEntry::Entry(hash) => {
                self.serialize(&0u8, buffer);
                self.serialize(hash, buffer);
            }
            EBEntry::Minute(minute) => {
                self.serialize(&1u8, buffer);
                self.serialize(minute, buffer);
            }
        }
    }
}

/// Entries written to one chain during one height.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EntryBlock {
    /// chain
    pub chain_id: ChainId,
    /// height
    pub db_height: u32,
    /// keymr of the previous block of this chain
    pub prev_keymr: Hash,
    /// lines
    pub entries: Vec<EBEntry>,
}

impl EntryBlock {
    /// empty block for `chain_id`
    pub fn new(chain_id: ChainId, db_height: u32) -> Self {
        EntryBlock {
            chain_id,
            db_height,
            prev_keymr: Hash::ZERO,
            entries: Vec::new(),
        }
    }

    /// entry hashes, without minute markers
    pub fn entry_hashes(&self) -> impl Iterator<Item = &Hash> {
        self.entries.iter().filter_map(|line| match line {
            EBEntry::Entry(hash) => Some(hash),
            EBEntry::Minute(_) => None,
        })
    }

    /// Appends a minute marker, unless the block is empty or already ends with one.
    pub fn add_minute_marker(&mut self, minute: u8) {
        if let Some(EBEntry::Entry(_)) = self.entries.last() {
            self.entries.push(EBEntry::Minute(minute));
        }
    }

    /// key merkle root
    pub fn keymr(&self) -> Hash {
        CanonicalSerializer.hash(self)
    }
}

impl Serializer<EntryBlock> for CanonicalSerializer {
    fn serialize(&self, value: &EntryBlock, buffer: &mut Vec<u8>) {
        self.serialize(&value.chain_id, buffer);
        self.serialize(&value.db_height, buffer);
        self.serialize(&value.prev_keymr, buffer);
        self.serialize(&value.entries, buffer);
    }
}
