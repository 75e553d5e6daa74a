// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::config::DIRECTORY_BLOCK_VERSION;
use crate::serialization::{merkle_root, CanonicalSerializer, Serializer};

/// Directory block header. Signed by every leader in the next height's DBSig round.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DirectoryBlockHeader {
    /// format version
    pub version: u8,
    /// network the block belongs to
    pub network_id: u32,
    /// height
    pub db_height: u32,
    /// leader timestamp of the block
    pub timestamp: ChainTime,
    /// key merkle root of the previous directory block
    pub prev_keymr: Hash,
    /// full hash of the previous directory block (ledger link)
    pub prev_full_hash: Hash,
    /// merkle root of the body
    pub body_mr: Hash,
    /// number of body entries
    pub block_count: u32,
}

impl DirectoryBlockHeader {
    /// hash of the header bytes
    pub fn hash(&self) -> Hash {
        CanonicalSerializer.hash(self)
    }

    /// Key merkle root: the id of a directory block.
    pub fn keymr(&self) -> Hash {
        Hash::chain(&self.hash(), &self.body_mr)
    }
}

impl Serializer<DirectoryBlockHeader> for CanonicalSerializer {
    fn serialize(&self, value: &DirectoryBlockHeader, buffer: &mut Vec<u8>) {
        self.serialize(&value.version, buffer);
        self.serialize(&value.network_id, buffer);
        self.serialize(&value.db_height, buffer);
        self.serialize(&value.timestamp, buffer);
        self.serialize(&value.prev_keymr, buffer);
        self.serialize(&value.prev_full_hash, buffer);
        self.serialize(&value.body_mr, buffer);
        self.serialize(&value.block_count, buffer);
    }
}

/// One body line of a directory block: a chain and the key merkle root of its block.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DBEntry {
    /// chain id (special chains for admin, entry-credit and factoid blocks)
    pub chain_id: Hash,
    /// key merkle root of the block for that chain
    pub keymr: Hash,
}

impl Serializer<DBEntry> for CanonicalSerializer {
    fn serialize(&self, value: &DBEntry, buffer: &mut Vec<u8>) {
        self.serialize(&value.chain_id, buffer);
        self.serialize(&value.keymr, buffer);
    }
}

/// Directory block: the root of a height.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DirectoryBlock {
    /// header
    pub header: DirectoryBlockHeader,
    /// admin, entry-credit and factoid lines first, then entry blocks sorted by chain
    pub entries: Vec<DBEntry>,
}

impl DirectoryBlock {
    /// Empty block at `db_height`. Links and body are filled in later.
    pub fn new(network_id: u32, db_height: u32, timestamp: ChainTime) -> Self {
        let mut block = DirectoryBlock {
            header: DirectoryBlockHeader {
                version: DIRECTORY_BLOCK_VERSION,
                network_id,
                db_height,
                timestamp,
                prev_keymr: Hash::ZERO,
                prev_full_hash: Hash::ZERO,
                body_mr: Hash::ZERO,
                block_count: 0,
            },
            entries: Vec::new(),
        };
        block.rebuild_body_mr();
        block
    }

    /// height
    pub fn db_height(&self) -> u32 {
        self.header.db_height
    }

    /// key merkle root
    pub fn keymr(&self) -> Hash {
        self.header.keymr()
    }

    /// Hash of header and body bytes.
    pub fn full_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.header, &mut buffer);
        CanonicalSerializer.serialize(&self.entries, &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// Replaces the body and recomputes the body merkle root.
    pub fn set_entries(&mut self, entries: Vec<DBEntry>) {
        self.entries = entries;
        self.rebuild_body_mr();
    }

    /// keymr listed for `chain_id`, if any
    pub fn keymr_of(&self, chain_id: &Hash) -> Option<Hash> {
        self.entries
            .iter()
            .find(|entry| &entry.chain_id == chain_id)
            .map(|entry| entry.keymr)
    }

    fn rebuild_body_mr(&mut self) {
        let leaves: Vec<Hash> = self.entries.iter().map(|e| CanonicalSerializer.hash(e)).collect();
        self.header.body_mr = merkle_root(&leaves);
        self.header.block_count = self.entries.len() as u32;
    }
}
