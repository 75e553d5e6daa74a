// Copyright (c) 2024 DCHAIN LABS
use dchain_hash::Hash;
use dchain_models::{
    blocks::{AdminEntry, DBEntry, DirectoryBlock, FinalizedBlock},
    config::{ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID},
    IdentityId,
};
use dchain_signature::Signature;
use dchain_time::ChainTime;

use crate::process_list::ProcessList;

/// One finished height on its way to the database.
///
/// Flags only move forward and `saved ⇒ signed ⇒ locked` always holds.
#[derive(Debug, Clone)]
pub struct DBState {
    /// directory, admin, factoid, entry-credit and entry blocks
    pub block: FinalizedBlock,
    /// message and entry hashes written to the included-in index
    pub included: Vec<Hash>,
    /// signatures of the directory block keymr received with the block
    pub signatures: Vec<(IdentityId, Signature)>,
    /// built locally, links not fixed yet
    pub is_new: bool,
    /// balances and authorities applied
    pub locked: bool,
    /// enough signatures seen
    pub signed: bool,
    /// may be written once signed
    pub ready_to_save: bool,
    /// written to the database
    pub saved: bool,
    /// height already processed before, nothing to apply
    pub repeat: bool,
    /// signatures checked on reception from the network
    pub sigs_verified: bool,
}

impl DBState {
    fn with_block(block: FinalizedBlock) -> Self {
        DBState {
            block,
            included: Vec::new(),
            signatures: Vec::new(),
            is_new: false,
            locked: false,
            signed: false,
            ready_to_save: false,
            saved: false,
            repeat: false,
            sigs_verified: false,
        }
    }

    /// Assembles the blocks of a complete process list. Links are fixed later.
    pub fn from_process_list(pl: &ProcessList, network_id: u32, timestamp: ChainTime) -> Self {
        let mut admin_block = pl.admin_block.clone();
        admin_block
            .entries
            .sort_by_key(|entry| !matches!(entry, AdminEntry::DBSignature { .. }));
        let mut included: Vec<Hash> = pl.message_hashes().copied().collect();
        included.extend(pl.commits_by_entry.keys().copied());
        included.sort_unstable();
        let block = FinalizedBlock {
            directory_block: DirectoryBlock::new(network_id, pl.db_height, timestamp),
            admin_block,
            factoid_block: pl.factoid_block.clone(),
            ec_block: pl.ec_block.clone(),
            entry_blocks: pl.entry_blocks.values().cloned().collect(),
            entries: pl.entries.clone(),
        };
        DBState {
            included,
            is_new: true,
            ..DBState::with_block(block)
        }
    }

    /// Block received from peers with the signatures that vouch for it.
    pub fn from_network(block: FinalizedBlock, signatures: Vec<(IdentityId, Signature)>) -> Self {
        DBState {
            signatures,
            sigs_verified: true,
            ..DBState::with_block(block)
        }
    }

    /// Block read back from the database.
    pub fn from_database(block: FinalizedBlock) -> Self {
        DBState {
            locked: true,
            signed: true,
            ready_to_save: true,
            saved: true,
            ..DBState::with_block(block)
        }
    }

    /// height
    pub fn height(&self) -> u32 {
        self.block.height()
    }

    /// directory block keymr
    pub fn keymr(&self) -> Hash {
        self.block.keymr()
    }

    /// true if the flag ordering holds
    pub fn flags_consistent(&self) -> bool {
        (!self.saved || self.signed) && (!self.signed || self.locked)
    }

    /// Links the blocks to those of `prev` and rebuilds the directory body.
    pub fn link_to(&mut self, prev: &DBState) {
        let prev_block = &prev.block;
        let block = &mut self.block;
        block.directory_block.header.prev_keymr = prev_block.keymr();
        block.directory_block.header.prev_full_hash = prev_block.directory_block.full_hash();
        block.admin_block.prev_back_ref_hash = prev_block.admin_block.hash();
        block.ec_block.prev_header_hash = prev_block.ec_block.header_hash();
        block.factoid_block.prev_keymr = prev_block.factoid_block.keymr();
        self.rebuild_directory_entries();
    }

    /// Lists the admin, entry-credit and factoid keymrs, then the entry
    /// blocks sorted by chain, in the directory block body.
    pub fn rebuild_directory_entries(&mut self) {
        let block = &mut self.block;
        block.entry_blocks.sort_by_key(|eb| eb.chain_id);
        let mut entries = vec![
            DBEntry {
                chain_id: ADMIN_CHAIN_ID,
                keymr: block.admin_block.keymr(),
            },
            DBEntry {
                chain_id: EC_CHAIN_ID,
                keymr: block.ec_block.keymr(),
            },
            DBEntry {
                chain_id: FACTOID_CHAIN_ID,
                keymr: block.factoid_block.keymr(),
            },
        ];
        entries.extend(block.entry_blocks.iter().map(|eb| DBEntry {
            chain_id: eb.chain_id.0,
            keymr: eb.keymr(),
        }));
        block.directory_block.set_entries(entries);
    }
}
