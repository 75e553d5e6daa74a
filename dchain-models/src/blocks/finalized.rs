// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use serde::{Deserialize, Serialize};

use super::{AdminBlock, DirectoryBlock, Entry, EntryBlock, EntryCreditBlock, FactoidBlock};
use crate::config::{ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID};
use crate::error::ModelsError;

/// Everything written for one height, as a single transactional unit.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FinalizedBlock {
    /// directory block
    pub directory_block: DirectoryBlock,
    /// admin block
    pub admin_block: AdminBlock,
    /// factoid block
    pub factoid_block: FactoidBlock,
    /// entry-credit block
    pub ec_block: EntryCreditBlock,
    /// entry blocks, sorted by chain
    pub entry_blocks: Vec<EntryBlock>,
    /// revealed entries
    pub entries: Vec<Entry>,
}

impl FinalizedBlock {
    /// height
    pub fn height(&self) -> u32 {
        self.directory_block.db_height()
    }

    /// directory block keymr
    pub fn keymr(&self) -> Hash {
        self.directory_block.keymr()
    }

    /// Checks that the directory block body lists exactly the keymrs of the other blocks.
    pub fn check_consistency(&self) -> Result<(), ModelsError> {
        let db = &self.directory_block;
        let expect = |chain: &Hash, keymr: Hash, name: &str| -> Result<(), ModelsError> {
            match db.keymr_of(chain) {
                Some(listed) if listed == keymr => Ok(()),
                _ => Err(ModelsError::InconsistentBlock(format!(
                    "{} keymr not listed in directory block {}",
                    name,
                    db.db_height()
                ))),
            }
        };
        expect(&ADMIN_CHAIN_ID, self.admin_block.keymr(), "admin")?;
        expect(&EC_CHAIN_ID, self.ec_block.keymr(), "entry credit")?;
        expect(&FACTOID_CHAIN_ID, self.factoid_block.keymr(), "factoid")?;
        for eb in &self.entry_blocks {
            expect(&eb.chain_id.0, eb.keymr(), "entry")?;
        }
        Ok(())
    }
}
