// Copyright (c) 2024 DCHAIN LABS
use dchain_hash::Hash;
use dchain_models::blocks::FinalizedBlock;

/// Key spaces of the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// directory blocks by keymr
    DirectoryBlock,
    /// admin blocks by keymr
    AdminBlock,
    /// entry-credit blocks by keymr
    EntryCreditBlock,
    /// factoid blocks by keymr
    FactoidBlock,
    /// entry blocks by keymr
    EntryBlock,
    /// entries by hash
    Entry,
    /// height that included a message, by message hash
    IncludedIn,
}

/// Writes applied atomically by [`crate::DatabaseController::write_batch`].
#[derive(Debug, Clone, Default)]
pub struct DBBatch {
    /// finished heights, in increasing order
    pub blocks: Vec<FinalizedBlock>,
    /// message hashes included by each height
    pub included: Vec<(Hash, u32)>,
}

impl DBBatch {
    /// empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a finished height with the hashes of the messages it included.
    pub fn add_block(&mut self, block: FinalizedBlock, included: impl IntoIterator<Item = Hash>) {
        let height = block.height();
        self.included
            .extend(included.into_iter().map(|hash| (hash, height)));
        self.blocks.push(block);
    }

    /// true if nothing would be written
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.included.is_empty()
    }
}
