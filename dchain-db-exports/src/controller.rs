// Copyright (c) 2024 DCHAIN LABS
use crate::{Bucket, DBBatch, DBError};
use dchain_hash::Hash;
use dchain_models::blocks::{DirectoryBlock, FinalizedBlock};

/// Block database used by consensus.
///
/// Finished heights are only ever written through [`DatabaseController::write_batch`]:
/// all the blocks of a batch become visible together or not at all.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait DatabaseController: Send + Sync {
    /// Directory block at the highest saved height, `None` on an empty database.
    fn fetch_directory_block_head(&self) -> Result<Option<DirectoryBlock>, DBError>;

    /// Directory block at `height`.
    fn fetch_dblock_by_height(&self, height: u32) -> Result<Option<DirectoryBlock>, DBError>;

    /// Directory block with the given key merkle root.
    fn fetch_dblock_by_keymr(&self, keymr: &Hash) -> Result<Option<DirectoryBlock>, DBError>;

    /// Everything written for `height`.
    fn fetch_block_by_height(&self, height: u32) -> Result<Option<FinalizedBlock>, DBError>;

    /// Height that included a message or entry hash.
    fn fetch_included_in(&self, hash: &Hash) -> Result<Option<u32>, DBError>;

    /// Atomically writes every block of the batch.
    fn write_batch(&self, batch: DBBatch) -> Result<(), DBError>;

    /// Whether `key` exists in `bucket`.
    fn does_key_exist(&self, bucket: Bucket, key: &Hash) -> Result<bool, DBError>;

    /// Drops data the configuration no longer asks to keep.
    fn trim(&self) -> Result<(), DBError>;

    /// Closes the database. Later calls fail with [`DBError::Closed`].
    fn close(&self) -> Result<(), DBError>;
}
