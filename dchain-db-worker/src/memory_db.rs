// Copyright (c) 2024 DCHAIN LABS
use std::collections::{BTreeMap, HashMap};

use dchain_db_exports::{Bucket, DBBatch, DBError, DatabaseController, DbConfig};
use dchain_hash::Hash;
use dchain_models::blocks::{DirectoryBlock, FinalizedBlock};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Default)]
struct Store {
    closed: bool,
    blocks: BTreeMap<u32, FinalizedBlock>,
    keys: HashMap<Bucket, HashMap<Hash, u32>>,
}

impl Store {
    fn index_block(&mut self, block: &FinalizedBlock) {
        let height = block.height();
        let mut put = |bucket: Bucket, key: Hash| {
            self.keys.entry(bucket).or_default().insert(key, height);
        };
        put(Bucket::DirectoryBlock, block.directory_block.keymr());
        put(Bucket::AdminBlock, block.admin_block.keymr());
        put(Bucket::EntryCreditBlock, block.ec_block.keymr());
        put(Bucket::FactoidBlock, block.factoid_block.keymr());
        for eb in &block.entry_blocks {
            put(Bucket::EntryBlock, eb.keymr());
        }
        for entry in &block.entries {
            put(Bucket::Entry, entry.hash());
            put(Bucket::IncludedIn, entry.hash());
        }
        for line in &block.ec_block.entries {
            if let Some(commit) = line.commit_hash() {
                put(Bucket::IncludedIn, *commit);
            }
        }
    }
}

/// Block database kept in memory, transactional per batch.
pub struct MemoryDB {
    config: DbConfig,
    store: RwLock<Store>,
}

impl MemoryDB {
    /// empty database
    pub fn new(config: DbConfig) -> Self {
        MemoryDB {
            config,
            store: RwLock::new(Store::default()),
        }
    }
}

impl DatabaseController for MemoryDB {
    fn fetch_directory_block_head(&self) -> Result<Option<DirectoryBlock>, DBError> {
        let store = self.store.read();
        if store.closed {
            return Err(DBError::Closed);
        }
        Ok(store
            .blocks
            .values()
            .next_back()
            .map(|b| b.directory_block.clone()))
    }

    fn fetch_dblock_by_height(&self, height: u32) -> Result<Option<DirectoryBlock>, DBError> {
        Ok(self
            .fetch_block_by_height(height)?
            .map(|block| block.directory_block))
    }

    fn fetch_dblock_by_keymr(&self, keymr: &Hash) -> Result<Option<DirectoryBlock>, DBError> {
        let height = {
            let store = self.store.read();
            if store.closed {
                return Err(DBError::Closed);
            }
            store
                .keys
                .get(&Bucket::DirectoryBlock)
                .and_then(|keys| keys.get(keymr).copied())
        };
        match height {
            Some(height) => self.fetch_dblock_by_height(height),
            None => Ok(None),
        }
    }

    fn fetch_block_by_height(&self, height: u32) -> Result<Option<FinalizedBlock>, DBError> {
        let store = self.store.read();
        if store.closed {
            return Err(DBError::Closed);
        }
        Ok(store.blocks.get(&height).cloned())
    }

    fn fetch_included_in(&self, hash: &Hash) -> Result<Option<u32>, DBError> {
        let store = self.store.read();
        if store.closed {
            return Err(DBError::Closed);
        }
        Ok(store
            .keys
            .get(&Bucket::IncludedIn)
            .and_then(|keys| keys.get(hash).copied()))
    }

    fn write_batch(&self, batch: DBBatch) -> Result<(), DBError> {
        let mut store = self.store.write();
        if store.closed {
            return Err(DBError::Closed);
        }
        // check everything before touching the store
        for block in &batch.blocks {
            block.check_consistency()?;
            if let Some(existing) = store.blocks.get(&block.height()) {
                if existing.keymr() != block.keymr() {
                    return Err(DBError::Conflict(block.height()));
                }
            }
        }
        for block in batch.blocks {
            debug!("database: writing block {}", block.height());
            store.index_block(&block);
            store.blocks.insert(block.height(), block);
        }
        let included = store.keys.entry(Bucket::IncludedIn).or_default();
        for (hash, height) in batch.included {
            included.insert(hash, height);
        }
        Ok(())
    }

    fn does_key_exist(&self, bucket: Bucket, key: &Hash) -> Result<bool, DBError> {
        let store = self.store.read();
        if store.closed {
            return Err(DBError::Closed);
        }
        Ok(store
            .keys
            .get(&bucket)
            .map(|keys| keys.contains_key(key))
            .unwrap_or(false))
    }

    fn trim(&self) -> Result<(), DBError> {
        let Some(keep) = self.config.keep_heights else {
            return Ok(());
        };
        let mut store = self.store.write();
        if store.closed {
            return Err(DBError::Closed);
        }
        let Some(head) = store.blocks.keys().next_back().copied() else {
            return Ok(());
        };
        let floor = head.saturating_sub(keep);
        for (height, block) in store.blocks.iter_mut() {
            if *height >= floor {
                break;
            }
            block.entries.clear();
        }
        Ok(())
    }

    fn close(&self) -> Result<(), DBError> {
        self.store.write().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_models::blocks::{
        AdminBlock, DBEntry, DirectoryBlock, EntryCreditBlock, FactoidBlock,
    };
    use dchain_models::config::{ADMIN_CHAIN_ID, EC_CHAIN_ID, FACTOID_CHAIN_ID};
    use dchain_time::ChainTime;

    fn block(height: u32) -> FinalizedBlock {
        let admin_block = AdminBlock::new(height);
        let ec_block = EntryCreditBlock::new(height);
        let factoid_block = FactoidBlock::new(height, 1000);
        let mut directory_block = DirectoryBlock::new(0, height, ChainTime::from_millis(1));
        directory_block.set_entries(vec![
            DBEntry {
                chain_id: ADMIN_CHAIN_ID,
                keymr: admin_block.keymr(),
            },
            DBEntry {
                chain_id: EC_CHAIN_ID,
                keymr: ec_block.keymr(),
            },
            DBEntry {
                chain_id: FACTOID_CHAIN_ID,
                keymr: factoid_block.keymr(),
            },
        ]);
        FinalizedBlock {
            directory_block,
            admin_block,
            factoid_block,
            ec_block,
            entry_blocks: vec![],
            entries: vec![],
        }
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let db = MemoryDB::new(DbConfig::default());
        let mut broken = block(1);
        broken.admin_block.db_height = 99;
        let mut batch = DBBatch::new();
        batch.add_block(block(0), vec![]);
        batch.add_block(broken, vec![]);
        assert!(db.write_batch(batch).is_err());
        assert_eq!(db.fetch_directory_block_head().unwrap(), None);

        let mut batch = DBBatch::new();
        let b0 = block(0);
        let keymr = b0.keymr();
        batch.add_block(b0, vec![Hash::compute_from(b"eom")]);
        db.write_batch(batch).unwrap();
        assert_eq!(db.fetch_directory_block_head().unwrap().unwrap().keymr(), keymr);
        assert!(db.does_key_exist(Bucket::DirectoryBlock, &keymr).unwrap());
        assert_eq!(
            db.fetch_included_in(&Hash::compute_from(b"eom")).unwrap(),
            Some(0)
        );
        assert!(db.fetch_dblock_by_keymr(&keymr).unwrap().is_some());
    }

    #[test]
    fn test_closed_database_refuses() {
        let db = MemoryDB::new(DbConfig::default());
        db.close().unwrap();
        assert_eq!(db.fetch_directory_block_head(), Err(DBError::Closed));
    }
}
