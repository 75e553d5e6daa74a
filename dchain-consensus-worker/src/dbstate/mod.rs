// Copyright (c) 2024 DCHAIN LABS
//! Finished heights and the window holding them until they are saved.
//!
//! [`DBStateList`] keeps `states[h - base]` for height `h`. Every state below
//! `base + complete` is saved; states above may be missing and are filled in
//! by local completion or by blocks received from peers.
mod state;

pub use state::DBState;

/// Window of [`DBState`], see the module documentation.
#[derive(Debug)]
pub struct DBStateList {
    base: u32,
    states: Vec<Option<DBState>>,
    complete: usize,
    highest_saved: u32,
    retention: usize,
}

impl DBStateList {
    /// Window starting with a saved state.
    pub fn new(first: DBState, retention: usize) -> Self {
        let base = first.height();
        let mut list = DBStateList {
            base,
            states: vec![Some(first)],
            complete: 0,
            highest_saved: base,
            retention: retention.max(1),
        };
        list.advance_complete();
        list
    }

    /// lowest height held
    pub fn base(&self) -> u32 {
        self.base
    }

    /// state at `db_height`
    pub fn get(&self, db_height: u32) -> Option<&DBState> {
        let index = db_height.checked_sub(self.base)? as usize;
        self.states.get(index)?.as_ref()
    }

    /// mutable state at `db_height`
    pub fn get_mut(&mut self, db_height: u32) -> Option<&mut DBState> {
        let index = db_height.checked_sub(self.base)? as usize;
        self.states.get_mut(index)?.as_mut()
    }

    /// highest state held
    pub fn last(&self) -> Option<&DBState> {
        self.states.iter().rev().flatten().next()
    }

    /// Highest saved height. Never decreases.
    pub fn highest_saved(&self) -> u32 {
        self.highest_saved
    }

    /// highest height of the contiguous saved prefix
    pub fn highest_complete(&self) -> u32 {
        (self.base + self.complete as u32).saturating_sub(1)
    }

    /// highest height held, saved or not
    pub fn highest_known(&self) -> u32 {
        self.last().map_or(self.highest_saved, DBState::height)
    }

    /// true if `db_height` is saved; trimmed heights are
    pub fn is_saved(&self, db_height: u32) -> bool {
        if db_height < self.base {
            return true;
        }
        self.get(db_height).map_or(false, |state| state.saved)
    }

    /// Inserts a state. Refused for heights already fully processed and for
    /// slots holding a state that is already locked.
    pub fn put(&mut self, state: DBState) -> bool {
        let Some(index) = state.height().checked_sub(self.base) else {
            return false;
        };
        let index = index as usize;
        if index < self.complete {
            return false;
        }
        if index >= self.states.len() {
            self.states.resize_with(index + 1, || None);
        }
        if let Some(existing) = &self.states[index] {
            if existing.locked || existing.saved {
                return false;
            }
        }
        self.states[index] = Some(state);
        true
    }

    /// Removes a state that is not saved yet.
    pub fn remove_unsaved(&mut self, db_height: u32) -> Option<DBState> {
        let index = db_height.checked_sub(self.base)? as usize;
        let slot = self.states.get_mut(index)?;
        if slot.as_ref()?.saved {
            return None;
        }
        slot.take()
    }

    /// Marks a state saved and moves the saved frontier. Refused for a state
    /// that is not signed and locked.
    pub fn mark_saved(&mut self, db_height: u32) -> bool {
        let Some(state) = self.get_mut(db_height) else {
            return false;
        };
        if !state.signed || !state.locked {
            return false;
        }
        state.saved = true;
        self.highest_saved = self.highest_saved.max(db_height);
        self.advance_complete();
        true
    }

    fn advance_complete(&mut self) {
        while let Some(Some(state)) = self.states.get(self.complete) {
            if !state.saved {
                break;
            }
            self.complete += 1;
        }
    }

    /// Drops the oldest saved states, keeping `retention` of them.
    pub fn trim(&mut self) {
        if self.complete <= self.retention {
            return;
        }
        let drop = self.complete - self.retention;
        self.states.drain(..drop);
        self.base += drop as u32;
        self.complete -= drop;
    }

    /// heights held, lowest first
    pub fn heights(&self) -> impl Iterator<Item = u32> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.is_some())
            .map(|(index, _)| self.base + index as u32)
    }

    /// lowest height above the saved frontier with no state
    pub fn first_gap(&self) -> Option<u32> {
        let upper = self.highest_known();
        (self.highest_complete() + 1..upper).find(|h| self.get(*h).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_models::blocks::{
        AdminBlock, DirectoryBlock, EntryCreditBlock, FactoidBlock, FinalizedBlock,
    };
    use dchain_time::ChainTime;

    fn block(height: u32) -> FinalizedBlock {
        FinalizedBlock {
            directory_block: DirectoryBlock::new(1, height, ChainTime::from_millis(height as u64)),
            admin_block: AdminBlock::new(height),
            factoid_block: FactoidBlock::new(height, 1_000),
            ec_block: EntryCreditBlock::new(height),
            entry_blocks: Vec::new(),
            entries: Vec::new(),
        }
    }

    #[test]
    fn test_put_refuses_processed_heights() {
        let mut list = DBStateList::new(DBState::from_database(block(4)), 2);
        assert!(!list.put(DBState::from_network(block(4), Vec::new())));
        assert!(!list.put(DBState::from_network(block(3), Vec::new())));
        assert!(list.put(DBState::from_network(block(6), Vec::new())));
        assert_eq!(list.first_gap(), Some(5));
        assert!(list.put(DBState::from_network(block(5), Vec::new())));
        assert_eq!(list.first_gap(), None);
        assert_eq!(list.highest_known(), 6);
    }

    #[test]
    fn test_saved_frontier_and_trim() {
        let mut list = DBStateList::new(DBState::from_database(block(0)), 2);
        for height in 1..=4 {
            assert!(list.put(DBState::from_network(block(height), Vec::new())));
        }
        for height in 1..=2 {
            let state = list.get_mut(height).unwrap();
            state.signed = true;
            state.locked = true;
        }
        assert!(list.mark_saved(1));
        assert_eq!(list.highest_saved(), 1);
        assert_eq!(list.highest_complete(), 1);
        assert!(list.mark_saved(2));
        assert_eq!(list.highest_complete(), 2);
        assert!(list.heights().all(|h| list.get(h).unwrap().flags_consistent()));

        list.trim();
        assert_eq!(list.base(), 1);
        assert!(list.is_saved(0));
        assert!(list.get(1).is_some());
        assert!(!list.is_saved(3));
        assert!(!list.put(DBState::from_network(block(2), Vec::new())));

        // an unsaved state can be dropped, a saved one cannot
        assert!(list.remove_unsaved(2).is_none());
        assert!(list.remove_unsaved(3).is_some());
        assert_eq!(list.first_gap(), Some(3));
    }

    #[test]
    fn test_unsigned_state_is_never_saved() {
        let mut list = DBStateList::new(DBState::from_database(block(0)), 2);
        assert!(list.put(DBState::from_network(block(1), Vec::new())));
        assert!(!list.mark_saved(1));

        list.get_mut(1).unwrap().locked = true;
        assert!(!list.mark_saved(1));
        assert!(!list.is_saved(1));
        assert_eq!(list.highest_saved(), 0);

        list.get_mut(1).unwrap().signed = true;
        assert!(list.mark_saved(1));
        assert!(list.get(1).unwrap().flags_consistent());
        assert!(!list.mark_saved(7));
    }
}
