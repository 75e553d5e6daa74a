// Copyright (c) 2024 DCHAIN LABS
//! Process lists: the per-height, per-leader ordered message logs.
//!
//! [`ProcessLists`] is an arena indexed by height: the list of height `h`
//! lives at `lists[h - base]`. Heights below `base` were trimmed.
mod authority_set;
mod list;
mod vm;

pub use authority_set::AuthoritySet;
pub use list::{ProcessList, SystemList};
pub use vm::{InsertOutcome, VM};

use dchain_models::{blocks::AdminEntry, config::MINUTES_PER_BLOCK, IdentityId};

/// Window of process lists, see the module documentation.
#[derive(Debug)]
pub struct ProcessLists {
    base: u32,
    lists: Vec<Option<ProcessList>>,
    /// authorities given to lists created from now on
    template: AuthoritySet,
    ec_exchange_rate: u64,
}

impl ProcessLists {
    /// Empty window starting at `base`.
    pub fn new(base: u32, template: AuthoritySet, ec_exchange_rate: u64) -> Self {
        ProcessLists {
            base,
            lists: Vec::new(),
            template,
            ec_exchange_rate,
        }
    }

    /// lowest height still held
    pub fn base(&self) -> u32 {
        self.base
    }

    /// authorities new lists start with
    pub fn template(&self) -> &AuthoritySet {
        &self.template
    }

    /// highest height with a list
    pub fn highest(&self) -> Option<u32> {
        self.lists
            .iter()
            .rposition(Option::is_some)
            .map(|index| self.base + index as u32)
    }

    /// list of `db_height`, if created
    pub fn get(&self, db_height: u32) -> Option<&ProcessList> {
        let index = db_height.checked_sub(self.base)? as usize;
        self.lists.get(index)?.as_ref()
    }

    /// Authorities of `db_height`: those of its list, or the ones a list
    /// created now would start with.
    pub fn authorities_at(&self, db_height: u32) -> &AuthoritySet {
        self.get(db_height)
            .map_or(&self.template, |pl| &pl.authorities)
    }

    /// Leader of `vm` at `minute` of `db_height`. Never creates a list.
    pub fn vm_leader_at(&self, db_height: u32, minute: u8, vm: usize) -> Option<IdentityId> {
        if let Some(pl) = self.get(db_height) {
            return pl.vm_leader(minute, vm).copied();
        }
        let minute = minute.min(MINUTES_PER_BLOCK - 1) as usize;
        let fed = *list::build_leader_map(db_height, self.template.fed.len())
            .get(minute)?
            .get(vm)?;
        self.template.fed.get(fed).copied()
    }

    /// true if `identity` leads `vm` at some minute of `db_height`
    pub fn leads_vm_at(&self, db_height: u32, identity: &IdentityId, vm: usize) -> bool {
        (0..MINUTES_PER_BLOCK).any(|minute| self.vm_leader_at(db_height, minute, vm).as_ref() == Some(identity))
    }

    /// mutable list of `db_height`, if created
    pub fn get_mut(&mut self, db_height: u32) -> Option<&mut ProcessList> {
        let index = db_height.checked_sub(self.base)? as usize;
        self.lists.get_mut(index)?.as_mut()
    }

    /// Returns the list of `db_height`, creating it if needed. Heights below
    /// the window or past `limit` are refused.
    pub fn get_or_create(&mut self, db_height: u32, limit: u32) -> Option<&mut ProcessList> {
        if db_height > limit {
            return None;
        }
        let index = db_height.checked_sub(self.base)? as usize;
        if index >= self.lists.len() {
            self.lists.resize_with(index + 1, || None);
        }
        let (template, rate) = (&self.template, self.ec_exchange_rate);
        Some(self.lists[index].get_or_insert_with(|| ProcessList::new(db_height, template.clone(), rate)))
    }

    /// Replaces the list of `db_height` with an empty one. Returns the old list.
    pub fn reset(&mut self, db_height: u32) -> Option<ProcessList> {
        let index = db_height.checked_sub(self.base)? as usize;
        let slot = self.lists.get_mut(index)?;
        let fresh = slot.as_ref()?.reset();
        slot.replace(fresh)
    }

    /// Applies an authority change to every list from `from_height` on and to
    /// lists created later.
    pub fn apply_admin_entry(&mut self, from_height: u32, entry: &AdminEntry) {
        self.template.apply_admin_entry(entry);
        for pl in self.lists.iter_mut().flatten() {
            if pl.db_height >= from_height {
                pl.apply_admin_entry(entry);
            }
        }
    }

    /// Drops the lists below `keep_from`.
    pub fn trim(&mut self, keep_from: u32) {
        if keep_from <= self.base {
            return;
        }
        let drop = ((keep_from - self.base) as usize).min(self.lists.len());
        self.lists.drain(..drop);
        self.base = keep_from;
    }

    /// every list held, lowest height first
    pub fn iter(&self) -> impl Iterator<Item = &ProcessList> {
        self.lists.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_hash::Hash;
    use dchain_models::IdentityId;

    fn id(n: u8) -> IdentityId {
        IdentityId(Hash::from_bytes(&[n; 32]))
    }

    #[test]
    fn test_window_bounds() {
        let mut lists = ProcessLists::new(5, AuthoritySet::new([id(1), id(2)], [id(3)]), 1_000);
        assert!(lists.get_or_create(4, 100).is_none());
        assert!(lists.get_or_create(101, 100).is_none());
        assert_eq!(lists.get_or_create(8, 100).map(|pl| pl.db_height), Some(8));
        assert!(lists.get(6).is_none());
        assert_eq!(lists.highest(), Some(8));

        lists.trim(7);
        assert_eq!(lists.base(), 7);
        assert!(lists.get(8).is_some());
        lists.trim(20);
        assert_eq!(lists.highest(), None);
    }

    #[test]
    fn test_leader_lookup_does_not_create_lists() {
        let mut lists = ProcessLists::new(1, AuthoritySet::new([id(1), id(2), id(3)], [id(4)]), 1_000);
        let leader = lists.vm_leader_at(7, 3, 1).expect("three leaders");
        assert!(lists.get(7).is_none());
        assert!(lists.leads_vm_at(7, &leader, 1));
        assert!(!lists.leads_vm_at(7, &id(4), 1));
        assert!(lists.vm_leader_at(7, 0, 3).is_none());
        assert_eq!(lists.authorities_at(7).fed.len(), 3);
        assert_eq!(lists.highest(), None);

        let created = lists.get_or_create(7, 100).unwrap().vm_leader(3, 1).copied();
        assert_eq!(created, Some(leader));
    }

    #[test]
    fn test_authority_change_reaches_later_lists() {
        let mut lists = ProcessLists::new(1, AuthoritySet::new([id(1), id(2)], [id(3)]), 1_000);
        lists.get_or_create(1, 100);
        lists.get_or_create(2, 100);
        let promote = AdminEntry::AddFederatedServer {
            identity: id(3),
            db_height: 2,
        };
        lists.apply_admin_entry(2, &promote);
        assert_eq!(lists.get(1).map(|pl| pl.fed_count()), Some(2));
        assert_eq!(lists.get(2).map(|pl| pl.fed_count()), Some(3));
        assert_eq!(lists.get(2).map(|pl| pl.vms.len()), Some(3));
        assert_eq!(lists.get_or_create(3, 100).map(|pl| pl.fed_count()), Some(3));
    }
}
