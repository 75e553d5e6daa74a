// Copyright (c) 2024 DCHAIN LABS
use std::collections::{HashMap, HashSet};

use dchain_hash::Hash;
use dchain_models::{Message, MessageKind};

/// Messages waiting to be executed again, by message hash.
///
/// A message can also wait on a dependency, such as a reveal waiting for
/// its commit: releasing the dependency hands it back right away.
#[derive(Debug, Default)]
pub struct Holding {
    messages: HashMap<Hash, Message>,
    dependents: HashMap<Hash, HashSet<Hash>>,
    capacity: usize,
}

impl Holding {
    /// empty holding bounded to `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Holding {
            capacity,
            ..Default::default()
        }
    }

    /// Holds a message. Returns false when full and the message is new.
    pub fn insert(&mut self, message: Message) -> bool {
        let hash = message.msg_hash();
        if !self.messages.contains_key(&hash) && self.messages.len() >= self.capacity {
            return false;
        }
        self.messages.insert(hash, message);
        true
    }

    /// Holds a message until `dependency` is released.
    pub fn insert_dependent(&mut self, dependency: Hash, message: Message) -> bool {
        let hash = message.msg_hash();
        if !self.insert(message) {
            return false;
        }
        self.dependents.entry(dependency).or_default().insert(hash);
        true
    }

    /// Takes back the messages waiting on `dependency`.
    pub fn release(&mut self, dependency: &Hash) -> Vec<Message> {
        let Some(hashes) = self.dependents.remove(dependency) else {
            return Vec::new();
        };
        let mut released: Vec<Message> = hashes
            .iter()
            .filter_map(|hash| self.messages.remove(hash))
            .collect();
        released.sort_by_key(|message| message.timestamp());
        released
    }

    /// held message
    pub fn get(&self, hash: &Hash) -> Option<&Message> {
        self.messages.get(hash)
    }

    /// true if `hash` is held
    pub fn contains(&self, hash: &Hash) -> bool {
        self.messages.contains_key(hash)
    }

    /// Stops holding a message.
    pub fn remove(&mut self, hash: &Hash) -> Option<Message> {
        self.messages.remove(hash)
    }

    /// Takes every held message out for review, oldest first. Dependency
    /// links of messages still waiting are kept.
    pub fn take_all(&mut self) -> Vec<Message> {
        let mut all: Vec<Message> = self.messages.drain().map(|(_, message)| message).collect();
        all.sort_by_key(|message| message.timestamp());
        all
    }

    /// Forgets dependency links whose messages are gone.
    pub fn prune_dependents(&mut self) {
        let messages = &self.messages;
        self.dependents.retain(|_, hashes| {
            hashes.retain(|hash| messages.contains_key(hash));
            !hashes.is_empty()
        });
    }

    /// Drops held blocks received from peers. Returns how many were dropped.
    pub fn drop_dbstates(&mut self) -> usize {
        let before = self.messages.len();
        self.messages
            .retain(|_, message| message.kind() != MessageKind::DBState);
        before - self.messages.len()
    }

    /// held messages matching `predicate`
    pub fn find(&self, predicate: impl Fn(&Message) -> bool) -> Option<&Message> {
        self.messages.values().find(|message| predicate(message))
    }

    /// number of held messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// true if nothing is held
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dchain_models::{blocks::Entry, messages::RevealEntry, ChainId};
    use dchain_time::ChainTime;

    fn reveal(content: &[u8], ts: u64) -> Message {
        Message::RevealEntry(RevealEntry::new(
            ChainTime::from_millis(ts),
            Entry {
                chain_id: ChainId(Hash::compute_from(b"chain")),
                ext_ids: Vec::new(),
                content: content.to_vec(),
            },
        ))
    }

    #[test]
    fn test_release_returns_dependents_only() {
        let mut holding = Holding::new(10);
        let dependency = Hash::compute_from(b"commit");
        assert!(holding.insert_dependent(dependency, reveal(b"b", 2)));
        assert!(holding.insert_dependent(dependency, reveal(b"a", 1)));
        assert!(holding.insert(reveal(b"c", 3)));

        let released = holding.release(&dependency);
        assert_eq!(released.len(), 2);
        assert_eq!(released[0], reveal(b"a", 1));
        assert_eq!(holding.len(), 1);
        assert!(holding.release(&dependency).is_empty());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut holding = Holding::new(1);
        assert!(holding.insert(reveal(b"a", 1)));
        assert!(holding.insert(reveal(b"a", 1)));
        assert!(!holding.insert(reveal(b"b", 1)));
    }
}
