// Copyright (c) 2024 DCHAIN LABS
use std::collections::BTreeMap;

use dchain_models::{messages::MissingMsg, IdentityId};
use dchain_time::ChainTime;

/// Floor of the delay between two asks for the same slot.
pub const MIN_ASK_DELAY: ChainTime = ChainTime::from_millis(500);

/// Delay between two asks for the same slot: a fiftieth of a block, at least
/// [`MIN_ASK_DELAY`].
pub fn ask_delay(block_time: ChainTime) -> ChainTime {
    ChainTime::from_millis(block_time.to_millis() / 50).max(MIN_ASK_DELAY)
}

/// Process list slots known to be missing, with the time each ask fires.
///
/// Keys are `(db_height, vm_index, height)`. Asking again for a pending slot
/// keeps the first time. Filling the slot cancels the ask.
#[derive(Debug)]
pub struct MissingMessageTracker {
    pending: BTreeMap<(u32, usize, u32), ChainTime>,
    floor: u32,
    range: u32,
    delay: ChainTime,
}

impl MissingMessageTracker {
    /// Tracker re-asking every `delay`, accepting heights in `[floor, floor + range]`.
    pub fn new(delay: ChainTime, range: u32) -> Self {
        MissingMessageTracker {
            pending: BTreeMap::new(),
            floor: 0,
            range,
            delay,
        }
    }

    /// Schedules an ask for a slot at `when`, unless one is already pending.
    pub fn ask(&mut self, db_height: u32, vm_index: usize, height: u32, when: ChainTime) {
        if db_height < self.floor || db_height > self.floor.saturating_add(self.range) {
            return;
        }
        self.pending
            .entry((db_height, vm_index, height))
            .or_insert(when);
    }

    /// The slot was filled.
    pub fn add(&mut self, db_height: u32, vm_index: usize, height: u32) {
        self.pending.remove(&(db_height, vm_index, height));
    }

    /// Drops every ask below `floor`.
    pub fn advance_height(&mut self, floor: u32) {
        if floor <= self.floor {
            return;
        }
        self.floor = floor;
        self.pending = self.pending.split_off(&(floor, 0, 0));
    }

    /// Builds one request per `(db_height, vm_index)` holding every slot
    /// whose ask is due, and schedules those slots again.
    pub fn tick(&mut self, now: ChainTime, asker: Option<IdentityId>) -> Vec<MissingMsg> {
        let mut requests: Vec<MissingMsg> = Vec::new();
        let next = now.saturating_add(self.delay);
        for ((db_height, vm_index, height), when) in self.pending.iter_mut() {
            if *when > now {
                continue;
            }
            *when = next;
            match requests.last_mut() {
                Some(last) if last.db_height == *db_height && last.vm_index == *vm_index => {
                    last.heights.push(*height)
                }
                _ => requests.push(MissingMsg {
                    timestamp: now,
                    db_height: *db_height,
                    vm_index: *vm_index,
                    heights: vec![*height],
                    asker,
                }),
            }
        }
        requests
    }

    /// number of pending asks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// true if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> ChainTime {
        ChainTime::from_millis(millis)
    }

    #[test]
    fn test_repeated_ask_sends_once() {
        let mut tracker = MissingMessageTracker::new(ms(500), 200);
        tracker.ask(5, 1, 3, ms(1_000));
        tracker.ask(5, 1, 3, ms(1_200));
        assert!(tracker.tick(ms(999), None).is_empty());
        let requests = tracker.tick(ms(1_000), None);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].heights, vec![3]);
        // re-asked only after the delay
        assert!(tracker.tick(ms(1_400), None).is_empty());
        assert_eq!(tracker.tick(ms(1_500), None).len(), 1);
    }

    #[test]
    fn test_asks_are_batched_per_vm() {
        let mut tracker = MissingMessageTracker::new(ms(500), 200);
        tracker.ask(5, 0, 1, ms(10));
        tracker.ask(5, 0, 4, ms(10));
        tracker.ask(5, 2, 0, ms(10));
        tracker.ask(6, 0, 0, ms(10));
        let requests = tracker.tick(ms(10), None);
        let summary: Vec<(u32, usize, Vec<u32>)> = requests
            .into_iter()
            .map(|m| (m.db_height, m.vm_index, m.heights))
            .collect();
        assert_eq!(
            summary,
            vec![(5, 0, vec![1, 4]), (5, 2, vec![0]), (6, 0, vec![0])]
        );
    }

    #[test]
    fn test_add_and_height_advance_cancel() {
        let mut tracker = MissingMessageTracker::new(ms(500), 200);
        tracker.ask(5, 0, 1, ms(10));
        tracker.ask(6, 0, 1, ms(10));
        tracker.ask(7, 0, 1, ms(10));
        tracker.add(5, 0, 1);
        tracker.advance_height(7);
        assert_eq!(tracker.len(), 1);
        tracker.ask(6, 0, 2, ms(10));
        tracker.ask(300, 0, 2, ms(10));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_delay_floor() {
        assert_eq!(ask_delay(ChainTime::from_minutes(10)), ms(12_000));
        assert_eq!(ask_delay(ms(10_000)), MIN_ASK_DELAY);
    }
}
