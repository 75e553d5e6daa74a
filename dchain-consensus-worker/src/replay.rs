// Copyright (c) 2024 DCHAIN LABS
//! Time-windowed deduplication of message hashes.
//!
//! The filter is a ring of one-minute buckets. With a range of `r` minutes and
//! a center minute `c`, bucket `i` holds the hashes stamped at minute
//! `c - 2r + i`, so the ring covers `[c - 2r, c + r]`. A bucket maps a hash
//! to the mask bits it was marked with.
use std::collections::{HashMap, VecDeque};

use dchain_hash::Hash;
use dchain_time::ChainTime;

/// Messages executed by the driver
pub const INTERNAL_REPLAY: u8 = 1;
/// Messages accepted from the network
pub const NETWORK_REPLAY: u8 = 2;
/// Entries already revealed
pub const REVEAL_REPLAY: u8 = 4;

/// Sliding window of marked hashes, see the module documentation.
#[derive(Debug)]
pub struct ReplayFilter {
    range: u64,
    center: Option<u64>,
    buckets: VecDeque<HashMap<Hash, u8>>,
}

impl ReplayFilter {
    /// Empty filter accepting timestamps within `range_minutes` of now.
    pub fn new(range_minutes: u64) -> Self {
        let len = (3 * range_minutes + 1) as usize;
        ReplayFilter {
            range: range_minutes,
            center: None,
            buckets: (0..len).map(|_| HashMap::new()).collect(),
        }
    }

    /// Moves the center to `now_minute`, evicting the oldest buckets.
    fn advance(&mut self, now_minute: u64) {
        let center = match self.center {
            Some(center) if center >= now_minute => return,
            Some(center) => center,
            None => {
                self.center = Some(now_minute);
                return;
            }
        };
        let shift = now_minute - center;
        if shift >= self.buckets.len() as u64 {
            self.buckets.iter_mut().for_each(HashMap::clear);
        } else {
            for _ in 0..shift {
                self.buckets.pop_front();
                self.buckets.push_back(HashMap::new());
            }
        }
        self.center = Some(now_minute);
    }

    fn bucket_index(&self, minute: u64) -> Option<usize> {
        let first = self.center?.checked_sub(2 * self.range)?;
        let index = minute.checked_sub(first)? as usize;
        (index < self.buckets.len()).then_some(index)
    }

    /// Checks that `timestamp` is within range of `now` and that `hash` carries
    /// none of the `mask` bits in its bucket. Returns the bucket index on success.
    pub fn valid(
        &mut self,
        mask: u8,
        hash: &Hash,
        timestamp: ChainTime,
        now: ChainTime,
    ) -> Option<usize> {
        let (now_minute, ts_minute) = (now.minutes(), timestamp.minutes());
        if now_minute.abs_diff(ts_minute) > self.range {
            return None;
        }
        self.advance(now_minute);
        let index = self.bucket_index(ts_minute)?;
        match self.buckets[index].get(hash) {
            Some(bits) if bits & mask != 0 => None,
            _ => Some(index),
        }
    }

    /// Same as [`ReplayFilter::valid`], and marks `hash` with `mask` on success.
    pub fn is_ts_valid(&mut self, mask: u8, hash: &Hash, timestamp: ChainTime, now: ChainTime) -> bool {
        match self.valid(mask, hash, timestamp, now) {
            Some(index) => {
                *self.buckets[index].entry(*hash).or_insert(0) |= mask;
                true
            }
            None => false,
        }
    }

    /// True if no bucket marks `hash` with any `mask` bit. Scans the whole ring.
    pub fn is_hash_unique(&self, mask: u8, hash: &Hash) -> bool {
        !self
            .buckets
            .iter()
            .any(|bucket| bucket.get(hash).map_or(false, |bits| bits & mask != 0))
    }

    /// Marks `hash` in the bucket of `now`.
    pub fn set_hash_now(&mut self, mask: u8, hash: &Hash, now: ChainTime) {
        self.advance(now.minutes());
        if let Some(index) = self.bucket_index(now.minutes()) {
            *self.buckets[index].entry(*hash).or_insert(0) |= mask;
        }
    }

    /// Removes the `mask` bits of `hash` from every bucket.
    pub fn clear(&mut self, mask: u8, hash: &Hash) {
        for bucket in self.buckets.iter_mut() {
            if let Some(bits) = bucket.get_mut(hash) {
                *bits &= !mask;
                if *bits == 0 {
                    bucket.remove(hash);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute(m: u64) -> ChainTime {
        ChainTime::from_minutes(m)
    }

    #[test]
    fn test_accepted_once_within_window() {
        let mut filter = ReplayFilter::new(60);
        let now = minute(1_000);
        for offset in [0u64, 1, 30, 60] {
            for (side, ts) in [(0u8, minute(1_000 - offset)), (1, minute(1_000 + offset))] {
                let hash = Hash::compute_from_tuple(&[&offset.to_be_bytes()[..], &[side][..]]);
                assert!(filter.is_ts_valid(INTERNAL_REPLAY, &hash, ts, now));
                assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, ts, now));
                assert_eq!(filter.valid(INTERNAL_REPLAY, &hash, ts, now), None);
            }
        }
    }

    #[test]
    fn test_clear_allows_again() {
        let mut filter = ReplayFilter::new(60);
        let hash = Hash::compute_from(b"message");
        let now = minute(500);
        assert!(filter.is_ts_valid(INTERNAL_REPLAY, &hash, now, now));
        assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, now, now));
        filter.clear(INTERNAL_REPLAY, &hash);
        assert!(filter.is_ts_valid(INTERNAL_REPLAY, &hash, now, now));
    }

    #[test]
    fn test_masks_are_independent() {
        let mut filter = ReplayFilter::new(60);
        let hash = Hash::compute_from(b"message");
        let now = minute(500);
        assert!(filter.is_ts_valid(NETWORK_REPLAY, &hash, now, now));
        assert!(filter.valid(INTERNAL_REPLAY, &hash, now, now).is_some());
        assert!(filter.is_hash_unique(REVEAL_REPLAY, &hash));
        assert!(!filter.is_hash_unique(NETWORK_REPLAY, &hash));

        filter.set_hash_now(REVEAL_REPLAY, &hash, now);
        filter.clear(NETWORK_REPLAY, &hash);
        assert!(!filter.is_hash_unique(REVEAL_REPLAY, &hash));
        assert!(filter.is_hash_unique(NETWORK_REPLAY, &hash));
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut filter = ReplayFilter::new(60);
        let hash = Hash::compute_from(b"old");
        let now = minute(1_000);
        assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(939), now));
        assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(1_061), now));
        assert!(filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(940), now));
    }

    #[test]
    fn test_rotation_forgets_old_buckets() {
        let mut filter = ReplayFilter::new(2);
        let hash = Hash::compute_from(b"message");
        assert!(filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(10), minute(10)));
        // still remembered while inside the window
        assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(10), minute(12)));
        // out of range once now is three minutes ahead, whatever the bucket says
        assert!(!filter.is_ts_valid(INTERNAL_REPLAY, &hash, minute(10), minute(13)));
        assert!(!filter.is_hash_unique(INTERNAL_REPLAY, &hash));
        filter.advance(100);
        assert!(filter.is_hash_unique(INTERNAL_REPLAY, &hash));
    }
}
