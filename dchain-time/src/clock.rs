// Copyright (c) 2024 DCHAIN LABS
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::ChainTime;

/// Source of the node's logical time.
/// Successive calls never go backwards.
pub trait Clock: Send + Sync {
    /// current timestamp
    fn now(&self) -> ChainTime;
}

/// Wall clock, clamped so it never goes backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    /// new system clock
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> ChainTime {
        let wall = ChainTime::now().map(|t| t.to_millis()).unwrap_or(0);
        let prev = self.last.fetch_max(wall, Ordering::AcqRel);
        ChainTime::from_millis(prev.max(wall))
    }
}

/// Clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// clock starting at `start`
    pub fn new(start: ChainTime) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start.to_millis())),
        }
    }

    /// move the clock forward by `delta`
    pub fn advance(&self, delta: ChainTime) {
        self.millis.fetch_add(delta.to_millis(), Ordering::AcqRel);
    }

    /// set the clock, ignored if it would go backwards
    pub fn set(&self, t: ChainTime) {
        self.millis.fetch_max(t.to_millis(), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> ChainTime {
        ChainTime::from_millis(self.millis.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_back() {
        let clock = ManualClock::new(ChainTime::from_millis(1000));
        clock.set(ChainTime::from_millis(500));
        assert_eq!(clock.now(), ChainTime::from_millis(1000));
        clock.advance(ChainTime::from_millis(20));
        assert_eq!(clock.clone().now(), ChainTime::from_millis(1020));
    }
}
