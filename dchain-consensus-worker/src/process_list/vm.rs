// Copyright (c) 2024 DCHAIN LABS
use dchain_models::{Ack, Message};
use dchain_time::ChainTime;

/// Result of placing an acknowledged message in a virtual server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// the slot was empty and is now filled
    Inserted,
    /// the slot already held the same message
    Duplicate,
    /// the slot holds a different message, nothing changed
    Conflict,
}

/// One leader's lane of a process list.
///
/// `list[i]` never changes once set, except when a broken serial hash chain
/// clears it. `height` is the next slot to process and never exceeds `list.len()`.
#[derive(Debug, Default, Clone)]
pub struct VM {
    /// messages, `None` for holes awaiting delivery
    pub list: Vec<Option<Message>>,
    /// ack of each slot
    pub list_ack: Vec<Option<Ack>>,
    /// next slot to process
    pub height: usize,
    /// true once the EOM of the current minute was processed
    pub synced: bool,
    /// minute the lane is in: one past its last processed EOM
    pub leader_minute: u8,
    /// first slot of the current minute, used when the minute closes
    pub minute_start: usize,
    /// slots below this were already asked for
    pub highest_ask: usize,
    /// when the lane was first seen stalled in an open round
    pub when_faulted: Option<ChainTime>,
    /// true once the lane's directory block signature was processed
    pub signed: bool,
}

impl VM {
    /// true if every slot received so far was processed
    pub fn is_caught_up(&self) -> bool {
        self.height == self.list.len()
    }

    /// ack of the last slot, the one a new ack must follow
    pub fn last_ack(&self) -> Option<&Ack> {
        self.list_ack.last().and_then(Option::as_ref)
    }

    /// ack of the slot before `height`
    pub fn previous_ack(&self, height: usize) -> Option<&Ack> {
        height
            .checked_sub(1)
            .and_then(|prev| self.list_ack.get(prev))
            .and_then(Option::as_ref)
    }

    /// Places `message` at `ack.height`, growing the list with holes.
    pub fn insert(&mut self, ack: Ack, message: Message) -> InsertOutcome {
        let slot = ack.height as usize;
        if slot >= self.list.len() {
            self.list.resize(slot + 1, None);
            self.list_ack.resize(slot + 1, None);
        }
        match &self.list[slot] {
            Some(existing) if existing.msg_hash() == message.msg_hash() => InsertOutcome::Duplicate,
            Some(_) => InsertOutcome::Conflict,
            None => {
                self.list[slot] = Some(message);
                self.list_ack[slot] = Some(ack);
                InsertOutcome::Inserted
            }
        }
    }

    /// Empties a slot, returning what it held.
    pub fn clear_slot(&mut self, slot: usize) -> Option<(Ack, Message)> {
        if slot < self.height {
            return None;
        }
        let message = self.list.get_mut(slot)?.take();
        let ack = self.list_ack.get_mut(slot)?.take();
        if self.highest_ask > slot {
            self.highest_ask = slot;
        }
        ack.zip(message)
    }

    /// Holes in `[from, len)` not asked for yet. Marks them asked.
    pub fn take_unasked_holes(&mut self, from: usize) -> Vec<u32> {
        let start = from.max(self.highest_ask);
        let holes: Vec<u32> = (start..self.list.len())
            .filter(|slot| self.list[*slot].is_none())
            .map(|slot| slot as u32)
            .collect();
        self.highest_ask = self.highest_ask.max(self.list.len());
        holes
    }
}
