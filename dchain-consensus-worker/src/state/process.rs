// Copyright (c) 2024 DCHAIN LABS
use dchain_logging::dchain_trace;
use dchain_models::{Ack, Message};

use super::ConsensusState;
use crate::{
    mmr::{ask_delay, MissingAsk},
    replay::INTERNAL_REPLAY,
};

/// What the walk of a VM found at its next slot.
enum Next {
    /// a slot to process
    Slot(Ack, Message),
    /// the walk stops here
    Stop,
}

impl ConsensusState {
    /// Walks every process list above the saved frontier up to the leader
    /// height, processing each VM in order, then tries to close the open
    /// round. Returns true if anything was processed.
    pub(crate) fn process(&mut self) -> bool {
        let mut progress = false;
        let from = self.dbstates.highest_saved() + 1;
        let to = self.leader_height;
        for db_height in from..=to {
            let Some(vm_count) = self.process_lists.get(db_height).map(|pl| pl.vms.len()) else {
                continue;
            };
            for vm_index in 0..vm_count {
                progress |= self.process_vm(db_height, vm_index);
            }
            if db_height == self.leader_height {
                progress |= self.process_system_list(db_height);
                progress |= if self.saving {
                    self.try_close_dbsig_round()
                } else {
                    self.try_close_round()
                };
            }
        }
        progress
    }

    /// Processes the slots of one VM until it syncs, hits a hole or a message
    /// that cannot be processed yet.
    fn process_vm(&mut self, db_height: u32, vm_index: usize) -> bool {
        let mut progress = false;
        loop {
            let slot = match self.next_slot(db_height, vm_index) {
                Some((slot, Next::Slot(ack, message))) => {
                    if !self.process_message(db_height, vm_index, &ack, &message) {
                        return progress;
                    }
                    slot
                }
                _ => return progress,
            };
            if let Some(vm) = self
                .process_lists
                .get_mut(db_height)
                .and_then(|pl| pl.vms.get_mut(vm_index))
            {
                vm.height = slot + 1;
            }
            progress = true;
        }
    }

    /// Looks at the next slot of a VM. Holes and broken serial hashes are
    /// asked for, an idle VM of the open round asks for its overdue message.
    fn next_slot(&mut self, db_height: u32, vm_index: usize) -> Option<(usize, Next)> {
        let now = self.now();
        let overdue_at = self
            .minute_started_at
            .saturating_add(self.config.minute_duration())
            .saturating_add(ask_delay(self.config.block_time));
        let open_round = db_height == self.leader_height;
        let saving = self.saving;

        let pl = self.process_lists.get_mut(db_height)?;
        let vm = pl.vms.get_mut(vm_index)?;
        if vm.synced {
            return None;
        }
        let slot = vm.height;
        if vm.is_caught_up() {
            let waiting = if saving { !vm.signed } else { !vm.synced };
            if open_round && waiting && vm.highest_ask <= slot {
                vm.highest_ask = slot + 1;
                self.mmr.ask(MissingAsk {
                    db_height,
                    vm_index,
                    height: slot as u32,
                    when: overdue_at,
                });
            }
            return Some((slot, Next::Stop));
        }

        let (Some(ack), Some(message)) = (vm.list_ack[slot].clone(), vm.list[slot].clone()) else {
            for height in vm.take_unasked_holes(slot) {
                self.mmr.ask(MissingAsk {
                    db_height,
                    vm_index,
                    height,
                    when: now,
                });
            }
            return Some((slot, Next::Stop));
        };

        if !ack.follows(vm.previous_ack(slot)) {
            dchain_trace!("consensus.process.serial_hash_broken", {
                "db_height": db_height,
                "vm_index": vm_index,
                "height": slot,
            });
            if let Some((ack, message)) = pl.clear_slot(vm_index, slot) {
                let mut replay = self.replay.lock();
                replay.clear(INTERNAL_REPLAY, &Message::Ack(ack).repeat_hash());
                replay.clear(INTERNAL_REPLAY, &message.repeat_hash());
            }
            self.mmr.ask(MissingAsk {
                db_height,
                vm_index,
                height: slot as u32,
                when: now,
            });
            return Some((slot, Next::Stop));
        }
        Some((slot, Next::Slot(ack, message)))
    }

    /// Applies one slot. Returns false if the VM must stop before it.
    fn process_message(&mut self, db_height: u32, vm_index: usize, ack: &Ack, message: &Message) -> bool {
        match message {
            Message::EndOfMinute(eom) => self.process_eom(db_height, vm_index, eom),
            Message::DirectoryBlockSignature(dbsig) => {
                self.process_dbsig(db_height, vm_index, ack, dbsig)
            }
            Message::CommitChain(_) | Message::CommitEntry(_) => {
                self.process_commit(db_height, message);
                true
            }
            Message::RevealEntry(reveal) => {
                self.process_reveal(db_height, reveal);
                true
            }
            _ => true,
        }
    }
}
