// Copyright (c) 2024 DCHAIN LABS
use dchain_logging::dchain_trace;
use dchain_models::{config::MINUTES_PER_BLOCK, messages::EndOfMinute};
use tracing::{debug, info};

use super::ConsensusState;
use crate::dbstate::DBState;

impl ConsensusState {
    /// Syncs a VM on the end of its current minute. An EOM of a later minute
    /// waits, one of an earlier minute is skipped.
    pub(crate) fn process_eom(&mut self, db_height: u32, vm_index: usize, eom: &EndOfMinute) -> bool {
        if db_height != self.leader_height || self.saving {
            return false;
        }
        if eom.minute < self.current_minute {
            debug!(
                "skipping stale end of minute {} of vm {} at height {}",
                eom.minute, vm_index, db_height
            );
            return true;
        }
        if eom.minute > self.current_minute {
            return false;
        }
        let Some(vm) = self
            .process_lists
            .get_mut(db_height)
            .and_then(|pl| pl.vms.get_mut(vm_index))
        else {
            return false;
        };
        vm.synced = true;
        vm.leader_minute = eom.minute + 1;
        vm.when_faulted = None;
        dchain_trace!("consensus.process_eom", {
            "db_height": db_height,
            "vm_index": vm_index,
            "minute": eom.minute,
        });
        true
    }

    /// Closes the current minute once every VM is synced and the system list
    /// is applied. Closing the last minute finishes the height.
    pub(crate) fn try_close_round(&mut self) -> bool {
        if self.saving || self.current_minute >= MINUTES_PER_BLOCK {
            return false;
        }
        let (db_height, minute) = (self.leader_height, self.current_minute);
        let Some(pl) = self.process_lists.get_mut(db_height) else {
            return false;
        };
        if pl.vms.is_empty() || !pl.vms.iter().all(|vm| vm.synced) || !pl.system.is_done() {
            return false;
        }
        pl.close_minute(minute);
        for vm in pl.vms.iter_mut() {
            vm.synced = false;
        }
        self.current_minute += 1;
        self.minute_started_at = self.now();
        debug!("closed minute {} of height {}", minute, db_height);
        if self.current_minute == MINUTES_PER_BLOCK {
            self.finish_height(db_height);
        }
        true
    }

    /// Turns the process list of `db_height` into a state waiting for its
    /// links and opens the signature round of the next height.
    fn finish_height(&mut self, db_height: u32) {
        let timestamp = self.block_timestamp(db_height);
        if let Some(pl) = self.process_lists.get(db_height) {
            let state = DBState::from_process_list(pl, self.config.network_id, timestamp);
            if !self.dbstates.put(state) {
                debug!("height {} was already completed elsewhere", db_height);
            }
        }
        self.saving = true;
        self.leader_height = db_height + 1;
        self.current_minute = 0;
        self.minute_started_at = self.now();
        let limit = self.process_list_limit();
        self.process_lists.get_or_create(self.leader_height, limit);
        self.mmr.advance_height(self.leader_height);
        info!("height {} completed, leading height {}", db_height, self.leader_height);
    }
}
