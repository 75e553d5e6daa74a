// Copyright (c) 2024 DCHAIN LABS
use dchain_models::{config::MINUTES_PER_BLOCK, messages::EndOfMinute, Message};
use tracing::debug;

use super::ConsensusState;

impl ConsensusState {
    /// Time driven work: ends the minute of the VM this node leads once the
    /// minute elapsed, and votes against stalled leaders.
    pub fn on_tick(&mut self) {
        self.issue_eom();
        self.fault_check();
    }

    fn issue_eom(&mut self) -> bool {
        if self.saving || self.current_minute >= MINUTES_PER_BLOCK {
            return false;
        }
        let Some(me) = self.identity() else {
            return false;
        };
        let now = self.now();
        if now < self.minute_started_at.saturating_add(self.config.minute_duration()) {
            return false;
        }
        let (db_height, minute) = (self.leader_height, self.current_minute);
        let Some(pl) = self.process_lists.get(db_height) else {
            return false;
        };
        let Some(vm_index) = pl.get_virtual_servers(minute, &me.identity) else {
            return false;
        };
        if pl.vms[vm_index].synced || !self.issued_eoms.insert((db_height, minute, vm_index)) {
            return false;
        }
        debug!(
            "ending minute {} of height {} on vm {}",
            minute, db_height, vm_index
        );
        let eom = EndOfMinute::new(now, db_height, minute, vm_index, me.identity, &me.keypair);
        self.execute_msg(Message::EndOfMinute(eom));
        true
    }
}
