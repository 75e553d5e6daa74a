// Copyright (c) 2024 DCHAIN LABS
//! Signature round: each federated server signs the previous directory block
//! header before minute 0 of a height opens.
use dchain_models::{
    messages::{DBStateMissing, DirectoryBlockSignature},
    Ack, Message,
};
use tracing::{info, warn};

use super::ConsensusState;
use crate::{
    mmr::MissingAsk,
    replay::{INTERNAL_REPLAY, NETWORK_REPLAY},
};

impl ConsensusState {
    /// Issues this node's signature of the previous block when it leads a VM
    /// of the open signature round.
    pub(crate) fn issue_dbsig(&mut self) -> bool {
        if !self.saving {
            return false;
        }
        let Some(me) = self.identity() else {
            return false;
        };
        let db_height = self.leader_height;
        let Some(prev) = db_height.checked_sub(1).and_then(|h| self.dbstates.get(h)) else {
            return false;
        };
        if prev.is_new {
            return false;
        }
        let header = prev.block.directory_block.header.clone();
        let limit = self.process_list_limit();
        let Some(pl) = self.process_lists.get_or_create(db_height, limit) else {
            return false;
        };
        let Some(vm_index) = pl.get_virtual_servers(0, &me.identity) else {
            return false;
        };
        if pl.vms[vm_index].signed || !self.issued_dbsigs.insert((db_height, vm_index)) {
            return false;
        }
        let dbsig = DirectoryBlockSignature::new(self.now(), vm_index, header, me.identity, &me.keypair);
        info!(
            "signing block {} for height {} on vm {}",
            db_height - 1,
            db_height,
            vm_index
        );
        self.execute_msg(Message::DirectoryBlockSignature(dbsig));
        true
    }

    /// Checks a signature against the local previous block and counts it.
    pub(crate) fn process_dbsig(
        &mut self,
        db_height: u32,
        vm_index: usize,
        ack: &Ack,
        dbsig: &DirectoryBlockSignature,
    ) -> bool {
        if db_height < self.leader_height {
            return true;
        }
        if db_height > self.leader_height {
            return false;
        }
        if self
            .process_lists
            .get(db_height)
            .and_then(|pl| pl.vms.get(vm_index))
            .map_or(true, |vm| vm.signed)
        {
            return true;
        }
        let Some(prev) = self.dbstates.get(db_height - 1) else {
            return false;
        };
        if prev.is_new {
            return false;
        }
        let prev_keymr = prev.keymr();
        let signed_keymr = dbsig.header.keymr();
        if !self.channels.authorities.verify_signature(
            &dbsig.leader,
            &signed_keymr,
            &dbsig.dblock_signature,
            db_height,
        ) {
            warn!(
                "bad block signature from {} at height {}, asking again",
                dbsig.leader, db_height
            );
            self.drop_slot(db_height, vm_index, ack.height);
            return false;
        }

        let Some(pl) = self.process_lists.get_mut(db_height) else {
            return false;
        };
        if signed_keymr == prev_keymr {
            pl.add_dbsig(dbsig.leader, dbsig.dblock_signature);
        } else {
            pl.diff_sig_tally += 1;
            warn!(
                "{} signed block {} while ours is {}",
                dbsig.leader, signed_keymr, prev_keymr
            );
        }
        let vm = &mut pl.vms[vm_index];
        vm.signed = true;
        vm.when_faulted = None;
        true
    }

    /// Clears a slot whose content was rejected and asks for it again.
    fn drop_slot(&mut self, db_height: u32, vm_index: usize, height: u32) {
        if let Some((ack, message)) = self
            .process_lists
            .get_mut(db_height)
            .and_then(|pl| pl.clear_slot(vm_index, height as usize))
        {
            let mut replay = self.replay.lock();
            replay.clear(INTERNAL_REPLAY, &Message::Ack(ack).repeat_hash());
            replay.clear(INTERNAL_REPLAY, &message.repeat_hash());
        }
        self.mmr.ask(MissingAsk {
            db_height,
            vm_index,
            height,
            when: self.now(),
        });
    }

    /// Closes the signature round once every VM signed. When most signatures
    /// disagree with the local previous block, that block is dropped and
    /// fetched from peers instead.
    pub(crate) fn try_close_dbsig_round(&mut self) -> bool {
        if !self.saving {
            return false;
        }
        let db_height = self.leader_height;
        let Some(pl) = self.process_lists.get_mut(db_height) else {
            return false;
        };
        if pl.vms.is_empty() || !pl.vms.iter().all(|vm| vm.signed) {
            return false;
        }
        if pl.diff_sig_tally * 2 > pl.fed_count() {
            self.fork_recovery(db_height);
            return true;
        }
        pl.dbsigs_done = true;
        self.saving = false;
        self.minute_started_at = self.now();
        info!("signature round of height {} closed", db_height);
        true
    }

    /// Resets the process list of `db_height` and replaces the local block
    /// below it by the one peers agree on.
    fn fork_recovery(&mut self, db_height: u32) {
        warn!(
            "most leaders disagree with our block {}, resetting height {}",
            db_height - 1,
            db_height
        );
        if let Some(old) = self.process_lists.reset(db_height) {
            let mut replay = self.replay.lock();
            for vm in &old.vms {
                for ack in vm.list_ack.iter().flatten() {
                    replay.clear(INTERNAL_REPLAY | NETWORK_REPLAY, &Message::Ack(ack.clone()).repeat_hash());
                }
                for message in vm.list.iter().flatten() {
                    replay.clear(INTERNAL_REPLAY | NETWORK_REPLAY, &message.repeat_hash());
                }
            }
        }
        let prev = db_height - 1;
        if prev > self.dbstates.highest_saved() {
            self.dbstates.remove_unsaved(prev);
            self.channels.network.send_out(Message::DBStateMissing(DBStateMissing {
                timestamp: self.now(),
                start: prev,
                end: prev,
            }));
        }
        self.issued_dbsigs.retain(|(height, _)| *height != db_height);
    }
}
