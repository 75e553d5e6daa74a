// Copyright (c) 2024 DCHAIN LABS
//! Leader replacement. A leader stalled past `fault_timeout` gets votes from
//! the other authorities; a majority of federated votes plus the pledge of
//! the audit server taking over make a full fault, applied in order through
//! the system list of the height.
use dchain_models::{
    blocks::AdminEntry,
    messages::{FullServerFault, ServerFault},
    IdentityId, Message,
};
use tracing::{debug, info, warn};

use super::{ConsensusState, Validity};
use crate::process_list::InsertOutcome;

/// What a fault vote is about. Votes on the same key are tallied together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultKey {
    /// height of the fault
    pub db_height: u32,
    /// stalled VM
    pub vm_index: usize,
    /// leader to remove
    pub faulted: IdentityId,
    /// audit server to promote
    pub replacement: IdentityId,
    /// system list slot
    pub system_height: u32,
}

impl From<&ServerFault> for FaultKey {
    fn from(vote: &ServerFault) -> Self {
        FaultKey {
            db_height: vote.db_height,
            vm_index: vote.vm_index,
            faulted: vote.faulted,
            replacement: vote.replacement,
            system_height: vote.system_height,
        }
    }
}

impl ConsensusState {
    /// Votes against every VM of the open round still waiting past the
    /// fault timeout.
    pub(crate) fn fault_check(&mut self) {
        let now = self.now();
        if now.saturating_sub(self.minute_started_at) < self.config.fault_timeout {
            return;
        }
        let (db_height, saving) = (self.leader_height, self.saving);
        let Some(pl) = self.process_lists.get_mut(db_height) else {
            return;
        };
        let mut lagging = Vec::new();
        for (vm_index, vm) in pl.vms.iter_mut().enumerate() {
            let waiting = if saving { !vm.signed } else { !vm.synced };
            if !waiting {
                continue;
            }
            if vm.when_faulted.is_none() {
                vm.when_faulted = Some(now);
                warn!("vm {} of height {} is stalled", vm_index, db_height);
            }
            lagging.push(vm_index);
        }
        for vm_index in lagging {
            self.cast_fault_vote(db_height, vm_index);
        }
    }

    /// Votes to replace the current leader of a stalled VM by the first
    /// audit server.
    fn cast_fault_vote(&mut self, db_height: u32, vm_index: usize) {
        let Some(me) = self.identity() else {
            return;
        };
        let minute = if self.saving { 0 } else { self.current_minute };
        let Some(pl) = self.process_lists.get(db_height) else {
            return;
        };
        if !pl.authorities.is_fed(&me.identity) && !pl.authorities.is_audit(&me.identity) {
            return;
        }
        let Some(faulted) = pl.vm_leader(minute, vm_index).copied() else {
            return;
        };
        let Some(replacement) = pl.authorities.audit.first().copied() else {
            debug!("no audit server to replace {}", faulted);
            return;
        };
        if faulted == me.identity {
            return;
        }
        let system_height = pl.system.list.len() as u32;
        let key = FaultKey {
            db_height,
            vm_index,
            faulted,
            replacement,
            system_height,
        };
        if !self.cast_votes.insert(key) {
            return;
        }
        let vote = ServerFault::new(
            self.now(),
            db_height,
            vm_index,
            faulted,
            replacement,
            system_height,
            me.identity,
            &me.keypair,
        );
        info!(
            "voting to replace {} by {} on vm {} of height {}",
            faulted, replacement, vm_index, db_height
        );
        self.channels.network.send_out(Message::ServerFault(vote.clone()));
        self.process_server_fault(vote);
    }

    /// Checks the voter of a fault vote.
    pub(crate) fn validate_server_fault(&mut self, vote: &ServerFault) -> Validity {
        if vote.db_height <= self.dbstates.highest_saved() {
            return Validity::Invalid;
        }
        let limit = self.process_list_limit();
        if vote.db_height > limit {
            return Validity::Hold;
        }
        let voter = &vote.signer;
        let authorities = self.process_lists.authorities_at(vote.db_height);
        if !authorities.is_fed(voter) && !authorities.is_audit(voter) {
            return Validity::Invalid;
        }
        if !self.channels.authorities.verify_signature(
            voter,
            &vote.core_hash(),
            &vote.signature,
            vote.db_height,
        ) {
            return Validity::Invalid;
        }
        self.process_lists.get_or_create(vote.db_height, limit);
        Validity::Valid
    }

    /// Records a vote and assembles the full fault when it is due.
    pub(crate) fn process_server_fault(&mut self, vote: ServerFault) {
        let key = FaultKey::from(&vote);
        self.fault_votes
            .entry(key)
            .or_default()
            .insert(vote.signer, vote.signature);
        self.try_full_fault(key);
    }

    /// Builds and sends a full fault once a majority of the federated servers
    /// other than the faulted one voted, the replacement included.
    fn try_full_fault(&mut self, key: FaultKey) {
        let Some(me) = self.identity() else {
            return;
        };
        let Some(pl) = self.process_lists.get(key.db_height) else {
            return;
        };
        if pl
            .system
            .list
            .get(key.system_height as usize)
            .map_or(false, Option::is_some)
        {
            return;
        }
        let Some(votes) = self.fault_votes.get(&key) else {
            return;
        };
        let fed_voters = votes
            .keys()
            .filter(|voter| **voter != key.faulted && pl.authorities.is_fed(voter))
            .count();
        let electorate = pl.fed_count().saturating_sub(1);
        if fed_voters * 2 <= electorate || !votes.contains_key(&key.replacement) {
            return;
        }
        let votes: Vec<_> = votes
            .iter()
            .map(|(voter, signature)| (*voter, *signature))
            .collect();
        let fault = FullServerFault::new(
            self.now(),
            key.db_height,
            key.vm_index,
            key.faulted,
            key.replacement,
            key.system_height,
            votes,
            me.identity,
            &me.keypair,
        );
        info!(
            "full fault: {} replaced by {} at height {}",
            key.faulted, key.replacement, key.db_height
        );
        self.channels
            .network
            .send_out(Message::FullServerFault(fault.clone()));
        self.add_full_fault(fault);
    }

    /// Checks a full fault: roles, distinct verified votes forming a
    /// majority, the pledge and the assembler signature.
    pub(crate) fn validate_full_fault(&mut self, fault: &FullServerFault) -> Validity {
        if fault.db_height <= self.dbstates.highest_saved() {
            return Validity::Invalid;
        }
        let limit = self.process_list_limit();
        if fault.db_height > limit {
            return Validity::Hold;
        }
        let applied = self
            .process_lists
            .get(fault.db_height)
            .and_then(|pl| pl.system.list.get(fault.system_height as usize))
            .and_then(Option::as_ref);
        if applied.map_or(false, |applied| applied.core_hash() == fault.core_hash()) {
            return Validity::Valid;
        }
        let authorities = self.process_lists.authorities_at(fault.db_height);
        if !authorities.is_fed(&fault.faulted) || !authorities.is_audit(&fault.replacement) {
            return Validity::Invalid;
        }
        let core_hash = fault.core_hash();
        let mut voters: Vec<&IdentityId> = Vec::with_capacity(fault.votes.len());
        for (voter, signature) in &fault.votes {
            if voters.contains(&voter)
                || !self
                    .channels
                    .authorities
                    .verify_signature(voter, &core_hash, signature, fault.db_height)
            {
                return Validity::Invalid;
            }
            voters.push(voter);
        }
        let fed_voters = voters
            .iter()
            .filter(|voter| ***voter != fault.faulted && authorities.is_fed(voter))
            .count();
        if fed_voters * 2 <= authorities.fed.len().saturating_sub(1) || !fault.has_pledge() {
            return Validity::Invalid;
        }
        if !self.channels.authorities.verify_signature(
            &fault.signer,
            &fault.signing_hash(),
            &fault.signature,
            fault.db_height,
        ) {
            return Validity::Invalid;
        }
        self.process_lists.get_or_create(fault.db_height, limit);
        Validity::Valid
    }

    /// Places a full fault in the system list of its height.
    pub(crate) fn add_full_fault(&mut self, fault: FullServerFault) {
        let limit = self.process_list_limit();
        let (db_height, system_height) = (fault.db_height, fault.system_height);
        let Some(pl) = self.process_lists.get_or_create(db_height, limit) else {
            return;
        };
        if pl.system.add(fault) == InsertOutcome::Conflict {
            warn!(
                "another fault already holds system slot {} of height {}",
                system_height, db_height
            );
        }
    }

    /// Applies the faults of the system list in order: the faulted leader is
    /// replaced in this height and the following ones.
    pub(crate) fn process_system_list(&mut self, db_height: u32) -> bool {
        let mut progress = false;
        loop {
            let Some(pl) = self.process_lists.get(db_height) else {
                return progress;
            };
            let Some(Some(fault)) = pl.system.list.get(pl.system.height) else {
                return progress;
            };
            let entry = AdminEntry::ServerFault {
                faulted: fault.faulted,
                replacement: fault.replacement,
                system_height: fault.system_height,
            };
            let vm_index = fault.vm_index;
            self.process_lists.apply_admin_entry(db_height, &entry);
            let Some(pl) = self.process_lists.get_mut(db_height) else {
                return progress;
            };
            pl.admin_block.add_entry(entry.clone());
            pl.system.height += 1;
            for vm in pl.vms.iter_mut() {
                vm.when_faulted = None;
            }
            self.minute_started_at = self.now();
            if let AdminEntry::ServerFault {
                faulted,
                replacement,
                ..
            } = entry
            {
                info!(
                    "applied fault on vm {} of height {}: {} replaced by {}",
                    vm_index, db_height, faulted, replacement
                );
            }
            progress = true;
        }
    }
}
