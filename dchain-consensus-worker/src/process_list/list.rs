// Copyright (c) 2024 DCHAIN LABS
use std::collections::{BTreeMap, HashMap, HashSet};

use dchain_hash::Hash;
use dchain_models::{
    blocks::{AdminBlock, AdminEntry, EBEntry, ECEntry, Entry, EntryBlock, EntryCreditBlock, FactoidBlock},
    config::{LEADER_MAP_HEIGHT_MULTIPLIER, MINUTES_PER_BLOCK},
    messages::FullServerFault,
    Ack, ChainId, EcAddress, IdentityId, Message,
};
use dchain_signature::Signature;

use super::{AuthoritySet, InsertOutcome, VM};

/// Ordered list of applied full server faults.
#[derive(Debug, Default, Clone)]
pub struct SystemList {
    /// faults by system height
    pub list: Vec<Option<FullServerFault>>,
    /// next system height to apply
    pub height: usize,
}

impl SystemList {
    /// Places a fault at its system height.
    pub fn add(&mut self, fault: FullServerFault) -> InsertOutcome {
        let slot = fault.system_height as usize;
        if slot >= self.list.len() {
            self.list.resize(slot + 1, None);
        }
        match &self.list[slot] {
            Some(existing) if existing.core_hash() == fault.core_hash() => InsertOutcome::Duplicate,
            Some(_) => InsertOutcome::Conflict,
            None => {
                self.list[slot] = Some(fault);
                InsertOutcome::Inserted
            }
        }
    }

    /// true once every fault received was applied
    pub fn is_done(&self) -> bool {
        self.height == self.list.len()
    }
}

/// Assigns, for each minute, the federated server index leading each VM.
pub(super) fn build_leader_map(db_height: u32, fed_count: usize) -> Vec<Vec<usize>> {
    if fed_count == 0 {
        return vec![Vec::new(); MINUTES_PER_BLOCK as usize];
    }
    let n = fed_count as u64;
    // the product wraps in 32 bits on every node
    let mut index = db_height.wrapping_mul(LEADER_MAP_HEIGHT_MULTIPLIER) as u64 % n;
    (0..MINUTES_PER_BLOCK)
        .map(|_| {
            index = (index + 1) % n;
            (0..fed_count)
                .map(|_| {
                    let fed = index as usize;
                    index = (index + 1) % n;
                    fed
                })
                .collect()
        })
        .collect()
}

/// Messages of one height, one lane per federated server, plus the block
/// being built from them.
#[derive(Debug, Clone)]
pub struct ProcessList {
    /// height
    pub db_height: u32,
    /// authorities of the height
    pub authorities: AuthoritySet,
    /// one lane per federated server
    pub vms: Vec<VM>,
    leader_map: Vec<Vec<usize>>,
    /// applied server faults
    pub system: SystemList,
    /// signatures of the previous directory block, one per federated server
    pub dbsigs: Vec<(IdentityId, Signature)>,
    /// true once the signature round of this height closed
    pub dbsigs_done: bool,
    /// signatures that disagree with the local previous block
    pub diff_sig_tally: usize,
    /// where each message sits, by message hash
    pub message_index: HashMap<Hash, (usize, usize)>,
    /// commit message hash by entry hash
    pub commits_by_entry: HashMap<Hash, Hash>,
    /// admin block under construction
    pub admin_block: AdminBlock,
    /// entry-credit block under construction
    pub ec_block: EntryCreditBlock,
    /// factoid block under construction
    pub factoid_block: FactoidBlock,
    /// entry blocks under construction, by chain
    pub entry_blocks: BTreeMap<ChainId, EntryBlock>,
    /// revealed entries
    pub entries: Vec<Entry>,
    /// credits spent by processed commits, by payer
    pub ec_debits: HashMap<EcAddress, u64>,
    /// chains created by processed reveals
    pub new_chains: HashSet<ChainId>,
}

impl ProcessList {
    /// Empty process list for `db_height`.
    pub fn new(db_height: u32, authorities: AuthoritySet, ec_exchange_rate: u64) -> Self {
        let fed_count = authorities.fed.len();
        ProcessList {
            db_height,
            leader_map: build_leader_map(db_height, fed_count),
            vms: vec![VM::default(); fed_count],
            authorities,
            system: SystemList::default(),
            dbsigs: Vec::new(),
            dbsigs_done: false,
            diff_sig_tally: 0,
            message_index: HashMap::new(),
            commits_by_entry: HashMap::new(),
            admin_block: AdminBlock::new(db_height),
            ec_block: EntryCreditBlock::new(db_height),
            factoid_block: FactoidBlock::new(db_height, ec_exchange_rate),
            entry_blocks: BTreeMap::new(),
            entries: Vec::new(),
            ec_debits: HashMap::new(),
            new_chains: HashSet::new(),
        }
    }

    /// Fresh list for the same height and authorities, used when the local
    /// content must be thrown away.
    pub fn reset(&self) -> Self {
        ProcessList::new(
            self.db_height,
            self.authorities.clone(),
            self.factoid_block.exchange_rate,
        )
    }

    /// number of federated servers
    pub fn fed_count(&self) -> usize {
        self.authorities.fed.len()
    }

    /// Replaces the authorities and rebuilds the leader map. Lanes are kept,
    /// added or truncated to match the federated count.
    pub fn set_authorities(&mut self, authorities: AuthoritySet) {
        let fed_count = authorities.fed.len();
        self.authorities = authorities;
        self.leader_map = build_leader_map(self.db_height, fed_count);
        self.vms.resize_with(fed_count, VM::default);
    }

    /// Applies an authority change. Returns true if the set changed.
    pub fn apply_admin_entry(&mut self, entry: &AdminEntry) -> bool {
        let mut authorities = self.authorities.clone();
        if !authorities.apply_admin_entry(entry) {
            return false;
        }
        self.set_authorities(authorities);
        true
    }

    /// VM led by `identity` at `minute`, if it is a federated server.
    pub fn get_virtual_servers(&self, minute: u8, identity: &IdentityId) -> Option<usize> {
        let fed = self.authorities.fed_index(identity)?;
        let minute = minute.min(MINUTES_PER_BLOCK - 1) as usize;
        self.leader_map.get(minute)?.iter().position(|f| *f == fed)
    }

    /// Leader of `vm` at `minute`.
    pub fn vm_leader(&self, minute: u8, vm: usize) -> Option<&IdentityId> {
        let minute = minute.min(MINUTES_PER_BLOCK - 1) as usize;
        let fed = *self.leader_map.get(minute)?.get(vm)?;
        self.authorities.fed.get(fed)
    }

    /// true if `identity` leads `vm` at some minute of this height
    pub fn leads_vm(&self, identity: &IdentityId, vm: usize) -> bool {
        (0..MINUTES_PER_BLOCK).any(|minute| self.vm_leader(minute, vm) == Some(identity))
    }

    /// Places an acknowledged message. Duplicates leave the list unchanged.
    pub fn add_to_process_list(&mut self, ack: Ack, message: Message) -> Option<InsertOutcome> {
        let (vm_index, slot) = (ack.vm_index, ack.height as usize);
        let msg_hash = message.msg_hash();
        let commit_entry = match &message {
            Message::CommitChain(_) | Message::CommitEntry(_) => message.entry_hash(),
            _ => None,
        };
        let outcome = self.vms.get_mut(vm_index)?.insert(ack, message);
        if outcome == InsertOutcome::Inserted {
            self.message_index.insert(msg_hash, (vm_index, slot));
            if let Some(entry_hash) = commit_entry {
                self.commits_by_entry.insert(entry_hash, msg_hash);
            }
        }
        Some(outcome)
    }

    /// Empties a slot that turned out to be wrong.
    pub fn clear_slot(&mut self, vm_index: usize, slot: usize) -> Option<(Ack, Message)> {
        let (ack, message) = self.vms.get_mut(vm_index)?.clear_slot(slot)?;
        self.message_index.remove(&ack.message_hash);
        Some((ack, message))
    }

    /// message and ack in a slot
    pub fn get_slot(&self, vm_index: usize, slot: usize) -> Option<(&Ack, &Message)> {
        let vm = self.vms.get(vm_index)?;
        let ack = vm.list_ack.get(slot)?.as_ref()?;
        let message = vm.list.get(slot)?.as_ref()?;
        Some((ack, message))
    }

    /// Records the signature of a federated server over the previous block.
    pub fn add_dbsig(&mut self, identity: IdentityId, signature: Signature) -> bool {
        if !self.authorities.is_fed(&identity) || self.dbsigs.iter().any(|(id, _)| id == &identity) {
            return false;
        }
        self.dbsigs.push((identity, signature));
        true
    }

    /// true if more than half of the federated servers signed the previous block
    pub fn dbsig_majority(&self) -> bool {
        self.dbsigs.len() * 2 > self.fed_count()
    }

    /// True when every lane processed its last EOM and its signature, and
    /// nothing received is left unprocessed.
    pub fn complete(&self) -> bool {
        !self.vms.is_empty()
            && self.vms.iter().all(|vm| {
                vm.leader_minute >= MINUTES_PER_BLOCK && vm.is_caught_up() && vm.signed
            })
    }

    /// Moves the content of `minute` into the blocks, lane by lane, then
    /// writes the minute markers. Lane order makes the result the same on
    /// every node whatever the arrival order was.
    pub fn close_minute(&mut self, minute: u8) {
        let mut ec_lines = Vec::new();
        let mut reveals = Vec::new();
        let mut signatures = Vec::new();
        for vm in self.vms.iter_mut() {
            let end = vm.height.min(vm.list.len());
            for slot in vm.minute_start..end {
                let Some(message) = &vm.list[slot] else {
                    continue;
                };
                match message {
                    // only signatures of the local previous block go in
                    Message::DirectoryBlockSignature(dbsig)
                        if self.dbsigs.iter().any(|(identity, _)| *identity == dbsig.leader) =>
                    {
                        signatures.push(AdminEntry::DBSignature {
                            identity: dbsig.leader,
                            signature: dbsig.dblock_signature,
                        })
                    }
                    Message::CommitChain(commit) => ec_lines.push(ECEntry::CommitChain {
                        commit_hash: message.msg_hash(),
                        chain_id: commit.chain_id,
                        entry_hash: commit.entry_hash,
                        address: commit.address(),
                        credits: commit.credits,
                    }),
                    Message::CommitEntry(commit) => ec_lines.push(ECEntry::CommitEntry {
                        commit_hash: message.msg_hash(),
                        entry_hash: commit.entry_hash,
                        address: commit.address(),
                        credits: commit.credits,
                    }),
                    Message::RevealEntry(reveal) => reveals.push(reveal.entry.clone()),
                    _ => {}
                }
            }
            vm.minute_start = end;
        }
        for entry in signatures {
            self.admin_block.add_entry(entry);
        }
        self.ec_block.entries.extend(ec_lines);
        for entry in reveals {
            let db_height = self.db_height;
            self.entry_blocks
                .entry(entry.chain_id)
                .or_insert_with(|| EntryBlock::new(entry.chain_id, db_height))
                .entries
                .push(EBEntry::Entry(entry.hash()));
            self.entries.push(entry);
        }
        self.ec_block.add_minute_marker(minute + 1);
        for entry_block in self.entry_blocks.values_mut() {
            entry_block.add_minute_marker(minute + 1);
        }
        self.factoid_block.end_of_period(minute);
    }

    /// hashes of every message placed in the lanes
    pub fn message_hashes(&self) -> impl Iterator<Item = &Hash> {
        self.message_index.keys()
    }
}
