// Copyright (c) 2024 DCHAIN LABS
//! Entry point of every message: replay check, validation, then leader or
//! follower execution for messages ordered by acks, direct execution for
//! the others.
use dchain_hash::Hash;
use dchain_logging::dchain_trace;
use dchain_models::{
    config::MINUTES_PER_BLOCK,
    messages::MissingMsgResponse,
    Ack, IdentityId, Message,
};
use dchain_signature::Signature;
use tracing::debug;

use super::{ConsensusState, Validity};
use crate::{
    process_list::InsertOutcome,
    replay::INTERNAL_REPLAY,
};

impl ConsensusState {
    /// Executes one message received from the network or built locally.
    pub fn execute_msg(&mut self, message: Message) {
        let now = self.now();
        let timestamp = message.timestamp();
        if now < self.boot_time.saturating_add(self.config.ignore_missing_period)
            && now.saturating_sub(timestamp) > self.config.ignore_missing_max_age
        {
            debug!("ignoring old {} message during boot", message.kind());
            return;
        }
        if self
            .replay
            .lock()
            .valid(INTERNAL_REPLAY, &message.repeat_hash(), timestamp, now)
            .is_none()
        {
            dchain_trace!("consensus.execute_msg.replay", { "kind": message.kind().to_string() });
            return;
        }
        let message = match message {
            Message::Ack(ack) => return self.execute_ack(ack),
            message => message,
        };
        let limit = self.process_list_limit();
        self.process_lists.get_or_create(self.leader_height, limit);

        match self.validate(&message) {
            Validity::Valid => self.execute_valid(message),
            Validity::Hold => self.hold(message),
            Validity::Invalid => {
                self.mark_invalid(&message);
                // Only messages ordered by acks are held: an ack from a
                // leader, or an authority change, can still place them. The
                // others never become valid and would only fill holding.
                if message.needs_ack() {
                    self.holding.insert(message);
                }
            }
        }
    }

    fn execute_valid(&mut self, message: Message) {
        if !message.needs_ack() {
            return self.execute_direct(message);
        }
        match self.should_lead(&message) {
            Some((db_height, vm_index)) => self.leader_execute(message, db_height, vm_index),
            None => self.follower_execute(message),
        }
    }

    /// Classifies a message. Entry and fault messages are checked in their
    /// own modules.
    pub(crate) fn validate(&mut self, message: &Message) -> Validity {
        match message {
            Message::EndOfMinute(eom) => {
                if eom.minute >= MINUTES_PER_BLOCK {
                    return Validity::Invalid;
                }
                self.validate_leader_message(
                    eom.db_height,
                    eom.vm_index,
                    eom.minute,
                    &eom.leader,
                    &eom.signing_hash(),
                    &eom.signature,
                )
            }
            Message::DirectoryBlockSignature(dbsig) => self.validate_leader_message(
                dbsig.db_height,
                dbsig.vm_index,
                0,
                &dbsig.leader,
                &dbsig.signing_hash(),
                &dbsig.signature,
            ),
            Message::CommitChain(_) | Message::CommitEntry(_) => self.validate_commit(message),
            Message::RevealEntry(reveal) => self.validate_reveal(reveal),
            Message::ServerFault(vote) => self.validate_server_fault(vote),
            Message::FullServerFault(fault) => self.validate_full_fault(fault),
            Message::MissingMsgResponse(response) => {
                if response.is_consistent() {
                    Validity::Valid
                } else {
                    Validity::Invalid
                }
            }
            Message::MissingMsg(_) | Message::DBStateMissing(_) | Message::DBState(_) => {
                Validity::Valid
            }
            Message::Ack(_) => Validity::Valid,
        }
    }

    /// Checks a message a leader signs for its own virtual server.
    fn validate_leader_message(
        &mut self,
        db_height: u32,
        vm_index: usize,
        minute: u8,
        leader: &IdentityId,
        signing_hash: &Hash,
        signature: &Signature,
    ) -> Validity {
        if db_height <= self.dbstates.highest_saved() {
            return Validity::Invalid;
        }
        let limit = self.process_list_limit();
        if db_height > limit {
            return Validity::Hold;
        }
        if self.process_lists.vm_leader_at(db_height, minute, vm_index).as_ref() != Some(leader) {
            return Validity::Invalid;
        }
        if !self
            .channels
            .authorities
            .verify_signature(leader, signing_hash, signature, db_height)
        {
            return Validity::Invalid;
        }
        // only authenticated leader messages open a height
        self.process_lists.get_or_create(db_height, limit);
        Validity::Valid
    }

    /// Height, virtual server and minute whose leader orders `message`.
    fn lead_target(&self, message: &Message) -> Option<(u32, usize, u8)> {
        match message {
            Message::EndOfMinute(eom) => Some((eom.db_height, eom.vm_index, eom.minute)),
            Message::DirectoryBlockSignature(dbsig) => Some((dbsig.db_height, dbsig.vm_index, 0)),
            Message::CommitChain(_) | Message::CommitEntry(_) | Message::RevealEntry(_) => {
                let pl = self.process_lists.get(self.leader_height)?;
                let vm_index = message.vm_index(pl.fed_count())?;
                Some((self.leader_height, vm_index, self.current_minute))
            }
            _ => None,
        }
    }

    /// Height and virtual server this node must order `message` in, if it
    /// leads it right now. Only signatures are led while saving.
    fn should_lead(&self, message: &Message) -> Option<(u32, usize)> {
        let me = self.config.identity.as_ref()?;
        let (db_height, vm_index, minute) = self.lead_target(message)?;
        let is_dbsig = matches!(message, Message::DirectoryBlockSignature(_));
        if db_height != self.leader_height || self.saving != is_dbsig {
            return None;
        }
        let pl = self.process_lists.get(db_height)?;
        (pl.vm_leader(minute, vm_index) == Some(&me.identity)).then_some((db_height, vm_index))
    }

    /// Stamps an ack for `message`, sends both out and places them.
    fn leader_execute(&mut self, message: Message, db_height: u32, vm_index: usize) {
        let Some(me) = self.identity() else {
            return self.follower_execute(message);
        };
        let now = self.now();
        let Some(vm) = self
            .process_lists
            .get(db_height)
            .and_then(|pl| pl.vms.get(vm_index))
        else {
            return;
        };
        if !vm.is_caught_up() {
            self.leader_backlog.push(message);
            return;
        }
        let ack = Ack::new(
            vm.last_ack(),
            now,
            db_height,
            vm_index,
            message.msg_hash(),
            me.identity,
            &me.keypair,
        );
        dchain_trace!("consensus.leader_execute", {
            "kind": message.kind().to_string(),
            "db_height": db_height,
            "vm_index": vm_index,
            "height": ack.height,
        });
        self.channels.network.send_out(message.clone());
        self.channels.network.send_out(Message::Ack(ack.clone()));
        self.add_to_process_list(ack, message);
    }

    /// Places the message if its ack arrived, holds it otherwise.
    fn follower_execute(&mut self, message: Message) {
        match self.acks.get(&message.msg_hash()).cloned() {
            Some(ack) => self.add_to_process_list(ack, message),
            None => {
                if !self.holding.insert(message) {
                    debug!("holding is full, dropping message");
                }
            }
        }
    }

    /// Keeps a message for later. A reveal without its commit waits on the
    /// entry hash so the commit releases it.
    fn hold(&mut self, message: Message) {
        if let Some(ack) = self.acks.get(&message.msg_hash()).cloned() {
            return self.add_to_process_list(ack, message);
        }
        let held = match &message {
            Message::RevealEntry(reveal) if !self.commits.contains_key(&reveal.entry_hash()) => {
                self.holding.insert_dependent(reveal.entry_hash(), message)
            }
            _ => self.holding.insert(message),
        };
        if !held {
            debug!("holding is full, dropping message");
        }
    }

    /// Checks an ack and places its message if already received.
    fn execute_ack(&mut self, ack: Ack) {
        let db_height = ack.db_height;
        if db_height <= self.dbstates.highest_saved() {
            return;
        }
        let limit = self.process_list_limit();
        if db_height > limit {
            debug!("ack for height {} is past the lookahead", db_height);
            return;
        }
        if !self.process_lists.leads_vm_at(db_height, &ack.leader, ack.vm_index)
            || !self.channels.authorities.verify_signature(
                &ack.leader,
                &ack.content_hash(),
                &ack.signature,
                db_height,
            )
        {
            return self.mark_invalid(&Message::Ack(ack));
        }
        self.process_lists.get_or_create(db_height, limit);
        match self.holding.get(&ack.message_hash).cloned() {
            Some(message) => self.add_to_process_list(ack, message),
            None => {
                self.acks.insert(ack.message_hash, ack);
            }
        }
    }

    /// Inserts an acknowledged message in its process list and marks both
    /// as executed.
    pub(crate) fn add_to_process_list(&mut self, ack: Ack, message: Message) {
        let now = self.now();
        let msg_hash = message.msg_hash();
        let (db_height, vm_index, height) = (ack.db_height, ack.vm_index, ack.height);
        if db_height <= self.dbstates.highest_saved() {
            self.acks.remove(&msg_hash);
            self.holding.remove(&msg_hash);
            return;
        }
        let limit = self.process_list_limit();
        let Some(pl) = self.process_lists.get_or_create(db_height, limit) else {
            return;
        };
        let ack_hash = Message::Ack(ack.clone()).repeat_hash();
        let ack_timestamp = ack.timestamp;
        match pl.add_to_process_list(ack, message.clone()) {
            Some(InsertOutcome::Inserted) => {
                {
                    let mut replay = self.replay.lock();
                    replay.is_ts_valid(INTERNAL_REPLAY, &message.repeat_hash(), message.timestamp(), now);
                    replay.is_ts_valid(INTERNAL_REPLAY, &ack_hash, ack_timestamp, now);
                }
                self.holding.remove(&msg_hash);
                self.acks.remove(&msg_hash);
                self.mmr.add(db_height, vm_index, height);
                dchain_trace!("consensus.add_to_process_list", {
                    "kind": message.kind().to_string(),
                    "db_height": db_height,
                    "vm_index": vm_index,
                    "height": height,
                });
            }
            Some(InsertOutcome::Duplicate) => {
                self.holding.remove(&msg_hash);
                self.acks.remove(&msg_hash);
            }
            Some(InsertOutcome::Conflict) => {
                debug!(
                    "slot {} of vm {} at height {} already holds another message",
                    height, vm_index, db_height
                );
                self.acks.remove(&msg_hash);
            }
            None => debug!("no vm {} at height {}", vm_index, db_height),
        }
    }

    /// Executes messages that are not ordered by acks.
    fn execute_direct(&mut self, message: Message) {
        let now = self.now();
        match message {
            Message::ServerFault(vote) => {
                self.mark_executed(&Message::ServerFault(vote.clone()), now);
                self.process_server_fault(vote);
            }
            Message::FullServerFault(fault) => {
                self.mark_executed(&Message::FullServerFault(fault.clone()), now);
                self.add_full_fault(fault);
            }
            Message::MissingMsg(request) => self.answer_missing(request),
            Message::MissingMsgResponse(MissingMsgResponse { ack, message, .. }) => {
                self.execute_msg(Message::Ack(ack));
                self.execute_msg(*message);
            }
            Message::DBStateMissing(request) => self.answer_dbstate_missing(request),
            Message::DBState(dbstate) => self.execute_dbstate_msg(dbstate),
            other => debug!("{} messages need an ack", other.kind()),
        }
    }

    fn mark_executed(&self, message: &Message, now: dchain_time::ChainTime) {
        self.replay
            .lock()
            .is_ts_valid(INTERNAL_REPLAY, &message.repeat_hash(), message.timestamp(), now);
    }

    /// Executes messages released by a processed dependency.
    pub(crate) fn execute_released(&mut self) -> bool {
        let mut progress = false;
        while let Some(message) = self.released.pop_front() {
            self.execute_msg(message);
            progress = true;
        }
        progress
    }

    /// Tries again the messages this node leads whose virtual server was
    /// behind. Returns true if any of them left the backlog.
    pub(crate) fn retry_leader_backlog(&mut self) -> bool {
        if self.leader_backlog.is_empty() {
            return false;
        }
        let backlog = std::mem::take(&mut self.leader_backlog);
        let before = backlog.len();
        for message in backlog {
            self.execute_msg(message);
        }
        self.leader_backlog.len() < before
    }
}
