// Copyright (c) 2024 DCHAIN LABS
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crossbeam::channel::{RecvTimeoutError, SendTimeoutError};
use dchain_channel::{sender::DChainSender, BackpressurePolicy, DChainChannel, SendOutcome};
use dchain_consensus_exports::{error::ConsensusError, AckStatus, ConsensusController};
use dchain_hash::Hash;
use dchain_models::{messages::DBStateMsg, Ack, Message};
use dchain_time::{ChainTime, Clock};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
    commands::ConsensusCommand,
    replay::{ReplayFilter, NETWORK_REPLAY},
    state::ConsensusStatus,
};

/// The consensus controller: pre-filters network messages, routes them to
/// the driver queues and answers queries.
#[derive(Clone)]
pub struct ConsensusControllerImpl {
    command_sender: DChainSender<ConsensusCommand>,
    msg_sender: DChainSender<Message>,
    ack_sender: DChainSender<Ack>,
    dbstate_sender: DChainSender<DBStateMsg>,
    status: Arc<RwLock<ConsensusStatus>>,
    replay: Arc<Mutex<ReplayFilter>>,
    clock: Arc<dyn Clock>,
    policy: BackpressurePolicy,
    dbstate_flood: Arc<AtomicBool>,
    query_timeout: ChainTime,
}

impl ConsensusControllerImpl {
    #[allow(clippy::too_many_arguments)]
    /// Creates a controller over the driver queues.
    pub fn new(
        command_sender: DChainSender<ConsensusCommand>,
        msg_sender: DChainSender<Message>,
        ack_sender: DChainSender<Ack>,
        dbstate_sender: DChainSender<DBStateMsg>,
        status: Arc<RwLock<ConsensusStatus>>,
        replay: Arc<Mutex<ReplayFilter>>,
        clock: Arc<dyn Clock>,
        policy: BackpressurePolicy,
        dbstate_flood: Arc<AtomicBool>,
        query_timeout: ChainTime,
    ) -> Self {
        ConsensusControllerImpl {
            command_sender,
            msg_sender,
            ack_sender,
            dbstate_sender,
            status,
            replay,
            clock,
            policy,
            dbstate_flood,
            query_timeout,
        }
    }

    fn query(
        &self,
        build: impl FnOnce(DChainSender<Result<AckStatus, ConsensusError>>) -> ConsensusCommand,
    ) -> Result<AckStatus, ConsensusError> {
        let (response_tx, response_rx) = DChainChannel::new("consensus_query".to_string(), Some(1));
        let timeout = self.query_timeout.to_duration();
        match self.command_sender.send_timeout(build(response_tx), timeout) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                return Err(ConsensusError::QueryTimeout(self.query_timeout.to_millis()))
            }
            Err(SendTimeoutError::Disconnected(_)) => return Err(ConsensusError::Stopped),
        }
        match response_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                Err(ConsensusError::QueryTimeout(self.query_timeout.to_millis()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ConsensusError::Stopped),
        }
    }
}

impl ConsensusController for ConsensusControllerImpl {
    fn get_highest_saved_blk(&self) -> u32 {
        self.status.read().highest_saved
    }

    fn get_highest_known_block(&self) -> u32 {
        self.status.read().highest_known
    }

    fn get_leader_height(&self) -> u32 {
        self.status.read().leader_height
    }

    fn get_ack_status(&self, hash: Hash) -> Result<AckStatus, ConsensusError> {
        self.query(|responder| ConsensusCommand::GetAckStatus(hash, responder))
    }

    fn get_entry_commit_ack_by_entry_hash(
        &self,
        entry_hash: Hash,
    ) -> Result<AckStatus, ConsensusError> {
        self.query(|responder| ConsensusCommand::GetEntryCommitAck(entry_hash, responder))
    }

    /// Drops network replays, then queues the message. A message dropped on a
    /// full queue is unmarked so that a later copy gets through.
    fn register_message(&self, message: Message) -> SendOutcome {
        let hash = message.repeat_hash();
        if !message.is_peer_to_peer() {
            let now = self.clock.now();
            if !self
                .replay
                .lock()
                .is_ts_valid(NETWORK_REPLAY, &hash, message.timestamp(), now)
            {
                debug!("dropping replayed {} message {}", message.kind(), hash);
                return SendOutcome::Dropped;
            }
        }
        let outcome = match message {
            Message::Ack(ack) => self.ack_sender.send_with_policy(ack, self.policy),
            Message::DBState(dbstate) => self.dbstate_sender.send_with_policy(dbstate, self.policy),
            message => {
                let outcome = self.msg_sender.send_with_policy(message, self.policy);
                if outcome == SendOutcome::Dropped {
                    self.dbstate_flood.store(true, Ordering::Release);
                }
                outcome
            }
        };
        if outcome == SendOutcome::Dropped {
            self.replay.lock().clear(NETWORK_REPLAY, &hash);
        }
        outcome
    }

    fn clone_box(&self) -> Box<dyn ConsensusController> {
        Box::new(self.clone())
    }
}
