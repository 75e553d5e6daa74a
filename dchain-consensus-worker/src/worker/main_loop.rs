// Copyright (c) 2024 DCHAIN LABS
use crossbeam::channel::{select, TryRecvError};
use dchain_consensus_exports::error::ConsensusError;
use dchain_models::Message;
use tracing::{debug, info, warn};

use super::ConsensusWorker;
use crate::commands::ConsensusCommand;

enum WaitingStatus {
    Ended,
    Interrupted,
    Disconnected,
}

impl ConsensusWorker {
    /// Execute a command received from the controller.
    ///
    /// # Returns:
    /// If successful, returns true if the loop should continue, false if it should stop.
    /// An error if the command failed
    fn manage_command(&mut self, command: ConsensusCommand) -> Result<bool, ConsensusError> {
        match command {
            ConsensusCommand::GetAckStatus(hash, responder) => {
                let status = self.state.get_ack_status(&hash);
                if responder.try_send(status).is_err() {
                    debug!("ack status query abandoned");
                }
                Ok(true)
            }
            ConsensusCommand::GetEntryCommitAck(entry_hash, responder) => {
                let status = self.state.get_entry_commit_ack(&entry_hash);
                if responder.try_send(status).is_err() {
                    debug!("entry commit query abandoned");
                }
                Ok(true)
            }
            ConsensusCommand::Stop => Ok(false),
        }
    }

    /// Runs the pending commands. Returns false once the worker must stop.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.command_receiver.try_recv() {
                Ok(command) => match self.manage_command(command) {
                    Ok(true) => {}
                    Ok(false) => return false,
                    Err(err) => warn!("error in consensus: {}", err),
                },
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Executes at most one batch from each inbound queue, acks first so the
    /// messages they order find them. Returns the number of messages executed.
    fn drain_inputs(&mut self) -> usize {
        let max = self.state.config.max_batch_per_pass;
        let acks = self.ack_receiver.drain_up_to(max);
        let messages = self.msg_receiver.drain_up_to(max);
        let dbstates = self.dbstate_receiver.drain_up_to(max);
        let count = acks.len() + messages.len() + dbstates.len();
        for ack in acks {
            self.state.execute_msg(Message::Ack(ack));
        }
        for message in messages {
            self.state.execute_msg(message);
        }
        for dbstate in dbstates {
            self.state.execute_msg(Message::DBState(dbstate));
        }
        count
    }

    /// Waits for any input or at most `max_idle_sleep`.
    ///
    /// # Return:
    /// WaitingStatus::Interrupted => if an input arrived or a command has been executed
    /// WaitingStatus::Ended => if the wait timed out
    /// WaitingStatus::Disconnected => if we received a stop signal
    fn wait_input(&mut self) -> WaitingStatus {
        let timeout = self.state.config.max_idle_sleep.to_duration();
        select! {
            recv(self.command_receiver) -> command => match command {
                Ok(command) => match self.manage_command(command) {
                    Ok(true) => WaitingStatus::Interrupted,
                    Ok(false) => WaitingStatus::Disconnected,
                    Err(err) => {
                        warn!("error in consensus: {}", err);
                        WaitingStatus::Interrupted
                    }
                },
                Err(_) => WaitingStatus::Disconnected,
            },
            recv(self.ack_receiver) -> ack => match ack {
                Ok(ack) => {
                    self.state.execute_msg(Message::Ack(ack));
                    WaitingStatus::Interrupted
                }
                Err(_) => WaitingStatus::Disconnected,
            },
            recv(self.msg_receiver) -> message => match message {
                Ok(message) => {
                    self.state.execute_msg(message);
                    WaitingStatus::Interrupted
                }
                Err(_) => WaitingStatus::Disconnected,
            },
            recv(self.dbstate_receiver) -> dbstate => match dbstate {
                Ok(dbstate) => {
                    self.state.execute_msg(Message::DBState(dbstate));
                    WaitingStatus::Interrupted
                }
                Err(_) => WaitingStatus::Disconnected,
            },
            default(timeout) => WaitingStatus::Ended,
        }
    }

    /// Runs until stopped: commands first, then a batch of every queue,
    /// the time driven work and a pass over the state. Sleeps only when a
    /// pass did nothing.
    pub fn run(mut self) {
        info!(
            "consensus worker started at height {}",
            self.state.leader_height
        );
        loop {
            if !self.drain_commands() {
                break;
            }
            let executed = self.drain_inputs();
            self.state.on_tick();
            let progress = self.state.step();
            if executed > 0 || progress {
                continue;
            }
            match self.wait_input() {
                WaitingStatus::Disconnected => break,
                WaitingStatus::Ended | WaitingStatus::Interrupted => continue,
            }
        }
        self.state.shutdown();
        let ConsensusWorker {
            state, mmr_thread, ..
        } = self;
        // dropping the state closes the requester queues
        drop(state);
        if let Some(handle) = mmr_thread {
            if handle.join().is_err() {
                warn!("missing message requester thread panicked");
            }
        }
        info!("consensus worker finished");
    }
}
