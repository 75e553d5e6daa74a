// Copyright (c) 2024 DCHAIN LABS
use std::thread::JoinHandle;

use dchain_channel::sender::DChainSender;
use dchain_consensus_exports::ConsensusManager;
use tracing::{debug, info};

use crate::commands::ConsensusCommand;

/// Stops the consensus worker thread.
pub struct ConsensusManagerImpl {
    /// command sender and join handle of the worker thread
    pub consensus_thread: Option<(DChainSender<ConsensusCommand>, JoinHandle<()>)>,
}

impl ConsensusManager for ConsensusManagerImpl {
    fn stop(&mut self) {
        info!("stopping consensus worker...");
        // join the consensus thread
        if let Some((tx, join_handle)) = self.consensus_thread.take() {
            // the worker also stops by itself once the controllers are dropped
            if tx.send(ConsensusCommand::Stop).is_err() {
                debug!("consensus worker already stopped");
            }
            drop(tx);
            join_handle
                .join()
                .expect("consensus thread panicked on try to join");
        }
        info!("consensus worker stopped");
    }
}
