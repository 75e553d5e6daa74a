// Copyright (c) 2024 DCHAIN LABS
//! Loopback transport: every message the driver sends out is delivered back
//! to it, as a peer-to-peer network with a single node would.
use std::thread::JoinHandle;

use dchain_channel::{receiver::DChainReceiver, SendOutcome};
use dchain_consensus_exports::ConsensusController;
use dchain_models::Message;
use tracing::{debug, info};

/// Starts the loopback thread. It stops once every sender of `receiver`
/// is dropped or the driver is gone.
pub fn start_loopback(
    receiver: DChainReceiver<Message>,
    controller: Box<dyn ConsensusController>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("network-loopback".into())
        .spawn(move || {
            let mut delivered: u64 = 0;
            let mut dropped: u64 = 0;
            while let Ok(message) = receiver.recv() {
                match controller.register_message(message) {
                    SendOutcome::Queued => delivered += 1,
                    SendOutcome::Dropped => {
                        dropped += 1;
                        debug!("loopback message dropped ({} so far)", dropped);
                    }
                    SendOutcome::Disconnected => break,
                }
            }
            info!(
                "loopback stopped: {} messages delivered, {} dropped",
                delivered, dropped
            );
        })
        .expect("OS failed to start network loopback thread")
}
