// Copyright (c) 2024 DCHAIN LABS
use std::{sync::Arc, thread::JoinHandle};

use crossbeam::channel::{select, tick};
use dchain_channel::{receiver::DChainReceiver, sender::DChainSender, DChainChannel};
use dchain_consensus_exports::NetworkController;
use dchain_logging::dchain_trace;
use dchain_models::{IdentityId, Message};
use dchain_time::{ChainTime, Clock};
use tracing::debug;

use super::MissingMessageTracker;

/// Request for a missing slot, fired at `when`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingAsk {
    /// process list height
    pub db_height: u32,
    /// virtual server
    pub vm_index: usize,
    /// slot
    pub height: u32,
    /// when the request may go out
    pub when: ChainTime,
}

/// Sending side of the requester, owned by the consensus driver.
#[derive(Clone)]
pub struct MmrSenders {
    ask: DChainSender<MissingAsk>,
    add: DChainSender<(u32, usize, u32)>,
    height: DChainSender<u32>,
}

impl MmrSenders {
    /// Asks for a slot at `when`.
    pub fn ask(&self, ask: MissingAsk) {
        if self.ask.send(ask).is_err() {
            debug!("missing message requester is gone");
        }
    }

    /// Signals that a slot was filled.
    pub fn add(&self, db_height: u32, vm_index: usize, height: u32) {
        let _ = self.add.send((db_height, vm_index, height));
    }

    /// Drops every ask below `db_height`.
    pub fn advance_height(&self, db_height: u32) {
        let _ = self.height.send(db_height);
    }
}

/// Receiving side of the requester, moved into its thread.
pub struct MmrReceivers {
    /// slot asks
    pub ask: DChainReceiver<MissingAsk>,
    /// filled slots
    pub add: DChainReceiver<(u32, usize, u32)>,
    /// new floor heights
    pub height: DChainReceiver<u32>,
}

/// Creates the three requester queues.
pub fn mmr_channels() -> (MmrSenders, MmrReceivers) {
    let (ask_tx, ask_rx) = DChainChannel::new("mmr_ask".to_string(), None);
    let (add_tx, add_rx) = DChainChannel::new("mmr_add".to_string(), None);
    let (height_tx, height_rx) = DChainChannel::new("mmr_height".to_string(), None);
    (
        MmrSenders {
            ask: ask_tx,
            add: add_tx,
            height: height_tx,
        },
        MmrReceivers {
            ask: ask_rx,
            add: add_rx,
            height: height_rx,
        },
    )
}

struct MissingMessageRequester {
    receivers: MmrReceivers,
    tracker: MissingMessageTracker,
    network: Box<dyn NetworkController>,
    clock: Arc<dyn Clock>,
    asker: Option<IdentityId>,
    cadence: ChainTime,
}

impl MissingMessageRequester {
    fn send_due(&mut self) {
        for request in self.tracker.tick(self.clock.now(), self.asker) {
            dchain_trace!("mmr.send", {
                "db_height": request.db_height,
                "vm_index": request.vm_index,
                "heights": request.heights,
            });
            self.network.send_out(Message::MissingMsg(request));
        }
    }

    fn run(&mut self) {
        let ticker = tick(self.cadence.to_duration());
        loop {
            select! {
                recv(self.receivers.ask) -> ask => match ask {
                    Ok(ask) => self.tracker.ask(ask.db_height, ask.vm_index, ask.height, ask.when),
                    Err(_) => break,
                },
                recv(self.receivers.add) -> add => match add {
                    Ok((db_height, vm_index, height)) => self.tracker.add(db_height, vm_index, height),
                    Err(_) => break,
                },
                recv(self.receivers.height) -> height => match height {
                    Ok(height) => self.tracker.advance_height(height),
                    Err(_) => break,
                },
                recv(ticker) -> _ => self.send_due(),
            }
        }
        debug!("missing message requester stopped");
    }
}

/// Starts the requester thread. It stops once the driver drops its senders.
pub fn start_mmr_thread(
    receivers: MmrReceivers,
    network: Box<dyn NetworkController>,
    clock: Arc<dyn Clock>,
    asker: Option<IdentityId>,
    cadence: ChainTime,
    range: u32,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("consensus-mmr".to_string())
        .spawn(move || {
            let mut requester = MissingMessageRequester {
                receivers,
                tracker: MissingMessageTracker::new(cadence, range),
                network,
                clock,
                asker,
                cadence,
            };
            requester.run();
        })
        .expect("OS failed to start missing message requester thread")
}
