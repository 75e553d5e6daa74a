// Copyright (c) 2024 DCHAIN LABS
//! Missing message requester: asks peers for process list slots that are
//! known to exist but were not received, batching the asks per virtual server.
mod requester;
mod tracker;

pub use requester::{mmr_channels, start_mmr_thread, MissingAsk, MmrReceivers, MmrSenders};
pub use tracker::{ask_delay, MissingMessageTracker, MIN_ASK_DELAY};
