// Copyright (c) 2024 DCHAIN LABS
use std::{
    ops::Deref,
    time::{Duration, Instant},
};

use crossbeam::channel::{SendError, SendTimeoutError, Sender, TrySendError};
#[cfg(feature = "metrics")]
use prometheus::Gauge;
use tracing::debug;

use crate::{BackpressurePolicy, SendOutcome};

#[derive(Debug)]
pub struct DChainSender<T> {
    pub(crate) sender: Sender<T>,
    pub(crate) name: String,
    /// channel size
    #[cfg(feature = "metrics")]
    pub(crate) actual_len: Gauge,
}

// derive would require `T: Clone`
impl<T> Clone for DChainSender<T> {
    fn clone(&self) -> Self {
        DChainSender {
            sender: self.sender.clone(),
            name: self.name.clone(),
            #[cfg(feature = "metrics")]
            actual_len: self.actual_len.clone(),
        }
    }
}

impl<T> DChainSender<T> {
    fn sent(&self) {
        #[cfg(feature = "metrics")]
        self.actual_len.inc();
    }

    /// Send a message to the channel
    pub fn send(&self, msg: T) -> Result<(), SendError<T>> {
        self.sender.send(msg)?;
        self.sent();
        Ok(())
    }

    pub fn send_timeout(&self, msg: T, duration: Duration) -> Result<(), SendTimeoutError<T>> {
        self.sender.send_timeout(msg, duration)?;
        self.sent();
        Ok(())
    }

    pub fn send_deadline(&self, msg: T, deadline: Instant) -> Result<(), SendTimeoutError<T>> {
        self.sender.send_deadline(msg, deadline)?;
        self.sent();
        Ok(())
    }

    pub fn try_send(&self, msg: T) -> Result<(), TrySendError<T>> {
        self.sender.try_send(msg)?;
        self.sent();
        Ok(())
    }

    /// Send honoring the given policy on a full queue.
    pub fn send_with_policy(&self, msg: T, policy: BackpressurePolicy) -> SendOutcome {
        match policy {
            BackpressurePolicy::Block => match self.send(msg) {
                Ok(()) => SendOutcome::Queued,
                Err(_) => SendOutcome::Disconnected,
            },
            BackpressurePolicy::DropNewest => match self.try_send(msg) {
                Ok(()) => SendOutcome::Queued,
                Err(TrySendError::Full(_)) => {
                    debug!("channel {} full, message dropped", self.name);
                    SendOutcome::Dropped
                }
                Err(TrySendError::Disconnected(_)) => SendOutcome::Disconnected,
            },
        }
    }

    /// name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Deref for DChainSender<T> {
    type Target = Sender<T>;

    fn deref(&self) -> &Self::Target {
        &self.sender
    }
}
