// Copyright (c) 2024 DCHAIN LABS
use std::{ops::Deref, time::Duration};

use crossbeam::channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
#[cfg(feature = "metrics")]
use prometheus::Gauge;

pub struct DChainReceiver<T> {
    pub(crate) receiver: Receiver<T>,
    #[allow(dead_code)]
    pub(crate) name: String,
    /// channel size
    #[cfg(feature = "metrics")]
    pub(crate) actual_len: Gauge,
}

impl<T> Clone for DChainReceiver<T> {
    fn clone(&self) -> Self {
        DChainReceiver {
            receiver: self.receiver.clone(),
            name: self.name.clone(),
            #[cfg(feature = "metrics")]
            actual_len: self.actual_len.clone(),
        }
    }
}

impl<T> DChainReceiver<T> {
    fn received(&self) {
        // use the len of the channel instead of dec() since clones share the queue
        #[cfg(feature = "metrics")]
        self.actual_len.set(self.receiver.len() as f64);
    }

    /// attempt to receive a message from the channel
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let msg = self.receiver.try_recv()?;
        self.received();
        Ok(msg)
    }

    pub fn recv(&self) -> Result<T, RecvError> {
        let msg = self.receiver.recv()?;
        self.received();
        Ok(msg)
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let msg = self.receiver.recv_timeout(timeout)?;
        self.received();
        Ok(msg)
    }

    /// Drain at most `max` queued messages without blocking.
    pub fn drain_up_to(&self, max: usize) -> Vec<T> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.try_recv() {
                Ok(msg) => out.push(msg),
                Err(_) => break,
            }
        }
        out
    }
}

impl<T> Deref for DChainReceiver<T> {
    type Target = Receiver<T>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}
