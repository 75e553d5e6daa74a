// Copyright (c) 2024 DCHAIN LABS
//! Named crossbeam channels.
//!
//! Every queue between a producer and the consensus driver goes through
//! [`DChainChannel::new`], which fixes its capacity up front. Producers pick
//! what happens on a full queue with [`BackpressurePolicy`].

use receiver::DChainReceiver;
use sender::DChainSender;
use serde::Deserialize;

pub mod receiver;
pub mod sender;

/// What a producer does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// wait for room
    #[default]
    Block,
    /// drop the message being sent
    DropNewest,
}

/// Outcome of a policy-driven send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// the message is in the queue
    Queued,
    /// the queue was full and the message was dropped
    Dropped,
    /// the receiving side is gone
    Disconnected,
}

#[derive(Clone)]
pub struct DChainChannel {}

impl DChainChannel {
    /// Creates a named channel. `None` capacity means unbounded.
    #[allow(clippy::new_ret_no_self)]
    pub fn new<T>(name: String, capacity: Option<usize>) -> (DChainSender<T>, DChainReceiver<T>) {
        let (s, r) = if let Some(capacity) = capacity {
            crossbeam::channel::bounded::<T>(capacity)
        } else {
            crossbeam::channel::unbounded::<T>()
        };

        #[cfg(feature = "metrics")]
        let actual_len = {
            use tracing::error;
            // Create gauge for actual length of channel
            let actual_len = prometheus::Gauge::new(
                format!("{}_channel_actual_size", name),
                "Actual length of channel",
            )
            .expect("Failed to create gauge");
            if let Err(e) = prometheus::register(Box::new(actual_len.clone())) {
                error!("Failed to register actual_len gauge for {} : {}", name, e);
            }
            actual_len
        };

        let sender = DChainSender {
            sender: s,
            name: name.clone(),
            #[cfg(feature = "metrics")]
            actual_len: actual_len.clone(),
        };

        let receiver = DChainReceiver {
            receiver: r,
            name,
            #[cfg(feature = "metrics")]
            actual_len,
        };

        (sender, receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_newest_when_full() {
        let (tx, rx) = DChainChannel::new::<u32>("test_drop".to_string(), Some(1));
        assert_eq!(
            tx.send_with_policy(1, BackpressurePolicy::DropNewest),
            SendOutcome::Queued
        );
        assert_eq!(
            tx.send_with_policy(2, BackpressurePolicy::DropNewest),
            SendOutcome::Dropped
        );
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }

    /// not `Clone`, like the command queues carrying response senders
    struct Query(crossbeam::channel::Sender<u32>);

    #[test]
    fn test_clone_does_not_need_clonable_messages() {
        let (tx, rx) = DChainChannel::new::<Query>("test_clone".to_string(), Some(2));
        let tx2: DChainSender<Query> = tx.clone();
        let rx2: DChainReceiver<Query> = rx.clone();
        let (answer_tx, answer_rx) = crossbeam::channel::bounded(1);
        tx2.send(Query(answer_tx)).unwrap();
        assert_eq!(tx2.name(), "test_clone");
        drop(tx);
        let Query(answer) = rx2.try_recv().unwrap();
        answer.send(7).unwrap();
        assert_eq!(answer_rx.try_recv().unwrap(), 7);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_when_receiver_dropped() {
        let (tx, rx) = DChainChannel::new::<u32>("test_disc".to_string(), Some(4));
        drop(rx);
        assert_eq!(
            tx.send_with_policy(1, BackpressurePolicy::Block),
            SendOutcome::Disconnected
        );
    }
}
