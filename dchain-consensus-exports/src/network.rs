// Copyright (c) 2024 DCHAIN LABS
use dchain_channel::{sender::DChainSender, BackpressurePolicy, SendOutcome};
use dchain_models::Message;

/// Outbound side of the peer-to-peer transport.
pub trait NetworkController: Send + Sync {
    /// Broadcasts a message to peers. Delivery is best effort.
    fn send_out(&self, message: Message);

    /// Returns a boxed clone of self.
    fn clone_box(&self) -> Box<dyn NetworkController>;
}

impl Clone for Box<dyn NetworkController> {
    fn clone(&self) -> Box<dyn NetworkController> {
        self.clone_box()
    }
}

/// Network controller pushing every outbound message into a channel.
///
/// Used by the node loopback transport and by tests to capture what the
/// driver sends.
#[derive(Clone)]
pub struct ChannelNetworkController {
    sender: DChainSender<Message>,
    policy: BackpressurePolicy,
}

impl ChannelNetworkController {
    /// new controller sending into `sender`
    pub fn new(sender: DChainSender<Message>, policy: BackpressurePolicy) -> Self {
        Self { sender, policy }
    }
}

impl NetworkController for ChannelNetworkController {
    fn send_out(&self, message: Message) {
        if self.sender.send_with_policy(message, self.policy) == SendOutcome::Disconnected {
            tracing::debug!("outbound channel {} is closed", self.sender.name());
        }
    }

    fn clone_box(&self) -> Box<dyn NetworkController> {
        Box::new(self.clone())
    }
}
