// Copyright (c) 2024 DCHAIN LABS
use dchain_channel::{receiver::DChainReceiver, BackpressurePolicy, DChainChannel};
use dchain_models::Message;

use crate::ChannelNetworkController;

/// Network controller capturing every outbound message.
pub fn capturing_network() -> (ChannelNetworkController, DChainReceiver<Message>) {
    let (sender, receiver) = DChainChannel::new("test_network".to_string(), None);
    (
        ChannelNetworkController::new(sender, BackpressurePolicy::Block),
        receiver,
    )
}
