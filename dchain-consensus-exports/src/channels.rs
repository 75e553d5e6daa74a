// Copyright (c) 2024 DCHAIN LABS
use std::sync::Arc;

use dchain_channel::sender::DChainSender;
use dchain_db_exports::DatabaseController;
use dchain_models::Message;
use dchain_time::Clock;

use crate::{AuthorityRegistry, NetworkController};

/// Collaborators of the consensus driver.
#[derive(Clone)]
pub struct ConsensusChannels {
    /// outbound transport
    pub network: Box<dyn NetworkController>,
    /// keys and roles of identities
    pub authorities: Arc<dyn AuthorityRegistry>,
    /// block database
    pub database: Arc<dyn DatabaseController>,
    /// logical time source
    pub clock: Arc<dyn Clock>,
    /// receives each invalid message once, for diagnostics
    pub invalid_message_sender: Option<DChainSender<Message>>,
}
