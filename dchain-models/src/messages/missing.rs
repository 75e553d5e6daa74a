// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::Signature;
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use super::Message;
use crate::ack::Ack;
use crate::blocks::FinalizedBlock;
use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Request for process list slots known to exist but not received.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MissingMsg {
    /// creation time
    pub timestamp: ChainTime,
    /// block height
    pub db_height: u32,
    /// virtual server
    pub vm_index: usize,
    /// missing slots
    pub heights: Vec<u32>,
    /// requesting node, if it has an identity
    pub asker: Option<IdentityId>,
}

impl MissingMsg {
    /// message hash
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.db_height, &mut buffer);
        CanonicalSerializer.serialize(&(self.vm_index as u32), &mut buffer);
        CanonicalSerializer.serialize(&self.heights, &mut buffer);
        CanonicalSerializer.serialize(&self.asker, &mut buffer);
        Hash::compute_from(&buffer)
    }
}

/// One answered slot: the ack and the message it acknowledges.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MissingMsgResponse {
    /// creation time
    pub timestamp: ChainTime,
    /// ack of the slot
    pub ack: Ack,
    /// message of the slot
    pub message: Box<Message>,
}

impl MissingMsgResponse {
    /// message hash
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.ack.content_hash(), &mut buffer);
        CanonicalSerializer.serialize(&self.message.msg_hash(), &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// true if the ack acknowledges the carried message
    pub fn is_consistent(&self) -> bool {
        self.ack.message_hash == self.message.msg_hash()
    }
}

/// Request for saved blocks in `start..=end`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DBStateMissing {
    /// creation time
    pub timestamp: ChainTime,
    /// first height
    pub start: u32,
    /// last height, inclusive
    pub end: u32,
}

impl DBStateMissing {
    /// message hash
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.start, &mut buffer);
        CanonicalSerializer.serialize(&self.end, &mut buffer);
        Hash::compute_from(&buffer)
    }
}

/// A finished block with the signatures of its height's leaders.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DBStateMsg {
    /// creation time
    pub timestamp: ChainTime,
    /// the block
    pub block: Box<FinalizedBlock>,
    /// directory block signatures (over the keymr)
    pub signatures: Vec<(IdentityId, Signature)>,
}

impl DBStateMsg {
    /// message hash
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.block.height(), &mut buffer);
        CanonicalSerializer.serialize(&self.block.keymr(), &mut buffer);
        Hash::compute_from(&buffer)
    }
}
