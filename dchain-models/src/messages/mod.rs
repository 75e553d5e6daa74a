// Copyright (c) 2024 DCHAIN LABS

//! Closed set of consensus messages.
//!
//! Every variant answers the same questions: when it was created
//! ([`Message::timestamp`]), what identifies its content ([`Message::msg_hash`]),
//! what identifies this exact copy ([`Message::repeat_hash`]) and which virtual
//! server orders it ([`Message::vm_index`]). Validation and execution live in
//! the consensus worker, which matches on the variant.

mod dbsig;
mod entries;
mod eom;
mod fault;
mod missing;

pub use dbsig::DirectoryBlockSignature;
pub use entries::{CommitChain, CommitEntry, RevealEntry};
pub use eom::EndOfMinute;
pub use fault::{fault_core_hash, FullServerFault, ServerFault};
pub use missing::{DBStateMissing, DBStateMsg, MissingMsg, MissingMsgResponse};

use dchain_hash::Hash;
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::ack::Ack;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Consensus message
#[allow(clippy::large_enum_variant)]
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Message {
    /// leader acknowledgement
    Ack(Ack),
    /// end of minute
    EndOfMinute(EndOfMinute),
    /// directory block signature
    DirectoryBlockSignature(DirectoryBlockSignature),
    /// chain creation payment
    CommitChain(CommitChain),
    /// entry payment
    CommitEntry(CommitEntry),
    /// entry publication
    RevealEntry(RevealEntry),
    /// fault vote
    ServerFault(ServerFault),
    /// applicable fault
    FullServerFault(FullServerFault),
    /// request for missing slots
    MissingMsg(MissingMsg),
    /// answer to a missing slot request
    MissingMsgResponse(MissingMsgResponse),
    /// request for saved blocks
    DBStateMissing(DBStateMissing),
    /// saved block
    DBState(DBStateMsg),
}

/// Variant tag, for logs and per-kind policies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ack
    Ack,
    /// EndOfMinute
    EndOfMinute,
    /// DirectoryBlockSignature
    DirectoryBlockSignature,
    /// CommitChain
    CommitChain,
    /// CommitEntry
    CommitEntry,
    /// RevealEntry
    RevealEntry,
    /// ServerFault
    ServerFault,
    /// FullServerFault
    FullServerFault,
    /// MissingMsg
    MissingMsg,
    /// MissingMsgResponse
    MissingMsgResponse,
    /// DBStateMissing
    DBStateMissing,
    /// DBState
    DBState,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Message {
    /// variant tag
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Ack(_) => MessageKind::Ack,
            Message::EndOfMinute(_) => MessageKind::EndOfMinute,
            Message::DirectoryBlockSignature(_) => MessageKind::DirectoryBlockSignature,
            Message::CommitChain(_) => MessageKind::CommitChain,
            Message::CommitEntry(_) => MessageKind::CommitEntry,
            Message::RevealEntry(_) => MessageKind::RevealEntry,
            Message::ServerFault(_) => MessageKind::ServerFault,
            Message::FullServerFault(_) => MessageKind::FullServerFault,
            Message::MissingMsg(_) => MessageKind::MissingMsg,
            Message::MissingMsgResponse(_) => MessageKind::MissingMsgResponse,
            Message::DBStateMissing(_) => MessageKind::DBStateMissing,
            Message::DBState(_) => MessageKind::DBState,
        }
    }

    /// creation time
    pub fn timestamp(&self) -> ChainTime {
        match self {
            Message::Ack(m) => m.timestamp,
            Message::EndOfMinute(m) => m.timestamp,
            Message::DirectoryBlockSignature(m) => m.timestamp,
            Message::CommitChain(m) => m.timestamp,
            Message::CommitEntry(m) => m.timestamp,
            Message::RevealEntry(m) => m.timestamp,
            Message::ServerFault(m) => m.timestamp,
            Message::FullServerFault(m) => m.timestamp,
            Message::MissingMsg(m) => m.timestamp,
            Message::MissingMsgResponse(m) => m.timestamp,
            Message::DBStateMissing(m) => m.timestamp,
            Message::DBState(m) => m.timestamp,
        }
    }

    /// Hash of the content, signature excluded. Acks reference messages by this hash.
    pub fn msg_hash(&self) -> Hash {
        match self {
            Message::Ack(m) => m.content_hash(),
            Message::EndOfMinute(m) => m.signing_hash(),
            Message::DirectoryBlockSignature(m) => m.signing_hash(),
            Message::CommitChain(m) => m.signing_hash(),
            Message::CommitEntry(m) => m.signing_hash(),
            Message::RevealEntry(m) => m.signing_hash(),
            Message::ServerFault(m) => m.signing_hash(),
            Message::FullServerFault(m) => m.signing_hash(),
            Message::MissingMsg(m) => m.signing_hash(),
            Message::MissingMsgResponse(m) => m.signing_hash(),
            Message::DBStateMissing(m) => m.signing_hash(),
            Message::DBState(m) => m.signing_hash(),
        }
    }

    /// Hash of this exact copy, signature included. Replay protection keys on it.
    pub fn repeat_hash(&self) -> Hash {
        let signature = match self {
            Message::Ack(m) => Some(m.signature),
            Message::EndOfMinute(m) => Some(m.signature),
            Message::DirectoryBlockSignature(m) => Some(m.signature),
            Message::CommitChain(m) => Some(m.signature),
            Message::CommitEntry(m) => Some(m.signature),
            Message::ServerFault(m) => Some(m.signature),
            Message::FullServerFault(m) => Some(m.signature),
            Message::RevealEntry(_)
            | Message::MissingMsg(_)
            | Message::MissingMsgResponse(_)
            | Message::DBStateMissing(_)
            | Message::DBState(_) => None,
        };
        let msg_hash = self.msg_hash();
        match signature {
            Some(signature) => {
                let mut buffer = Vec::with_capacity(96);
                CanonicalSerializer.serialize(&msg_hash, &mut buffer);
                CanonicalSerializer.serialize(&signature, &mut buffer);
                Hash::compute_from(&buffer)
            }
            None => msg_hash,
        }
    }

    /// Virtual server ordering this message given `fed_count` leaders.
    /// Entry traffic is spread by entry hash so a commit and its reveal share a server.
    /// `None` for messages that are never placed in a process list.
    pub fn vm_index(&self, fed_count: usize) -> Option<usize> {
        let by_hash = |hash: &Hash| -> Option<usize> {
            if fed_count == 0 {
                None
            } else {
                Some((hash.byte_sum() % fed_count as u64) as usize)
            }
        };
        match self {
            Message::Ack(m) => Some(m.vm_index),
            Message::EndOfMinute(m) => Some(m.vm_index),
            Message::DirectoryBlockSignature(m) => Some(m.vm_index),
            Message::ServerFault(m) => Some(m.vm_index),
            Message::FullServerFault(m) => Some(m.vm_index),
            Message::CommitChain(m) => by_hash(&m.entry_hash),
            Message::CommitEntry(m) => by_hash(&m.entry_hash),
            Message::RevealEntry(m) => by_hash(&m.entry_hash()),
            Message::MissingMsg(_)
            | Message::MissingMsgResponse(_)
            | Message::DBStateMissing(_)
            | Message::DBState(_) => None,
        }
    }

    /// Height the message refers to, when it names one.
    pub fn db_height(&self) -> Option<u32> {
        match self {
            Message::Ack(m) => Some(m.db_height),
            Message::EndOfMinute(m) => Some(m.db_height),
            Message::DirectoryBlockSignature(m) => Some(m.db_height),
            Message::ServerFault(m) => Some(m.db_height),
            Message::FullServerFault(m) => Some(m.db_height),
            Message::MissingMsg(m) => Some(m.db_height),
            Message::MissingMsgResponse(m) => Some(m.ack.db_height),
            Message::DBState(m) => Some(m.block.height()),
            Message::CommitChain(_)
            | Message::CommitEntry(_)
            | Message::RevealEntry(_)
            | Message::DBStateMissing(_) => None,
        }
    }

    /// True for messages that are ordered by a leader ack into a process list.
    pub fn needs_ack(&self) -> bool {
        matches!(
            self,
            Message::EndOfMinute(_)
                | Message::DirectoryBlockSignature(_)
                | Message::CommitChain(_)
                | Message::CommitEntry(_)
                | Message::RevealEntry(_)
        )
    }

    /// True for requests and answers exchanged between peers outside process lists.
    pub fn is_peer_to_peer(&self) -> bool {
        matches!(
            self,
            Message::MissingMsg(_)
                | Message::MissingMsgResponse(_)
                | Message::DBStateMissing(_)
                | Message::DBState(_)
        )
    }

    /// Entry hash a commit pays for or a reveal publishes.
    pub fn entry_hash(&self) -> Option<Hash> {
        match self {
            Message::CommitChain(m) => Some(m.entry_hash),
            Message::CommitEntry(m) => Some(m.entry_hash),
            Message::RevealEntry(m) => Some(m.entry_hash()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Entry;
    use crate::identity::{ChainId, IdentityId};
    use dchain_signature::KeyPair;

    fn eom(minute: u8) -> Message {
        let keypair = KeyPair::from_seed(&[3u8; 32]);
        let leader = IdentityId::from_public_key(&keypair.get_public_key());
        Message::EndOfMinute(EndOfMinute::new(
            ChainTime::from_millis(1000),
            4,
            minute,
            1,
            leader,
            &keypair,
        ))
    }

    #[test]
    fn test_repeat_hash_differs_from_msg_hash_for_signed() {
        let m = eom(2);
        assert_ne!(m.msg_hash(), m.repeat_hash());
        assert_eq!(m.msg_hash(), eom(2).msg_hash());
        assert_ne!(m.msg_hash(), eom(3).msg_hash());
    }

    #[test]
    fn test_commit_and_reveal_share_vm() {
        let ec_key = KeyPair::from_seed(&[9u8; 32]);
        let entry = Entry {
            chain_id: ChainId(Hash::compute_from(b"chain")),
            ext_ids: vec![b"a".to_vec()],
            content: b"hello".to_vec(),
        };
        let reveal = Message::RevealEntry(RevealEntry::new(ChainTime::from_millis(5), entry.clone()));
        let commit = Message::CommitEntry(CommitEntry::new(
            ChainTime::from_millis(4),
            entry.hash(),
            1,
            &ec_key,
        ));
        for fed in 1..8 {
            assert_eq!(reveal.vm_index(fed), commit.vm_index(fed));
        }
        assert_eq!(reveal.vm_index(0), None);
        assert_eq!(reveal.repeat_hash(), reveal.msg_hash());
    }
}
