// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::{KeyPair, Signature};
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::{identity::IdentityId, serialization::{CanonicalSerializer, Serializer}};

/// Leader acknowledgement placing one message at a slot of its virtual server.
///
/// For a fixed `(db_height, vm_index)` heights go 0, 1, 2... and `serial_hash`
/// chains every ack to the previous one, so a gap or a reorder is detectable.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Ack {
    /// when the leader stamped it
    pub timestamp: ChainTime,
    /// block height
    pub db_height: u32,
    /// virtual server
    pub vm_index: usize,
    /// slot in the virtual server
    pub height: u32,
    /// hash of the acknowledged message
    pub message_hash: Hash,
    /// `H(prev.serial_hash || message_hash)`, or `message_hash` at height 0
    pub serial_hash: Hash,
    /// leader that stamped it
    pub leader: IdentityId,
    /// leader signature over the ack content
    pub signature: Signature,
}

impl Ack {
    /// Stamps a new ack following `prev` in the same virtual server.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prev: Option<&Ack>,
        timestamp: ChainTime,
        db_height: u32,
        vm_index: usize,
        message_hash: Hash,
        leader: IdentityId,
        keypair: &KeyPair,
    ) -> Self {
        let (height, serial_hash) = match prev {
            Some(prev) => (
                prev.height + 1,
                Ack::next_serial_hash(&prev.serial_hash, &message_hash),
            ),
            None => (0, message_hash),
        };
        let mut ack = Ack {
            timestamp,
            db_height,
            vm_index,
            height,
            message_hash,
            serial_hash,
            leader,
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        ack.signature = keypair.sign(&ack.content_hash());
        ack
    }

    /// serial hash of the ack following one whose serial hash is `prev`
    pub fn next_serial_hash(prev: &Hash, message_hash: &Hash) -> Hash {
        Hash::chain(prev, message_hash)
    }

    /// Whether `self` correctly follows `prev` in the serial hash chain.
    pub fn follows(&self, prev: Option<&Ack>) -> bool {
        match prev {
            Some(prev) => {
                self.height == prev.height + 1
                    && self.serial_hash == Ack::next_serial_hash(&prev.serial_hash, &self.message_hash)
            }
            None => self.height == 0 && self.serial_hash == self.message_hash,
        }
    }

    /// hash of the signed content
    pub fn content_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        self.serialize_content(&mut buffer);
        Hash::compute_from(&buffer)
    }

    fn serialize_content(&self, buffer: &mut Vec<u8>) {
        CanonicalSerializer.serialize(&self.timestamp, buffer);
        CanonicalSerializer.serialize(&self.db_height, buffer);
        CanonicalSerializer.serialize(&(self.vm_index as u32), buffer);
        CanonicalSerializer.serialize(&self.height, buffer);
        CanonicalSerializer.serialize(&self.message_hash, buffer);
        CanonicalSerializer.serialize(&self.serial_hash, buffer);
        CanonicalSerializer.serialize(&self.leader, buffer);
    }
}

impl Serializer<Ack> for CanonicalSerializer {
    fn serialize(&self, value: &Ack, buffer: &mut Vec<u8>) {
        value.serialize_content(buffer);
        self.serialize(&value.signature, buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_chain() {
        let keypair = KeyPair::from_seed(&[7u8; 32]);
        let leader = IdentityId::from_public_key(&keypair.get_public_key());
        let m0 = Hash::compute_from(b"m0");
        let m1 = Hash::compute_from(b"m1");
        let a0 = Ack::new(None, ChainTime::from_millis(1), 5, 0, m0, leader, &keypair);
        let a1 = Ack::new(Some(&a0), ChainTime::from_millis(2), 5, 0, m1, leader, &keypair);
        assert_eq!(a0.height, 0);
        assert_eq!(a0.serial_hash, m0);
        assert_eq!(a1.height, 1);
        assert!(a1.follows(Some(&a0)));
        assert!(a0.follows(None));
        assert!(!a0.follows(Some(&a1)));
        assert!(keypair
            .get_public_key()
            .verify_signature(&a1.content_hash(), &a1.signature)
            .is_ok());
    }
}
