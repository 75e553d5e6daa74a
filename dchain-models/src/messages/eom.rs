// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::{KeyPair, Signature};
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// End-Of-Minute marker issued by the leader of a virtual server.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct EndOfMinute {
    /// creation time
    pub timestamp: ChainTime,
    /// block height
    pub db_height: u32,
    /// minute being closed, 0 to 9
    pub minute: u8,
    /// virtual server the leader runs this minute
    pub vm_index: usize,
    /// issuing leader
    pub leader: IdentityId,
    /// leader signature over [`EndOfMinute::signing_hash`]
    pub signature: Signature,
}

impl EndOfMinute {
    /// Builds and signs an EOM.
    pub fn new(
        timestamp: ChainTime,
        db_height: u32,
        minute: u8,
        vm_index: usize,
        leader: IdentityId,
        keypair: &KeyPair,
    ) -> Self {
        let mut eom = EndOfMinute {
            timestamp,
            db_height,
            minute,
            vm_index,
            leader,
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        eom.signature = keypair.sign(&eom.signing_hash());
        eom
    }

    /// hash of everything but the signature
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.db_height, &mut buffer);
        CanonicalSerializer.serialize(&self.minute, &mut buffer);
        CanonicalSerializer.serialize(&(self.vm_index as u32), &mut buffer);
        CanonicalSerializer.serialize(&self.leader, &mut buffer);
        Hash::compute_from(&buffer)
    }
}
