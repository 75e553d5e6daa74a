// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::{KeyPair, Signature};
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::blocks::DirectoryBlockHeader;
use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Signature of the previous directory block by one leader, opening a new height.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct DirectoryBlockSignature {
    /// creation time
    pub timestamp: ChainTime,
    /// height of the process list carrying it (signed block height + 1)
    pub db_height: u32,
    /// virtual server the leader runs at minute 0
    pub vm_index: usize,
    /// header of the signed block, as the leader computed it
    pub header: DirectoryBlockHeader,
    /// leader
    pub leader: IdentityId,
    /// signature over the header keymr
    pub dblock_signature: Signature,
    /// signature over [`DirectoryBlockSignature::signing_hash`]
    pub signature: Signature,
}

impl DirectoryBlockSignature {
    /// Builds and signs a DBSig for `header`.
    pub fn new(
        timestamp: ChainTime,
        vm_index: usize,
        header: DirectoryBlockHeader,
        leader: IdentityId,
        keypair: &KeyPair,
    ) -> Self {
        let blank = Signature::from_bytes(&[0u8; 64]);
        let mut dbsig = DirectoryBlockSignature {
            timestamp,
            db_height: header.db_height + 1,
            vm_index,
            dblock_signature: keypair.sign(&header.keymr()),
            header,
            leader,
            signature: blank,
        };
        dbsig.signature = keypair.sign(&dbsig.signing_hash());
        dbsig
    }

    /// hash of everything but the message signature
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.db_height, &mut buffer);
        CanonicalSerializer.serialize(&(self.vm_index as u32), &mut buffer);
        CanonicalSerializer.serialize(&self.header, &mut buffer);
        CanonicalSerializer.serialize(&self.leader, &mut buffer);
        CanonicalSerializer.serialize(&self.dblock_signature, &mut buffer);
        Hash::compute_from(&buffer)
    }
}
