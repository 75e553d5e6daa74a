// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::{KeyPair, Signature};
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Hash every vote on the same fault signs, whoever casts it.
pub fn fault_core_hash(
    faulted: &IdentityId,
    replacement: &IdentityId,
    db_height: u32,
    vm_index: usize,
    system_height: u32,
) -> Hash {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"server-fault");
    CanonicalSerializer.serialize(&faulted, &mut buffer);
    CanonicalSerializer.serialize(&replacement, &mut buffer);
    CanonicalSerializer.serialize(&db_height, &mut buffer);
    CanonicalSerializer.serialize(&(vm_index as u32), &mut buffer);
    CanonicalSerializer.serialize(&system_height, &mut buffer);
    Hash::compute_from(&buffer)
}

/// One authority's vote to replace a faulted leader by an audit server.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ServerFault {
    /// creation time
    pub timestamp: ChainTime,
    /// height where the fault was seen
    pub db_height: u32,
    /// stalled virtual server
    pub vm_index: usize,
    /// leader to remove
    pub faulted: IdentityId,
    /// audit server to promote
    pub replacement: IdentityId,
    /// system list slot the fault targets
    pub system_height: u32,
    /// voter
    pub signer: IdentityId,
    /// vote signature over [`ServerFault::core_hash`]
    pub signature: Signature,
}

impl ServerFault {
    /// Builds and signs a vote.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: ChainTime,
        db_height: u32,
        vm_index: usize,
        faulted: IdentityId,
        replacement: IdentityId,
        system_height: u32,
        signer: IdentityId,
        keypair: &KeyPair,
    ) -> Self {
        let core = fault_core_hash(&faulted, &replacement, db_height, vm_index, system_height);
        ServerFault {
            timestamp,
            db_height,
            vm_index,
            faulted,
            replacement,
            system_height,
            signer,
            signature: keypair.sign(&core),
        }
    }

    /// hash the vote signature covers
    pub fn core_hash(&self) -> Hash {
        fault_core_hash(
            &self.faulted,
            &self.replacement,
            self.db_height,
            self.vm_index,
            self.system_height,
        )
    }

    /// message hash: the vote plus its voter and time
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.core_hash(), &mut buffer);
        CanonicalSerializer.serialize(&self.signer, &mut buffer);
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        Hash::compute_from(&buffer)
    }
}

/// A fault with enough votes to be applied.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FullServerFault {
    /// creation time
    pub timestamp: ChainTime,
    /// height where the fault applies
    pub db_height: u32,
    /// stalled virtual server
    pub vm_index: usize,
    /// leader to remove
    pub faulted: IdentityId,
    /// audit server to promote
    pub replacement: IdentityId,
    /// system list slot
    pub system_height: u32,
    /// collected votes, each over the fault core hash
    pub votes: Vec<(IdentityId, Signature)>,
    /// node that assembled the votes
    pub signer: IdentityId,
    /// signature over [`FullServerFault::signing_hash`]
    pub signature: Signature,
}

impl FullServerFault {
    /// Assembles and signs a full fault from collected votes.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timestamp: ChainTime,
        db_height: u32,
        vm_index: usize,
        faulted: IdentityId,
        replacement: IdentityId,
        system_height: u32,
        votes: Vec<(IdentityId, Signature)>,
        signer: IdentityId,
        keypair: &KeyPair,
    ) -> Self {
        let mut fault = FullServerFault {
            timestamp,
            db_height,
            vm_index,
            faulted,
            replacement,
            system_height,
            votes,
            signer,
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        fault.signature = keypair.sign(&fault.signing_hash());
        fault
    }

    /// hash each vote signs
    pub fn core_hash(&self) -> Hash {
        fault_core_hash(
            &self.faulted,
            &self.replacement,
            self.db_height,
            self.vm_index,
            self.system_height,
        )
    }

    /// hash of everything but the outer signature
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.core_hash(), &mut buffer);
        CanonicalSerializer.serialize(&(self.votes.len() as u64), &mut buffer);
        for (identity, signature) in &self.votes {
            CanonicalSerializer.serialize(&identity, &mut buffer);
            CanonicalSerializer.serialize(&signature, &mut buffer);
        }
        CanonicalSerializer.serialize(&self.signer, &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// true if the replacement voted for its own promotion
    pub fn has_pledge(&self) -> bool {
        self.votes.iter().any(|(id, _)| id == &self.replacement)
    }
}
