// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::PublicKey;
use serde::{Deserialize, Serialize};

use crate::serialization::{CanonicalSerializer, Serializer};

/// Identity chain of an authority (federated or audit server).
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct IdentityId(pub Hash);

impl IdentityId {
    /// Identity derived from a public key. Used for locally generated identities.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        IdentityId(Hash::compute_from_tuple(&[&b"identity"[..], &public_key.to_bytes()[..]]))
    }

    /// raw bytes, used to sort authority sets
    pub fn to_bytes(&self) -> &[u8; 32] {
        self.0.to_bytes()
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityId({:?})", self.0)
    }
}

impl Serializer<IdentityId> for CanonicalSerializer {
    fn serialize(&self, value: &IdentityId, buffer: &mut Vec<u8>) {
        self.serialize(&value.0, buffer);
    }
}

/// Id of a user entry chain.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Debug, Serialize, Deserialize,
)]
pub struct ChainId(pub Hash);

impl ChainId {
    /// Chain id of a new chain: hash of the concatenated hashes of its first entry's external ids.
    pub fn from_ext_ids(ext_ids: &[Vec<u8>]) -> Self {
        let mut buffer = Vec::with_capacity(ext_ids.len() * 32);
        for ext_id in ext_ids {
            buffer.extend_from_slice(Hash::compute_from(ext_id).to_bytes());
        }
        ChainId(Hash::compute_from(&buffer))
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serializer<ChainId> for CanonicalSerializer {
    fn serialize(&self, value: &ChainId, buffer: &mut Vec<u8>) {
        self.serialize(&value.0, buffer);
    }
}

/// Entry-credit address: hash of the paying public key.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub struct EcAddress(pub Hash);

impl EcAddress {
    /// address of a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        EcAddress(Hash::compute_from_tuple(&[&b"ec"[..], &public_key.to_bytes()[..]]))
    }
}

impl std::fmt::Display for EcAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an identity at a given height.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ServerType {
    /// leader, runs a virtual server
    Federated,
    /// standby replacement for a faulted leader
    Audit,
    /// no authority
    None,
}

/// Signing key and role of an identity.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Authority {
    /// identity chain
    pub identity: IdentityId,
    /// current signing key
    pub public_key: PublicKey,
    /// role
    pub server_type: ServerType,
}
