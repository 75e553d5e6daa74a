// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::Signature;
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Admin block line.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AdminEntry {
    /// signature of the previous directory block by a federated server
    DBSignature {
        /// signer
        identity: IdentityId,
        /// signature over the previous block keymr
        signature: Signature,
    },
    /// identity becomes a federated server from `db_height`
    AddFederatedServer {
        /// promoted identity
        identity: IdentityId,
        /// effective height
        db_height: u32,
    },
    /// identity becomes an audit server from `db_height`
    AddAuditServer {
        /// demoted or added identity
        identity: IdentityId,
        /// effective height
        db_height: u32,
    },
    /// identity loses its authority from `db_height`
    RemoveFederatedServer {
        /// removed identity
        identity: IdentityId,
        /// effective height
        db_height: u32,
    },
    /// a full server fault was applied
    ServerFault {
        /// faulted leader
        faulted: IdentityId,
        /// audit server that replaced it
        replacement: IdentityId,
        /// system list height of the fault
        system_height: u32,
    },
    /// factoid payouts made by this block
    CoinbaseDescriptor {
        /// recipient and amount
        outputs: Vec<(IdentityId, u64)>,
    },
}

impl AdminEntry {
    /// true for lines that change the authority set
    pub fn is_authority_change(&self) -> bool {
        matches!(
            self,
            AdminEntry::AddFederatedServer { .. }
                | AdminEntry::AddAuditServer { .. }
                | AdminEntry::RemoveFederatedServer { .. }
        )
    }
}

impl Serializer<AdminEntry> for CanonicalSerializer {
    fn serialize(&self, value: &AdminEntry, buffer: &mut Vec<u8>) {
        match value {
            AdminEntry::DBSignature {
                identity,
                signature,
            } => {
                self.serialize(&0u8, buffer);
                self.serialize(identity, buffer);
                self.serialize(signature, buffer);
            }
            AdminEntry::AddFederatedServer {
                identity,
                db_height,
            } => {
                self.serialize(&1u8, buffer);
                self.serialize(identity, buffer);
                self.serialize(db_height, buffer);
            }
            AdminEntry::AddAuditServer {
                identity,
                db_height,
            } => {
                self.serialize(&2u8, buffer);
                self.serialize(identity, buffer);
                self.serialize(db_height, buffer);
            }
            AdminEntry::RemoveFederatedServer {
                identity,
                db_height,
            } => {
                self.serialize(&3u8, buffer);
                self.serialize(identity, buffer);
                self.serialize(db_height, buffer);
            }
            AdminEntry::ServerFault {
                faulted,
                replacement,
                system_height,
            } => {
                self.serialize(&4u8, buffer);
                self.serialize(faulted, buffer);
                self.serialize(replacement, buffer);
                self.serialize(system_height, buffer);
            }
            AdminEntry::CoinbaseDescriptor { outputs } => {
                self.serialize(&5u8, buffer);
                self.serialize(&(outputs.len() as u64), buffer);
                for (identity, amount) in outputs {
                    self.serialize(identity, buffer);
                    self.serialize(amount, buffer);
                }
            }
        }
    }
}

/// Admin block of a height.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct AdminBlock {
    /// height
    pub db_height: u32,
    /// hash of the previous admin block
    pub prev_back_ref_hash: Hash,
    /// lines, in insertion order
    pub entries: Vec<AdminEntry>,
}

impl AdminBlock {
    /// empty admin block
    pub fn new(db_height: u32) -> Self {
        AdminBlock {
            db_height,
            ..Default::default()
        }
    }

    /// Adds a line unless an identical one is already present.
    pub fn add_entry(&mut self, entry: AdminEntry) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// coinbase outputs, if this block declares any
    pub fn coinbase(&self) -> Option<&Vec<(IdentityId, u64)>> {
        self.entries.iter().find_map(|entry| match entry {
            AdminEntry::CoinbaseDescriptor { outputs } => Some(outputs),
            _ => None,
        })
    }

    /// hash of the whole block
    pub fn hash(&self) -> Hash {
        CanonicalSerializer.hash(self)
    }

    /// key merkle root (the admin block has a single hash)
    pub fn keymr(&self) -> Hash {
        self.hash()
    }
}

impl Serializer<AdminBlock> for CanonicalSerializer {
    fn serialize(&self, value: &AdminBlock, buffer: &mut Vec<u8>) {
        self.serialize(&value.db_height, buffer);
        self.serialize(&value.prev_back_ref_hash, buffer);
        self.serialize(&value.entries, buffer);
    }
}
