// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use dchain_signature::{KeyPair, PublicKey, Signature};
use dchain_time::ChainTime;
use serde::{Deserialize, Serialize};

use crate::blocks::Entry;
use crate::config::{CHAIN_CREATION_CREDITS, MAX_ENTRY_CREDITS};
use crate::error::ModelsError;
use crate::identity::{ChainId, EcAddress};
use crate::serialization::{CanonicalSerializer, Serializer};

/// Payment for an entry, revealed later by a [`RevealEntry`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CommitEntry {
    /// creation time
    pub timestamp: ChainTime,
    /// hash of the entry paid for
    pub entry_hash: Hash,
    /// credits paid
    pub credits: u8,
    /// paying key
    pub ec_public_key: PublicKey,
    /// signature by the paying key
    pub signature: Signature,
}

impl CommitEntry {
    /// Builds and signs a commit.
    pub fn new(timestamp: ChainTime, entry_hash: Hash, credits: u8, ec_key: &KeyPair) -> Self {
        let mut commit = CommitEntry {
            timestamp,
            entry_hash,
            credits,
            ec_public_key: ec_key.get_public_key(),
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        commit.signature = ec_key.sign(&commit.signing_hash());
        commit
    }

    /// hash of everything but the signature
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.entry_hash, &mut buffer);
        CanonicalSerializer.serialize(&self.credits, &mut buffer);
        CanonicalSerializer.serialize(&self.ec_public_key, &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// payer
    pub fn address(&self) -> EcAddress {
        EcAddress::from_public_key(&self.ec_public_key)
    }

    /// Checks the signature and credit bounds.
    pub fn check(&self) -> Result<(), ModelsError> {
        if self.credits == 0 || self.credits > MAX_ENTRY_CREDITS {
            return Err(ModelsError::InvalidCredits(self.credits));
        }
        self.ec_public_key
            .verify_signature(&self.signing_hash(), &self.signature)?;
        Ok(())
    }
}

/// Payment for a new chain and its first entry.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CommitChain {
    /// creation time
    pub timestamp: ChainTime,
    /// chain being created
    pub chain_id: ChainId,
    /// first entry of the chain
    pub entry_hash: Hash,
    /// credits paid, chain creation included
    pub credits: u8,
    /// paying key
    pub ec_public_key: PublicKey,
    /// signature by the paying key
    pub signature: Signature,
}

impl CommitChain {
    /// Builds and signs a chain commit.
    pub fn new(
        timestamp: ChainTime,
        chain_id: ChainId,
        entry_hash: Hash,
        credits: u8,
        ec_key: &KeyPair,
    ) -> Self {
        let mut commit = CommitChain {
            timestamp,
            chain_id,
            entry_hash,
            credits,
            ec_public_key: ec_key.get_public_key(),
            signature: Signature::from_bytes(&[0u8; 64]),
        };
        commit.signature = ec_key.sign(&commit.signing_hash());
        commit
    }

    /// hash of everything but the signature
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.chain_id, &mut buffer);
        CanonicalSerializer.serialize(&self.entry_hash, &mut buffer);
        CanonicalSerializer.serialize(&self.credits, &mut buffer);
        CanonicalSerializer.serialize(&self.ec_public_key, &mut buffer);
        Hash::compute_from(&buffer)
    }

    /// payer
    pub fn address(&self) -> EcAddress {
        EcAddress::from_public_key(&self.ec_public_key)
    }

    /// Checks the signature and credit bounds.
    pub fn check(&self) -> Result<(), ModelsError> {
        if self.credits <= CHAIN_CREATION_CREDITS
            || self.credits > CHAIN_CREATION_CREDITS + MAX_ENTRY_CREDITS
        {
            return Err(ModelsError::InvalidCredits(self.credits));
        }
        self.ec_public_key
            .verify_signature(&self.signing_hash(), &self.signature)?;
        Ok(())
    }
}

/// Publishes the entry a commit paid for.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RevealEntry {
    /// creation time
    pub timestamp: ChainTime,
    /// the entry
    pub entry: Entry,
}

impl RevealEntry {
    /// new reveal
    pub fn new(timestamp: ChainTime, entry: Entry) -> Self {
        RevealEntry { timestamp, entry }
    }

    /// hash of the revealed entry
    pub fn entry_hash(&self) -> Hash {
        self.entry.hash()
    }

    /// message hash
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        CanonicalSerializer.serialize(&self.timestamp, &mut buffer);
        CanonicalSerializer.serialize(&self.entry, &mut buffer);
        Hash::compute_from(&buffer)
    }
}
