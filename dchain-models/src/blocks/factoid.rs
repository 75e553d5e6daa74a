// Copyright (c) 2024 DCHAIN LABS

use dchain_hash::Hash;
use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::serialization::{CanonicalSerializer, Serializer};

/// Factoid block of a height. Value transfers are handled outside consensus;
/// consensus only closes periods and records coinbase payouts.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct FactoidBlock {
    /// height
    pub db_height: u32,
    /// keymr of the previous factoid block
    pub prev_keymr: Hash,
    /// entry credits bought per factoid
    pub exchange_rate: u64,
    /// minutes whose period was closed
    pub ended_periods: Vec<u8>,
    /// coinbase payouts
    pub coinbase: Vec<(IdentityId, u64)>,
}

impl FactoidBlock {
    /// empty block
    pub fn new(db_height: u32, exchange_rate: u64) -> Self {
        FactoidBlock {
            db_height,
            exchange_rate,
            ..Default::default()
        }
    }

    /// Closes the period of `minute`. Closing the same minute twice is a no-op.
    pub fn end_of_period(&mut self, minute: u8) {
        if !self.ended_periods.contains(&minute) {
            self.ended_periods.push(minute);
        }
    }

    /// key merkle root
    pub fn keymr(&self) -> Hash {
        CanonicalSerializer.hash(self)
    }
}

impl Serializer<FactoidBlock> for CanonicalSerializer {
    fn serialize(&self, value: &FactoidBlock, buffer: &mut Vec<u8>) {
        self.serialize(&value.db_height, buffer);
        self.serialize(&value.prev_keymr, buffer);
        self.serialize(&value.exchange_rate, buffer);
        self.serialize(&value.ended_periods, buffer);
        self.serialize(&(value.coinbase.len() as u64), buffer);
        for (identity, amount) in &value.coinbase {
            self.serialize(identity, buffer);
            self.serialize(amount, buffer);
        }
    }
}
