// Copyright (c) 2024 DCHAIN LABS
use std::collections::HashMap;

use dchain_models::{EcAddress, IdentityId};

use super::ConsensusState;

/// Balances of processed heights.
#[derive(Debug, Default, Clone)]
pub struct Balances {
    /// entry credits by address
    pub ec: HashMap<EcAddress, i64>,
    /// factoshis paid by coinbase descriptors, by identity
    pub factoid: HashMap<IdentityId, u64>,
}

impl ConsensusState {
    /// Entry credits `address` can still spend: the permanent balance minus
    /// what commits of process lists not applied yet already took.
    pub fn effective_ec_balance(&self, address: &EcAddress) -> i64 {
        let permanent = self.balances.ec.get(address).copied().unwrap_or(0);
        let pending: u64 = self
            .process_lists
            .iter()
            .filter(|pl| pl.db_height > self.processed_height)
            .filter_map(|pl| pl.ec_debits.get(address))
            .sum();
        permanent.saturating_sub(pending as i64)
    }
}
