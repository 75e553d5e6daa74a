// Copyright (c) 2024 DCHAIN LABS
use dchain_models::{Authority, ServerType};
use dchain_signature::KeyPair;
use dchain_time::ChainTime;

use crate::{ConsensusConfig, NodeIdentity};

/// Deterministic identities, `fed` federated servers then `audit` audit servers.
pub fn test_identities(fed: usize, audit: usize) -> Vec<(NodeIdentity, ServerType)> {
    (0..fed + audit)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            seed[31] = 0x5a;
            let server_type = if i < fed {
                ServerType::Federated
            } else {
                ServerType::Audit
            };
            (NodeIdentity::from_keypair(KeyPair::from_seed(&seed)), server_type)
        })
        .collect()
}

impl ConsensusConfig {
    /// Configuration with short timings for tests, signing as `identity`.
    pub fn for_tests(
        identities: &[(NodeIdentity, ServerType)],
        identity: Option<NodeIdentity>,
    ) -> Self {
        ConsensusConfig {
            block_time: ChainTime::from_minutes(10),
            fault_timeout: ChainTime::from_minutes(2),
            ignore_missing_period: ChainTime::from_millis(0),
            holding_review_interval: ChainTime::from_millis(0),
            catchup_request_interval: ChainTime::from_millis(0),
            query_timeout: ChainTime::from_millis(1_000),
            identity,
            genesis_authorities: identities
                .iter()
                .map(|(node, server_type)| Authority {
                    identity: node.identity,
                    public_key: node.keypair.get_public_key(),
                    server_type: *server_type,
                })
                .collect(),
            ..Default::default()
        }
    }
}
