// Copyright (c) 2024 DCHAIN LABS
//! Builds the configuration of each module from the node settings.
use anyhow::{bail, Context, Result};
use dchain_consensus_exports::{ConsensusConfig, NodeIdentity};
use dchain_db_exports::DbConfig;
use dchain_models::{Authority, EcAddress, IdentityId};
use dchain_signature::{KeyPair, PublicKey};

use crate::settings::Settings;

/// Consensus configuration of the node. `follower` drops the signing key.
pub fn consensus_config(settings: &Settings, follower: bool) -> Result<ConsensusConfig> {
    let consensus = &settings.consensus;
    if settings.authorities.is_empty() {
        bail!("no genesis authority configured");
    }
    let genesis_authorities = settings
        .authorities
        .iter()
        .map(|authority| {
            let public_key = PublicKey::from_bs58_check(&authority.public_key)
                .with_context(|| format!("invalid authority key {}", authority.public_key))?;
            Ok(Authority {
                identity: IdentityId::from_public_key(&public_key),
                public_key,
                server_type: authority.server_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let genesis_ec_balances = settings
        .genesis_ec_balances
        .iter()
        .map(|balance| {
            let public_key = PublicKey::from_bs58_check(&balance.public_key)
                .with_context(|| format!("invalid entry credit key {}", balance.public_key))?;
            Ok((EcAddress::from_public_key(&public_key), balance.credits))
        })
        .collect::<Result<Vec<_>>>()?;
    let identity = if follower || settings.node.secret_key.is_empty() {
        None
    } else {
        let keypair = KeyPair::from_bs58_check(&settings.node.secret_key)
            .context("invalid node secret key")?;
        Some(NodeIdentity::from_keypair(keypair))
    };

    Ok(ConsensusConfig {
        network_id: consensus.network_id,
        block_time: consensus.block_time,
        genesis_timestamp: consensus.genesis_timestamp,
        fault_timeout: consensus.fault_timeout,
        replay_range_minutes: consensus.replay_range_minutes,
        lookahead_heights: consensus.lookahead_heights,
        process_list_retention: consensus.process_list_retention,
        dbstate_retention: consensus.dbstate_retention,
        ignore_missing_period: consensus.ignore_missing_period,
        holding_review_interval: consensus.holding_review_interval,
        max_holding_size: consensus.max_holding_size,
        catchup_request_interval: consensus.catchup_request_interval,
        catchup_max_range: consensus.catchup_max_range,
        msg_queue_size: consensus.msg_queue_size,
        ack_queue_size: consensus.ack_queue_size,
        dbstate_queue_size: consensus.dbstate_queue_size,
        queue_policy: consensus.queue_policy,
        identity,
        genesis_authorities,
        genesis_ec_balances,
        ..Default::default()
    })
}

/// database configuration
pub fn db_config(settings: &Settings) -> DbConfig {
    DbConfig {
        keep_heights: settings.database.keep_heights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SETTINGS;
    use dchain_models::ServerType;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_base_config_signs_as_the_single_leader() {
        let config = consensus_config(&SETTINGS, false).unwrap();
        let identity = config.identity.expect("the base configuration signs");
        assert_eq!(config.genesis_authorities.len(), 1);
        assert_eq!(config.genesis_authorities[0].identity, identity.identity);
        assert_eq!(config.genesis_authorities[0].server_type, ServerType::Federated);
        assert_eq!(config.genesis_ec_balances.len(), 1);
    }

    #[test]
    #[serial]
    fn test_follower_has_no_identity() {
        let config = consensus_config(&SETTINGS, true).unwrap();
        assert!(config.identity.is_none());
    }

    #[test]
    #[serial]
    fn test_bad_key_is_reported() {
        let mut settings = SETTINGS.clone();
        settings.authorities[0].public_key = "not a key".to_string();
        let err = consensus_config(&settings, true).unwrap_err();
        assert!(err.to_string().contains("invalid authority key"));

        let mut settings = SETTINGS.clone();
        settings.authorities.clear();
        assert!(consensus_config(&settings, true).is_err());
    }
}
