// Copyright (c) 2024 DCHAIN LABS
//! Node settings read from the configuration files and the environment.
use std::path::Path;

use dchain_channel::BackpressurePolicy;
use dchain_models::ServerType;
use dchain_time::ChainTime;
use serde::Deserialize;

/// default base configuration, relative to the working directory
pub const BASE_CONFIG_PATH: &str = "base_config/config.toml";
/// optional override, relative to the working directory
pub const OVERRIDE_CONFIG_PATH: &str = "config/config.toml";
/// prefix of the environment variables overriding settings
pub const ENV_PREFIX: &str = "DCHAIN";

lazy_static::lazy_static! {
    pub static ref SETTINGS: Settings = {
        let base = std::env::var("DCHAIN_CONFIG_PATH")
            .unwrap_or_else(|_| BASE_CONFIG_PATH.to_string());
        let override_path = std::env::var("DCHAIN_CONFIG_OVERRIDE_PATH")
            .unwrap_or_else(|_| OVERRIDE_CONFIG_PATH.to_string());
        build_settings(&base, &override_path)
            .unwrap_or_else(|err| panic!("failed to read the node configuration {}: {}", base, err))
    };
}

/// Reads `base`, then `override_path` if it exists, then `DCHAIN_*`
/// environment variables (`DCHAIN_LOGGING__LEVEL=3`).
pub fn build_settings(base: &str, override_path: &str) -> Result<Settings, config::ConfigError> {
    let mut builder = config::Config::builder().add_source(config::File::with_name(base));
    if Path::new(override_path).is_file() {
        builder = builder.add_source(config::File::with_name(override_path));
    }
    builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LoggingSettings {
    pub level: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    /// bs58 check signing key, empty for a follower
    #[serde(default)]
    pub secret_key: String,
    pub status_interval: ChainTime,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct DatabaseSettings {
    pub keep_heights: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsensusSettings {
    pub network_id: u32,
    pub block_time: ChainTime,
    pub genesis_timestamp: ChainTime,
    pub fault_timeout: ChainTime,
    pub replay_range_minutes: u64,
    pub lookahead_heights: u32,
    pub process_list_retention: u32,
    pub dbstate_retention: usize,
    pub ignore_missing_period: ChainTime,
    pub holding_review_interval: ChainTime,
    pub max_holding_size: usize,
    pub catchup_request_interval: ChainTime,
    pub catchup_max_range: u32,
    pub msg_queue_size: usize,
    pub ack_queue_size: usize,
    pub dbstate_queue_size: usize,
    pub queue_policy: BackpressurePolicy,
}

/// A genesis authority, identified by its signing key.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthoritySettings {
    pub public_key: String,
    pub server_type: ServerType,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EcBalanceSettings {
    pub public_key: String,
    pub credits: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub node: NodeSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    pub consensus: ConsensusSettings,
    pub authorities: Vec<AuthoritySettings>,
    #[serde(default)]
    pub genesis_ec_balances: Vec<EcBalanceSettings>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const MINIMAL: &str = r#"
[logging]
level = 1
[node]
status_interval = 500
[consensus]
network_id = 7
block_time = 6000
genesis_timestamp = 0
fault_timeout = 2000
replay_range_minutes = 60
lookahead_heights = 20
process_list_retention = 2
dbstate_retention = 2
ignore_missing_period = 0
holding_review_interval = 100
max_holding_size = 10
catchup_request_interval = 100
catchup_max_range = 5
msg_queue_size = 10
ack_queue_size = 10
dbstate_queue_size = 10
queue_policy = "drop_newest"
[[authorities]]
public_key = "2kozVbcAAHujkTgGTcd9NvKUs3UqSj9uKxKi4nWcQoVEQrd7hm"
server_type = "Audit"
"#;

    fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    #[serial]
    fn test_load_node_config() {
        let _ = *SETTINGS;
        assert!(!SETTINGS.authorities.is_empty());
    }

    #[test]
    #[serial]
    fn test_override_and_environment() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(&dir, "base.toml", MINIMAL);
        let override_path = write_config(&dir, "override.toml", "[consensus]\ncatchup_max_range = 9\n");

        std::env::set_var("DCHAIN_LOGGING__LEVEL", "4");
        let settings = build_settings(&base, &override_path).unwrap();
        std::env::remove_var("DCHAIN_LOGGING__LEVEL");

        assert_eq!(settings.logging.level, 4);
        assert_eq!(settings.consensus.catchup_max_range, 9);
        assert_eq!(settings.consensus.queue_policy, BackpressurePolicy::DropNewest);
        assert_eq!(settings.consensus.block_time, ChainTime::from_millis(6000));
        assert_eq!(settings.authorities[0].server_type, ServerType::Audit);
        assert!(settings.node.secret_key.is_empty());
        assert!(settings.database.keep_heights.is_none());
        assert!(settings.genesis_ec_balances.is_empty());
    }

    #[test]
    #[serial]
    fn test_missing_override_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_config(&dir, "base.toml", MINIMAL);
        let settings = build_settings(&base, "does/not/exist.toml").unwrap();
        assert_eq!(settings.consensus.catchup_max_range, 5);
    }
}
