// Copyright (c) 2024 DCHAIN LABS
//! Consensus configuration.
//!
//! Protocol values come from `dchain_models::config` and every node of a
//! network must agree on them. The rest (queues, timeouts, retention) is local.
use dchain_channel::BackpressurePolicy;
use dchain_models::{
    config::{
        COINBASE_DECLARATION_DELAY, COINBASE_PAYOUT_AMOUNT, COINBASE_PAYOUT_FREQUENCY,
        PROCESS_LIST_LOOKAHEAD, REPLAY_RANGE_MINUTES,
    },
    Authority, EcAddress, IdentityId,
};
use dchain_signature::KeyPair;
use dchain_time::ChainTime;

/// Signing identity of a node taking part in consensus.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    /// identity chain
    pub identity: IdentityId,
    /// signing key registered for the identity
    pub keypair: KeyPair,
}

impl NodeIdentity {
    /// identity derived from the public key
    pub fn from_keypair(keypair: KeyPair) -> Self {
        NodeIdentity {
            identity: IdentityId::from_public_key(&keypair.get_public_key()),
            keypair,
        }
    }
}

/// Consensus configuration
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// network magic written in every directory block header
    pub network_id: u32,
    /// duration of a block, ten minutes of `block_time / 10`
    pub block_time: ChainTime,
    /// replay window half width, in minutes
    pub replay_range_minutes: u64,
    /// how far past the highest known height a process list may be created
    pub lookahead_heights: u32,
    /// saved heights whose process lists are kept in memory
    pub process_list_retention: u32,
    /// saved heights whose states are kept in memory
    pub dbstate_retention: usize,
    /// how long a VM may stay unsynced in an open round before it is faulted
    pub fault_timeout: ChainTime,
    /// after boot, messages older than `ignore_missing_max_age` are dropped for this long
    pub ignore_missing_period: ChainTime,
    /// age limit applied during the boot grace period
    pub ignore_missing_max_age: ChainTime,
    /// how often held messages are re-executed
    pub holding_review_interval: ChainTime,
    /// held messages more than this many heights below the saved frontier are dropped
    pub holding_max_age_heights: u32,
    /// maximum number of held messages
    pub max_holding_size: usize,
    /// how long an unanswerable missing message request is retried
    pub missing_response_delay_max: ChainTime,
    /// maximum number of deferred missing message requests
    pub missing_response_max_pending: usize,
    /// minimum delay between two catchup requests
    pub catchup_request_interval: ChainTime,
    /// maximum number of heights asked by one catchup request
    pub catchup_max_range: u32,
    /// heights between two coinbase descriptors
    pub coinbase_payout_frequency: u32,
    /// first height carrying a coinbase descriptor
    pub coinbase_declaration_delay: u32,
    /// amount paid to each authority by a coinbase descriptor
    pub coinbase_payout_amount: u64,
    /// factoshis per entry credit
    pub ec_exchange_rate: u64,
    /// capacity of the inbound message queue
    pub msg_queue_size: usize,
    /// capacity of the inbound ack queue
    pub ack_queue_size: usize,
    /// capacity of the received block queue
    pub dbstate_queue_size: usize,
    /// capacity of the command queue
    pub command_queue_size: usize,
    /// what producers do on a full queue
    pub queue_policy: BackpressurePolicy,
    /// messages taken from each queue per pass
    pub max_batch_per_pass: usize,
    /// maximum idle wait of the driver between passes
    pub max_idle_sleep: ChainTime,
    /// how long a query waits for the driver
    pub query_timeout: ChainTime,
    /// signing identity, `None` for a follower node
    pub identity: Option<NodeIdentity>,
    /// authorities of height 0, federated and audit
    pub genesis_authorities: Vec<Authority>,
    /// timestamp of the genesis block
    pub genesis_timestamp: ChainTime,
    /// entry-credit balances credited at height 0
    pub genesis_ec_balances: Vec<(EcAddress, i64)>,
}

impl ConsensusConfig {
    /// duration of one minute of a block
    pub fn minute_duration(&self) -> ChainTime {
        ChainTime::from_millis(self.block_time.to_millis() / 10)
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            network_id: 0xfa92_e5a2,
            block_time: ChainTime::from_minutes(10),
            replay_range_minutes: REPLAY_RANGE_MINUTES,
            lookahead_heights: PROCESS_LIST_LOOKAHEAD,
            process_list_retention: 2,
            dbstate_retention: 2,
            fault_timeout: ChainTime::from_millis(120_000),
            ignore_missing_period: ChainTime::from_minutes(10),
            ignore_missing_max_age: ChainTime::from_minutes(15),
            holding_review_interval: ChainTime::from_millis(1_000),
            holding_max_age_heights: 2,
            max_holding_size: 50_000,
            missing_response_delay_max: ChainTime::from_millis(3_000),
            missing_response_max_pending: 100,
            catchup_request_interval: ChainTime::from_millis(5_000),
            catchup_max_range: 100,
            coinbase_payout_frequency: COINBASE_PAYOUT_FREQUENCY,
            coinbase_declaration_delay: COINBASE_DECLARATION_DELAY,
            coinbase_payout_amount: COINBASE_PAYOUT_AMOUNT,
            ec_exchange_rate: 1_000,
            msg_queue_size: 10_000,
            ack_queue_size: 10_000,
            dbstate_queue_size: 1_000,
            command_queue_size: 1_024,
            queue_policy: BackpressurePolicy::Block,
            max_batch_per_pass: 500,
            max_idle_sleep: ChainTime::from_millis(10),
            query_timeout: ChainTime::from_millis(2_000),
            identity: None,
            genesis_authorities: Vec::new(),
            genesis_timestamp: ChainTime::from_millis(0),
            genesis_ec_balances: Vec::new(),
        }
    }
}
