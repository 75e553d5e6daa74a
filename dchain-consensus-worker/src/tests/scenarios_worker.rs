// Copyright (c) 2024 DCHAIN LABS
use std::{sync::Arc, thread, time::Duration};

use assert_matches::assert_matches;
use dchain_channel::{receiver::DChainReceiver, SendOutcome};
use dchain_consensus_exports::{
    error::ConsensusError, test_exports::capturing_network, AckStatus, ConsensusChannels,
    ConsensusConfig, ConsensusController, ConsensusManager, StaticAuthorityRegistry,
};
use dchain_db_exports::{DBError, DatabaseController, DbConfig, MockDatabaseController};
use dchain_db_worker::MemoryDB;
use dchain_hash::Hash;
use dchain_models::Message;
use dchain_time::{ChainTime, ManualClock};

use super::tools::{ec_address, init_logging, new_chain, Federation, START};
use crate::start_consensus_worker;

struct RunningNode {
    controller: Box<dyn ConsensusController>,
    manager: Box<dyn ConsensusManager>,
    clock: ManualClock,
    database: Arc<MemoryDB>,
    _network: DChainReceiver<Message>,
}

fn start(config: ConsensusConfig) -> RunningNode {
    init_logging();
    let clock = ManualClock::new(START);
    let database = Arc::new(MemoryDB::new(DbConfig::default()));
    let (network, captured) = capturing_network();
    let channels = ConsensusChannels {
        network: Box::new(network),
        authorities: Arc::new(StaticAuthorityRegistry::new(
            config.genesis_authorities.clone(),
        )),
        database: database.clone(),
        clock: Arc::new(clock.clone()),
        invalid_message_sender: None,
    };
    let (controller, manager) =
        start_consensus_worker(config, channels).expect("could not start the consensus worker");
    RunningNode {
        controller,
        manager,
        clock,
        database,
        _network: captured,
    }
}

/// Moves the shared clock forward until `check` holds or `rounds` ran out.
fn advance_until(node: &RunningNode, step: ChainTime, rounds: usize, check: impl Fn(&RunningNode) -> bool) -> bool {
    for _ in 0..rounds {
        if check(node) {
            return true;
        }
        node.clock.advance(step);
        thread::sleep(Duration::from_millis(5));
    }
    check(node)
}

#[test]
fn test_worker_saves_blocks_and_stops() {
    let federation = Federation::new(1, 0);
    let mut node = start(federation.config(Some(0)));
    assert_eq!(node.controller.get_highest_saved_blk(), 0);

    let saved = advance_until(&node, ChainTime::from_minutes(1), 1_000, |node| {
        node.controller.get_highest_saved_blk() >= 1
    });
    assert!(saved, "the worker did not save height 1");
    assert!(node.database.fetch_block_by_height(1).unwrap().is_some());
    assert!(node.controller.get_leader_height() >= 2);
    assert!(node.controller.get_highest_known_block() >= 1);

    node.manager.stop();
    assert_matches!(
        node.controller.get_ack_status(Hash::compute_from(b"after stop")),
        Err(ConsensusError::Stopped) | Err(ConsensusError::QueryTimeout(_))
    );
}

#[test]
fn test_worker_answers_status_queries() {
    let federation = Federation::new(1, 0);
    let mut config = federation.config(Some(0));
    config.genesis_ec_balances = vec![(ec_address(), 100)];
    let mut node = start(config);

    assert_eq!(
        node.controller
            .get_ack_status(Hash::compute_from(b"never seen"))
            .unwrap(),
        AckStatus::Unknown
    );

    let (commit, _, entry_hash) = new_chain(START, b"through the worker");
    let commit_hash = commit.msg_hash();
    assert_eq!(node.controller.register_message(commit.clone()), SendOutcome::Queued);
    assert_eq!(node.controller.register_message(commit), SendOutcome::Dropped);

    let acked = advance_until(&node, ChainTime::from_millis(100), 500, |node| {
        matches!(node.controller.get_ack_status(commit_hash), Ok(AckStatus::Ack))
    });
    assert!(acked, "the commit was never acknowledged");
    assert_eq!(
        node.controller
            .get_entry_commit_ack_by_entry_hash(entry_hash)
            .unwrap(),
        AckStatus::Ack
    );
    node.manager.stop();
}

#[test]
fn test_too_short_block_time_is_refused() {
    let federation = Federation::new(1, 0);
    let mut config = federation.config(Some(0));
    config.block_time = ChainTime::from_millis(5);
    let clock = ManualClock::new(START);
    let (network, _captured) = capturing_network();
    let channels = ConsensusChannels {
        network: Box::new(network),
        authorities: Arc::new(StaticAuthorityRegistry::new(
            config.genesis_authorities.clone(),
        )),
        database: Arc::new(MemoryDB::new(DbConfig::default())),
        clock: Arc::new(clock),
        invalid_message_sender: None,
    };
    match start_consensus_worker(config, channels) {
        Err(ConsensusError::InvalidConfig(_)) => {}
        Err(err) => panic!("unexpected error: {}", err),
        Ok(_) => panic!("a 5 ms block time was accepted"),
    }
}

#[test]
fn test_unreadable_database_fails_the_start() {
    let federation = Federation::new(1, 0);
    let config = federation.config(None);
    let mut database = MockDatabaseController::new();
    database
        .expect_fetch_directory_block_head()
        .times(1)
        .returning(|| Err(DBError::Closed));
    let (network, _captured) = capturing_network();
    let channels = ConsensusChannels {
        network: Box::new(network),
        authorities: Arc::new(StaticAuthorityRegistry::new(
            config.genesis_authorities.clone(),
        )),
        database: Arc::new(database),
        clock: Arc::new(ManualClock::new(START)),
        invalid_message_sender: None,
    };
    match start_consensus_worker(config, channels) {
        Err(ConsensusError::DBError(DBError::Closed)) => {}
        Err(err) => panic!("unexpected error: {}", err),
        Ok(_) => panic!("the worker started over a closed database"),
    }
}
