// Copyright (c) 2024 DCHAIN LABS
use dchain_consensus_exports::AckStatus;
use dchain_db_exports::DatabaseController;
use dchain_models::{blocks::AdminEntry, Message};

use super::tools::{Federation, TestNode};

#[test]
fn test_single_leader_saves_blocks() {
    let federation = Federation::new(1, 0);
    let me = federation.nth(0).identity;
    let mut node = TestNode::new(federation.config(Some(0)));
    assert_eq!(node.state.leader_height, 1);
    assert!(node.state.saving);

    node.run_until_saved(2, 60);

    let block_1 = node
        .database
        .fetch_block_by_height(1)
        .unwrap()
        .expect("block 1 is not in the database");
    let block_2 = node
        .database
        .fetch_block_by_height(2)
        .unwrap()
        .expect("block 2 is not in the database");
    assert_eq!(block_2.directory_block.header.prev_keymr, block_1.keymr());
    assert!(block_1.check_consistency().is_ok());
    // the signatures of a block sit in the admin block of the next one
    let signers: Vec<_> = block_2
        .admin_block
        .entries
        .iter()
        .filter_map(|entry| match entry {
            AdminEntry::DBSignature { identity, .. } => Some(*identity),
            _ => None,
        })
        .collect();
    assert_eq!(signers, vec![me]);
    assert_eq!(node.state.status.read().highest_saved, node.state.dbstates.highest_saved());
}

#[test]
fn test_block_flags_hold_at_every_minute() {
    let federation = Federation::new(1, 0);
    let mut node = TestNode::new(federation.config(Some(0)));
    let mut highest_saved = node.state.dbstates.highest_saved();

    for _ in 0..80 {
        node.tick_minute();
        let dbstates = &node.state.dbstates;
        for height in dbstates.heights() {
            let state = dbstates.get(height).unwrap();
            assert!(
                state.flags_consistent(),
                "height {}: saved {} signed {} locked {}",
                height,
                state.saved,
                state.signed,
                state.locked
            );
        }
        assert!(dbstates.highest_saved() >= highest_saved);
        highest_saved = dbstates.highest_saved();
    }
    assert!(highest_saved >= 4, "only {} heights saved", highest_saved);
}

#[test]
fn test_leader_sends_every_message_with_its_ack() {
    let federation = Federation::new(1, 0);
    let mut node = TestNode::new(federation.config(Some(0)));
    while node.state.step() {}
    assert!(!node.state.saving, "signature round of height 1 should be closed");

    let sent = node.sent();
    assert_eq!(sent.len(), 2);
    let (Message::DirectoryBlockSignature(dbsig), Message::Ack(ack)) = (&sent[0], &sent[1]) else {
        panic!("expected a signature and its ack, got {:?}", sent);
    };
    assert_eq!(ack.message_hash, sent[0].msg_hash());
    assert_eq!((ack.db_height, ack.vm_index, ack.height), (1, 0, 0));
    assert_eq!(dbsig.db_height, 1);

    node.tick_minute();
    let sent = node.sent();
    let eoms: Vec<_> = sent
        .iter()
        .filter_map(|message| match message {
            Message::EndOfMinute(eom) => Some(eom.minute),
            _ => None,
        })
        .collect();
    assert_eq!(eoms, vec![0]);
    assert_eq!(node.state.current_minute, 1);
    assert_eq!(
        node.state.get_ack_status(&sent[0].msg_hash()).unwrap(),
        AckStatus::Ack
    );
}

#[test]
fn test_end_of_minute_waits_for_the_minute_to_elapse() {
    let federation = Federation::new(1, 0);
    let mut node = TestNode::new(federation.config(Some(0)));
    while node.state.step() {}
    node.sent();

    node.state.on_tick();
    while node.state.step() {}
    assert!(node.sent().is_empty());
    assert_eq!(node.state.current_minute, 0);

    node.tick_minute();
    assert_eq!(node.state.current_minute, 1);
}

#[test]
fn test_restart_resumes_from_the_database() {
    let federation = Federation::new(1, 0);
    let mut node = TestNode::new(federation.config(Some(0)));
    node.run_until_saved(2, 60);
    let saved = node.state.dbstates.highest_saved();
    let database = node.database.clone();
    drop(node);

    let restarted = TestNode::with_database(federation.config(Some(0)), database);
    assert_eq!(restarted.state.dbstates.highest_saved(), saved);
    assert_eq!(restarted.state.leader_height, saved + 1);
    assert!(restarted.state.saving);
    assert_eq!(restarted.state.processed_height, saved);
}

#[test]
fn test_saved_message_is_confirmed() {
    let federation = Federation::new(1, 0);
    let mut node = TestNode::new(federation.config(Some(0)));
    while node.state.step() {}
    let dbsig_hash = node.sent()[0].msg_hash();

    node.run_until_saved(1, 60);
    assert_eq!(
        node.state.get_ack_status(&dbsig_hash).unwrap(),
        AckStatus::DBlockConfirmed
    );
}
