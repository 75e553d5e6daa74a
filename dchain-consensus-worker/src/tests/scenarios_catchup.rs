// Copyright (c) 2024 DCHAIN LABS
use assert_matches::assert_matches;
use dchain_consensus_exports::AckStatus;
use dchain_db_exports::DatabaseController;
use dchain_hash::Hash;
use dchain_models::{
    messages::{DBStateMissing, DBStateMsg},
    Message,
};

use super::tools::{Federation, TestNode};

/// Blocks 1 and 2 as served by a single leader that saved them.
fn served_blocks(federation: &Federation) -> (TestNode, Vec<DBStateMsg>) {
    let mut leader = TestNode::new(federation.config(Some(0)));
    leader.run_until_saved(2, 60);
    leader.sent();

    leader.state.execute_msg(Message::DBStateMissing(DBStateMissing {
        timestamp: leader.state.now(),
        start: 1,
        end: 2,
    }));
    let blocks: Vec<DBStateMsg> = leader
        .sent()
        .into_iter()
        .filter_map(|message| match message {
            Message::DBState(dbstate) => Some(dbstate),
            _ => None,
        })
        .collect();
    (leader, blocks)
}

#[test]
fn test_saved_blocks_are_served_with_their_signatures() {
    let federation = Federation::new(1, 0);
    let me = federation.nth(0).identity;
    let (leader, blocks) = served_blocks(&federation);

    assert_eq!(blocks.len(), 2);
    for (dbstate, height) in blocks.iter().zip(1..) {
        assert_eq!(dbstate.block.height(), height);
        let saved = leader.database.fetch_block_by_height(height).unwrap().unwrap();
        assert_eq!(dbstate.block.keymr(), saved.keymr());
        assert_eq!(dbstate.signatures.len(), 1);
        assert_eq!(dbstate.signatures[0].0, me);
    }
}

#[test]
fn test_request_is_clipped_to_saved_heights() {
    let federation = Federation::new(1, 0);
    let (mut leader, _) = served_blocks(&federation);
    let highest_saved = leader.state.dbstates.highest_saved();

    leader.state.execute_msg(Message::DBStateMissing(DBStateMissing {
        timestamp: leader.state.now(),
        start: 1,
        end: highest_saved + 50,
    }));
    let served = leader
        .sent()
        .into_iter()
        .filter(|message| matches!(message, Message::DBState(_)))
        .count();
    assert_eq!(served as u32, highest_saved);
}

#[test]
fn test_follower_catches_up_from_served_blocks() {
    let federation = Federation::new(1, 0);
    let (leader, blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));

    for dbstate in blocks {
        follower.state.execute_msg(Message::DBState(dbstate));
    }
    while follower.state.step() {}

    assert_eq!(follower.state.dbstates.highest_saved(), 2);
    assert_eq!(follower.state.leader_height, 3);
    assert!(follower.state.saving);
    let ours = follower.database.fetch_block_by_height(2).unwrap().unwrap();
    let theirs = leader.database.fetch_block_by_height(2).unwrap().unwrap();
    assert_eq!(ours.keymr(), theirs.keymr());
    assert_eq!(follower.state.status.read().highest_saved, 2);
}

#[test]
fn test_gap_below_a_received_block_is_requested() {
    let federation = Federation::new(1, 0);
    let (_, mut blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));

    let block_2 = blocks.pop().unwrap();
    follower.state.execute_msg(Message::DBState(block_2));
    while follower.state.step() {}
    assert_eq!(follower.state.dbstates.highest_saved(), 0);

    let requests: Vec<_> = follower
        .sent()
        .into_iter()
        .filter_map(|message| match message {
            Message::DBStateMissing(request) => Some((request.start, request.end)),
            _ => None,
        })
        .collect();
    assert!(requests.contains(&(1, 2)), "no request for the gap: {:?}", requests);

    follower.state.execute_msg(Message::DBState(blocks.pop().unwrap()));
    while follower.state.step() {}
    assert_eq!(follower.state.dbstates.highest_saved(), 2);
}

#[test]
fn test_unsigned_block_is_invalid() {
    let federation = Federation::new(1, 0);
    let (_, mut blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));

    let mut unsigned = blocks.remove(0);
    unsigned.signatures.clear();
    let message = Message::DBState(unsigned);
    let hash = message.msg_hash();
    follower.state.execute_msg(message);
    while follower.state.step() {}
    assert_eq!(follower.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
    assert_eq!(follower.state.dbstates.highest_saved(), 0);
}

#[test]
fn test_block_signed_by_outsider_is_invalid() {
    let federation = Federation::new(1, 0);
    let outsider = Federation::new(2, 0).nth(1).clone();
    let (_, mut blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));

    let mut forged = blocks.remove(0);
    let keymr = forged.block.keymr();
    forged.signatures = vec![(outsider.identity, outsider.keypair.sign(&keymr))];
    let message = Message::DBState(forged);
    let hash = message.msg_hash();
    follower.state.execute_msg(message);
    assert_matches!(follower.state.get_ack_status(&hash), Ok(AckStatus::Invalid));
}

#[test]
fn test_block_not_following_the_saved_chain_is_invalid() {
    let federation = Federation::new(1, 0);
    let leader = federation.nth(0).clone();
    let (_, mut blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));
    follower.state.execute_msg(Message::DBState(blocks.remove(0)));
    while follower.state.step() {}
    assert_eq!(follower.state.dbstates.highest_saved(), 1);

    let mut foreign = blocks.remove(0);
    foreign.block.directory_block.header.prev_keymr = Hash::compute_from(b"another chain");
    let keymr = foreign.block.keymr();
    foreign.signatures = vec![(leader.identity, leader.keypair.sign(&keymr))];
    let message = Message::DBState(foreign);
    let hash = message.msg_hash();
    follower.state.execute_msg(message);
    assert_eq!(follower.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
    assert_eq!(follower.state.dbstates.highest_known(), 1);
}

#[test]
fn test_block_past_the_lookahead_is_dropped() {
    let federation = Federation::new(1, 0);
    let leader = federation.nth(0).clone();
    let (_, mut blocks) = served_blocks(&federation);
    let mut follower = TestNode::new(federation.config(None));
    let known = follower.state.highest_known();

    let mut far = blocks.remove(0);
    far.block.directory_block.header.db_height = u32::MAX;
    let keymr = far.block.keymr();
    far.signatures = vec![(leader.identity, leader.keypair.sign(&keymr))];
    follower.state.execute_msg(Message::DBState(far));
    while follower.state.step() {}

    assert!(follower.state.dbstates.get(u32::MAX).is_none());
    assert_eq!(follower.state.highest_known(), known);
}
