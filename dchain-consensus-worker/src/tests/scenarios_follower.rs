// Copyright (c) 2024 DCHAIN LABS
use assert_matches::assert_matches;
use dchain_consensus_exports::AckStatus;
use dchain_hash::Hash;
use dchain_models::{
    blocks::AdminEntry,
    messages::{DirectoryBlockSignature, EndOfMinute, MissingMsg, MissingMsgResponse, ServerFault},
    Ack, Message,
};
use dchain_time::ChainTime;

use super::tools::{Federation, TestNode};

const FED: usize = 4;

/// Follower of `FED` leaders with the signature round of height 1 processed.
fn follower_past_signatures(federation: &mut Federation) -> TestNode {
    let mut node = TestNode::new(federation.config(None));
    for vm_index in 0..FED {
        let (message, ack) = federation.dbsig(&node.state, 1, vm_index);
        node.deliver(message, ack);
    }
    node.state.process();
    assert!(!node.state.saving, "signature round of height 1 should be closed");
    node
}

#[test]
fn test_follower_builds_height_from_acked_messages() {
    let mut federation = Federation::new(FED, 0);
    let mut node = follower_past_signatures(&mut federation);

    for minute in 0..10 {
        for vm_index in 0..FED {
            let (message, ack) = federation.eom(&node.state, 1, minute, vm_index);
            node.deliver(message, ack);
        }
    }
    for _ in 0..10 {
        node.state.process();
    }
    assert_eq!(node.state.leader_height, 2);
    assert!(node.state.saving);
    let state = node.state.dbstates.get(1).expect("height 1 not completed");
    assert!(state.is_new);
    assert!(!state.locked);

    assert!(node.state.update_state());
    let state = node.state.dbstates.get(1).expect("height 1 dropped");
    assert!(!state.is_new);
    assert!(state.locked);
    let genesis_keymr = node.state.dbstates.get(0).map(|genesis| genesis.keymr());
    assert_eq!(Some(state.block.directory_block.header.prev_keymr), genesis_keymr);
    let signatures = state
        .block
        .admin_block
        .entries
        .iter()
        .filter(|entry| matches!(entry, AdminEntry::DBSignature { .. }))
        .count();
    assert_eq!(signatures, FED);
}

#[test]
fn test_end_of_minute_of_a_later_minute_waits() {
    let mut federation = Federation::new(FED, 0);
    let mut node = follower_past_signatures(&mut federation);

    // minute 1 of every vm arrives before minute 0 of vm 3
    let mut late = None;
    for minute in 0..2 {
        for vm_index in 0..FED {
            let (message, ack) = federation.eom(&node.state, 1, minute, vm_index);
            if minute == 0 && vm_index == 3 {
                late = Some((message, ack));
                continue;
            }
            node.deliver(message, ack);
        }
    }
    node.state.process();
    node.state.process();
    assert_eq!(node.state.current_minute, 0);

    let (message, ack) = late.unwrap();
    node.deliver(message, ack);
    node.state.process();
    node.state.process();
    assert_eq!(node.state.current_minute, 2);
}

#[test]
fn test_gap_in_acks_is_asked_for_and_filled() {
    let mut federation = Federation::new(FED, 0);
    let mut node = TestNode::new(federation.config(None));
    let (dbsig, dbsig_ack) = federation.dbsig(&node.state, 1, 0);
    let (eom, eom_ack) = federation.eom(&node.state, 1, 0, 0);
    assert_eq!(eom_ack.height, 1);
    node.deliver(eom, eom_ack);

    node.state.process();
    let now = node.state.now();
    let asks = node.mmr.ask.drain_up_to(100);
    assert!(
        asks.iter()
            .any(|ask| (ask.db_height, ask.vm_index, ask.height, ask.when) == (1, 0, 0, now)),
        "slot 0 of vm 0 was not asked for: {:?}",
        asks
    );

    node.state.execute_msg(Message::MissingMsgResponse(MissingMsgResponse {
        timestamp: now,
        ack: dbsig_ack,
        message: Box::new(dbsig),
    }));
    node.state.process();
    let vm = &node.state.process_lists.get(1).unwrap().vms[0];
    assert!(vm.signed);
    // the end of minute waits for the signature round to close
    assert_eq!(vm.height, 1);
}

#[test]
fn test_broken_ack_chain_clears_the_slot() {
    let mut federation = Federation::new(FED, 0);
    let mut node = TestNode::new(federation.config(None));
    let (dbsig, dbsig_ack) = federation.dbsig(&node.state, 1, 0);
    node.deliver(dbsig, dbsig_ack);

    let leader = federation.leader(&node.state, 1, 0, 0);
    let now = node.state.now();
    let forged_prev = Ack::new(
        None,
        now,
        1,
        0,
        Hash::compute_from(b"not the signature"),
        leader.identity,
        &leader.keypair,
    );
    let (eom, _) = federation.eom(&node.state, 1, 0, 0);
    let bad_ack = Ack::new(
        Some(&forged_prev),
        now,
        1,
        0,
        eom.msg_hash(),
        leader.identity,
        &leader.keypair,
    );
    assert_eq!(bad_ack.height, 1);
    node.deliver(eom, bad_ack);

    node.state.process();
    let vm = &node.state.process_lists.get(1).unwrap().vms[0];
    assert_eq!(vm.height, 1);
    assert!(vm.list[1].is_none());
    let asks = node.mmr.ask.drain_up_to(100);
    assert!(asks
        .iter()
        .any(|ask| (ask.db_height, ask.vm_index, ask.height) == (1, 0, 1)));
}

#[test]
fn test_missing_message_request_is_answered_from_the_lists() {
    let mut federation = Federation::new(FED, 0);
    let mut node = follower_past_signatures(&mut federation);
    node.sent();

    node.state.execute_msg(Message::MissingMsg(MissingMsg {
        timestamp: node.state.now(),
        db_height: 1,
        vm_index: 2,
        heights: vec![0, 5],
        asker: Some(federation.nth(1).identity),
    }));

    let sent = node.sent();
    assert_eq!(sent.len(), 1);
    assert_matches!(&sent[0], Message::MissingMsgResponse(response) => {
        assert_eq!((response.ack.vm_index, response.ack.height), (2, 0));
        assert!(response.is_consistent());
    });
    // slot 5 does not exist yet, it is retried for a while
    assert_eq!(node.state.deferred_missing.len(), 1);
    assert_eq!(node.state.deferred_missing[0].1.heights, vec![5]);

    node.clock.advance(node.state.config.missing_response_delay_max);
    node.clock.advance(ChainTime::from_millis(1));
    node.state.step();
    assert!(node.state.deferred_missing.is_empty());
}

#[test]
fn test_signature_from_wrong_leader_is_invalid() {
    let federation = Federation::new(FED, 0);
    let mut node = TestNode::new(federation.config(None));
    let header = node.state.dbstates.get(0).unwrap().block.directory_block.header.clone();
    let wrong = federation.leader(&node.state, 1, 0, 1);
    let dbsig = Message::DirectoryBlockSignature(DirectoryBlockSignature::new(
        node.state.now(),
        0,
        header,
        wrong.identity,
        &wrong.keypair,
    ));
    let hash = dbsig.msg_hash();
    node.state.execute_msg(dbsig);
    assert_eq!(node.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
}

#[test]
fn test_majority_of_different_signatures_resets_the_height() {
    let mut federation = Federation::new(3, 0);
    let mut node = TestNode::new(federation.config(None));
    let mut forged = node.state.dbstates.get(0).unwrap().block.directory_block.header.clone();
    forged.timestamp = forged.timestamp.saturating_add(ChainTime::from_millis(1));
    for vm_index in 0..3 {
        let (message, ack) = federation.dbsig_over(&node.state, 1, vm_index, forged.clone());
        node.deliver(message, ack);
    }
    node.state.process();

    let pl = node.state.process_lists.get(1).unwrap();
    assert!(node.state.saving);
    assert!(pl.dbsigs.is_empty());
    assert_eq!(pl.diff_sig_tally, 0);
    assert!(pl.vms.iter().all(|vm| vm.list.is_empty() && !vm.signed));

    federation.forget(1);
    for vm_index in 0..3 {
        let (message, ack) = federation.dbsig(&node.state, 1, vm_index);
        node.deliver(message, ack);
    }
    node.state.process();
    assert!(!node.state.saving);
    assert_eq!(node.state.process_lists.get(1).unwrap().dbsigs.len(), 3);
}

#[test]
fn test_outsider_cannot_open_heights() {
    let federation = Federation::new(FED, 0);
    let outsider = Federation::new(FED + 2, 0).nth(FED + 1).clone();
    let mut node = TestNode::new(federation.config(None));
    while node.state.step() {}
    node.sent();
    let known = node.state.highest_known();
    let limit = node.state.process_list_limit();
    let now = node.state.now();

    let eom = Message::EndOfMinute(EndOfMinute::new(
        now,
        limit,
        0,
        0,
        outsider.identity,
        &outsider.keypair,
    ));
    let eom_hash = eom.msg_hash();
    node.state.execute_msg(eom);
    let ack = Ack::new(
        None,
        now,
        limit,
        1,
        Hash::compute_from(b"anything"),
        outsider.identity,
        &outsider.keypair,
    );
    node.state.execute_msg(Message::Ack(ack));
    let (faulted, replacement) = (federation.nth(0).identity, federation.nth(1).identity);
    let vote = Message::ServerFault(ServerFault::new(
        now,
        limit - 1,
        0,
        faulted,
        replacement,
        0,
        outsider.identity,
        &outsider.keypair,
    ));
    let vote_hash = vote.msg_hash();
    node.state.execute_msg(vote);
    while node.state.step() {}
    node.state.publish_status();

    assert_eq!(node.state.get_ack_status(&eom_hash).unwrap(), AckStatus::Invalid);
    assert_eq!(node.state.get_ack_status(&vote_hash).unwrap(), AckStatus::Invalid);
    // an ack could still place the end of minute, never the vote
    assert!(node.state.holding.contains(&eom_hash));
    assert!(!node.state.holding.contains(&vote_hash));
    assert!(node.state.process_lists.get(limit).is_none());
    assert!(node.state.process_lists.get(limit - 1).is_none());
    assert_eq!(node.state.highest_known(), known);
    assert_eq!(node.state.status.read().highest_known, known);
    assert!(!node
        .sent()
        .iter()
        .any(|message| matches!(message, Message::DBStateMissing(_))));
}

#[test]
fn test_leader_message_of_a_later_height_opens_it() {
    let federation = Federation::new(FED, 0);
    let mut node = TestNode::new(federation.config(None));
    let leader = federation.leader(&node.state, 3, 0, 2);
    assert!(node.state.process_lists.get(3).is_none());

    let eom = EndOfMinute::new(node.state.now(), 3, 0, 2, leader.identity, &leader.keypair);
    node.state.execute_msg(Message::EndOfMinute(eom));
    assert!(node.state.process_lists.get(3).is_some());
}

#[test]
fn test_missing_request_for_the_last_height_is_ignored() {
    let mut federation = Federation::new(FED, 0);
    let mut node = follower_past_signatures(&mut federation);
    node.sent();

    node.state.execute_msg(Message::MissingMsg(MissingMsg {
        timestamp: node.state.now(),
        db_height: u32::MAX,
        vm_index: 0,
        heights: vec![0, 1],
        asker: None,
    }));
    while node.state.step() {}
    assert!(node.sent().is_empty());
    assert!(node.state.deferred_missing.is_empty());
}
