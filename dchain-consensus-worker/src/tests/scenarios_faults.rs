// Copyright (c) 2024 DCHAIN LABS
use assert_matches::assert_matches;
use dchain_consensus_exports::{AckStatus, NodeIdentity};
use dchain_models::{
    blocks::AdminEntry,
    messages::{DirectoryBlockSignature, FullServerFault, ServerFault},
    Message,
};

use super::tools::{Federation, TestNode};

/// three federated servers and one audit server
fn federation() -> Federation {
    Federation::new(3, 1)
}

/// vm led by `leader` at minute 0 of height 1
fn vm_of(node: &TestNode, leader: &NodeIdentity) -> usize {
    node.state
        .process_lists
        .get(1)
        .unwrap()
        .get_virtual_servers(0, &leader.identity)
        .expect("not a leader of height 1")
}

fn vote(node: &TestNode, voter: &NodeIdentity, vm_index: usize, faulted: &NodeIdentity, replacement: &NodeIdentity) -> ServerFault {
    ServerFault::new(
        node.state.now(),
        1,
        vm_index,
        faulted.identity,
        replacement.identity,
        0,
        voter.identity,
        &voter.keypair,
    )
}

#[test]
fn test_stalled_leader_is_replaced_by_the_audit_server() {
    let federation = federation();
    let (b, c, d) = (
        federation.nth(1).clone(),
        federation.nth(2).clone(),
        federation.nth(3).clone(),
    );
    let mut node = TestNode::new(federation.config(Some(0)));
    while node.state.step() {}
    assert!(node.state.saving);
    node.sent();

    // no vote before the timeout
    node.state.on_tick();
    assert!(node.sent().is_empty());

    node.clock.advance(node.state.config.fault_timeout);
    node.state.on_tick();
    let vm_index = vm_of(&node, &c);
    let votes: Vec<_> = node
        .sent()
        .into_iter()
        .filter_map(|message| match message {
            Message::ServerFault(vote) => Some(vote),
            _ => None,
        })
        .collect();
    // one vote per stalled vm, its own vm is signed
    assert_eq!(votes.len(), 2);
    assert!(votes
        .iter()
        .any(|vote| vote.vm_index == vm_index && vote.faulted == c.identity && vote.replacement == d.identity));

    node.state
        .execute_msg(Message::ServerFault(vote(&node, &b, vm_index, &c, &d)));
    assert!(node.sent().is_empty(), "the replacement has not pledged yet");
    node.state
        .execute_msg(Message::ServerFault(vote(&node, &d, vm_index, &c, &d)));
    let sent = node.sent();
    assert_eq!(sent.len(), 1);
    assert_matches!(&sent[0], Message::FullServerFault(fault) => {
        assert_eq!((fault.faulted, fault.replacement), (c.identity, d.identity));
        assert!(fault.has_pledge());
        assert_eq!(fault.votes.len(), 3);
    });

    while node.state.step() {}
    let pl = node.state.process_lists.get(1).unwrap();
    assert!(pl.authorities.is_fed(&d.identity));
    assert!(pl.authorities.is_audit(&c.identity));
    assert_eq!(pl.vm_leader(0, vm_index), Some(&d.identity));
    assert!(pl.admin_block.entries.iter().any(|entry| matches!(
        entry,
        AdminEntry::ServerFault { faulted, replacement, system_height: 0 }
            if *faulted == c.identity && *replacement == d.identity
    )));
    assert_eq!(pl.system.height, 1);
}

/// Full fault of `c` by `d`, voted by `voters` and assembled by the first one.
fn full_fault(node: &TestNode, voters: &[&NodeIdentity], c: &NodeIdentity, d: &NodeIdentity) -> FullServerFault {
    let vm_index = vm_of(node, c);
    let votes = voters
        .iter()
        .map(|voter| (voter.identity, vote(node, voter, vm_index, c, d).signature))
        .collect();
    FullServerFault::new(
        node.state.now(),
        1,
        vm_index,
        c.identity,
        d.identity,
        0,
        votes,
        voters[0].identity,
        &voters[0].keypair,
    )
}

#[test]
fn test_follower_applies_a_full_fault() {
    let mut federation = federation();
    let (a, b, c, d) = (
        federation.nth(0).clone(),
        federation.nth(1).clone(),
        federation.nth(2).clone(),
        federation.nth(3).clone(),
    );
    let mut node = TestNode::new(federation.config(None));
    let vm_index = vm_of(&node, &c);

    let fault = full_fault(&node, &[&a, &b, &d], &c, &d);
    node.state.execute_msg(Message::FullServerFault(fault));
    while node.state.step() {}
    let pl = node.state.process_lists.get(1).unwrap();
    assert_eq!(pl.vm_leader(0, vm_index), Some(&d.identity));

    // the replaced leader can no longer sign for the vm
    let header = node.state.dbstates.get(0).unwrap().block.directory_block.header.clone();
    let stale = Message::DirectoryBlockSignature(DirectoryBlockSignature::new(
        node.state.now(),
        vm_index,
        header,
        c.identity,
        &c.keypair,
    ));
    let stale_hash = stale.msg_hash();
    node.state.execute_msg(stale);
    assert_eq!(node.state.get_ack_status(&stale_hash).unwrap(), AckStatus::Invalid);

    // its replacement can
    let (dbsig, ack) = federation.dbsig(&node.state, 1, vm_index);
    let dbsig_hash = dbsig.msg_hash();
    node.deliver(dbsig, ack);
    assert_eq!(node.state.get_ack_status(&dbsig_hash).unwrap(), AckStatus::Ack);
}

#[test]
fn test_full_fault_without_majority_is_invalid() {
    let federation = federation();
    let (a, c, d) = (
        federation.nth(0).clone(),
        federation.nth(2).clone(),
        federation.nth(3).clone(),
    );
    let mut node = TestNode::new(federation.config(None));

    let fault = full_fault(&node, &[&a, &d], &c, &d);
    let hash = Message::FullServerFault(fault.clone()).msg_hash();
    node.state.execute_msg(Message::FullServerFault(fault));
    assert_eq!(node.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
    while node.state.step() {}
    assert!(node
        .state
        .process_lists
        .get(1)
        .unwrap()
        .authorities
        .is_fed(&c.identity));
}

#[test]
fn test_full_fault_without_pledge_is_invalid() {
    let federation = federation();
    let (a, b, c, d) = (
        federation.nth(0).clone(),
        federation.nth(1).clone(),
        federation.nth(2).clone(),
        federation.nth(3).clone(),
    );
    let mut node = TestNode::new(federation.config(None));

    let fault = full_fault(&node, &[&a, &b], &c, &d);
    let hash = Message::FullServerFault(fault.clone()).msg_hash();
    node.state.execute_msg(Message::FullServerFault(fault));
    assert_eq!(node.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
}

#[test]
fn test_vote_from_outsider_is_invalid() {
    let federation = federation();
    let outsider = Federation::new(5, 0).nth(4).clone();
    let (c, d) = (federation.nth(2).clone(), federation.nth(3).clone());
    let mut node = TestNode::new(federation.config(Some(0)));
    let vm_index = vm_of(&node, &c);

    let vote = Message::ServerFault(vote(&node, &outsider, vm_index, &c, &d));
    let hash = vote.msg_hash();
    node.state.execute_msg(vote);
    assert_eq!(node.state.get_ack_status(&hash).unwrap(), AckStatus::Invalid);
    assert!(node.state.fault_votes.is_empty());
}
