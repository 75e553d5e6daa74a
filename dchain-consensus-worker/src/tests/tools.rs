// Copyright (c) 2024 DCHAIN LABS
use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc},
};

use dchain_channel::receiver::DChainReceiver;
use dchain_consensus_exports::{
    test_exports::{capturing_network, test_identities},
    ConsensusChannels, ConsensusConfig, NodeIdentity, StaticAuthorityRegistry,
};
use dchain_db_exports::DbConfig;
use dchain_db_worker::MemoryDB;
use dchain_hash::Hash;
use dchain_models::{
    blocks::{DirectoryBlockHeader, Entry},
    messages::{CommitChain, DirectoryBlockSignature, EndOfMinute, RevealEntry},
    Ack, ChainId, EcAddress, IdentityId, Message, ServerType,
};
use dchain_signature::KeyPair;
use dchain_time::{ChainTime, ManualClock};
use parking_lot::{Mutex, RwLock};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    mmr::{mmr_channels, MmrReceivers},
    replay::ReplayFilter,
    state::{ConsensusState, ConsensusStatus},
};

/// Sends debug logs of the test to stdout. Only the first call of a test
/// binary installs the subscriber.
pub fn init_logging() {
    use tracing_subscriber::prelude::*;
    let tracing_layer = tracing_subscriber::fmt::layer()
        .with_test_writer()
        .with_filter(LevelFilter::DEBUG);
    let _ = tracing_subscriber::registry().with(tracing_layer).try_init();
}

/// Time every test node starts at.
pub const START: ChainTime = ChainTime::from_minutes(1_000);

/// A consensus state driven by hand, with everything it sends captured.
pub struct TestNode {
    pub state: ConsensusState,
    pub clock: ManualClock,
    pub network: DChainReceiver<Message>,
    pub database: Arc<MemoryDB>,
    pub mmr: MmrReceivers,
}

impl TestNode {
    /// Node over an empty database.
    pub fn new(config: ConsensusConfig) -> Self {
        Self::with_database(config, Arc::new(MemoryDB::new(DbConfig::default())))
    }

    /// Node loading its state from `database`.
    pub fn with_database(config: ConsensusConfig, database: Arc<MemoryDB>) -> Self {
        let clock = ManualClock::new(START);
        let (network, captured) = capturing_network();
        let (mmr_senders, mmr) = mmr_channels();
        let channels = ConsensusChannels {
            network: Box::new(network),
            authorities: Arc::new(StaticAuthorityRegistry::new(
                config.genesis_authorities.clone(),
            )),
            database: database.clone(),
            clock: Arc::new(clock.clone()),
            invalid_message_sender: None,
        };
        let replay = Arc::new(Mutex::new(ReplayFilter::new(config.replay_range_minutes)));
        let state = ConsensusState::new(
            config,
            channels,
            mmr_senders,
            replay,
            Arc::new(RwLock::new(ConsensusStatus::default())),
            Arc::new(AtomicBool::new(false)),
        )
        .expect("could not load the consensus state");
        TestNode {
            state,
            clock,
            network: captured,
            database,
            mmr,
        }
    }

    /// Executes an ack then its message, the way a follower gets them.
    pub fn deliver(&mut self, message: Message, ack: Ack) {
        self.state.execute_msg(Message::Ack(ack));
        self.state.execute_msg(message);
    }

    /// Everything sent since the last call.
    pub fn sent(&self) -> Vec<Message> {
        self.network.drain_up_to(usize::MAX)
    }

    /// Moves the clock by one minute of a block, then runs a full pass.
    pub fn tick_minute(&mut self) {
        self.clock.advance(self.state.config.minute_duration());
        self.state.on_tick();
        while self.state.step() {}
    }

    /// Ticks until `height` is saved. Panics after `max_minutes`.
    pub fn run_until_saved(&mut self, height: u32, max_minutes: usize) {
        for _ in 0..max_minutes {
            if self.state.dbstates.highest_saved() >= height {
                return;
            }
            self.tick_minute();
        }
        panic!(
            "height {} not saved after {} minutes, highest saved {}",
            height,
            max_minutes,
            self.state.dbstates.highest_saved()
        );
    }
}

/// Federated and audit servers signing on behalf of the leaders of a test
/// network, keeping the ack chain of every virtual server.
pub struct Federation {
    pub identities: Vec<(NodeIdentity, ServerType)>,
    last_acks: HashMap<(u32, usize), Ack>,
}

impl Federation {
    pub fn new(fed: usize, audit: usize) -> Self {
        Federation {
            identities: test_identities(fed, audit),
            last_acks: HashMap::new(),
        }
    }

    /// Test configuration for a node signing as `me`, or a follower.
    pub fn config(&self, me: Option<usize>) -> ConsensusConfig {
        let identity = me.map(|index| self.identities[index].0.clone());
        ConsensusConfig::for_tests(&self.identities, identity)
    }

    /// identity of an authority by identity id
    pub fn node(&self, identity: &IdentityId) -> &NodeIdentity {
        &self
            .identities
            .iter()
            .find(|(node, _)| node.identity == *identity)
            .expect("unknown test identity")
            .0
    }

    /// identity of an authority by position
    pub fn nth(&self, index: usize) -> &NodeIdentity {
        &self.identities[index].0
    }

    /// Leader of `vm_index` at `minute` of `db_height`, as the node sees it.
    pub fn leader(&self, state: &ConsensusState, db_height: u32, minute: u8, vm_index: usize) -> NodeIdentity {
        let leader = state
            .process_lists
            .vm_leader_at(db_height, minute, vm_index)
            .expect("no leader for this vm");
        self.node(&leader).clone()
    }

    /// Stamps the next ack of a VM for `message`, signed by `leader`.
    pub fn ack(
        &mut self,
        leader: &NodeIdentity,
        timestamp: ChainTime,
        db_height: u32,
        vm_index: usize,
        message: &Message,
    ) -> Ack {
        let ack = Ack::new(
            self.last_acks.get(&(db_height, vm_index)),
            timestamp,
            db_height,
            vm_index,
            message.msg_hash(),
            leader.identity,
            &leader.keypair,
        );
        self.last_acks.insert((db_height, vm_index), ack.clone());
        ack
    }

    /// Forgets the ack chains of `db_height`, as after a reset of its list.
    pub fn forget(&mut self, db_height: u32) {
        self.last_acks.retain(|(height, _), _| *height != db_height);
    }

    /// Signature of the previous block by the minute 0 leader of `vm_index`.
    pub fn dbsig(&mut self, state: &ConsensusState, db_height: u32, vm_index: usize) -> (Message, Ack) {
        let header = state
            .dbstates
            .get(db_height - 1)
            .expect("previous block unknown")
            .block
            .directory_block
            .header
            .clone();
        self.dbsig_over(state, db_height, vm_index, header)
    }

    /// Signature of an arbitrary header by the minute 0 leader of `vm_index`.
    pub fn dbsig_over(
        &mut self,
        state: &ConsensusState,
        db_height: u32,
        vm_index: usize,
        header: DirectoryBlockHeader,
    ) -> (Message, Ack) {
        let leader = self.leader(state, db_height, 0, vm_index);
        let now = state.now();
        let message = Message::DirectoryBlockSignature(DirectoryBlockSignature::new(
            now,
            vm_index,
            header,
            leader.identity,
            &leader.keypair,
        ));
        let ack = self.ack(&leader, now, db_height, vm_index, &message);
        (message, ack)
    }

    /// End of `minute` on `vm_index` from its leader.
    pub fn eom(&mut self, state: &ConsensusState, db_height: u32, minute: u8, vm_index: usize) -> (Message, Ack) {
        let leader = self.leader(state, db_height, minute, vm_index);
        let now = state.now();
        let message = Message::EndOfMinute(EndOfMinute::new(
            now,
            db_height,
            minute,
            vm_index,
            leader.identity,
            &leader.keypair,
        ));
        let ack = self.ack(&leader, now, db_height, vm_index, &message);
        (message, ack)
    }
}

/// Key paying for entries in tests.
pub fn ec_key() -> KeyPair {
    KeyPair::from_seed(&[0xec; 32])
}

/// address of [`ec_key`]
pub fn ec_address() -> EcAddress {
    EcAddress::from_public_key(&ec_key().get_public_key())
}

/// First entry of a new chain, with the commit paying for it.
pub fn new_chain(timestamp: ChainTime, name: &[u8]) -> (Message, Message, Hash) {
    let ext_ids = vec![name.to_vec()];
    let entry = Entry {
        chain_id: ChainId::from_ext_ids(&ext_ids),
        ext_ids,
        content: b"first entry".to_vec(),
    };
    let entry_hash = entry.hash();
    let commit = CommitChain::new(timestamp, entry.chain_id, entry_hash, 11, &ec_key());
    let reveal = RevealEntry::new(timestamp, entry);
    (
        Message::CommitChain(commit),
        Message::RevealEntry(reveal),
        entry_hash,
    )
}
