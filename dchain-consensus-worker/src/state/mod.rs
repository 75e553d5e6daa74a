// Copyright (c) 2024 DCHAIN LABS
use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use dchain_consensus_exports::{
    error::ConsensusError, ConsensusChannels, ConsensusConfig, NodeIdentity,
};
use dchain_db_exports::{DBBatch, MISSING_BLOCK_ERROR};
use dchain_hash::Hash;
use dchain_models::{
    blocks::{
        AdminBlock, AdminEntry, DirectoryBlock, EntryCreditBlock, FactoidBlock, FinalizedBlock,
    },
    messages::MissingMsg,
    Ack, ChainId, IdentityId, Message, ServerType,
};
use dchain_signature::Signature;
use dchain_time::ChainTime;
use parking_lot::{Mutex, RwLock};
use schnellru::{ByLength, LruMap};
use tracing::{error, info};

use crate::{
    dbstate::{DBState, DBStateList},
    holding::Holding,
    mmr::MmrSenders,
    process_list::{AuthoritySet, ProcessLists},
    replay::ReplayFilter,
};

mod balances;
mod dbsig;
mod dbstates;
mod entries;
mod eom;
mod execute;
mod fault;
mod holding_review;
mod missing;
mod process;
mod queries;
mod tick;

pub use balances::Balances;
pub use fault::FaultKey;

/// Number of invalid message hashes remembered.
const INVALID_CACHE_SIZE: u32 = 10_000;

/// Outcome of validating a message against the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// can be executed now
    Valid,
    /// may become valid later, kept in holding
    Hold,
    /// can never be executed
    Invalid,
}

/// Heights published after every pass for the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsensusStatus {
    /// highest height written to the database
    pub highest_saved: u32,
    /// highest height heard of
    pub highest_known: u32,
    /// height the leaders are building
    pub leader_height: u32,
    /// minute of the leader height
    pub current_minute: u8,
}

/// Everything the consensus driver owns. Only the driver thread mutates it.
pub struct ConsensusState {
    /// configuration
    pub config: ConsensusConfig,
    /// collaborators
    pub channels: ConsensusChannels,
    /// replay protection, shared with the controller for network pre-filtering
    pub replay: Arc<Mutex<ReplayFilter>>,
    /// process lists by height
    pub process_lists: ProcessLists,
    /// finished heights by height
    pub dbstates: DBStateList,
    /// messages waiting to be executed again
    pub holding: Holding,
    /// acks waiting for their message, by message hash
    pub acks: HashMap<Hash, Ack>,
    /// processed commits not revealed yet, by entry hash
    pub commits: HashMap<Hash, Message>,
    /// hashes of messages found invalid
    pub invalid: LruMap<Hash, (), ByLength>,
    /// permanent balances
    pub balances: Balances,
    /// keymr of the last entry block of every known chain
    pub chain_heads: HashMap<ChainId, Hash>,
    /// height the leaders are building
    pub leader_height: u32,
    /// minute of `leader_height`, 0 to 10
    pub current_minute: u8,
    /// true while the signature round of `leader_height` is open
    pub saving: bool,
    /// highest height whose balances and authority changes were applied
    pub processed_height: u32,
    /// when the current minute or signature round started
    pub minute_started_at: ChainTime,
    /// end of minute messages already issued, by (height, minute, vm)
    pub issued_eoms: HashSet<(u32, u8, usize)>,
    /// signatures already issued, by (height, vm)
    pub issued_dbsigs: HashSet<(u32, usize)>,
    /// fault votes received, by fault
    pub fault_votes: BTreeMap<FaultKey, BTreeMap<IdentityId, Signature>>,
    /// faults this node voted for
    pub cast_votes: HashSet<FaultKey>,
    /// missing message requests that could not be fully answered yet, with their deadline
    pub deferred_missing: VecDeque<(ChainTime, MissingMsg)>,
    /// messages this node leads that wait for their virtual server to catch up
    pub leader_backlog: Vec<Message>,
    /// messages released by a processed dependency, executed in the same pass
    pub released: VecDeque<Message>,
    /// when the last catchup request was sent
    pub last_catchup: Option<ChainTime>,
    /// when holding was last reviewed
    pub last_review: ChainTime,
    /// boot time, start of the grace period for old messages
    pub boot_time: ChainTime,
    /// missing message requester
    pub mmr: MmrSenders,
    /// status shared with the controller
    pub status: Arc<RwLock<ConsensusStatus>>,
    /// raised by the controller when it dropped a message on a full queue
    pub dbstate_flood: Arc<AtomicBool>,
}

/// Authorities declared by the configuration for height 0.
fn genesis_authority_set(config: &ConsensusConfig) -> AuthoritySet {
    let of_type = |server_type: ServerType| {
        config
            .genesis_authorities
            .iter()
            .filter(move |authority| authority.server_type == server_type)
            .map(|authority| authority.identity)
    };
    AuthoritySet::new(of_type(ServerType::Federated), of_type(ServerType::Audit))
}

/// Builds the block of height 0: an admin block declaring the genesis
/// authorities and empty entry-credit and factoid blocks.
pub fn create_genesis_block(config: &ConsensusConfig) -> FinalizedBlock {
    let set = genesis_authority_set(config);
    let mut admin_block = AdminBlock::new(0);
    for identity in &set.fed {
        admin_block.add_entry(AdminEntry::AddFederatedServer {
            identity: *identity,
            db_height: 0,
        });
    }
    for identity in &set.audit {
        admin_block.add_entry(AdminEntry::AddAuditServer {
            identity: *identity,
            db_height: 0,
        });
    }
    let mut state = DBState::from_database(FinalizedBlock {
        directory_block: DirectoryBlock::new(config.network_id, 0, config.genesis_timestamp),
        admin_block,
        factoid_block: FactoidBlock::new(0, config.ec_exchange_rate),
        ec_block: EntryCreditBlock::new(0),
        entry_blocks: Vec::new(),
        entries: Vec::new(),
    });
    state.rebuild_directory_entries();
    state.block
}

impl ConsensusState {
    /// Creates the driver state from the database.
    ///
    /// An empty database gets a genesis block. Otherwise every saved block is
    /// replayed to rebuild balances, chain heads and authorities, and the last
    /// `dbstate_retention` blocks are kept in memory.
    pub fn new(
        config: ConsensusConfig,
        channels: ConsensusChannels,
        mmr: MmrSenders,
        replay: Arc<Mutex<ReplayFilter>>,
        status: Arc<RwLock<ConsensusStatus>>,
        dbstate_flood: Arc<AtomicBool>,
    ) -> Result<Self, ConsensusError> {
        let database = channels.database.clone();
        let head = match database.fetch_directory_block_head()? {
            Some(head) => head.db_height(),
            None => {
                let genesis = create_genesis_block(&config);
                info!("empty database, writing genesis block {}", genesis.keymr());
                let mut batch = DBBatch::new();
                batch.add_block(genesis, []);
                database.write_batch(batch)?;
                0
            }
        };
        let fetch = |height: u32| -> Result<FinalizedBlock, ConsensusError> {
            match database.fetch_block_by_height(height)? {
                Some(block) => Ok(block),
                None => {
                    error!("block {} is missing below the database head {}", height, head);
                    panic!("{}: height {}", MISSING_BLOCK_ERROR, height);
                }
            }
        };

        let retention = config.dbstate_retention.max(1) as u32;
        let first_kept = (head + 1).saturating_sub(retention);
        let now = channels.clock.now();
        let mut state = ConsensusState {
            replay,
            process_lists: ProcessLists::new(
                head + 1,
                AuthoritySet::default(),
                config.ec_exchange_rate,
            ),
            dbstates: DBStateList::new(
                DBState::from_database(fetch(first_kept)?),
                config.dbstate_retention,
            ),
            holding: Holding::new(config.max_holding_size),
            acks: HashMap::new(),
            commits: HashMap::new(),
            invalid: LruMap::new(ByLength::new(INVALID_CACHE_SIZE)),
            balances: Balances::default(),
            chain_heads: HashMap::new(),
            leader_height: head + 1,
            current_minute: 0,
            saving: true,
            processed_height: 0,
            minute_started_at: now,
            issued_eoms: HashSet::new(),
            issued_dbsigs: HashSet::new(),
            fault_votes: BTreeMap::new(),
            cast_votes: HashSet::new(),
            deferred_missing: VecDeque::new(),
            leader_backlog: Vec::new(),
            released: VecDeque::new(),
            last_catchup: None,
            last_review: now,
            boot_time: now,
            mmr,
            status,
            dbstate_flood,
            config,
            channels,
        };

        for height in 0..=head {
            let block = fetch(height)?;
            state.apply_block_effects(&block);
            state.processed_height = height;
            if height > first_kept {
                state.dbstates.put(DBState::from_database(block));
                state.dbstates.mark_saved(height);
            }
        }
        let limit = state.process_list_limit();
        state.process_lists.get_or_create(state.leader_height, limit);
        state.mmr.advance_height(state.leader_height);
        info!(
            "consensus state loaded: highest saved {}, leading height {}",
            head, state.leader_height
        );
        state.publish_status();
        Ok(state)
    }

    /// current logical time
    pub fn now(&self) -> ChainTime {
        self.channels.clock.now()
    }

    /// signing identity of the node, if any
    pub(crate) fn identity(&self) -> Option<NodeIdentity> {
        self.config.identity.clone()
    }

    /// Timestamp written in the directory block of `db_height`. Every node
    /// computes the same value.
    pub(crate) fn block_timestamp(&self, db_height: u32) -> ChainTime {
        self.config
            .genesis_timestamp
            .saturating_add(self.config.block_time.saturating_mul(db_height as u64))
    }

    /// highest height a process list may be created for
    pub(crate) fn process_list_limit(&self) -> u32 {
        self.dbstates
            .highest_known()
            .max(self.leader_height)
            .saturating_add(self.config.lookahead_heights)
    }

    /// Highest height heard of: states held or process lists created by
    /// messages of later heights.
    pub fn highest_known(&self) -> u32 {
        let from_lists = self
            .process_lists
            .highest()
            .map_or(0, |height| height.saturating_sub(1));
        self.dbstates.highest_known().max(from_lists)
    }

    /// Publishes the heights read by the controller.
    pub fn publish_status(&self) {
        let status = ConsensusStatus {
            highest_saved: self.dbstates.highest_saved(),
            highest_known: self.highest_known(),
            leader_height: self.leader_height,
            current_minute: self.current_minute,
        };
        *self.status.write() = status;
    }

    /// Records an invalid message and reports it once.
    pub(crate) fn mark_invalid(&mut self, message: &Message) {
        let hash = message.msg_hash();
        if self.invalid.peek(&hash).is_some() {
            return;
        }
        self.invalid.insert(hash, ());
        tracing::warn!("invalid {} message {}", message.kind(), hash);
        if let Some(sender) = &self.channels.invalid_message_sender {
            let _ = sender.try_send(message.clone());
        }
    }

    /// One pass of the driver outside of queue draining: issues due
    /// signatures, re-executes released and backlogged messages, processes the
    /// lists, moves finished heights forward and serves deferred requests.
    /// Returns true if anything moved.
    pub fn step(&mut self) -> bool {
        let mut progress = false;
        if self.dbstate_flood.swap(false, Ordering::AcqRel) {
            let dropped = self.holding.drop_dbstates();
            tracing::debug!("message queue flooded, dropped {} held blocks", dropped);
        }
        progress |= self.issue_dbsig();
        progress |= self.execute_released();
        progress |= self.retry_leader_backlog();
        progress |= self.process();
        while self.update_state() {
            progress = true;
        }
        self.trim_windows();
        self.catchup();
        self.retry_deferred_missing();
        self.review_holding();
        self.publish_status();
        progress
    }

    /// Drops process lists and states that fell out of the retention windows.
    pub(crate) fn trim_windows(&mut self) {
        let highest_saved = self.dbstates.highest_saved();
        let keep_from = (highest_saved + 1).saturating_sub(self.config.process_list_retention);
        self.process_lists.trim(keep_from);
        self.dbstates.trim();
        self.issued_eoms.retain(|(height, _, _)| *height > highest_saved);
        self.issued_dbsigs.retain(|(height, _)| *height > highest_saved);
        self.fault_votes.retain(|key, _| key.db_height > highest_saved);
        self.cast_votes.retain(|key| key.db_height > highest_saved);
    }

    /// Closes the database; in-flight state is abandoned.
    pub fn shutdown(&self) {
        if let Err(err) = self.channels.database.close() {
            tracing::warn!("error while closing the database: {}", err);
        }
    }
}
